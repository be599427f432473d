//! Calculation thread that keeps a simulation stepping.
//!
//! The simulation lives behind a [`parking_lot::Mutex`]. The calculation
//! thread holds the lock for a whole `iterate()`, so anything that reads the
//! field through [`SimulationController::with_simulation`] sees a complete
//! generation.
//!
//! Every `frame_check_every` iterations the thread offers a frame to the
//! [`FrameSink`], but only if `frame_interval` has passed since the last one
//! or an exposure is being recorded.

use crate::error::{SimError, SimResult};
use crate::simulation::WavefieldSimulation;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info};
use waves_core::PerformanceAverages;

const PAUSE_POLL: Duration = Duration::from_millis(20);

/// Snapshot of the loop state handed to a [`FrameSink`].
#[derive(Debug, Clone, Copy)]
pub struct FrameStats {
    /// Iterations completed.
    pub iteration: u64,
    /// Phase timing averages.
    pub averages: PerformanceAverages,
    /// Time since the previous frame.
    pub since_last: Duration,
    /// Whether an exposure is being recorded.
    pub exposing: bool,
}

/// Consumer of periodic frames, typically a renderer.
pub trait FrameSink: Send + 'static {
    /// Called on the calculation thread with the simulation locked.
    fn present(&mut self, simulation: &WavefieldSimulation, stats: &FrameStats);
}

impl<F> FrameSink for F
where
    F: FnMut(&WavefieldSimulation, &FrameStats) + Send + 'static,
{
    fn present(&mut self, simulation: &WavefieldSimulation, stats: &FrameStats) {
        self(simulation, stats)
    }
}

/// Loop settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerOptions {
    /// Start stepping immediately.
    pub auto_start: bool,
    /// Stop once this many iterations are done.
    pub max_iterations: Option<u64>,
    /// Iterations between frame checks.
    pub frame_check_every: u64,
    /// Minimum time between frames.
    pub frame_interval: Duration,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            auto_start: true,
            max_iterations: None,
            frame_check_every: 64,
            frame_interval: Duration::from_secs(1) / 30,
        }
    }
}

#[derive(Debug, Default)]
struct Flags {
    paused: AtomicBool,
    terminate: AtomicBool,
    finished: AtomicBool,
}

/// Owns the calculation thread and the shared simulation.
pub struct SimulationController {
    simulation: Arc<Mutex<WavefieldSimulation>>,
    flags: Arc<Flags>,
    handle: Option<JoinHandle<()>>,
}

impl SimulationController {
    /// Start the calculation thread.
    pub fn spawn(
        simulation: WavefieldSimulation,
        options: ControllerOptions,
        sink: impl FrameSink,
    ) -> SimResult<Self> {
        let simulation = Arc::new(Mutex::new(simulation));
        let flags = Arc::new(Flags::default());
        flags.paused.store(!options.auto_start, Ordering::Release);

        let handle = {
            let simulation = Arc::clone(&simulation);
            let flags = Arc::clone(&flags);
            thread::Builder::new()
                .name("waves-calc".into())
                .spawn(move || calculation_loop(&simulation, &flags, options, sink))
                .map_err(SimError::Io)?
        };

        info!(
            auto_start = options.auto_start,
            max_iterations = ?options.max_iterations,
            "calculation thread started"
        );
        Ok(Self {
            simulation,
            flags,
            handle: Some(handle),
        })
    }

    /// Shared handle to the simulation.
    pub fn simulation(&self) -> Arc<Mutex<WavefieldSimulation>> {
        Arc::clone(&self.simulation)
    }

    /// Run `f` with the simulation locked, between two iterations.
    pub fn with_simulation<R>(&self, f: impl FnOnce(&mut WavefieldSimulation) -> R) -> R {
        f(&mut self.simulation.lock())
    }

    /// Stop stepping until [`resume`](Self::resume).
    pub fn pause(&self) {
        self.flags.paused.store(true, Ordering::Release);
    }

    /// Continue stepping.
    pub fn resume(&self) {
        self.flags.paused.store(false, Ordering::Release);
    }

    /// Flip between paused and running; returns the new paused state.
    pub fn toggle_pause(&self) -> bool {
        !self.flags.paused.fetch_xor(true, Ordering::AcqRel)
    }

    /// Whether stepping is paused.
    pub fn is_paused(&self) -> bool {
        self.flags.paused.load(Ordering::Acquire)
    }

    /// Whether the thread has exited (iteration limit or stop).
    pub fn is_finished(&self) -> bool {
        self.flags.finished.load(Ordering::Acquire)
    }

    /// Ask the thread to exit and wait for it.
    pub fn stop(&mut self) {
        self.flags.terminate.store(true, Ordering::Release);
        self.join();
    }

    /// Wait for the thread to exit on its own.
    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("calculation thread panicked");
            }
        }
    }
}

impl Drop for SimulationController {
    fn drop(&mut self) {
        self.stop();
    }
}

fn calculation_loop(
    simulation: &Mutex<WavefieldSimulation>,
    flags: &Flags,
    options: ControllerOptions,
    mut sink: impl FrameSink,
) {
    let check_every = options.frame_check_every.max(1);
    let mut last_frame = Instant::now();

    while !flags.terminate.load(Ordering::Acquire) {
        if flags.paused.load(Ordering::Acquire) {
            thread::sleep(PAUSE_POLL);
            continue;
        }

        let mut sim = simulation.lock();
        let iteration = sim.current_iteration();
        if options.max_iterations.is_some_and(|max| iteration >= max) {
            break;
        }
        if iteration % check_every == 0 {
            let since_last = last_frame.elapsed();
            if since_last >= options.frame_interval || sim.is_exposing() {
                present(&mut sink, &sim, since_last);
                last_frame = Instant::now();
            }
        }
        sim.iterate();
    }

    let sim = simulation.lock();
    present(&mut sink, &sim, last_frame.elapsed());
    flags.finished.store(true, Ordering::Release);
    debug!(iteration = sim.current_iteration(), "calculation thread exiting");
}

fn present(sink: &mut impl FrameSink, sim: &WavefieldSimulation, since_last: Duration) {
    let stats = FrameStats {
        iteration: sim.current_iteration(),
        averages: sim.performance_averages(),
        since_last,
        exposing: sim.is_exposing(),
    };
    sink.present(sim, &stats);
}
