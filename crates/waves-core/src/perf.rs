//! Running timings of the update loop.
//!
//! Ticks are nanoseconds measured with [`std::time::Instant`]. Counters only
//! accumulate; [`PerformanceCounters::reset`] starts a new measurement window.

use std::time::{Duration, Instant};

/// A timed phase of one simulation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Stencil velocity pass.
    Velocity,
    /// Location integration pass.
    Location,
}

/// Averages derived from [`PerformanceCounters`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PerformanceAverages {
    /// Mean ticks per iteration (both phases).
    pub per_iteration: f64,
    /// Mean ticks per iteration divided by the logical cell count.
    pub per_iteration_per_cell: f64,
    /// Mean ticks of the velocity pass.
    pub velocity: f64,
    /// Mean ticks of the location pass.
    pub location: f64,
    /// Iterations the averages are taken over.
    pub iterations: u64,
}

impl PerformanceAverages {
    /// Cell updates per second implied by the per-cell average.
    pub fn cells_per_second(&self) -> f64 {
        if self.per_iteration_per_cell > 0.0 {
            1.0e9 / self.per_iteration_per_cell
        } else {
            0.0
        }
    }
}

/// Accumulated phase timings.
#[derive(Debug, Clone, Default)]
pub struct PerformanceCounters {
    velocity_ticks: u64,
    location_ticks: u64,
    iterations: u64,
    cells: u64,
}

impl PerformanceCounters {
    /// Counters for a grid with `cells` logical cells.
    pub fn new(cells: usize) -> Self {
        Self {
            cells: cells as u64,
            ..Self::default()
        }
    }

    /// Add elapsed time to a phase.
    pub fn record(&mut self, phase: Phase, elapsed: Duration) {
        let ticks = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        let slot = match phase {
            Phase::Velocity => &mut self.velocity_ticks,
            Phase::Location => &mut self.location_ticks,
        };
        *slot = slot.saturating_add(ticks);
    }

    /// Time `f` and record it against `phase`.
    pub fn time<R>(&mut self, phase: Phase, f: impl FnOnce() -> R) -> R {
        let start = Instant::now();
        let result = f();
        self.record(phase, start.elapsed());
        result
    }

    /// Count one completed iteration.
    pub fn finish_iteration(&mut self) {
        self.iterations += 1;
    }

    /// Iterations recorded since the last reset.
    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// Total ticks for a phase.
    pub fn total(&self, phase: Phase) -> u64 {
        match phase {
            Phase::Velocity => self.velocity_ticks,
            Phase::Location => self.location_ticks,
        }
    }

    /// Mean ticks per iteration, 0 before the first iteration.
    pub fn average_per_iteration(&self) -> f64 {
        self.mean(self.velocity_ticks + self.location_ticks)
    }

    /// Mean ticks per iteration per logical cell.
    pub fn average_per_iteration_per_cell(&self) -> f64 {
        if self.cells == 0 {
            return 0.0;
        }
        self.average_per_iteration() / self.cells as f64
    }

    /// All averages at once.
    pub fn averages(&self) -> PerformanceAverages {
        PerformanceAverages {
            per_iteration: self.average_per_iteration(),
            per_iteration_per_cell: self.average_per_iteration_per_cell(),
            velocity: self.mean(self.velocity_ticks),
            location: self.mean(self.location_ticks),
            iterations: self.iterations,
        }
    }

    /// Clear all totals, keeping the cell count.
    pub fn reset(&mut self) {
        *self = Self {
            cells: self.cells,
            ..Self::default()
        };
    }

    fn mean(&self, ticks: u64) -> f64 {
        if self.iterations == 0 {
            0.0
        } else {
            ticks as f64 / self.iterations as f64
        }
    }
}
