//! The wave field simulation.
//!
//! [`WavefieldSimulation`] owns two generations of [`Cell`]s, the material map
//! built from a [`SceneDescription`], the emitters and a [`WorkerPool`]. Each
//! call to [`iterate`](WavefieldSimulation::iterate) advances the field by
//! one step:
//!
//! 1. enabled emitters force their cells in the current generation,
//! 2. velocity pass over all logical cells (parallel, full barrier),
//! 3. location pass (parallel, full barrier),
//! 4. the iteration counter advances, which swaps the generations,
//! 5. an active exposure accumulates the new current generation.
//!
//! Which generation is "current" is decided by the parity of the iteration
//! counter, so no data is copied between steps.

mod emitter;
mod material;
mod params;
mod stencil;

pub use emitter::{Emitter, Region, SquareWave};
pub use material::{
    quantize_resistance, resistance_table, Material, MaterialMap, VelocityFactor,
    RESISTANCE_LEVELS, RESISTANCE_MAX,
};
pub use params::{Stencil, WaveParams};
pub use stencil::{Kernel, Taps};

use crate::error::{SimError, SimResult};
use crate::imaging::{
    ApertureMask, Exposure, ExposureMode, ImagePatternDecoder, ImageWriter, PatternDecoder,
    PngWriter,
};
use crate::scene::SceneDescription;
use std::path::Path;
use tracing::{debug, error, info, warn};
use waves_core::{Cell, Grid, PerformanceAverages, PerformanceCounters, Phase, WorkerPool};

/// Lifecycle of a simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationState {
    /// Grids allocated, not yet initialized.
    Uninitialized,
    /// Initialized, no step taken since.
    Ready,
    /// At least one step taken.
    Stepping,
}

/// Configuration for building a [`WavefieldSimulation`].
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    /// Scene to simulate.
    pub scene: SceneDescription,
    /// Worker threads; 0 uses every available hardware thread.
    pub threads: usize,
}

impl SimulationConfig {
    /// Configuration for a scene with automatic thread count.
    pub fn new(scene: SceneDescription) -> Self {
        Self { scene, threads: 0 }
    }

    /// Configuration for a built-in scene.
    pub fn preset(index: usize) -> SimResult<Self> {
        SceneDescription::preset(index)
            .map(Self::new)
            .ok_or_else(|| SimError::config(format!("no built-in scene {index}")))
    }

    /// Set the worker thread count.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Build the simulation.
    pub fn build(self) -> SimResult<WavefieldSimulation> {
        let pool = if self.threads == 0 {
            WorkerPool::with_available_parallelism()?
        } else {
            WorkerPool::new(self.threads)?
        };
        WavefieldSimulation::with_pool(self.scene, pool)
    }
}

/// Scene-dependent state, rebuilt together on a scene switch.
struct SceneState {
    scene: SceneDescription,
    generations: [Grid<Cell>; 2],
    material: MaterialMap,
    kernel: Kernel,
    emitters: Vec<Emitter>,
}

impl SceneState {
    fn build(scene: SceneDescription) -> SimResult<Self> {
        scene.validate()?;
        let material = scene.build_material()?;
        let shape = scene.shape();
        let current = Grid::new(shape, Cell::default())?;
        let kernel = Kernel::new(&scene.params, current.layout())?;
        Ok(Self {
            emitters: scene.emitters.clone(),
            generations: [current.clone(), current],
            material,
            kernel,
            scene,
        })
    }
}

/// A heterogeneous scalar wave field and everything needed to advance it.
pub struct WavefieldSimulation {
    scene: SceneDescription,
    generations: [Grid<Cell>; 2],
    material: MaterialMap,
    kernel: Kernel,
    emitters: Vec<Emitter>,
    aperture: Option<ApertureMask>,
    decoder: Box<dyn PatternDecoder>,
    pool: WorkerPool,
    iteration: u64,
    counters: PerformanceCounters,
    exposure: Option<Exposure>,
    exposure_frames: u64,
    state: SimulationState,
}

impl WavefieldSimulation {
    /// Build a simulation for `scene` with `threads` workers (0 for all
    /// hardware threads).
    pub fn new(scene: SceneDescription, threads: usize) -> SimResult<Self> {
        SimulationConfig::new(scene).with_threads(threads).build()
    }

    /// Build a simulation that runs its passes on an existing pool.
    pub fn with_pool(scene: SceneDescription, pool: WorkerPool) -> SimResult<Self> {
        let parts = SceneState::build(scene)?;
        let cells = parts.scene.shape().cell_count();
        info!(
            scene = %parts.scene.name,
            shape = %parts.scene.shape(),
            threads = pool.size(),
            emitters = parts.emitters.len(),
            "simulation created"
        );
        Ok(Self {
            scene: parts.scene,
            generations: parts.generations,
            material: parts.material,
            kernel: parts.kernel,
            emitters: parts.emitters,
            aperture: None,
            decoder: Box::new(ImagePatternDecoder::default()),
            pool,
            iteration: 0,
            counters: PerformanceCounters::new(cells),
            exposure: None,
            exposure_frames: 0,
            state: SimulationState::Uninitialized,
        })
    }

    /// Switch to another scene, keeping the worker pool. On error the current
    /// scene stays in place.
    pub fn load_scene(&mut self, scene: SceneDescription) -> SimResult<()> {
        let parts = SceneState::build(scene)?;
        info!(scene = %parts.scene.name, shape = %parts.scene.shape(), "scene loaded");
        self.counters = PerformanceCounters::new(parts.scene.shape().cell_count());
        self.scene = parts.scene;
        self.generations = parts.generations;
        self.material = parts.material;
        self.kernel = parts.kernel;
        self.emitters = parts.emitters;
        self.aperture = None;
        self.exposure = None;
        self.iteration = 0;
        self.state = SimulationState::Uninitialized;
        Ok(())
    }

    /// Replace the decoder used by [`initialize`](Self::initialize).
    pub fn set_pattern_decoder(&mut self, decoder: Box<dyn PatternDecoder>) {
        self.decoder = decoder;
    }

    /// Reset the field to rest and optionally carve an aperture pattern into
    /// the emitters.
    ///
    /// Returns false if the pattern could not be decoded or does not match the
    /// grid's xy plane. The simulation then runs unmasked and stays usable.
    pub fn initialize(&mut self, pattern: Option<&Path>) -> bool {
        self.reset();
        self.aperture = None;
        self.state = SimulationState::Ready;

        let Some(path) = pattern else {
            return true;
        };
        match self
            .decoder
            .decode(path)
            .and_then(|mask| self.apply_aperture(mask))
        {
            Ok(()) => true,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "pattern rejected, running unmasked");
                false
            }
        }
    }

    /// Use `mask` to restrict which emitter cells are driven.
    pub fn apply_aperture(&mut self, mask: ApertureMask) -> SimResult<()> {
        let expected = (self.scene.width, self.scene.height);
        let actual = (mask.width(), mask.height());
        if expected != actual {
            return Err(SimError::PatternMismatch { expected, actual });
        }
        info!(open = mask.open_count(), "aperture applied");
        self.aperture = Some(mask);
        Ok(())
    }

    /// Drive every emitter cell again.
    pub fn clear_aperture(&mut self) {
        self.aperture = None;
    }

    /// Current aperture, if any.
    pub fn aperture(&self) -> Option<&ApertureMask> {
        self.aperture.as_ref()
    }

    /// Advance the field by one step. Initializes with defaults if
    /// [`initialize`](Self::initialize) was never called.
    ///
    /// Always returns true; the return value is the driver's signal to keep
    /// going.
    pub fn iterate(&mut self) -> bool {
        if self.state == SimulationState::Uninitialized {
            self.initialize(None);
        }
        self.state = SimulationState::Stepping;

        let parity = (self.iteration % 2) as usize;
        let (low, high) = self.generations.split_at_mut(1);
        let (current, next) = if parity == 0 {
            (&mut low[0], &mut high[0])
        } else {
            (&mut high[0], &mut low[0])
        };

        inject_sources(
            current,
            &self.emitters,
            self.aperture.as_ref(),
            self.iteration,
        );

        let cells = current.as_slice();
        let material = self.material.grid().as_slice();
        let kernel = &self.kernel;
        let pool = &mut self.pool;
        let slabs = next.outer_slabs(pool.size());

        // SAFETY (both passes): the pool runs every worker index exactly once
        // per `run`, so each slab is claimed by a single worker at a time.
        self.counters.time(Phase::Velocity, || {
            pool.run(|index, _| {
                let mut slab = unsafe { slabs.claim(index) };
                for row in slab.layout().rows(slab.outer()) {
                    kernel.velocity_row(cells, material, row, slab.row_mut(row));
                }
            })
        });
        self.counters.time(Phase::Location, || {
            pool.run(|index, _| {
                let mut slab = unsafe { slabs.claim(index) };
                for row in slab.layout().rows(slab.outer()) {
                    kernel.location_row(cells, row, slab.row_mut(row));
                }
            })
        });

        self.iteration += 1;
        self.counters.finish_iteration();
        self.accumulate_exposure();
        true
    }

    fn accumulate_exposure(&mut self) {
        let current = &self.generations[(self.iteration % 2) as usize];
        let done = match self.exposure.as_mut() {
            Some(exposure) => exposure.accumulate(current),
            None => return,
        };
        if !done {
            return;
        }
        if let Some(exposure) = self.exposure.take() {
            let frame = self.exposure_frames;
            self.exposure_frames += 1;
            match exposure.finish(frame) {
                Ok(()) => info!(frame, iteration = self.iteration, "exposure finished"),
                Err(e) => error!(frame, error = %e, "exposure could not be written"),
            }
        }
    }

    /// The generation a renderer should read. Valid until the next
    /// `iterate`.
    pub fn current_grid(&self) -> &Grid<Cell> {
        &self.generations[(self.iteration % 2) as usize]
    }

    /// Mutable current generation, for seeding initial conditions.
    pub fn current_grid_mut(&mut self) -> &mut Grid<Cell> {
        &mut self.generations[(self.iteration % 2) as usize]
    }

    /// Number of completed steps.
    pub fn current_iteration(&self) -> u64 {
        self.iteration
    }

    /// Lifecycle state.
    pub fn state(&self) -> SimulationState {
        self.state
    }

    /// Enable or disable an emitter. Out-of-range indices are ignored.
    pub fn toggle_emitter(&mut self, index: usize) {
        match self.emitters.get_mut(index) {
            Some(emitter) => {
                emitter.toggle();
                debug!(index, enabled = emitter.enabled, "emitter toggled");
            }
            None => debug!(index, count = self.emitters.len(), "no such emitter"),
        }
    }

    /// Emitters with their current enabled flags.
    pub fn emitters(&self) -> &[Emitter] {
        &self.emitters
    }

    /// Record an energy exposure over `steps` steps into PNG files in
    /// `folder`.
    pub fn start_exposure(&mut self, folder: impl AsRef<Path>, steps: u64) -> SimResult<()> {
        let writer = PngWriter::new(folder)?;
        self.start_exposure_with(Box::new(writer), steps, ExposureMode::Energy)
    }

    /// Record an exposure into a custom writer. Replaces a running exposure.
    pub fn start_exposure_with(
        &mut self,
        writer: Box<dyn ImageWriter>,
        steps: u64,
        mode: ExposureMode,
    ) -> SimResult<()> {
        if steps == 0 {
            return Err(SimError::config("exposure duration must be positive"));
        }
        if let Some(previous) = &self.exposure {
            warn!(
                elapsed = previous.elapsed(),
                duration = previous.duration(),
                "discarding unfinished exposure"
            );
        }
        let plane = self.scene.exposure_plane();
        info!(steps, plane, ?mode, "exposure started");
        self.exposure = Some(Exposure::new(
            writer,
            mode,
            steps,
            (self.scene.width, self.scene.height),
            plane,
        ));
        Ok(())
    }

    /// Whether an exposure is being recorded.
    pub fn is_exposing(&self) -> bool {
        self.exposure.is_some()
    }

    /// Completed exposures since the simulation was created.
    pub fn exposure_frames(&self) -> u64 {
        self.exposure_frames
    }

    /// Phase timing averages.
    pub fn performance_averages(&self) -> PerformanceAverages {
        self.counters.averages()
    }

    /// Start a new timing window.
    pub fn reset_performance(&mut self) {
        self.counters.reset();
    }

    /// Scene being simulated.
    pub fn scene(&self) -> &SceneDescription {
        &self.scene
    }

    /// Material map of the scene.
    pub fn material(&self) -> &MaterialMap {
        &self.material
    }

    /// Worker threads used by the passes.
    pub fn threads(&self) -> usize {
        self.pool.size()
    }

    /// Set every slot of both generations, guards included.
    pub fn fill_field(&mut self, cell: Cell) {
        for grid in &mut self.generations {
            grid.fill(cell);
        }
    }

    /// Bring the field to rest and restart the iteration count.
    pub fn reset(&mut self) {
        self.fill_field(Cell::default());
        self.iteration = 0;
        self.counters.reset();
        self.exposure = None;
    }

    /// Sum of squared displacements over the logical cells.
    pub fn total_energy(&self) -> f64 {
        self.current_grid()
            .logical()
            .map(|c| f64::from(c.energy()))
            .sum()
    }

    /// Largest absolute displacement over the logical cells.
    pub fn max_location(&self) -> f32 {
        self.current_grid()
            .logical()
            .map(|c| c.location.abs())
            .fold(0.0, f32::max)
    }
}

impl std::fmt::Debug for WavefieldSimulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WavefieldSimulation")
            .field("scene", &self.scene.name)
            .field("shape", &self.scene.shape())
            .field("iteration", &self.iteration)
            .field("state", &self.state)
            .field("threads", &self.pool.size())
            .finish_non_exhaustive()
    }
}

/// Force enabled emitter cells to the source value with zero velocity.
fn inject_sources(
    grid: &mut Grid<Cell>,
    emitters: &[Emitter],
    aperture: Option<&ApertureMask>,
    iteration: u64,
) {
    for emitter in emitters.iter().filter(|e| e.enabled) {
        let source = Cell::at_rest(emitter.wave.value_at(iteration));
        for (x, y, z) in emitter.region.cells() {
            if aperture.map_or(true, |mask| mask.allows(x, y)) {
                *grid.at_mut(x as isize, y as isize, z as isize) = source;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::BoundaryProfile;

    fn small_scene() -> SceneDescription {
        let mut scene = SceneDescription::planar("small", 32, 32);
        scene.emitters.push(Emitter::new(
            Region::planar(14..18, 14..18),
            SquareWave::new(1.0, 20),
        ));
        scene
    }

    #[test]
    fn test_lifecycle() {
        let mut sim = WavefieldSimulation::new(small_scene(), 2).unwrap();
        assert_eq!(sim.state(), SimulationState::Uninitialized);
        assert!(sim.initialize(None));
        assert_eq!(sim.state(), SimulationState::Ready);
        assert!(sim.iterate());
        assert_eq!(sim.state(), SimulationState::Stepping);
        assert_eq!(sim.current_iteration(), 1);
    }

    #[test]
    fn test_iterate_without_initialize() {
        let mut sim = WavefieldSimulation::new(small_scene(), 1).unwrap();
        for _ in 0..5 {
            sim.iterate();
        }
        assert_eq!(sim.current_iteration(), 5);
        assert!(sim.total_energy() > 0.0);
    }

    #[test]
    fn test_source_drives_current_generation() {
        let mut sim = WavefieldSimulation::new(small_scene(), 2).unwrap();
        sim.initialize(None);
        sim.iterate();
        let inner = *sim.current_grid().at(15, 15, 0);
        assert_eq!(inner, Cell::at_rest(1.0));
        // edge of the source feels the flat surroundings
        let edge = *sim.current_grid().at(14, 14, 0);
        assert!(edge.velocity < 0.0);
        assert!((edge.location - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_parity_swaps_generations() {
        let mut sim = WavefieldSimulation::new(small_scene(), 2).unwrap();
        sim.initialize(None);
        let first = sim.current_grid() as *const Grid<Cell>;
        sim.iterate();
        let second = sim.current_grid() as *const Grid<Cell>;
        sim.iterate();
        assert_ne!(first, second);
        assert_eq!(first, sim.current_grid() as *const Grid<Cell>);
    }

    #[test]
    fn test_thread_count_does_not_change_result() {
        let mut scene = small_scene();
        scene.boundary = BoundaryProfile {
            thickness: 4,
            decay: 0.9,
        };
        let mut single = WavefieldSimulation::new(scene.clone(), 1).unwrap();
        let mut many = WavefieldSimulation::new(scene, 7).unwrap();
        for _ in 0..60 {
            single.iterate();
            many.iterate();
        }
        assert_eq!(single.current_grid(), many.current_grid());
    }

    #[test]
    fn test_toggle_emitter() {
        let mut sim = WavefieldSimulation::new(small_scene(), 1).unwrap();
        sim.toggle_emitter(0);
        assert!(!sim.emitters()[0].enabled);
        sim.toggle_emitter(7);
        assert!(!sim.emitters()[0].enabled);
        sim.iterate();
        assert_eq!(sim.total_energy(), 0.0);
    }

    #[test]
    fn test_aperture_mismatch() {
        let mut sim = WavefieldSimulation::new(small_scene(), 1).unwrap();
        let result = sim.apply_aperture(ApertureMask::full(16, 16));
        assert!(matches!(
            result,
            Err(SimError::PatternMismatch {
                expected: (32, 32),
                actual: (16, 16)
            })
        ));
        assert!(sim.aperture().is_none());
    }

    #[test]
    fn test_closed_aperture_silences_emitters() {
        let mut sim = WavefieldSimulation::new(small_scene(), 2).unwrap();
        sim.initialize(None);
        sim.apply_aperture(ApertureMask::from_fn(32, 32, |_, _| false))
            .unwrap();
        for _ in 0..10 {
            sim.iterate();
        }
        assert_eq!(sim.max_location(), 0.0);
    }

    #[test]
    fn test_load_scene_keeps_pool() {
        let mut sim = WavefieldSimulation::new(small_scene(), 3).unwrap();
        sim.iterate();
        sim.load_scene(SceneDescription::volume("cube", 32, 32, 16))
            .unwrap();
        assert_eq!(sim.threads(), 3);
        assert_eq!(sim.current_iteration(), 0);
        assert_eq!(sim.state(), SimulationState::Uninitialized);
        assert_eq!(sim.current_grid().depth(), 16);
        let bad = SceneDescription::planar("bad", 20, 32);
        assert!(sim.load_scene(bad).is_err());
        assert_eq!(sim.scene().name, "cube");
    }

    #[test]
    fn test_zero_length_exposure_rejected() {
        let mut sim = WavefieldSimulation::new(small_scene(), 1).unwrap();
        let dir = std::env::temp_dir();
        assert!(matches!(
            sim.start_exposure(dir, 0),
            Err(SimError::Config(_))
        ));
        assert!(!sim.is_exposing());
    }

    #[test]
    fn test_performance_counters_advance() {
        let mut sim = WavefieldSimulation::new(small_scene(), 2).unwrap();
        for _ in 0..3 {
            sim.iterate();
        }
        let averages = sim.performance_averages();
        assert_eq!(averages.iterations, 3);
        assert!(averages.per_iteration >= averages.velocity);
        sim.reset_performance();
        assert_eq!(sim.performance_averages().iterations, 0);
    }
}
