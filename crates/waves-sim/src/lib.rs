//! # waves-sim
//!
//! Scalar wave propagation through a heterogeneous 2D or 3D medium.
//!
//! Each cell carries a displacement and a velocity. Every step, a stencil pass
//! pulls each cell toward the weighted average of its neighbors, scaled by the
//! cell's stiffness and damped by its resistance, and a second pass
//! integrates the displacement. Both passes run on a persistent worker pool.
//!
//! ## Features
//!
//! - 4/8-neighbor planar and 6-neighbor volumetric stencils
//! - Slow-medium lenses (spheres and sliced spheres) that refract the wave
//! - Exponential absorbing layers along the faces and outside a cylinder
//! - Square-wave emitters with optional aperture masks from images
//! - Long exposures written as PNG frames
//! - A calculation thread with pause/resume and frame cadence
//!
//! ## Example
//!
//! ```no_run
//! use waves_sim::prelude::*;
//!
//! let mut sim = SimulationConfig::preset(0)?.with_threads(4).build()?;
//! sim.initialize(None);
//! for _ in 0..1000 {
//!     sim.iterate();
//! }
//! println!("energy after 1000 steps: {}", sim.total_energy());
//! # Ok::<(), waves_sim::SimError>(())
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod controller;
pub mod error;
pub mod imaging;
pub mod scene;
pub mod simulation;

pub use error::{SimError, SimResult};

/// Commonly used types.
pub mod prelude {
    pub use crate::config::{ExposureConfig, RuntimeConfig};
    pub use crate::controller::{ControllerOptions, FrameSink, FrameStats, SimulationController};
    pub use crate::error::{SimError, SimResult};
    pub use crate::imaging::{
        ApertureMask, ExposureMode, ImagePatternDecoder, ImageWriter, PatternDecoder, PngWriter,
    };
    pub use crate::scene::{
        Axis, BoundaryProfile, Lens, LensShape, RadialAbsorption, SceneDescription,
    };
    pub use crate::simulation::{
        Emitter, Material, MaterialMap, Region, SimulationConfig, SimulationState, SquareWave,
        Stencil, VelocityFactor, WaveParams, WavefieldSimulation,
    };
    pub use waves_core::{Cell, Grid, GridShape, PerformanceAverages, WorkerPool};
}
