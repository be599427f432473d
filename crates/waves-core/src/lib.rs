//! # waves-core
//!
//! Building blocks shared by the wave simulation engine:
//!
//! - [`Grid`] - fixed-size 2D/3D storage with guard cells, so stencil reads
//!   never need a bounds branch
//! - [`Cell`] - the dynamic per-cell state (displacement and velocity)
//! - [`WorkerPool`] - persistent threads with a fork/join barrier for
//!   data-parallel passes over a grid
//! - [`PerformanceCounters`] - running phase timings for the update loop
//!
//! ## Example
//!
//! ```
//! use waves_core::{partition, Cell, Grid, GridShape, WorkerPool};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! let grid = Grid::new(GridShape::planar(32, 32), Cell::default()).unwrap();
//! assert_eq!(grid.at(-1, -1, 0).location, 0.0);
//!
//! let mut pool = WorkerPool::new(4).unwrap();
//! let visited = AtomicUsize::new(0);
//! pool.run(|index, count| {
//!     let rows = partition(grid.height(), index, count);
//!     visited.fetch_add(rows.len(), Ordering::Relaxed);
//! });
//! assert_eq!(visited.into_inner(), 32);
//! ```

#![warn(missing_docs)]

pub mod cell;
pub mod error;
pub mod grid;
pub mod partition;
pub mod perf;
pub mod pool;

pub use cell::Cell;
pub use error::{Result, WavesError};
pub use grid::{
    Grid, GridShape, Layout, OuterSlab, OuterSlabs, Row, Strides, BLOCK_SIZE, DEFAULT_GUARD,
};
pub use partition::partition;
pub use perf::{Phase, PerformanceAverages, PerformanceCounters};
pub use pool::WorkerPool;
