//! Error types for grid construction and worker pool setup.

use thiserror::Error;

/// Result type for waves-core operations.
pub type Result<T> = std::result::Result<T, WavesError>;

/// Errors raised while setting up core resources.
///
/// Hot-path operations never return errors; out-of-range accesses are
/// programming errors caught by debug assertions.
#[derive(Error, Debug)]
pub enum WavesError {
    /// Grid extents rejected at construction.
    #[error("Invalid grid shape: {0}")]
    InvalidShape(String),

    /// A worker thread could not be spawned.
    #[error("Failed to spawn worker thread: {0}")]
    ThreadSpawn(#[source] std::io::Error),
}

impl WavesError {
    /// Create an invalid shape error.
    pub fn invalid_shape(msg: impl Into<String>) -> Self {
        Self::InvalidShape(msg.into())
    }
}
