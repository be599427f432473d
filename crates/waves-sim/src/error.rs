//! Error types for scene loading, patterns and exposures.

use thiserror::Error;
use waves_core::WavesError;

/// Result type for simulation operations.
pub type SimResult<T> = std::result::Result<T, SimError>;

/// Errors raised outside the stepping hot path.
///
/// None of these are fatal: a rejected pattern or exposure leaves the
/// simulation usable.
#[derive(Error, Debug)]
pub enum SimError {
    /// Grid or worker pool setup failed.
    #[error("Core error: {0}")]
    Core(#[from] WavesError),

    /// The scene description is inconsistent.
    #[error("Invalid scene: {0}")]
    InvalidScene(String),

    /// An aperture pattern does not match the grid's xy plane.
    #[error("Pattern is {actual:?} but the grid plane is {expected:?}")]
    PatternMismatch {
        /// Grid plane (width, height).
        expected: (usize, usize),
        /// Decoded image (width, height).
        actual: (usize, usize),
    },

    /// A pattern file could not be decoded.
    #[error("Failed to decode pattern: {0}")]
    PatternDecode(String),

    /// An exposure frame could not be written.
    #[error("Failed to write image: {0}")]
    ImageWrite(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parse error.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl SimError {
    /// Create an invalid scene error.
    pub fn invalid_scene(msg: impl Into<String>) -> Self {
        Self::InvalidScene(msg.into())
    }

    /// Create a pattern decode error.
    pub fn pattern_decode(msg: impl Into<String>) -> Self {
        Self::PatternDecode(msg.into())
    }

    /// Create an image write error.
    pub fn image_write(msg: impl Into<String>) -> Self {
        Self::ImageWrite(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
