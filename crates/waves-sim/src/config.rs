//! Runtime configuration for the driver binaries.
//!
//! ```toml
//! scene = 2
//! threads = 8
//! auto_start = true
//! max_iterations = 5000
//!
//! [exposure]
//! folder = "frames"
//! steps = 1024
//! mode = "magnitude"
//! ```

use crate::error::{SimError, SimResult};
use crate::imaging::ExposureMode;
use crate::scene::{preset_names, SceneDescription, PRESET_COUNT};
use crate::simulation::SimulationConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Exposure recorded right after start-up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExposureConfig {
    /// Output folder for `{frame:08}.png` files.
    pub folder: PathBuf,
    /// Steps per exposure.
    pub steps: u64,
    /// Integrated quantity.
    #[serde(default)]
    pub mode: ExposureMode,
}

/// Settings of a simulation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Built-in scene index, used when `scene_file` is not set.
    pub scene: usize,
    /// Scene description in TOML.
    pub scene_file: Option<PathBuf>,
    /// Worker threads; 0 for all hardware threads.
    pub threads: usize,
    /// Start stepping immediately instead of paused.
    pub auto_start: bool,
    /// Stop after this many iterations.
    pub max_iterations: Option<u64>,
    /// Aperture pattern image.
    pub pattern: Option<PathBuf>,
    /// Exposure to record at start-up.
    pub exposure: Option<ExposureConfig>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            scene: 0,
            scene_file: None,
            threads: 0,
            auto_start: false,
            max_iterations: None,
            pattern: None,
            exposure: None,
        }
    }
}

impl RuntimeConfig {
    /// Parse from TOML.
    pub fn from_toml_str(text: &str) -> SimResult<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> SimResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    /// The scene this run simulates.
    pub fn resolve_scene(&self) -> SimResult<SceneDescription> {
        if let Some(path) = &self.scene_file {
            return SceneDescription::load(path);
        }
        SceneDescription::preset(self.scene).ok_or_else(|| {
            SimError::config(format!(
                "scene {} does not exist; built-in scenes are 0..{} ({})",
                self.scene,
                PRESET_COUNT,
                preset_names().join(", ")
            ))
        })
    }

    /// Engine configuration for this run.
    pub fn simulation_config(&self) -> SimResult<SimulationConfig> {
        let scene = self.resolve_scene()?;
        Ok(SimulationConfig::new(scene).with_threads(self.threads))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::from_toml_str("").unwrap();
        assert_eq!(config, RuntimeConfig::default());
        assert_eq!(config.resolve_scene().unwrap().name, "open-water");
    }

    #[test]
    fn test_full_file() {
        let config = RuntimeConfig::from_toml_str(
            r#"
            scene = 2
            threads = 3
            auto_start = true
            max_iterations = 500

            [exposure]
            folder = "frames"
            steps = 64
            "#,
        )
        .unwrap();
        assert!(config.auto_start);
        assert_eq!(config.max_iterations, Some(500));
        let exposure = config.exposure.as_ref().unwrap();
        assert_eq!(exposure.mode, ExposureMode::Energy);
        let engine = config.simulation_config().unwrap();
        assert_eq!(engine.threads, 3);
        assert_eq!(engine.scene.name, "double-slit");
    }

    #[test]
    fn test_unknown_scene() {
        let config = RuntimeConfig {
            scene: 99,
            ..RuntimeConfig::default()
        };
        assert!(matches!(config.resolve_scene(), Err(SimError::Config(_))));
    }

    #[test]
    fn test_scene_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.toml");
        let scene = SceneDescription::planar("custom", 64, 64);
        std::fs::write(&path, scene.to_toml_string().unwrap()).unwrap();

        let config = RuntimeConfig {
            scene_file: Some(path),
            ..RuntimeConfig::default()
        };
        assert_eq!(config.resolve_scene().unwrap(), scene);
    }

    #[test]
    fn test_bad_toml() {
        assert!(matches!(
            RuntimeConfig::from_toml_str("scene = \"two\""),
            Err(SimError::Toml(_))
        ));
    }
}
