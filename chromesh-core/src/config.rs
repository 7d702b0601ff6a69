//! Pipeline configuration
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::normalize::{ViewParams, DEFAULT_FILL_RATIO};

/// Largest accepted file: 100 MiB
pub const DEFAULT_MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Config file looked up in the working directory by [`PipelineConfig::load`]
pub const CONFIG_FILE: &str = "chromesh.toml";

/// Settings for an [`IngestionGuard`](crate::IngestionGuard)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Size ceiling in bytes
    pub max_file_size: u64,
    /// Share of the viewport the mesh is scaled to fill
    pub fill_ratio: f32,
    /// Camera assumed when the caller does not pass one
    pub view: ViewConfig,
}

/// Camera settings in user-facing units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub fov_degrees: f32,
    pub distance: f32,
    pub aspect: f32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            fill_ratio: DEFAULT_FILL_RATIO,
            view: ViewConfig::default(),
        }
    }
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            fov_degrees: 75.0,
            distance: 75f32.sqrt(),
            aspect: 16.0 / 9.0,
        }
    }
}

impl ViewConfig {
    pub fn to_view_params(self) -> ViewParams {
        ViewParams::from_degrees(self.fov_degrees, self.distance, self.aspect)
    }
}

impl PipelineConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: PipelineConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load `chromesh.toml` if present, then apply environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = if PathBuf::from(CONFIG_FILE).exists() {
            Self::from_file(CONFIG_FILE)?
        } else {
            Self::default()
        };

        if let Ok(value) = std::env::var("CHROMESH_MAX_FILE_SIZE") {
            config.max_file_size = value.parse().map_err(|_| ConfigError::Invalid {
                key: "CHROMESH_MAX_FILE_SIZE",
                detail: format!("'{}' is not a byte count", value),
            })?;
        }

        if let Ok(value) = std::env::var("CHROMESH_FILL_RATIO") {
            config.fill_ratio = value.parse().map_err(|_| ConfigError::Invalid {
                key: "CHROMESH_FILL_RATIO",
                detail: format!("'{}' is not a number", value),
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_file_size == 0 {
            return Err(ConfigError::Invalid {
                key: "max_file_size",
                detail: "must be greater than zero".to_string(),
            });
        }
        if !(self.fill_ratio > 0.0 && self.fill_ratio <= 1.0) {
            return Err(ConfigError::Invalid {
                key: "fill_ratio",
                detail: format!("{} is outside (0, 1]", self.fill_ratio),
            });
        }
        Ok(())
    }
}
