//! Configuration management
//!
//! This module provides runtime configuration loading from a JSON file in the
//! working directory. It names the model artifact and the genre labels; DSP
//! parameters are fixed by the trained model and are not configurable.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::analysis::genres::GenreTable;

/// File read by `AppConfig::load`
pub const CONFIG_FILE: &str = "musicl.json";

/// Default location of the model artifact
pub const DEFAULT_MODEL_PATH: &str = "RF_classifier.json";

/// Complete application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub model: ModelConfig,
    pub genres: GenreTable,
}

/// Model artifact location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Path of the JSON model, relative to the working directory
    pub path: PathBuf,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_MODEL_PATH),
        }
    }
}

impl Default for AppConfig {
    /// Default configuration values (fallback if config file not found)
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            genres: GenreTable::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The parsed configuration, or the defaults if the file is missing or
    /// its JSON is invalid. Fields absent from the file keep their defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                log::debug!(
                    "[Config] No config file at {:?}. Using defaults.",
                    path.as_ref()
                );
                Self::default()
            }
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load `musicl.json` from the working directory
    pub fn load() -> Self {
        Self::load_from_file(CONFIG_FILE)
    }
}
