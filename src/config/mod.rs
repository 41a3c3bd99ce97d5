//! Configuration module for inodeploy
//!
//! This module handles the persistent deployment configuration:
//! - Serial port exclusions and baud rate
//! - The watched download path and the working sketch directory
//! - Toolchain command lines, known boards and subprocess timeouts
//!
//! # Config Location
//!
//! The configuration is stored as TOML in the platform-appropriate location:
//! - **Linux**: `~/.config/dev.inodeploy/config.toml`
//! - **macOS**: `~/Library/Application Support/dev.inodeploy/config.toml`
//! - **Windows**: `%APPDATA%\dev.inodeploy\config.toml`
//!
//! # Example
//!
//! ```ignore
//! use inodeploy::config::DeployConfig;
//!
//! let mut config = DeployConfig::load_or_default();
//! config.ports.exclusions.push("/dev/ttyAMA0".to_string());
//! config.save(inodeploy::config::config_path().unwrap())?;
//! ```

pub mod settings;

pub use settings::*;

use crate::error::{DeployError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application identifier for config directories
pub const APP_ID: &str = "dev.inodeploy";

/// Config filename
pub const CONFIG_FILE: &str = "config.toml";

/// Log directory name inside the app data directory
pub const LOG_DIR: &str = "logs";

// ==================== Directories ====================

/// Get the application config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID))
}

/// Get the path to the config file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|p| p.join(CONFIG_FILE))
}

/// Get the directory rolling log files are written to
pub fn log_dir() -> Option<PathBuf> {
    dirs_next::data_dir().map(|p| p.join(APP_ID).join(LOG_DIR))
}

// ==================== Deploy Config ====================

/// Full deployment configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DeployConfig {
    /// Port discovery and serial settings
    #[serde(default)]
    pub ports: PortSettings,

    /// Sketch intake settings
    #[serde(default)]
    pub intake: IntakeSettings,

    /// External toolchain settings
    #[serde(default)]
    pub toolchain: ToolchainSettings,
}

impl DeployConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a config file from disk. A missing file yields defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            DeployError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        Self::from_toml(&content)
            .map_err(|e| e.with_context(format!("Failed to parse config file {:?}", path)))
    }

    /// Load from the default location, returning defaults on any error
    pub fn load_or_default() -> Self {
        let Some(path) = config_path() else {
            tracing::warn!("Could not determine config path, using defaults");
            return Self::default();
        };

        Self::load(&path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Parse a config from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| DeployError::Config(e.to_string()))
    }

    /// Save the config to disk as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DeployError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| DeployError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content).map_err(|e| {
            DeployError::Config(format!("Failed to write config file {:?}: {}", path, e))
        })
    }
}
