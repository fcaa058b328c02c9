//! Application configuration
//!
//! `AppConfig` carries process-level options from the command line.
//! `Settings` is the optional `photopipe.toml` file merged with
//! `PHOTOPIPE_*` environment overrides.

use crate::container::ContainerSettings;
use crate::error::{ErrorCode, PipelineError, Result};
use crate::session::ToolPaths;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const SETTINGS_FILE: &str = "photopipe.toml";

/// Application configuration structure
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Verbosity level for logging
    pub verbose: u8,
    /// Explicit settings file from `--config`
    pub config_path: Option<PathBuf>,
}

impl AppConfig {
    pub fn new(verbose: u8, config_path: Option<PathBuf>) -> Self {
        Self {
            verbose,
            config_path,
        }
    }

    /// Get the log level string based on verbosity
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            2 => "trace",
            _ => "trace,tokio=debug,runtime=debug",
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::new(0, None)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Parent directory of generated session folders
    pub data_dir: PathBuf,
    /// Extra directory searched for `<name>.yaml` pipeline definitions
    pub pipelines_dir: Option<PathBuf>,
    pub tools: ToolPaths,
    pub container: ContainerSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            pipelines_dir: None,
            tools: ToolPaths::default(),
            container: ContainerSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings and apply environment overrides
    ///
    /// An explicit path must exist. Otherwise `./photopipe.toml` and then the
    /// platform config directory are tried, falling back to defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) if !path.is_file() => {
                return Err(PipelineError::configuration_with_code(
                    ErrorCode::CONFIG_NOT_FOUND,
                    "settings file not found",
                )
                .with_path(path));
            }
            Some(path) => Some(path.to_path_buf()),
            None => Self::candidates().into_iter().find(|p| p.is_file()),
        };

        let mut settings = match &path {
            Some(path) => {
                debug!("Loading settings from {}", path.display());
                let content = std::fs::read_to_string(path)
                    .map_err(|e| PipelineError::from(e).with_path(path))?;
                Self::from_toml_str(&content).map_err(|e| e.with_path(path))?
            }
            None => Self::default(),
        };
        settings.merge_env_vars();
        Ok(settings)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    fn candidates() -> Vec<PathBuf> {
        let mut candidates = vec![PathBuf::from(SETTINGS_FILE)];
        if let Some(dirs) = ProjectDirs::from("org", "photopipe", "photopipe") {
            candidates.push(dirs.config_dir().join(SETTINGS_FILE));
        }
        candidates
    }

    pub fn merge_env_vars(&mut self) {
        self.apply_env(|key| std::env::var(key).ok());
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(data_dir) = lookup("PHOTOPIPE_DATA_DIR") {
            self.data_dir = PathBuf::from(data_dir);
        }

        if let Some(image) = lookup("PHOTOPIPE_IMAGE") {
            self.container.image = image;
        }

        if let Some(runtime) = lookup("PHOTOPIPE_CONTAINER_RUNTIME") {
            self.container.runtime = runtime;
        }

        if let Some(enabled) = lookup("PHOTOPIPE_CONTAINER") {
            match parse_bool(&enabled) {
                Some(value) => self.container.enabled = value,
                None => warn!("Ignoring PHOTOPIPE_CONTAINER={:?}: not a boolean", enabled),
            }
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
