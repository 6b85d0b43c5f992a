//! Optional RON configuration file for the console.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bedconsole_core::{RegistryConfig, RequestError};
use bedconsole_engine::{parse_base_url, BackendSettings, DEFAULT_BACKEND_URL};
use engine_logging::engine_info;
use serde::Deserialize;

use super::logging::LogDestination;

/// Looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "bedconsole.ron";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: ron::error::SpannedError,
    },
    #[error("invalid backend url: {0}")]
    BackendUrl(#[from] RequestError),
    #[error("poll interval must be positive")]
    PollInterval,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub backend_url: String,
    pub poll_interval_ms: u64,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub model_wait_timeout_ms: u64,
    pub max_finished_jobs: Option<usize>,
    pub log_destination: LogDestination,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            poll_interval_ms: 2_000,
            connect_timeout_ms: 10_000,
            request_timeout_ms: 30_000,
            model_wait_timeout_ms: 600_000,
            max_finished_jobs: None,
            log_destination: LogDestination::File,
        }
    }
}

impl AppConfig {
    /// Reads `path`, or the default file when none is given. A missing default
    /// file means defaults; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, explicit) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if !explicit && err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(source) => return Err(ConfigError::Read { path, source }),
        };
        let config = Self::parse(&text).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        engine_info!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn parse(text: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(text)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn backend_settings(&self) -> Result<BackendSettings, ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::PollInterval);
        }
        Ok(BackendSettings {
            base_url: parse_base_url(&self.backend_url)?,
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            poll_interval: self.poll_interval(),
            model_wait_timeout: Duration::from_millis(self.model_wait_timeout_ms),
        })
    }

    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            max_finished_jobs: self.max_finished_jobs,
        }
    }
}
