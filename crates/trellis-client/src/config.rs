//! File-backed configuration, merged over built-in defaults.
//!
//! A single JSON file carries server endpoints, default parameters, named
//! presets, storage paths and logging options. Missing keys at any level
//! fall back to the defaults, and the full default config is written out on
//! first run so there is a file to edit.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::params::{ParamOverrides, PresetMap, ProcessingParams};

pub const DEFAULT_CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub websocket_url: String,
    pub rest_api_url: String,
    /// Idle receive deadline in seconds; 0 disables it entirely.
    pub timeout_seconds: u64,
    pub reconnect_attempts: u32,
    pub reconnect_delay_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            websocket_url: "ws://localhost:5000".to_string(),
            rest_api_url: "http://localhost:8000".to_string(),
            timeout_seconds: 600,
            reconnect_attempts: 3,
            reconnect_delay_seconds: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    pub default_parameters: ProcessingParams,
    pub parameter_presets: PresetMap,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            default_parameters: ProcessingParams::default(),
            parameter_presets: builtin_presets(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub download_dir: PathBuf,
    pub api_download_dir: PathBuf,
    pub session_dir: PathBuf,
    pub metadata_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from("trellis_downloads"),
            api_download_dir: PathBuf::from("trellis_api_downloads"),
            session_dir: PathBuf::from("trellis_sessions"),
            metadata_dir: PathBuf::from("trellis_metadata"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub processing: ProcessingConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    #[serde(skip)]
    path: Option<PathBuf>,
}

impl Config {
    /// Load from `path`, or from `config.json` in the working directory.
    /// A missing file yields the defaults and writes them back; a corrupt
    /// file yields the defaults without touching it.
    pub fn load(path: Option<&Path>) -> Config {
        let path = path
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        if path.exists() {
            match std::fs::read_to_string(&path)
                .map_err(|e| e.to_string())
                .and_then(|text| serde_json::from_str::<Config>(&text).map_err(|e| e.to_string()))
            {
                Ok(mut config) => {
                    info!("loaded configuration from {}", path.display());
                    config.path = Some(path);
                    return config;
                }
                Err(err) => {
                    warn!("could not read {}: {err}; using defaults", path.display());
                    return Config::default();
                }
            }
        }
        let mut config = Config::default();
        config.path = Some(path);
        if let Err(err) = config.save() {
            warn!("could not write default config: {err}");
        }
        config
    }

    pub fn save(&self) -> std::io::Result<()> {
        let path = self
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        std::fs::write(&path, serde_json::to_string_pretty(self)?)?;
        info!("saved configuration to {}", path.display());
        Ok(())
    }

    /// Parameters for a named preset, merged over the default set. An
    /// unknown name yields the defaults unchanged.
    pub fn preset_params(&self, name: &str) -> ProcessingParams {
        match self.processing.parameter_presets.get(name) {
            Some(overrides) => overrides.apply_to(&self.processing.default_parameters),
            None => {
                warn!("preset '{name}' not found, using default parameters");
                self.processing.default_parameters.clone()
            }
        }
    }

    pub fn preset_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.processing.parameter_presets.keys().cloned().collect();
        names.sort();
        names
    }

    /// Register (or replace) a preset, optionally persisting the config.
    pub fn add_preset(
        &mut self,
        name: &str,
        overrides: ParamOverrides,
        persist: bool,
    ) -> std::io::Result<()> {
        self.processing
            .parameter_presets
            .insert(name.to_string(), overrides);
        if persist {
            self.save()?;
        }
        Ok(())
    }

    pub fn recv_timeout(&self) -> Option<Duration> {
        match self.server.timeout_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

fn builtin_presets() -> PresetMap {
    let mut presets = PresetMap::new();
    presets.insert(
        "fast".to_string(),
        ParamOverrides {
            sparse_steps: Some(8),
            slat_steps: Some(8),
            texture_size: Some(512),
            ..Default::default()
        },
    );
    presets.insert(
        "balanced".to_string(),
        ParamOverrides {
            sparse_steps: Some(12),
            slat_steps: Some(12),
            texture_size: Some(1024),
            ..Default::default()
        },
    );
    presets.insert(
        "quality".to_string(),
        ParamOverrides {
            sparse_steps: Some(20),
            slat_steps: Some(16),
            texture_size: Some(2048),
            ..Default::default()
        },
    );
    presets
}
