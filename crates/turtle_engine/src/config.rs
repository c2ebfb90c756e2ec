use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::app::{DispatcherSettings, LoopConfig, Vec3};

pub const CONFIG_PATH_ENV_VAR: &str = "TURTLE_CONFIG";
pub const POOL_CAPACITY_ENV_VAR: &str = "TURTLE_POOL_CAPACITY";
pub const MOVE_SPEED_ENV_VAR: &str = "TURTLE_MOVE_SPEED";
pub const TARGET_TPS_ENV_VAR: &str = "TURTLE_TARGET_TPS";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TurtleConfig {
    pub pool_capacity: usize,
    pub move_speed: f32,
    pub spawn_position: Vec3,
    pub target_tps: u32,
    pub max_frame_delta_ms: u64,
    pub max_ticks_per_frame: u32,
    pub metrics_log_interval_ms: u64,
}

impl Default for TurtleConfig {
    fn default() -> Self {
        let settings = DispatcherSettings::default();
        let loop_config = LoopConfig::default();
        Self {
            pool_capacity: settings.pool_capacity,
            move_speed: settings.move_speed,
            spawn_position: settings.spawn_position,
            target_tps: loop_config.target_tps,
            max_frame_delta_ms: loop_config.max_frame_delta.as_millis() as u64,
            max_ticks_per_frame: loop_config.max_ticks_per_frame,
            metrics_log_interval_ms: loop_config.metrics_log_interval.as_millis() as u64,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("invalid config value for {field}: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
}

impl TurtleConfig {
    /// Defaults, then the JSON file named by `TURTLE_CONFIG` if set, then
    /// per-field environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match read_env(CONFIG_PATH_ENV_VAR)? {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_overrides(|var| env::var(var))?;
        config.validate()?;
        info!(
            pool_capacity = config.pool_capacity,
            move_speed = config.move_speed,
            spawn_position = %config.spawn_position,
            target_tps = config.target_tps,
            "config_loaded"
        );
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw, path)
    }

    pub fn from_json_str(raw: &str, path: &Path) -> Result<Self, ConfigError> {
        let mut deserializer = serde_json::Deserializer::from_str(raw);
        serde_path_to_error::deserialize::<_, Self>(&mut deserializer).map_err(|error| {
            let location = error.path().to_string();
            let source = error.into_inner();
            let message = if location.is_empty() || location == "." {
                source.to_string()
            } else {
                format!("at {location}: {source}")
            };
            ConfigError::Parse {
                path: path.to_path_buf(),
                message,
            }
        })
    }

    /// Applies `TURTLE_*` overrides read through `lookup`. Unparseable values
    /// are logged and ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        if let Some(value) = read_override(&lookup, POOL_CAPACITY_ENV_VAR)? {
            self.pool_capacity = value;
        }
        if let Some(value) = read_override(&lookup, MOVE_SPEED_ENV_VAR)? {
            self.move_speed = value;
        }
        if let Some(value) = read_override(&lookup, TARGET_TPS_ENV_VAR)? {
            self.target_tps = value;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pool_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "pool_capacity",
                message: "must be at least 1".to_string(),
            });
        }
        // A non-positive speed would leave every move in flight forever.
        if !self.move_speed.is_finite() || self.move_speed <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "move_speed",
                message: format!("must be a positive finite number, got {}", self.move_speed),
            });
        }
        if !self.spawn_position.is_finite() {
            return Err(ConfigError::Invalid {
                field: "spawn_position",
                message: "components must be finite".to_string(),
            });
        }
        if self.target_tps == 0 {
            return Err(ConfigError::Invalid {
                field: "target_tps",
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn dispatcher_settings(&self) -> DispatcherSettings {
        DispatcherSettings {
            pool_capacity: self.pool_capacity,
            move_speed: self.move_speed,
            spawn_position: self.spawn_position,
        }
    }

    pub fn loop_config(&self) -> LoopConfig {
        LoopConfig {
            target_tps: self.target_tps,
            max_frame_delta: Duration::from_millis(self.max_frame_delta_ms),
            max_ticks_per_frame: self.max_ticks_per_frame,
            metrics_log_interval: Duration::from_millis(self.metrics_log_interval_ms),
        }
    }
}

fn read_env(var: &'static str) -> Result<Option<String>, ConfigError> {
    match env::var(var) {
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(source) => Err(ConfigError::EnvVar { var, source }),
    }
}

fn read_override<F, T>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Result<String, env::VarError>,
    T: std::str::FromStr,
{
    let value = match lookup(var) {
        Ok(value) => value,
        Err(env::VarError::NotPresent) => return Ok(None),
        Err(source) => return Err(ConfigError::EnvVar { var, source }),
    };
    match value.trim().parse::<T>() {
        Ok(parsed) => Ok(Some(parsed)),
        Err(_) => {
            warn!(
                env_var = var,
                value = value.as_str(),
                "invalid config override value; keeping configured value"
            );
            Ok(None)
        }
    }
}
