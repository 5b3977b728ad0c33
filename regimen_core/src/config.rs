//! Configuration file support for Regimen.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/regimen/config.toml`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub simulation: SimulationConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Remote engine configuration.
///
/// `endpoint` is optional: when absent, evaluation runs on the local path
/// only and the skip is recorded as `not_configured`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub service_key: Option<String>,

    /// Request timeout in seconds. Generous enough to tolerate engine
    /// cold starts, which run materially longer than a warm call.
    #[serde(default = "default_engine_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            service_key: None,
            timeout_seconds: default_engine_timeout_seconds(),
        }
    }
}

/// Pharmacokinetic simulation configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Lookback horizon for the dashboard, in hours
    #[serde(default = "default_horizon_hours")]
    pub horizon_hours: i64,

    /// Timeline sampling cadence, in minutes
    #[serde(default = "default_sample_minutes")]
    pub sample_minutes: i64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            horizon_hours: default_horizon_hours(),
            sample_minutes: default_sample_minutes(),
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| {
        let home = std::env::var("HOME").expect("HOME environment variable not set");
        PathBuf::from(home).join(".local/share")
    });
    base.join("regimen")
}

fn default_engine_timeout_seconds() -> u64 {
    8
}

fn default_horizon_hours() -> i64 {
    24
}

fn default_sample_minutes() -> i64 {
    60
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| {
            let home = std::env::var("HOME").expect("HOME environment variable not set");
            PathBuf::from(home).join(".config")
        });
        base.join("regimen").join("config.toml")
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.engine.timeout_seconds == 0 {
            return Err(Error::Config("engine.timeout_seconds must be positive".into()));
        }
        if self.simulation.horizon_hours <= 0 {
            return Err(Error::Config("simulation.horizon_hours must be positive".into()));
        }
        if self.simulation.sample_minutes <= 0 {
            return Err(Error::Config("simulation.sample_minutes must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.engine.endpoint.is_none());
        assert_eq!(config.engine.timeout_seconds, 8);
        assert_eq!(config.simulation.horizon_hours, 24);
        assert_eq!(config.simulation.sample_minutes, 60);
    }

    #[test]
    fn test_config_roundtrip() {
        let mut config = Config::default();
        config.engine.endpoint = Some("http://localhost:8787".into());

        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed.engine.endpoint.as_deref(), Some("http://localhost:8787"));
        assert_eq!(parsed.simulation.horizon_hours, config.simulation.horizon_hours);
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[engine]
endpoint = "http://engine.internal"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.engine.endpoint.as_deref(), Some("http://engine.internal"));
        assert_eq!(config.engine.timeout_seconds, 8); // default
        assert_eq!(config.simulation.horizon_hours, 24); // default
    }

    #[test]
    fn test_invalid_timeout_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[engine]\ntimeout_seconds = 0\n").unwrap();

        assert!(Config::load_from(&path).is_err());
    }
}
