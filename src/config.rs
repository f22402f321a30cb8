use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const CONFIG_FILE: &str = "med-station.toml";

/// Main configuration structure for the station.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MedStationConfig {
    /// Station identity
    pub station: StationConfig,
    /// Request lifecycle settings
    pub requests: RequestPolicyConfig,
    /// Where the store snapshot lives
    pub data: DataConfig,
    /// Logging settings
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StationConfig {
    /// Display name used by the CLI
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RequestPolicyConfig {
    /// Hours a PENDING request may sit before it expires
    pub expiry_hours: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DataConfig {
    /// Path to the JSON snapshot file
    pub snapshot_path: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level filter (e.g. "info", "med_station=debug")
    pub log_level: String,
    /// Emit JSON logs instead of human-readable ones
    pub json_logs: bool,
}

impl Default for MedStationConfig {
    fn default() -> Self {
        Self {
            station: StationConfig {
                name: "University Health Station".to_string(),
            },
            requests: RequestPolicyConfig {
                expiry_hours: crate::lifecycle::DEFAULT_EXPIRY_HOURS,
            },
            data: DataConfig {
                snapshot_path: "med-station.json".to_string(),
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                json_logs: false,
            },
        }
    }
}

impl MedStationConfig {
    /// Load configuration with precedence: defaults, then `med-station.toml`
    /// if present, then `MED_STATION_*` environment variables (nested keys
    /// use `__`, e.g. `MED_STATION_DATA__SNAPSHOT_PATH`).
    pub fn load() -> Result<Self> {
        let defaults = Config::try_from(&MedStationConfig::default())?;
        let settings = Config::builder()
            .add_source(defaults)
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(
                Environment::with_prefix("MED_STATION")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    /// Save configuration to file, for `med-station init`.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = MedStationConfig::default();
        assert_eq!(config.requests.expiry_hours, 24);
        assert!(!config.data.snapshot_path.is_empty());
    }

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = MedStationConfig::default();
        let rendered = toml::to_string_pretty(&config).unwrap();
        let parsed: MedStationConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.station.name, config.station.name);
        assert_eq!(parsed.requests.expiry_hours, config.requests.expiry_hours);
    }
}
