use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use telemetry::{TelemetryConfig, DEFAULT_ADDRESS, DEFAULT_QUEUE_CAPACITY, DEFAULT_SEND_INTERVAL};

const APP_DIR: &str = "bicycle-telemetry";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Seconds to transmit before shutting down; 0 runs until killed
    pub duration_secs: u64,
    /// Wait before capturing the straight-ahead reference
    pub settle_ms: u64,
    pub transmit: TransmitConfig,
    pub sensors: SensorConfig,
    pub simulation: SimulationConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            duration_secs: 10,
            settle_ms: 500,
            transmit: TransmitConfig::default(),
            sensors: SensorConfig::default(),
            simulation: SimulationConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransmitConfig {
    /// Last used target, `host:port` or `udp://host:port`
    pub address: String,
    pub interval_ms: u64,
    pub debug_transmit: bool,
}

impl Default for TransmitConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            interval_ms: DEFAULT_SEND_INTERVAL.as_millis() as u64,
            debug_transmit: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub use_gyroscope: bool,
    pub invert_rotation: bool,
    /// Last used low-pass cutoff in Hz; 0 disables the filter
    pub cutoff_hz: f64,
    pub queue_capacity: usize,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            use_gyroscope: true,
            invert_rotation: false,
            cutoff_hz: 0.0,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// Synthetic ride fed to the pipeline in place of phone sensors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Readings per second for each registered sensor
    pub rate_hz: f64,
    /// Compass heading of the bicycle when riding straight
    pub heading_deg: f64,
    /// Peak handlebar deflection
    pub amplitude_deg: f64,
    /// Duration of one full left-right steering cycle
    pub period_secs: f64,
    /// Offer a rotation-vector sensor; without it only accel+mag mode starts
    pub has_gyroscope: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            rate_hz: 50.0,
            heading_deg: 30.0,
            amplitude_deg: 20.0,
            period_secs: 4.0,
            has_gyroscope: true,
        }
    }
}

impl AppConfig {
    pub fn telemetry_config(&self) -> TelemetryConfig {
        TelemetryConfig {
            address: self.transmit.address.clone(),
            interval: Duration::from_millis(self.transmit.interval_ms),
            debug_transmit: self.transmit.debug_transmit,
            use_gyroscope: self.sensors.use_gyroscope,
            invert_rotation: self.sensors.invert_rotation,
            cutoff_hz: self.sensors.cutoff_hz,
            queue_capacity: self.sensors.queue_capacity,
        }
    }

    /// Keep the address and cutoff of a session for the next run
    pub fn remember_session(&mut self, session: &TelemetryConfig) {
        self.transmit.address = session.address.clone();
        self.sensors.cutoff_hz = session.cutoff_hz;
    }
}

/// Default config file: `<config dir>/bicycle-telemetry/config.toml`
pub fn default_config_path() -> Result<PathBuf> {
    let dir = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
        .join(APP_DIR);
    Ok(dir.join(CONFIG_FILE))
}

/// Load config from `path`, or return defaults if the file does not exist
pub fn load_config(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        info!("No config at {}, using defaults", path.display());
        return Ok(AppConfig::default());
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let config: AppConfig =
        toml::from_str(&contents).with_context(|| format!("parsing {}", path.display()))?;
    info!("Loaded config from {}", path.display());
    Ok(config)
}

pub fn save_config(path: &Path, config: &AppConfig) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents).with_context(|| format!("writing {}", path.display()))?;
    info!("Saved config to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("{}-{}-{}", APP_DIR, name, std::process::id()))
            .join(CONFIG_FILE)
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            duration_secs = 0

            [transmit]
            address = "udp://192.168.1.20:5000"
            "#,
        )
        .unwrap();

        assert_eq!(config.duration_secs, 0);
        assert_eq!(config.transmit.address, "udp://192.168.1.20:5000");
        assert_eq!(config.transmit.interval_ms, 50);
        assert_eq!(config.sensors, SensorConfig::default());
        assert_eq!(config.simulation, SimulationConfig::default());
    }

    #[test]
    fn test_telemetry_config_mirrors_sections() {
        let mut config = AppConfig::default();
        config.transmit.interval_ms = 20;
        config.sensors.use_gyroscope = false;
        config.sensors.cutoff_hz = 2.5;

        let telemetry = config.telemetry_config();
        assert_eq!(telemetry.interval, Duration::from_millis(20));
        assert!(!telemetry.use_gyroscope);
        assert_eq!(telemetry.cutoff_hz, 2.5);
        assert_eq!(telemetry.address, DEFAULT_ADDRESS);
        assert!(telemetry.validate().is_ok());
    }

    #[test]
    fn test_session_is_persisted() {
        let path = scratch_path("persist");
        let mut config = AppConfig::default();
        config.remember_session(&TelemetryConfig {
            address: "10.0.0.7:6000".to_string(),
            cutoff_hz: 1.5,
            invert_rotation: true,
            ..Default::default()
        });
        save_config(&path, &config).unwrap();

        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.transmit.address, "10.0.0.7:6000");
        assert_eq!(loaded.sensors.cutoff_hz, 1.5);
        // only address and cutoff are remembered
        assert!(!loaded.sensors.invert_rotation);

        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = load_config(&scratch_path("missing")).unwrap();
        assert_eq!(config, AppConfig::default());
    }
}
