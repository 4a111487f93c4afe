//! Actuation bus configuration
//!
//! Register layout and bus parameters for the dispensing controller board.
//! Loaded from JSON and validated once; the rest of the crate only ever sees
//! a validated [`HardwareConfig`].

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::modbus::SerialConfig;

#[derive(Error, Debug)]
pub enum HardwareConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid hardware configuration: {0}")]
    Invalid(String),
}

/// Register and coil addresses on the controller board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterMap {
    /// Speed register of glue channel 0; channel `n` uses `base + n`
    pub motor_speed_base: u16,
    /// Direction coil of glue channel 0 (set = reverse); channel `n` uses `base + n`
    pub motor_reverse_coil_base: u16,
    /// Fan speed register (0-100 %)
    pub fan_speed: u16,
    /// Generator enable coil
    pub generator_coil: u16,
    /// Vacuum pump enable coil
    pub vacuum_coil: u16,
}

impl Default for RegisterMap {
    fn default() -> Self {
        Self {
            motor_speed_base: 0,
            motor_reverse_coil_base: 0,
            fan_speed: 10,
            generator_coil: 16,
            vacuum_coil: 17,
        }
    }
}

/// Glue type wired to a pump channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlueChannel {
    pub glue_type: String,
    pub channel: u8,
}

/// Complete actuation bus configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HardwareConfig {
    pub serial: SerialConfig,
    /// Modbus slave address of the controller board
    pub slave_id: u8,
    #[serde(default)]
    pub registers: RegisterMap,
    /// Number of glue pump channels on the board
    pub motor_channels: u8,
    /// Glue type to pump channel wiring
    pub glue_channels: Vec<GlueChannel>,
    /// Generator idle period before forced shutoff, in seconds
    pub generator_idle_timeout_s: f64,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            serial: SerialConfig::default(),
            slave_id: 1,
            registers: RegisterMap::default(),
            motor_channels: 4,
            glue_channels: vec![
                GlueChannel {
                    glue_type: "Type A".to_string(),
                    channel: 0,
                },
                GlueChannel {
                    glue_type: "Type B".to_string(),
                    channel: 1,
                },
            ],
            generator_idle_timeout_s: 60.0,
        }
    }
}

impl HardwareConfig {
    /// Load and validate from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, HardwareConfigError> {
        let file = File::open(path)?;
        let config: Self = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), HardwareConfigError> {
        self.serial.validate().map_err(HardwareConfigError::Invalid)?;
        if self.slave_id == 0 || self.slave_id > 247 {
            return Err(HardwareConfigError::Invalid(format!(
                "slave id must be in 1..=247, got {}",
                self.slave_id
            )));
        }
        if self.motor_channels == 0 {
            return Err(HardwareConfigError::Invalid(
                "at least one motor channel is required".to_string(),
            ));
        }
        for g in &self.glue_channels {
            if g.channel >= self.motor_channels {
                return Err(HardwareConfigError::Invalid(format!(
                    "glue type '{}' wired to channel {} but board has {} channels",
                    g.glue_type, g.channel, self.motor_channels
                )));
            }
        }
        if !(self.generator_idle_timeout_s.is_finite() && self.generator_idle_timeout_s > 0.0) {
            return Err(HardwareConfigError::Invalid(format!(
                "generator idle timeout must be positive, got {}",
                self.generator_idle_timeout_s
            )));
        }
        Ok(())
    }

    pub fn generator_idle_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.generator_idle_timeout_s)
    }

    /// Pump channel for a glue type.
    pub fn channel_for(&self, glue_type: &str) -> Option<u8> {
        self.glue_channels
            .iter()
            .find(|g| g.glue_type == glue_type)
            .map(|g| g.channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_is_valid() {
        assert!(HardwareConfig::default().validate().is_ok());
    }

    #[test]
    fn test_channel_lookup() {
        let config = HardwareConfig::default();
        assert_eq!(config.channel_for("Type B"), Some(1));
        assert_eq!(config.channel_for("Type Z"), None);
    }

    #[test]
    fn test_rejects_out_of_range_channel() {
        let mut config = HardwareConfig::default();
        config.glue_channels[0].channel = 9;
        assert!(matches!(
            config.validate(),
            Err(HardwareConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_load_round_trip() {
        let config = HardwareConfig::default();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(serde_json::to_string_pretty(&config).unwrap().as_bytes())
            .unwrap();

        let loaded = HardwareConfig::load(file.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_rejects_missing_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"{"slave_id": 1}"#).unwrap();
        assert!(matches!(
            HardwareConfig::load(file.path()),
            Err(HardwareConfigError::Json(_))
        ));
    }
}
