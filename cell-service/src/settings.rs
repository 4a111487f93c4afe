//! Cell settings
//!
//! One JSON document holds every tunable of the cell. It is parsed into typed
//! sections and validated once at load; nothing downstream re-checks it.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use calibration::CalibrationConfig;
use hardware::{HardwareConfig, HardwareConfigError, Pose6};
use motion::{DispenseSettings, KinematicConfig, MotionConfig, PickAndPlaceConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use workpiece::{AlignmentConfig, SegmentSettings, SIMILARITY_THRESHOLD};

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid {section} settings: {reason}")]
    Invalid {
        section: &'static str,
        reason: String,
    },
}

impl SettingsError {
    fn invalid(section: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            section,
            reason: reason.into(),
        }
    }
}

/// Robot motion defaults and operator moves
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotSettings {
    /// Percent of the robot maximum
    pub velocity: f64,
    pub acceleration: f64,
    pub tool_frame: u8,
    pub user_frame: u8,
    /// Pose the camera calibrates from, looking down at the fiducials
    pub calibration_pose: Pose6,
    /// Jog increment, in millimetres (degrees for rotation)
    pub jog_step_mm: f64,
}

/// Dispensing process settings applied when a segment carries none
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlueSettings {
    pub spray_height_mm: f64,
    pub fan_speed: u16,
    pub motor_speed: u16,
    pub reverse_duration_ms: u64,
    pub reverse_speed: u16,
    pub generator_to_glue_delay_ms: u64,
    /// Hold on the first point before actuation
    pub warm_up_delay_ms: u64,
    pub reach_start_mm: f64,
    pub reach_end_mm: f64,
    pub rz_angle_deg: f64,
    pub glue_type: String,
}

impl GlueSettings {
    /// Segment settings for outline paths of templates without a spray pattern.
    pub fn segment_defaults(&self, robot: &RobotSettings) -> SegmentSettings {
        SegmentSettings {
            spray_height_mm: self.spray_height_mm,
            velocity: robot.velocity,
            acceleration: robot.acceleration,
            rz_angle_deg: self.rz_angle_deg,
            glue_type: self.glue_type.clone(),
        }
    }

    pub fn dispense_settings(&self) -> DispenseSettings {
        DispenseSettings {
            fan_speed: self.fan_speed,
            motor_speed: self.motor_speed,
            reverse_speed: self.reverse_speed,
            reverse_duration_ms: self.reverse_duration_ms,
            generator_to_glue_delay_ms: self.generator_to_glue_delay_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Minimum similarity percentage, exclusive
    pub similarity_threshold: f64,
    #[serde(default)]
    pub alignment: AlignmentConfig,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: SIMILARITY_THRESHOLD,
            alignment: AlignmentConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the calibration artifacts
    pub calibration_dir: PathBuf,
    /// Workpiece template JSON file
    pub templates_file: PathBuf,
}

/// A gripper parked in the tool changer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSlotSettings {
    pub gripper_id: u32,
    pub pose: Pose6,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickPlaceSettings {
    #[serde(flatten)]
    pub motion: PickAndPlaceConfig,
    /// Lower-left corner of the placement area, robot xy
    pub plane_origin: [f64; 2],
    pub plane_width_mm: f64,
    pub plane_depth_mm: f64,
    pub spacing_mm: f64,
    pub tool_slots: Vec<ToolSlotSettings>,
}

impl Default for PickPlaceSettings {
    fn default() -> Self {
        Self {
            motion: PickAndPlaceConfig::default(),
            plane_origin: [0.0, 200.0],
            plane_width_mm: 300.0,
            plane_depth_mm: 200.0,
            spacing_mm: 10.0,
            tool_slots: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellSettings {
    pub robot: RobotSettings,
    pub glue: GlueSettings,
    pub hardware: HardwareConfig,
    #[serde(default)]
    pub kinematics: KinematicConfig,
    #[serde(default)]
    pub motion: MotionConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    pub calibration: CalibrationConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub pick_place: PickPlaceSettings,
}

impl CellSettings {
    /// Load and validate from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let file = File::open(path)?;
        let settings: Self = serde_json::from_reader(BufReader::new(file))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        let r = &self.robot;
        for (name, value) in [("velocity", r.velocity), ("acceleration", r.acceleration)] {
            if !(value > 0.0 && value <= 100.0) {
                return Err(SettingsError::invalid(
                    "robot",
                    format!("{name} must be in (0, 100] percent, got {value}"),
                ));
            }
        }
        if !(r.jog_step_mm.is_finite() && r.jog_step_mm > 0.0) {
            return Err(SettingsError::invalid(
                "robot",
                format!("jog step must be positive, got {}", r.jog_step_mm),
            ));
        }

        let g = &self.glue;
        if g.fan_speed > 100 {
            return Err(SettingsError::invalid(
                "glue",
                format!("fan speed is a percentage, got {}", g.fan_speed),
            ));
        }
        if !(g.reach_start_mm > 0.0 && g.reach_end_mm > 0.0) {
            return Err(SettingsError::invalid(
                "glue",
                "reach thresholds must be positive",
            ));
        }
        if !g.spray_height_mm.is_finite() {
            return Err(SettingsError::invalid("glue", "spray height is not finite"));
        }
        if self.hardware.channel_for(&g.glue_type).is_none() {
            return Err(SettingsError::invalid(
                "glue",
                format!("glue type '{}' is not wired to any channel", g.glue_type),
            ));
        }

        self.hardware.validate().map_err(|e| match e {
            HardwareConfigError::Invalid(reason) => SettingsError::invalid("hardware", reason),
            other => SettingsError::invalid("hardware", other.to_string()),
        })?;
        self.kinematics
            .validate()
            .map_err(|reason| SettingsError::invalid("kinematics", reason))?;
        self.motion_config()
            .validate()
            .map_err(|reason| SettingsError::invalid("motion", reason))?;
        self.calibration
            .validate()
            .map_err(|e| SettingsError::invalid("calibration", e.to_string()))?;

        let m = &self.matching;
        if !(0.0..100.0).contains(&m.similarity_threshold) {
            return Err(SettingsError::invalid(
                "matching",
                format!(
                    "similarity threshold must be in [0, 100), got {}",
                    m.similarity_threshold
                ),
            ));
        }

        let p = &self.pick_place;
        if !(p.plane_width_mm > 0.0 && p.plane_depth_mm > 0.0 && p.spacing_mm >= 0.0) {
            return Err(SettingsError::invalid(
                "pick_place",
                "placement area must have positive size and non-negative spacing",
            ));
        }
        Ok(())
    }

    /// Motion settings with the robot frames and glue reach/warm-up values
    /// folded in.
    pub fn motion_config(&self) -> MotionConfig {
        MotionConfig {
            reach_start_mm: self.glue.reach_start_mm,
            reach_end_mm: self.glue.reach_end_mm,
            warm_up_delay_ms: self.glue.warm_up_delay_ms,
            tool_frame: self.robot.tool_frame,
            user_frame: self.robot.user_frame,
            ..self.motion.clone()
        }
    }

    /// Defaults suitable for a simulated cell rooted at `dir`.
    pub fn with_storage_root(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            robot: RobotSettings {
                velocity: 30.0,
                acceleration: 30.0,
                tool_frame: 0,
                user_frame: 0,
                calibration_pose: Pose6::new(300.0, 0.0, 300.0, 180.0, 0.0, 0.0),
                jog_step_mm: 1.0,
            },
            glue: GlueSettings {
                spray_height_mm: 10.0,
                fan_speed: 100,
                motor_speed: 500,
                reverse_duration_ms: 200,
                reverse_speed: 300,
                generator_to_glue_delay_ms: 0,
                warm_up_delay_ms: 0,
                reach_start_mm: 1.0,
                reach_end_mm: 1.0,
                rz_angle_deg: 0.0,
                glue_type: "Type A".to_string(),
            },
            hardware: HardwareConfig::default(),
            kinematics: KinematicConfig::default(),
            motion: MotionConfig::default(),
            matching: MatchingConfig::default(),
            calibration: CalibrationConfig::default(),
            storage: StorageConfig {
                calibration_dir: dir.join("calibration"),
                templates_file: dir.join("templates.json"),
            },
            pick_place: PickPlaceSettings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let settings = CellSettings::with_storage_root("/tmp/cell");
        settings.validate().unwrap();
        assert_eq!(settings.motion_config().reach_start_mm, 1.0);
    }

    #[test]
    fn test_load_round_trip() {
        let settings = CellSettings::with_storage_root("/tmp/cell");
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(serde_json::to_string_pretty(&settings).unwrap().as_bytes())
            .unwrap();
        assert_eq!(CellSettings::load(file.path()).unwrap(), settings);
    }

    #[test]
    fn test_missing_section_fails_fast() {
        let settings = CellSettings::with_storage_root("/tmp/cell");
        let mut value = serde_json::to_value(&settings).unwrap();
        value.as_object_mut().unwrap().remove("glue");
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(value.to_string().as_bytes()).unwrap();
        assert!(matches!(
            CellSettings::load(file.path()),
            Err(SettingsError::Json(_))
        ));
    }

    #[test]
    fn test_unwired_glue_type_rejected() {
        let mut settings = CellSettings::with_storage_root("/tmp/cell");
        settings.glue.glue_type = "Epoxy".to_string();
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::Invalid { section: "glue", .. })
        ));
    }

    #[test]
    fn test_velocity_out_of_range() {
        let mut settings = CellSettings::with_storage_root("/tmp/cell");
        settings.robot.velocity = 150.0;
        assert!(settings.validate().is_err());
    }
}
