//! Kinematic sampling and trajectory execution parameters

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default bound on every wait-until-stationary loop
pub const DEFAULT_STATIONARY_TIMEOUT_S: f64 = 30.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KinematicConfig {
    /// Pose sampling period, in milliseconds
    pub sample_period_ms: u64,
    /// Speeds below this count as stationary, in mm/s
    pub stationary_speed_mm_s: f64,
    /// Accelerations beyond +/- this count as speeding up or slowing down, in mm/s^2
    pub acceleration_threshold_mm_s2: f64,
}

impl Default for KinematicConfig {
    fn default() -> Self {
        Self {
            sample_period_ms: 20,
            stationary_speed_mm_s: 1.0,
            acceleration_threshold_mm_s2: 50.0,
        }
    }
}

impl KinematicConfig {
    pub fn sample_period(&self) -> Duration {
        Duration::from_millis(self.sample_period_ms.max(1))
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.sample_period_ms == 0 {
            return Err("kinematic sample period must be nonzero".to_string());
        }
        if !(self.stationary_speed_mm_s > 0.0 && self.acceleration_threshold_mm_s2 > 0.0) {
            return Err("kinematic thresholds must be positive".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionConfig {
    /// Upper bound on waiting for the arm to settle, in seconds
    pub stationary_timeout_s: f64,
    /// Poll period of the settle wait, in milliseconds
    pub poll_interval_ms: u64,
    /// Blend radius between streamed linear moves, in millimetres
    pub blend_radius_mm: f64,
    /// Distance from a path's first pose that counts as arrived, in millimetres
    pub reach_start_mm: f64,
    /// Distance from a path's last pose that counts as arrived, in millimetres
    pub reach_end_mm: f64,
    /// Hold at the first pose before actuation starts, in milliseconds
    pub warm_up_delay_ms: u64,
    /// Robot tool frame id
    pub tool_frame: u8,
    /// Robot user frame id
    pub user_frame: u8,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            stationary_timeout_s: DEFAULT_STATIONARY_TIMEOUT_S,
            poll_interval_ms: 10,
            blend_radius_mm: 1.0,
            reach_start_mm: 1.0,
            reach_end_mm: 1.0,
            warm_up_delay_ms: 0,
            tool_frame: 0,
            user_frame: 0,
        }
    }
}

impl MotionConfig {
    pub fn stationary_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.stationary_timeout_s)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn warm_up_delay(&self) -> Duration {
        Duration::from_millis(self.warm_up_delay_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(self.stationary_timeout_s.is_finite() && self.stationary_timeout_s > 0.0) {
            return Err(format!(
                "stationary timeout must be positive, got {}",
                self.stationary_timeout_s
            ));
        }
        for (name, value) in [
            ("blend radius", self.blend_radius_mm),
            ("reach start", self.reach_start_mm),
            ("reach end", self.reach_end_mm),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(format!("{name} must be non-negative, got {value}"));
            }
        }
        Ok(())
    }
}
