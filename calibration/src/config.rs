//! Calibration procedure parameters

use std::time::Duration;

use nalgebra::{Matrix2, Vector2};
use serde::{Deserialize, Serialize};
use shared::chessboard::ChessboardPattern;

use crate::CalibrationError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    pub chessboard: ChessboardPattern,
    /// Fiducial ids that must all be found
    pub required_marker_ids: Vec<u32>,
    /// Frames to search for the chessboard before giving up
    pub max_chessboard_frames: usize,
    /// Frames to accumulate fiducials before giving up
    pub max_marker_frames: usize,
    /// Corrective moves per fiducial before giving up
    pub max_servo_iterations: usize,
    /// Re-captures when a fiducial is missing after a move
    pub max_marker_lost_retries: usize,
    /// Residual offset from the image center that counts as aligned, in pixels
    pub servo_tolerance_px: f64,
    /// Maps image axes onto robot axes, row-major
    pub image_to_robot: [[f64; 2]; 2],
    /// Robot z of the work plane
    pub work_plane_z_mm: f64,
    /// z change from the calibration pose while servoing
    pub servo_z_offset_mm: f64,
    /// Camera center to tool point, robot xy, in millimetres
    pub tool_offset_mm: [f64; 2],
    /// Chessboard views needed for camera calibration
    pub min_camera_images: usize,
    /// Frames to try while collecting camera calibration views
    pub max_camera_frames: usize,
    pub velocity: f64,
    pub acceleration: f64,
    /// Bound on each settle wait, in seconds
    pub settle_timeout_s: f64,
    pub poll_interval_ms: u64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            chessboard: ChessboardPattern::default(),
            required_marker_ids: (0..9).collect(),
            max_chessboard_frames: 10,
            max_marker_frames: 10,
            max_servo_iterations: 10,
            max_marker_lost_retries: 5,
            servo_tolerance_px: 1.0,
            image_to_robot: [[1.0, 0.0], [0.0, 1.0]],
            work_plane_z_mm: 0.0,
            servo_z_offset_mm: 0.0,
            tool_offset_mm: [0.0, 0.0],
            min_camera_images: 10,
            max_camera_frames: 100,
            velocity: 20.0,
            acceleration: 20.0,
            settle_timeout_s: 30.0,
            poll_interval_ms: 10,
        }
    }
}

impl CalibrationConfig {
    pub fn image_to_robot(&self) -> Matrix2<f64> {
        let m = &self.image_to_robot;
        Matrix2::new(m[0][0], m[0][1], m[1][0], m[1][1])
    }

    pub fn tool_offset(&self) -> Vector2<f64> {
        Vector2::new(self.tool_offset_mm[0], self.tool_offset_mm[1])
    }

    pub fn settle_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.settle_timeout_s)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn validate(&self) -> Result<(), CalibrationError> {
        let invalid = |msg: String| Err(CalibrationError::InvalidConfig(msg));

        self.chessboard.validate()?;
        if self.required_marker_ids.len() < 4 {
            return invalid(format!(
                "a homography needs at least 4 fiducials, {} configured",
                self.required_marker_ids.len()
            ));
        }
        if self.image_to_robot().determinant().abs() < 1e-9 {
            return invalid("image_to_robot matrix is singular".to_string());
        }
        if !(self.servo_tolerance_px > 0.0) {
            return invalid(format!(
                "servo tolerance must be positive, got {}",
                self.servo_tolerance_px
            ));
        }
        if self.max_servo_iterations == 0 {
            return invalid("at least one servo iteration is required".to_string());
        }
        if !(self.settle_timeout_s.is_finite() && self.settle_timeout_s > 0.0) {
            return invalid(format!(
                "settle timeout must be positive, got {}",
                self.settle_timeout_s
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(CalibrationConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_singular_axis_matrix() {
        let config = CalibrationConfig {
            image_to_robot: [[1.0, 2.0], [2.0, 4.0]],
            ..CalibrationConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(CalibrationError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_rejects_too_few_markers() {
        let config = CalibrationConfig {
            required_marker_ids: vec![0, 1, 2],
            ..CalibrationConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
