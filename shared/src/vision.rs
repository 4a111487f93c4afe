//! Vision collaborator interface
//!
//! Frame acquisition, contour extraction and fiducial detection happen
//! outside the cell controller. This module fixes the shape of what comes
//! back from that collaborator so the matching and calibration layers can be
//! driven either by a real camera service or by a simulation in tests.

use ndarray::Array2;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::chessboard::ChessboardPattern;
use crate::contour::Contour;

/// Error type for vision collaborator operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VisionError {
    /// Frame could not be captured
    #[error("capture error: {0}")]
    Capture(String),
    /// Intrinsic calibration solver failed
    #[error("intrinsic calibration failed: {0}")]
    IntrinsicsSolver(String),
}

/// A detected square fiducial marker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerDetection {
    pub id: u32,
    /// Corner pixels in detector order (top-left first, clockwise)
    pub corners: [Point2<f64>; 4],
}

impl MarkerDetection {
    /// Mean of the four corners.
    pub fn center(&self) -> Point2<f64> {
        let sum = self
            .corners
            .iter()
            .fold(nalgebra::Vector2::zeros(), |acc, c| acc + c.coords);
        Point2::from(sum / 4.0)
    }
}

/// One captured frame together with everything the collaborator extracted
/// from it.
#[derive(Debug, Clone)]
pub struct VisionFrame {
    /// Monotonic frame counter
    pub frame_number: u64,
    /// 8-bit grayscale image, indexed `[row, col]`
    pub image: Array2<u8>,
    /// External contours, in pixels
    pub contours: Vec<Contour>,
    /// Fiducial markers visible in the frame
    pub markers: Vec<MarkerDetection>,
    /// Inner chessboard corners in row-major order, if a board was found
    pub chessboard_corners: Option<Vec<Point2<f64>>>,
}

impl VisionFrame {
    /// Image width and height in pixels.
    pub fn size(&self) -> (usize, usize) {
        let (rows, cols) = self.image.dim();
        (cols, rows)
    }

    /// Pixel at the geometric image center.
    pub fn center(&self) -> Point2<f64> {
        let (w, h) = self.size();
        Point2::new(w as f64 / 2.0, h as f64 / 2.0)
    }

    pub fn marker(&self, id: u32) -> Option<&MarkerDetection> {
        self.markers.iter().find(|m| m.id == id)
    }
}

/// Source of processed camera frames.
pub trait VisionSource: Send {
    /// Capture the latest frame. Consumers see last-write-wins snapshots.
    fn capture(&mut self) -> Result<VisionFrame, VisionError>;
}

/// Pinhole intrinsics plus distortion coefficients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    /// Row-major 3x3 camera matrix
    pub camera_matrix: [[f64; 3]; 3],
    /// Distortion coefficients (k1, k2, p1, p2, k3, ...)
    pub distortion: Vec<f64>,
    /// Reprojection RMS reported by the solver, in pixels
    pub rms_error: f64,
}

/// A single chessboard view used for intrinsic calibration
#[derive(Debug, Clone)]
pub struct ChessboardView {
    pub corners: Vec<Point2<f64>>,
    pub image_size: (usize, usize),
}

/// Solver for camera intrinsics from multiple chessboard views.
pub trait IntrinsicsSolver: Send {
    fn solve(
        &self,
        views: &[ChessboardView],
        pattern: &ChessboardPattern,
    ) -> Result<CameraIntrinsics, VisionError>;
}

/// Measures workpiece height above the work plane.
pub trait HeightSensor: Send {
    fn measure_height_mm(&mut self) -> Result<f64, VisionError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_marker_center() {
        let m = MarkerDetection {
            id: 4,
            corners: [
                Point2::new(10.0, 10.0),
                Point2::new(20.0, 10.0),
                Point2::new(20.0, 20.0),
                Point2::new(10.0, 20.0),
            ],
        };
        assert_abs_diff_eq!(m.center().x, 15.0, epsilon = 1e-12);
        assert_abs_diff_eq!(m.center().y, 15.0, epsilon = 1e-12);
    }

    #[test]
    fn test_frame_center_uses_width_then_height() {
        let frame = VisionFrame {
            frame_number: 0,
            image: Array2::zeros((720, 1280)),
            contours: vec![],
            markers: vec![],
            chessboard_corners: None,
        };
        assert_eq!(frame.size(), (1280, 720));
        assert_abs_diff_eq!(frame.center().x, 640.0, epsilon = 1e-12);
        assert_abs_diff_eq!(frame.center().y, 360.0, epsilon = 1e-12);
    }
}
