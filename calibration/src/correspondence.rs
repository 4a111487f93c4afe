//! Pixel/robot point pairs and the homography fitted to them

use cell_math::{Homography, HomographyError};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// One fiducial seen at `pixel` from the calibration pose and reached by the
/// tool at `robot`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationCorrespondence {
    pub marker_id: u32,
    pub pixel: Point2<f64>,
    /// Robot x, y, z in millimetres
    pub robot: [f64; 3],
}

/// Fit the pixel-to-robot homography and report its RMS residual in
/// millimetres.
pub fn fit_homography(
    points: &[CalibrationCorrespondence],
) -> Result<(Homography, f64), HomographyError> {
    let src: Vec<[f64; 2]> = points.iter().map(|c| [c.pixel.x, c.pixel.y]).collect();
    let dst: Vec<[f64; 2]> = points.iter().map(|c| [c.robot[0], c.robot[1]]).collect();

    let homography = Homography::estimate(&src, &dst)?;
    let rms = homography.rms_error(&src, &dst);
    info!(
        "Fitted camera-to-robot homography from {} points, RMS {:.3} mm",
        points.len(),
        rms
    );
    Ok((homography, rms))
}

/// Operator-driven calibration: the robot is jogged onto each fiducial and
/// its pose recorded against the fiducial's pixel position.
#[derive(Debug, Clone)]
pub struct ManualCalibration {
    required: usize,
    points: Vec<CalibrationCorrespondence>,
}

impl Default for ManualCalibration {
    fn default() -> Self {
        Self::new(9)
    }
}

impl ManualCalibration {
    pub fn new(required: usize) -> Self {
        Self {
            required: required.max(4),
            points: Vec::new(),
        }
    }

    /// Record a point, replacing an earlier one for the same fiducial.
    pub fn record(&mut self, point: CalibrationCorrespondence) -> usize {
        self.points.retain(|p| p.marker_id != point.marker_id);
        self.points.push(point);
        debug!(
            "Recorded calibration point {} ({}/{})",
            point.marker_id,
            self.points.len(),
            self.required
        );
        self.points.len()
    }

    pub fn points(&self) -> &[CalibrationCorrespondence] {
        &self.points
    }

    pub fn is_complete(&self) -> bool {
        self.points.len() >= self.required
    }

    /// The fitted homography once enough points are held.
    pub fn fit(&self) -> Option<Result<(Homography, f64), HomographyError>> {
        self.is_complete().then(|| fit_homography(&self.points))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn make_points() -> Vec<CalibrationCorrespondence> {
        let mut out = Vec::new();
        for r in 0..3 {
            for c in 0..3 {
                let px = Point2::new(100.0 + 200.0 * c as f64, 80.0 + 150.0 * r as f64);
                out.push(CalibrationCorrespondence {
                    marker_id: (r * 3 + c) as u32,
                    pixel: px,
                    robot: [400.0 - px.y * 0.5, 50.0 - px.x * 0.5, 0.0],
                });
            }
        }
        out
    }

    #[test]
    fn test_fit_affine_points() {
        let (h, rms) = fit_homography(&make_points()).unwrap();
        assert!(rms < 1e-6);
        let p = h.apply_point(Point2::new(300.0, 230.0));
        assert_abs_diff_eq!(p.x, 285.0, epsilon = 1e-6);
        assert_abs_diff_eq!(p.y, -100.0, epsilon = 1e-6);
    }

    #[test]
    fn test_fit_needs_four_points() {
        let points = make_points();
        assert!(fit_homography(&points[..3]).is_err());
    }

    #[test]
    fn test_manual_calibration_replaces_and_completes() {
        let mut manual = ManualCalibration::default();
        let points = make_points();

        manual.record(points[0]);
        let mut moved = points[0];
        moved.robot[0] += 1.0;
        assert_eq!(manual.record(moved), 1);
        assert!(manual.fit().is_none());

        for p in &points[1..] {
            manual.record(*p);
        }
        assert!(manual.is_complete());
        let (_, rms) = manual.fit().unwrap().unwrap();
        assert!(rms > 0.0);
    }
}
