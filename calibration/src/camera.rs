//! Intrinsic and perspective calibration from chessboard views

use cell_math::Homography;
use shared::chessboard::ChessboardPattern;
use shared::vision::{CameraIntrinsics, ChessboardView, IntrinsicsSolver, VisionSource};
use tracing::{debug, info};

use crate::CalibrationError;

/// Result of a camera calibration run
#[derive(Debug, Clone)]
pub struct CameraCalibration {
    pub intrinsics: CameraIntrinsics,
    /// Maps the imaged board onto a fronto-parallel rectangle
    pub perspective: Homography,
    /// Scale measured on the last view
    pub ppm: f64,
    pub views_used: usize,
}

/// Collect `min_images` chessboard views, solve the intrinsics and derive the
/// perspective correction from the last view.
///
/// The perspective matrix maps the four outer corners onto an axis-aligned
/// rectangle anchored at the first corner, sized by the board dimensions at
/// the measured scale.
pub fn calibrate_camera(
    camera: &mut dyn VisionSource,
    solver: &dyn IntrinsicsSolver,
    pattern: &ChessboardPattern,
    min_images: usize,
    max_frames: usize,
) -> Result<CameraCalibration, CalibrationError> {
    pattern.validate()?;

    let mut views = Vec::with_capacity(min_images);
    for frame_idx in 0..max_frames {
        if views.len() >= min_images {
            break;
        }
        let frame = camera.capture()?;
        let image_size = frame.size();
        match frame.chessboard_corners {
            Some(corners) if corners.len() == pattern.corner_count() => {
                views.push(ChessboardView {
                    corners,
                    image_size,
                });
                debug!("Chessboard view {}/{} (frame {})", views.len(), min_images, frame_idx);
            }
            _ => debug!("No chessboard in frame {}", frame_idx),
        }
    }

    let Some(last) = views.last() else {
        return Err(CalibrationError::NotEnoughImages {
            needed: min_images,
            got: 0,
        });
    };
    if views.len() < min_images {
        return Err(CalibrationError::NotEnoughImages {
            needed: min_images,
            got: views.len(),
        });
    }

    let ppm = pattern.pixels_per_mm(&last.corners)?;
    let outer = pattern.outer_corners(&last.corners)?;
    let width = (pattern.cols - 1) as f64 * pattern.square_size_mm * ppm;
    let height = (pattern.rows - 1) as f64 * pattern.square_size_mm * ppm;
    let origin = outer[0];
    let target = [
        [origin.x, origin.y],
        [origin.x + width, origin.y],
        [origin.x + width, origin.y + height],
        [origin.x, origin.y + height],
    ];
    let source: Vec<[f64; 2]> = outer.iter().map(|p| [p.x, p.y]).collect();
    let perspective = Homography::estimate(&source, &target)?;

    let intrinsics = solver.solve(&views, pattern)?;
    info!(
        "Camera calibrated from {} views: RMS {:.3} px, {:.3} px/mm",
        views.len(),
        intrinsics.rms_error,
        ppm
    );

    Ok(CameraCalibration {
        intrinsics,
        perspective,
        ppm,
        views_used: views.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra::Point2;
    use ndarray::Array2;
    use shared::vision::{VisionError, VisionFrame};

    /// Skewed board: x spacing 20 px, rows shear by 2 px per row.
    struct BoardCamera {
        pattern: ChessboardPattern,
        frames: usize,
        blank_every: usize,
    }

    impl VisionSource for BoardCamera {
        fn capture(&mut self) -> Result<VisionFrame, VisionError> {
            self.frames += 1;
            let visible = self.blank_every == 0 || self.frames % self.blank_every != 0;
            let corners = visible.then(|| {
                let mut pts = Vec::new();
                for r in 0..self.pattern.rows {
                    for c in 0..self.pattern.cols {
                        pts.push(Point2::new(
                            100.0 + 20.0 * c as f64 + 2.0 * r as f64,
                            50.0 + 20.0 * r as f64,
                        ));
                    }
                }
                pts
            });
            Ok(VisionFrame {
                frame_number: self.frames as u64,
                image: Array2::zeros((480, 640)),
                contours: vec![],
                markers: vec![],
                chessboard_corners: corners,
            })
        }
    }

    struct FixedSolver;

    impl IntrinsicsSolver for FixedSolver {
        fn solve(
            &self,
            views: &[ChessboardView],
            _pattern: &ChessboardPattern,
        ) -> Result<CameraIntrinsics, VisionError> {
            let (w, h) = views[0].image_size;
            Ok(CameraIntrinsics {
                camera_matrix: [
                    [700.0, 0.0, w as f64 / 2.0],
                    [0.0, 700.0, h as f64 / 2.0],
                    [0.0, 0.0, 1.0],
                ],
                distortion: vec![0.0; 5],
                rms_error: 0.1,
            })
        }
    }

    fn pattern() -> ChessboardPattern {
        ChessboardPattern {
            cols: 5,
            rows: 4,
            square_size_mm: 10.0,
        }
    }

    #[test]
    fn test_collects_views_and_rectifies() {
        let mut camera = BoardCamera {
            pattern: pattern(),
            frames: 0,
            blank_every: 3,
        };
        let result = calibrate_camera(&mut camera, &FixedSolver, &pattern(), 4, 20).unwrap();

        assert_eq!(result.views_used, 4);
        assert_abs_diff_eq!(result.intrinsics.camera_matrix[0][2], 320.0);

        // Last corner of the first row lands on the rectangle's top edge
        let p = result.perspective.apply_point(Point2::new(180.0, 50.0));
        assert_abs_diff_eq!(p.y, 50.0, epsilon = 1e-6);
        // First corner of the last row is pulled back over the first corner
        let q = result.perspective.apply_point(Point2::new(106.0, 110.0));
        assert_abs_diff_eq!(q.x, 100.0, epsilon = 1e-6);
    }

    #[test]
    fn test_not_enough_views() {
        let mut camera = BoardCamera {
            pattern: pattern(),
            frames: 0,
            blank_every: 0,
        };
        let err = calibrate_camera(&mut camera, &FixedSolver, &pattern(), 10, 5).unwrap_err();
        assert!(matches!(
            err,
            CalibrationError::NotEnoughImages { needed: 10, got: 5 }
        ));
    }
}
