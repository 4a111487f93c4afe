//! Chessboard scale reference.
//!
//! The board is described by its inner-corner grid; corners arrive row-major
//! (`cols` corners per row). Pixel-per-millimetre scale is the mean spacing of
//! adjacent corners divided by the physical square size.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChessboardError {
    #[error("expected {expected} corners, got {got}")]
    CornerCount { expected: usize, got: usize },

    #[error("invalid chessboard pattern: {0}")]
    InvalidPattern(String),
}

/// Physical description of the calibration chessboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChessboardPattern {
    /// Inner corners per row
    pub cols: usize,
    /// Inner corners per column
    pub rows: usize,
    /// Edge length of one square in millimetres
    pub square_size_mm: f64,
}

impl Default for ChessboardPattern {
    fn default() -> Self {
        Self {
            cols: 9,
            rows: 6,
            square_size_mm: 25.0,
        }
    }
}

impl ChessboardPattern {
    pub fn corner_count(&self) -> usize {
        self.cols * self.rows
    }

    pub fn validate(&self) -> Result<(), ChessboardError> {
        if self.cols < 2 || self.rows < 2 {
            return Err(ChessboardError::InvalidPattern(format!(
                "need at least 2x2 inner corners, got {}x{}",
                self.cols, self.rows
            )));
        }
        if self.square_size_mm.is_nan() || self.square_size_mm <= 0.0 {
            return Err(ChessboardError::InvalidPattern(format!(
                "square size must be positive, got {}",
                self.square_size_mm
            )));
        }
        Ok(())
    }

    fn check_corners(&self, corners: &[Point2<f64>]) -> Result<(), ChessboardError> {
        self.validate()?;
        if corners.len() != self.corner_count() {
            return Err(ChessboardError::CornerCount {
                expected: self.corner_count(),
                got: corners.len(),
            });
        }
        Ok(())
    }

    /// Pixels per millimetre from the mean adjacent-corner spacing.
    pub fn pixels_per_mm(&self, corners: &[Point2<f64>]) -> Result<f64, ChessboardError> {
        self.check_corners(corners)?;

        let mut total = 0.0;
        let mut count = 0usize;
        for r in 0..self.rows {
            for c in 0..self.cols {
                let p = corners[r * self.cols + c];
                if c + 1 < self.cols {
                    total += (corners[r * self.cols + c + 1] - p).norm();
                    count += 1;
                }
                if r + 1 < self.rows {
                    total += (corners[(r + 1) * self.cols + c] - p).norm();
                    count += 1;
                }
            }
        }

        Ok(total / count as f64 / self.square_size_mm)
    }

    /// The four outer inner-corners: first, end of first row, last, start of last row.
    pub fn outer_corners(
        &self,
        corners: &[Point2<f64>],
    ) -> Result<[Point2<f64>; 4], ChessboardError> {
        self.check_corners(corners)?;
        let last_row = (self.rows - 1) * self.cols;
        Ok([
            corners[0],
            corners[self.cols - 1],
            corners[last_row + self.cols - 1],
            corners[last_row],
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn make_grid(pattern: &ChessboardPattern, spacing_px: f64) -> Vec<Point2<f64>> {
        let mut pts = Vec::new();
        for r in 0..pattern.rows {
            for c in 0..pattern.cols {
                pts.push(Point2::new(
                    100.0 + c as f64 * spacing_px,
                    80.0 + r as f64 * spacing_px,
                ));
            }
        }
        pts
    }

    #[test]
    fn test_ppm_of_regular_grid() {
        let pattern = ChessboardPattern::default();
        let corners = make_grid(&pattern, 50.0);
        let ppm = pattern.pixels_per_mm(&corners).unwrap();
        assert_relative_eq!(ppm, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_wrong_corner_count() {
        let pattern = ChessboardPattern::default();
        let err = pattern.pixels_per_mm(&[Point2::origin(); 3]).unwrap_err();
        assert_eq!(
            err,
            ChessboardError::CornerCount {
                expected: 54,
                got: 3
            }
        );
    }

    #[test]
    fn test_outer_corners() {
        let pattern = ChessboardPattern {
            cols: 3,
            rows: 2,
            square_size_mm: 10.0,
        };
        let corners = make_grid(&pattern, 10.0);
        let outer = pattern.outer_corners(&corners).unwrap();
        assert_eq!(outer[0], Point2::new(100.0, 80.0));
        assert_eq!(outer[1], Point2::new(120.0, 80.0));
        assert_eq!(outer[2], Point2::new(120.0, 90.0));
        assert_eq!(outer[3], Point2::new(100.0, 90.0));
    }

    #[test]
    fn test_rejects_non_positive_square() {
        let pattern = ChessboardPattern {
            square_size_mm: 0.0,
            ..Default::default()
        };
        assert!(pattern.validate().is_err());
    }
}
