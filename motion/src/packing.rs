//! Greedy row packing of workpieces on the placement plane

use nalgebra::Point2;
use tracing::debug;

use crate::MotionError;

/// Fills a rectangular plane left to right in rows. Each row is as deep as
/// its deepest item; an item that would cross the plane width starts a new
/// row.
#[derive(Debug, Clone)]
pub struct RowPacker {
    origin: Point2<f64>,
    width: f64,
    depth: f64,
    spacing: f64,
    cursor_x: f64,
    row_y: f64,
    row_depth: f64,
}

impl RowPacker {
    /// Plane spanning `width` x `depth` mm from `origin` (robot x, y).
    pub fn new(origin: Point2<f64>, width: f64, depth: f64, spacing: f64) -> Self {
        Self {
            origin,
            width,
            depth,
            spacing,
            cursor_x: 0.0,
            row_y: 0.0,
            row_depth: 0.0,
        }
    }

    /// Reserve room for an item and return its center.
    pub fn place(&mut self, width: f64, depth: f64) -> Result<Point2<f64>, MotionError> {
        let full = MotionError::PlaneFull { width, depth };
        if width > self.width {
            return Err(full);
        }

        if self.cursor_x > 0.0 && self.cursor_x + width > self.width {
            self.row_y += self.row_depth + self.spacing;
            self.cursor_x = 0.0;
            self.row_depth = 0.0;
            debug!("Starting new placement row at y offset {:.1}", self.row_y);
        }
        if self.row_y + depth > self.depth {
            return Err(full);
        }

        let center = Point2::new(
            self.origin.x + self.cursor_x + width / 2.0,
            self.origin.y + self.row_y + depth / 2.0,
        );
        self.cursor_x += width + self.spacing;
        self.row_depth = self.row_depth.max(depth);
        Ok(center)
    }

    /// Forget all placements.
    pub fn reset(&mut self) {
        self.cursor_x = 0.0;
        self.row_y = 0.0;
        self.row_depth = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_fills_row_then_wraps() {
        let mut packer = RowPacker::new(Point2::new(100.0, 200.0), 100.0, 100.0, 5.0);

        let a = packer.place(40.0, 20.0).unwrap();
        assert_abs_diff_eq!(a.x, 120.0);
        assert_abs_diff_eq!(a.y, 210.0);

        let b = packer.place(40.0, 30.0).unwrap();
        assert_abs_diff_eq!(b.x, 165.0);
        assert_abs_diff_eq!(b.y, 215.0);

        // 85 + 40 > 100: new row below the deepest item (30) plus spacing
        let c = packer.place(40.0, 10.0).unwrap();
        assert_abs_diff_eq!(c.x, 120.0);
        assert_abs_diff_eq!(c.y, 200.0 + 35.0 + 5.0);
    }

    #[test]
    fn test_plane_full() {
        let mut packer = RowPacker::new(Point2::origin(), 50.0, 50.0, 0.0);
        packer.place(50.0, 30.0).unwrap();
        assert!(matches!(
            packer.place(50.0, 30.0),
            Err(MotionError::PlaneFull { .. })
        ));
        assert!(packer.place(60.0, 1.0).is_err());

        packer.reset();
        assert!(packer.place(50.0, 50.0).is_ok());
    }
}
