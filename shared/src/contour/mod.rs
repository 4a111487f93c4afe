//! Planar contours and the shape measurements taken on them.
//!
//! A [`Contour`] is an ordered, implicitly closed point sequence in camera
//! pixels (or, after transformation, robot millimetres). Geometry is computed
//! on the polygon itself, so results do not depend on point density.

mod hull;
mod moments;
mod shape;

use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};

pub use hull::{convex_hull_indices, convexity_defects, ConvexityDefect};
pub use moments::{hu_moments, Moments};
pub use shape::{match_shapes, similarity_percent, HU_EPSILON};

/// Ordered point sequence describing a closed outline or an open sub-path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contour {
    points: Vec<Point2<f64>>,
}

impl Contour {
    pub fn new(points: Vec<Point2<f64>>) -> Self {
        Self { points }
    }

    /// Build from `[x, y]` pairs as delivered by the vision collaborator.
    pub fn from_xy(points: &[[f64; 2]]) -> Self {
        Self {
            points: points.iter().map(|p| Point2::new(p[0], p[1])).collect(),
        }
    }

    pub fn points(&self) -> &[Point2<f64>] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn to_xy(&self) -> Vec<[f64; 2]> {
        self.points.iter().map(|p| [p.x, p.y]).collect()
    }

    /// Spatial moments of the polygon up to third order.
    pub fn moments(&self) -> Moments {
        Moments::from_polygon(&self.points)
    }

    /// Enclosed area (absolute, independent of winding).
    pub fn area(&self) -> f64 {
        self.moments().m00
    }

    /// Area centroid, falling back to the vertex mean for degenerate
    /// (zero-area) contours such as straight strokes.
    pub fn centroid(&self) -> Point2<f64> {
        let m = self.moments();
        if m.m00.abs() > f64::EPSILON {
            return Point2::new(m.m10 / m.m00, m.m01 / m.m00);
        }
        self.vertex_mean()
    }

    /// Principal-axis orientation in degrees, `0.5 * atan2(2μ11, μ20 - μ02)`.
    pub fn orientation_deg(&self) -> f64 {
        let m = self.moments();
        if m.m00.abs() > f64::EPSILON {
            let (mu20, mu11, mu02) = (m.mu20(), m.mu11(), m.mu02());
            return 0.5 * (2.0 * mu11).atan2(mu20 - mu02).to_degrees();
        }

        // Open strokes have no area; use the vertex covariance instead.
        let c = self.vertex_mean();
        let (mut sxx, mut sxy, mut syy) = (0.0, 0.0, 0.0);
        for p in &self.points {
            let d = p - c;
            sxx += d.x * d.x;
            sxy += d.x * d.y;
            syy += d.y * d.y;
        }
        0.5 * (2.0 * sxy).atan2(sxx - syy).to_degrees()
    }

    pub fn translate(&mut self, delta: Vector2<f64>) {
        for p in self.points.iter_mut() {
            *p += delta;
        }
    }

    /// Rotate counter-clockwise by `angle_deg` about `pivot`.
    pub fn rotate_about(&mut self, pivot: Point2<f64>, angle_deg: f64) {
        cell_math::rotate_points_about(&mut self.points, pivot, angle_deg);
    }

    /// Deepest convexity defect point, if the contour has any concavity.
    pub fn farthest_defect(&self) -> Option<Point2<f64>> {
        convexity_defects(&self.points)
            .into_iter()
            .max_by(|a, b| a.depth.total_cmp(&b.depth))
            .map(|d| self.points[d.farthest])
    }

    /// Copy with the first point repeated at the end.
    pub fn closed(&self) -> Contour {
        let mut points = self.points.clone();
        if let (Some(first), Some(last)) = (self.points.first(), self.points.last()) {
            if first != last {
                points.push(*first);
            }
        }
        Contour { points }
    }

    fn vertex_mean(&self) -> Point2<f64> {
        if self.points.is_empty() {
            return Point2::origin();
        }
        let sum = self
            .points
            .iter()
            .fold(Vector2::zeros(), |acc, p| acc + p.coords);
        Point2::from(sum / self.points.len() as f64)
    }
}

impl From<Vec<Point2<f64>>> for Contour {
    fn from(points: Vec<Point2<f64>>) -> Self {
        Self::new(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn make_rect(w: f64, h: f64) -> Contour {
        Contour::from_xy(&[[0.0, 0.0], [w, 0.0], [w, h], [0.0, h]])
    }

    #[test]
    fn test_rectangle_area_and_centroid() {
        let rect = make_rect(100.0, 40.0);
        assert_abs_diff_eq!(rect.area(), 4000.0, epsilon = 1e-9);
        let c = rect.centroid();
        assert_abs_diff_eq!(c.x, 50.0, epsilon = 1e-9);
        assert_abs_diff_eq!(c.y, 20.0, epsilon = 1e-9);
    }

    #[test]
    fn test_winding_does_not_change_area() {
        let mut pts = make_rect(10.0, 5.0).points().to_vec();
        pts.reverse();
        assert_abs_diff_eq!(Contour::new(pts).area(), 50.0, epsilon = 1e-9);
    }

    #[test]
    fn test_orientation_follows_rotation() {
        let mut rect = make_rect(100.0, 40.0);
        assert_abs_diff_eq!(rect.orientation_deg(), 0.0, epsilon = 1e-9);

        let pivot = rect.centroid();
        rect.rotate_about(pivot, 12.0);
        assert_abs_diff_eq!(rect.orientation_deg(), 12.0, epsilon = 1e-9);
    }

    #[test]
    fn test_open_stroke_orientation_and_centroid() {
        let stroke = Contour::from_xy(&[[0.0, 0.0], [10.0, 10.0], [20.0, 20.0]]);
        assert_abs_diff_eq!(stroke.orientation_deg(), 45.0, epsilon = 1e-9);
        assert_abs_diff_eq!(stroke.centroid().x, 10.0, epsilon = 1e-9);
    }

    #[test]
    fn test_closed_repeats_first_point_once() {
        let rect = make_rect(2.0, 1.0);
        let closed = rect.closed();
        assert_eq!(closed.len(), 5);
        assert_eq!(closed.closed().len(), 5);
    }

    #[test]
    fn test_convex_shape_has_no_defect() {
        assert!(make_rect(3.0, 3.0).farthest_defect().is_none());
    }
}
