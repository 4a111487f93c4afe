//! Planar rotations in degrees, positive from +x toward +y.

use nalgebra::{Matrix2, Point2};

pub fn rotation_deg(angle_deg: f64) -> Matrix2<f64> {
    let (s, c) = angle_deg.to_radians().sin_cos();
    Matrix2::new(c, -s, s, c)
}

/// Rotate `point` about `pivot`.
pub fn rotate_about(point: Point2<f64>, pivot: Point2<f64>, angle_deg: f64) -> Point2<f64> {
    pivot + rotation_deg(angle_deg) * (point - pivot)
}

/// Rotate a contour's points in place about `pivot`.
pub fn rotate_points_about(points: &mut [Point2<f64>], pivot: Point2<f64>, angle_deg: f64) {
    let r = rotation_deg(angle_deg);
    for p in points.iter_mut() {
        *p = pivot + r * (*p - pivot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_quarter_turn_about_pivot() {
        let rotated = rotate_about(Point2::new(20.0, 10.0), Point2::new(10.0, 10.0), 90.0);
        assert_abs_diff_eq!(rotated, Point2::new(10.0, 20.0), epsilon = 1e-10);
    }

    #[test]
    fn test_half_turn_keeps_pivot_and_centroid() {
        let pivot = Point2::new(-3.0, 4.0);
        let mut pts = vec![Point2::new(-2.0, 4.0), Point2::new(-4.0, 4.0), pivot];
        rotate_points_about(&mut pts, pivot, 180.0);

        assert_abs_diff_eq!(pts[0], Point2::new(-4.0, 4.0), epsilon = 1e-10);
        assert_abs_diff_eq!(pts[1], Point2::new(-2.0, 4.0), epsilon = 1e-10);
        assert_abs_diff_eq!(pts[2], pivot, epsilon = 1e-12);
    }

    #[test]
    fn test_rotation_preserves_determinant() {
        assert_abs_diff_eq!(rotation_deg(37.0).determinant(), 1.0, epsilon = 1e-12);
    }
}
