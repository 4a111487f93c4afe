//! Polygon moments via Green's theorem.
//!
//! Raw moments are integrated exactly over the polygon interior, so a
//! contour sampled with 4 points and one sampled with 400 points along the
//! same outline produce the same values. Clockwise and counter-clockwise
//! windings give identical (positive-area) results.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Raw spatial moments of a closed polygon up to third order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Moments {
    pub m00: f64,
    pub m10: f64,
    pub m01: f64,
    pub m20: f64,
    pub m11: f64,
    pub m02: f64,
    pub m30: f64,
    pub m21: f64,
    pub m12: f64,
    pub m03: f64,
}

impl Moments {
    /// Integrate moments over the polygon `points` (implicitly closed).
    pub fn from_polygon(points: &[Point2<f64>]) -> Self {
        let Some(last) = points.last() else {
            return Self::default();
        };

        let (mut a00, mut a10, mut a01) = (0.0, 0.0, 0.0);
        let (mut a20, mut a11, mut a02) = (0.0, 0.0, 0.0);
        let (mut a30, mut a21, mut a12, mut a03) = (0.0, 0.0, 0.0, 0.0);

        let (mut xp, mut yp) = (last.x, last.y);
        for p in points {
            let (x, y) = (p.x, p.y);
            let (xp2, yp2, x2, y2) = (xp * xp, yp * yp, x * x, y * y);
            let dxy = xp * y - x * yp;
            let sx = xp + x;
            let sy = yp + y;

            a00 += dxy;
            a10 += dxy * sx;
            a01 += dxy * sy;
            a20 += dxy * (xp * sx + x2);
            a11 += dxy * (xp * (sy + yp) + x * (sy + y));
            a02 += dxy * (yp * sy + y2);
            a30 += dxy * sx * (xp2 + x2);
            a03 += dxy * sy * (yp2 + y2);
            a21 += dxy * (xp2 * (3.0 * yp + y) + 2.0 * x * xp * sy + x2 * (yp + 3.0 * y));
            a12 += dxy * (yp2 * (3.0 * xp + x) + 2.0 * y * yp * sx + y2 * (xp + 3.0 * x));

            xp = x;
            yp = y;
        }

        // Clockwise winding integrates to negative area; flip everything.
        let sign = if a00 < 0.0 { -1.0 } else { 1.0 };

        Self {
            m00: sign * a00 / 2.0,
            m10: sign * a10 / 6.0,
            m01: sign * a01 / 6.0,
            m20: sign * a20 / 12.0,
            m11: sign * a11 / 24.0,
            m02: sign * a02 / 12.0,
            m30: sign * a30 / 20.0,
            m21: sign * a21 / 60.0,
            m12: sign * a12 / 60.0,
            m03: sign * a03 / 20.0,
        }
    }

    fn cx(&self) -> f64 {
        self.m10 / self.m00
    }

    fn cy(&self) -> f64 {
        self.m01 / self.m00
    }

    /// Second central moment μ₂₀
    pub fn mu20(&self) -> f64 {
        self.m20 - self.m10 * self.cx()
    }

    /// Second central moment μ₁₁
    pub fn mu11(&self) -> f64 {
        self.m11 - self.m10 * self.cy()
    }

    /// Second central moment μ₀₂
    pub fn mu02(&self) -> f64 {
        self.m02 - self.m01 * self.cy()
    }

    fn mu30(&self) -> f64 {
        let cx = self.cx();
        self.m30 - cx * (3.0 * self.mu20() + cx * self.m10)
    }

    fn mu21(&self) -> f64 {
        let (cx, cy) = (self.cx(), self.cy());
        self.m21 - cx * (2.0 * self.mu11() + cx * self.m01) - cy * self.mu20()
    }

    fn mu12(&self) -> f64 {
        let (cx, cy) = (self.cx(), self.cy());
        self.m12 - cy * (2.0 * self.mu11() + cy * self.m10) - cx * self.mu02()
    }

    fn mu03(&self) -> f64 {
        let cy = self.cy();
        self.m03 - cy * (3.0 * self.mu02() + cy * self.m01)
    }
}

/// The seven Hu invariants of a polygon.
///
/// Invariant to translation, scale and rotation. A zero-area polygon yields
/// all zeros.
pub fn hu_moments(m: &Moments) -> [f64; 7] {
    if m.m00.abs() <= f64::EPSILON {
        return [0.0; 7];
    }

    let s2 = 1.0 / (m.m00 * m.m00);
    let s3 = s2 / m.m00.sqrt();

    let nu20 = m.mu20() * s2;
    let nu11 = m.mu11() * s2;
    let nu02 = m.mu02() * s2;
    let nu30 = m.mu30() * s3;
    let nu21 = m.mu21() * s3;
    let nu12 = m.mu12() * s3;
    let nu03 = m.mu03() * s3;

    let t0 = nu30 + nu12;
    let t1 = nu21 + nu03;
    let q0 = nu20 - nu02;
    let q1 = nu30 - 3.0 * nu12;
    let q2 = 3.0 * nu21 - nu03;

    let t0_sq = t0 * t0;
    let t1_sq = t1 * t1;

    [
        nu20 + nu02,
        q0 * q0 + 4.0 * nu11 * nu11,
        q1 * q1 + q2 * q2,
        t0_sq + t1_sq,
        q1 * t0 * (t0_sq - 3.0 * t1_sq) + q2 * t1 * (3.0 * t0_sq - t1_sq),
        q0 * (t0_sq - t1_sq) + 4.0 * nu11 * t0 * t1,
        q2 * t0 * (t0_sq - 3.0 * t1_sq) - q1 * t1 * (3.0 * t0_sq - t1_sq),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square(side: f64) -> Vec<Point2<f64>> {
        vec![
            Point2::new(0.0, 0.0),
            Point2::new(side, 0.0),
            Point2::new(side, side),
            Point2::new(0.0, side),
        ]
    }

    #[test]
    fn test_unit_square_second_moments() {
        let m = Moments::from_polygon(&square(1.0));
        assert_relative_eq!(m.m00, 1.0, epsilon = 1e-12);
        assert_relative_eq!(m.m20, 1.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(m.m11, 0.25, epsilon = 1e-12);
        assert_relative_eq!(m.mu20(), 1.0 / 12.0, epsilon = 1e-12);
        assert_relative_eq!(m.mu11(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_hu_first_invariant_of_square() {
        // nu20 + nu02 = 2 * (1/12) for any square.
        let hu = hu_moments(&Moments::from_polygon(&square(37.0)));
        assert_relative_eq!(hu[0], 1.0 / 6.0, epsilon = 1e-12);
        assert_relative_eq!(hu[1], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_empty_and_degenerate() {
        assert_eq!(Moments::from_polygon(&[]), Moments::default());
        let line = [Point2::new(0.0, 0.0), Point2::new(5.0, 5.0)];
        assert_eq!(hu_moments(&Moments::from_polygon(&line)), [0.0; 7]);
    }
}
