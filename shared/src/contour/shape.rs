//! Hu-moment shape distance and the similarity score derived from it.

use super::{hu_moments, Contour};

/// Invariants with magnitude below this are ignored by the distance.
pub const HU_EPSILON: f64 = 1e-5;

/// Log-scaled Hu-moment distance between two contours.
///
/// Each invariant `h` is mapped to `m = sign(h) * log10(|h|)` and the
/// distance is `Σ |1/m_a - 1/m_b|` over the invariants present in both
/// shapes. Identical shapes at any scale, position or rotation give 0.
pub fn match_shapes(a: &Contour, b: &Contour) -> f64 {
    let ha = hu_moments(&a.moments());
    let hb = hu_moments(&b.moments());

    ha.iter()
        .zip(hb.iter())
        .filter(|(x, y)| x.abs() > HU_EPSILON && y.abs() > HU_EPSILON)
        .map(|(x, y)| {
            let ma = x.signum() * x.abs().log10();
            let mb = y.signum() * y.abs().log10();
            (1.0 / ma - 1.0 / mb).abs()
        })
        .sum()
}

/// Similarity as a percentage in `[0, 100]`, `100 * (1 - distance)` clamped.
pub fn similarity_percent(a: &Contour, b: &Contour) -> f64 {
    100.0 * (1.0 - match_shapes(a, b)).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra::Vector2;

    fn make_l_shape(scale: f64) -> Contour {
        let pts = [
            [0.0, 0.0],
            [60.0, 0.0],
            [60.0, 20.0],
            [20.0, 20.0],
            [20.0, 80.0],
            [0.0, 80.0],
        ];
        Contour::from_xy(&pts.map(|p| [p[0] * scale, p[1] * scale]))
    }

    #[test]
    fn test_identical_shapes_score_full() {
        let a = make_l_shape(1.0);
        assert_abs_diff_eq!(match_shapes(&a, &a), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(similarity_percent(&a, &a), 100.0, epsilon = 1e-9);
    }

    #[test]
    fn test_invariant_to_similarity_transform() {
        let a = make_l_shape(1.0);
        let mut b = make_l_shape(2.5);
        let pivot = b.centroid();
        b.rotate_about(pivot, 33.0);
        b.translate(Vector2::new(400.0, -120.0));

        assert!(similarity_percent(&a, &b) > 99.0);
    }

    #[test]
    fn test_different_shapes_score_lower() {
        let l = make_l_shape(1.0);
        let rect = Contour::from_xy(&[[0.0, 0.0], [100.0, 0.0], [100.0, 40.0], [0.0, 40.0]]);
        assert!(similarity_percent(&l, &rect) < similarity_percent(&l, &l));
    }
}
