//! Angle wrapping.

/// Wrap an angle in degrees into the half-open range `[-180, 180)`.
pub fn normalize_angle_deg(angle: f64) -> f64 {
    let wrapped = (angle + 180.0).rem_euclid(360.0) - 180.0;
    // rem_euclid rounds up to the modulus for tiny negative remainders
    if wrapped >= 180.0 {
        -180.0
    } else {
        wrapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_wraps_into_half_open_range() {
        assert_abs_diff_eq!(normalize_angle_deg(180.0), -180.0, epsilon = 1e-12);
        assert_abs_diff_eq!(normalize_angle_deg(-180.0), -180.0, epsilon = 1e-12);
        assert_abs_diff_eq!(normalize_angle_deg(190.0), -170.0, epsilon = 1e-12);
        assert_abs_diff_eq!(normalize_angle_deg(-190.0), 170.0, epsilon = 1e-12);
        assert_abs_diff_eq!(normalize_angle_deg(725.0), 5.0, epsilon = 1e-9);
        assert_abs_diff_eq!(normalize_angle_deg(12.0), 12.0, epsilon = 1e-12);
    }

    #[test]
    fn test_just_below_minus_180_stays_in_range() {
        for a in [-1.8000000000000003e2, -180.0 - f64::EPSILON * 256.0, -540.0000000000001] {
            let n = normalize_angle_deg(a);
            assert!((-180.0..180.0).contains(&n), "{a:e} -> {n}");
        }
    }

    #[test]
    fn test_range_holds_for_sweep() {
        let mut a = -1000.0;
        while a < 1000.0 {
            let n = normalize_angle_deg(a);
            assert!((-180.0..180.0).contains(&n), "{a} -> {n}");
            a += 7.3;
        }
    }
}
