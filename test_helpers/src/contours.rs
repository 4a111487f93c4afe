//! Synthetic contour builders.

use nalgebra::{Point2, Vector2};
use shared::contour::Contour;

/// Axis-aligned `w` x `h` rectangle centered on `center`.
pub fn rectangle(w: f64, h: f64, center: Point2<f64>) -> Contour {
    let (hw, hh) = (w / 2.0, h / 2.0);
    Contour::from_xy(&[
        [center.x - hw, center.y - hh],
        [center.x + hw, center.y - hh],
        [center.x + hw, center.y + hh],
        [center.x - hw, center.y + hh],
    ])
}

/// L-shaped outline with its corner at `origin`, arms `scale` * (60, 80).
pub fn l_shape(scale: f64, origin: Point2<f64>) -> Contour {
    let pts = [
        [0.0, 0.0],
        [60.0, 0.0],
        [60.0, 20.0],
        [20.0, 20.0],
        [20.0, 80.0],
        [0.0, 80.0],
    ];
    Contour::from_xy(&pts.map(|p| [origin.x + p[0] * scale, origin.y + p[1] * scale]))
}

/// Copy of `contour` rotated by `angle_deg` about its centroid, then shifted.
pub fn transformed(contour: &Contour, angle_deg: f64, translation: Vector2<f64>) -> Contour {
    let mut out = contour.clone();
    let pivot = out.centroid();
    out.rotate_about(pivot, angle_deg);
    out.translate(translation);
    out
}

/// Insert `per_edge - 1` evenly spaced points on every edge of a closed contour.
pub fn resample(contour: &Contour, per_edge: usize) -> Contour {
    let pts = contour.points();
    let n = pts.len();
    let mut out = Vec::with_capacity(n * per_edge.max(1));
    for i in 0..n {
        let (a, b) = (pts[i], pts[(i + 1) % n]);
        for k in 0..per_edge.max(1) {
            let t = k as f64 / per_edge.max(1) as f64;
            out.push(a + (b - a) * t);
        }
    }
    Contour::new(out)
}
