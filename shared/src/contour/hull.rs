//! Convex hull and convexity defects of a contour.

use nalgebra::Point2;

/// Minimum depth for a concavity to be reported as a defect.
const MIN_DEFECT_DEPTH: f64 = 1e-9;

/// A region of a contour lying strictly inside one hull edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvexityDefect {
    /// Contour index where the hull edge starts
    pub start: usize,
    /// Contour index where the hull edge ends
    pub end: usize,
    /// Contour index of the point farthest from the hull edge
    pub farthest: usize,
    /// Distance of `farthest` from the hull edge
    pub depth: f64,
}

fn cross(o: Point2<f64>, a: Point2<f64>, b: Point2<f64>) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// Indices of the convex hull vertices (monotone chain), counter-clockwise.
///
/// Collinear points on hull edges are excluded.
pub fn convex_hull_indices(points: &[Point2<f64>]) -> Vec<usize> {
    let n = points.len();
    if n < 3 {
        return (0..n).collect();
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        points[a]
            .x
            .total_cmp(&points[b].x)
            .then(points[a].y.total_cmp(&points[b].y))
    });

    let mut hull: Vec<usize> = Vec::with_capacity(2 * n);
    for &i in &order {
        while hull.len() >= 2
            && cross(points[hull[hull.len() - 2]], points[hull[hull.len() - 1]], points[i]) <= 0.0
        {
            hull.pop();
        }
        hull.push(i);
    }
    let lower_len = hull.len() + 1;
    for &i in order.iter().rev().skip(1) {
        while hull.len() >= lower_len
            && cross(points[hull[hull.len() - 2]], points[hull[hull.len() - 1]], points[i]) <= 0.0
        {
            hull.pop();
        }
        hull.push(i);
    }
    hull.pop();
    hull
}

fn distance_to_line(p: Point2<f64>, a: Point2<f64>, b: Point2<f64>) -> f64 {
    let ab = b - a;
    let len = ab.norm();
    if len < f64::EPSILON {
        return (p - a).norm();
    }
    cross(a, b, p).abs() / len
}

/// Convexity defects of a simple polygon.
///
/// Hull vertices are visited in contour order; for each pair of consecutive
/// hull vertices the contour points between them are scanned for the one
/// farthest from the connecting hull edge.
pub fn convexity_defects(points: &[Point2<f64>]) -> Vec<ConvexityDefect> {
    let n = points.len();
    let mut hull = convex_hull_indices(points);
    if hull.len() < 3 {
        return Vec::new();
    }
    hull.sort_unstable();

    let mut defects = Vec::new();
    for k in 0..hull.len() {
        let start = hull[k];
        let end = hull[(k + 1) % hull.len()];
        let span = (end + n - start) % n;
        if span < 2 {
            continue;
        }

        let (a, b) = (points[start], points[end]);
        let deepest = (1..span)
            .map(|offset| (start + offset) % n)
            .map(|idx| (idx, distance_to_line(points[idx], a, b)))
            .max_by(|x, y| x.1.total_cmp(&y.1));

        if let Some((farthest, depth)) = deepest {
            if depth > MIN_DEFECT_DEPTH {
                defects.push(ConvexityDefect {
                    start,
                    end,
                    farthest,
                    depth,
                });
            }
        }
    }
    defects
}
