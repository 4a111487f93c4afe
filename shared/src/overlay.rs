//! Debug-image annotation.
//!
//! Minimal raster drawing on 8-bit grayscale frames, used to mark detected
//! fiducials and the image center on calibration failure images.

use nalgebra::Point2;
use ndarray::Array2;

/// Set a pixel if it lies inside the image.
fn put(image: &mut Array2<u8>, x: i64, y: i64, value: u8) {
    let (rows, cols) = image.dim();
    if x >= 0 && y >= 0 && (x as usize) < cols && (y as usize) < rows {
        image[[y as usize, x as usize]] = value;
    }
}

/// Draw an axis-aligned cross of half-length `half` centered on `center`.
pub fn draw_cross(image: &mut Array2<u8>, center: Point2<f64>, half: i64, value: u8) {
    let (cx, cy) = (center.x.round() as i64, center.y.round() as i64);
    for d in -half..=half {
        put(image, cx + d, cy, value);
        put(image, cx, cy + d, value);
    }
}

/// Draw a straight segment with Bresenham's algorithm.
pub fn draw_line(image: &mut Array2<u8>, a: Point2<f64>, b: Point2<f64>, value: u8) {
    let (mut x0, mut y0) = (a.x.round() as i64, a.y.round() as i64);
    let (x1, y1) = (b.x.round() as i64, b.y.round() as i64);
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        put(image, x0, y0, value);
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

/// Draw a closed polygon outline.
pub fn draw_polygon(image: &mut Array2<u8>, points: &[Point2<f64>], value: u8) {
    for (i, a) in points.iter().enumerate() {
        let b = points[(i + 1) % points.len()];
        draw_line(image, *a, b, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cross_is_clipped_at_border() {
        let mut img = Array2::zeros((5, 5));
        draw_cross(&mut img, Point2::new(0.0, 0.0), 2, 255);
        assert_eq!(img[[0, 0]], 255);
        assert_eq!(img[[0, 2]], 255);
        assert_eq!(img[[2, 0]], 255);
        assert_eq!(img.iter().filter(|&&v| v == 255).count(), 5);
    }

    #[test]
    fn test_line_endpoints() {
        let mut img = Array2::zeros((10, 10));
        draw_line(&mut img, Point2::new(1.0, 1.0), Point2::new(8.0, 4.0), 9);
        assert_eq!(img[[1, 1]], 9);
        assert_eq!(img[[4, 8]], 9);
    }

    #[test]
    fn test_polygon_closes() {
        let mut img = Array2::zeros((10, 10));
        let square = [
            Point2::new(2.0, 2.0),
            Point2::new(6.0, 2.0),
            Point2::new(6.0, 6.0),
            Point2::new(2.0, 6.0),
        ];
        draw_polygon(&mut img, &square, 1);
        assert_eq!(img[[4, 2]], 1);
        assert_eq!(img[[4, 4]], 0);
    }
}
