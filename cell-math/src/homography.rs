//! Plane-to-plane homography between camera pixels and robot millimetres.
//!
//! Provides:
//! - Direct Linear Transform (DLT) estimation with Hartley normalization.
//! - Perspective-correct point mapping in both directions.
//! - Reprojection error and local scale queries.
//!
//! A [`Homography`] is validated to be invertible on construction and on
//! deserialization, so mapping in either direction is infallible afterwards.

use nalgebra::{DMatrix, Matrix2, Matrix3, Point2, Vector3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Threshold below which a homography determinant counts as singular.
const SINGULAR_EPSILON: f64 = 1e-12;

/// Homogeneous coordinate magnitude treated as a point at infinity.
const W_EPSILON: f64 = 1e-15;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum HomographyError {
    #[error("too few points: need {needed}, got {got}")]
    TooFewPoints { needed: usize, got: usize },

    #[error("source has {src} points but destination has {dst}")]
    LengthMismatch { src: usize, dst: usize },

    #[error("homography is not invertible: determinant={determinant:.6e}")]
    Singular { determinant: f64 },

    #[error("numerical failure: {0}")]
    NumericalFailure(String),
}

/// Project a 2D point through a 3x3 matrix: H * [x, y, 1]^T -> [u, v].
///
/// Returns NaN coordinates for points mapped to infinity.
fn project(h: &Matrix3<f64>, x: f64, y: f64) -> [f64; 2] {
    let p = h * Vector3::new(x, y, 1.0);
    if p[2].abs() < W_EPSILON {
        return [f64::NAN, f64::NAN];
    }
    [p[0] / p[2], p[1] / p[2]]
}

/// Invertible 3x3 projective transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "HomographyRepr", into = "HomographyRepr")]
pub struct Homography {
    matrix: Matrix3<f64>,
}

/// Row-major on-disk representation.
#[derive(Serialize, Deserialize)]
struct HomographyRepr {
    rows: [[f64; 3]; 3],
}

impl TryFrom<HomographyRepr> for Homography {
    type Error = HomographyError;

    fn try_from(repr: HomographyRepr) -> Result<Self, Self::Error> {
        let r = repr.rows;
        Homography::new(Matrix3::new(
            r[0][0], r[0][1], r[0][2], r[1][0], r[1][1], r[1][2], r[2][0], r[2][1], r[2][2],
        ))
    }
}

impl From<Homography> for HomographyRepr {
    fn from(h: Homography) -> Self {
        let m = h.matrix;
        HomographyRepr {
            rows: [
                [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
                [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
                [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
            ],
        }
    }
}

impl Homography {
    /// Wrap a matrix, rejecting singular ones.
    pub fn new(matrix: Matrix3<f64>) -> Result<Self, HomographyError> {
        let determinant = matrix.determinant();
        if !determinant.is_finite() || determinant.abs() < SINGULAR_EPSILON {
            return Err(HomographyError::Singular { determinant });
        }
        Ok(Self { matrix })
    }

    pub fn identity() -> Self {
        Self {
            matrix: Matrix3::identity(),
        }
    }

    /// Estimate the homography mapping `src` onto `dst` from at least four
    /// correspondences.
    ///
    /// The solution is the eigenvector of the smallest eigenvalue of AᵀA,
    /// computed on Hartley-normalized coordinates and denormalized afterwards.
    pub fn estimate(src: &[[f64; 2]], dst: &[[f64; 2]]) -> Result<Self, HomographyError> {
        if src.len() != dst.len() {
            return Err(HomographyError::LengthMismatch {
                src: src.len(),
                dst: dst.len(),
            });
        }
        let n = src.len();
        if n < 4 {
            return Err(HomographyError::TooFewPoints { needed: 4, got: n });
        }

        let (t_src, src_n) = normalize_points(src);
        let (t_dst, dst_n) = normalize_points(dst);

        let mut a = DMatrix::zeros(2 * n, 9);
        for i in 0..n {
            let (sx, sy) = (src_n[i][0], src_n[i][1]);
            let (dx, dy) = (dst_n[i][0], dst_n[i][1]);

            a[(2 * i, 3)] = -sx;
            a[(2 * i, 4)] = -sy;
            a[(2 * i, 5)] = -1.0;
            a[(2 * i, 6)] = dy * sx;
            a[(2 * i, 7)] = dy * sy;
            a[(2 * i, 8)] = dy;

            a[(2 * i + 1, 0)] = sx;
            a[(2 * i + 1, 1)] = sy;
            a[(2 * i + 1, 2)] = 1.0;
            a[(2 * i + 1, 6)] = -dx * sx;
            a[(2 * i + 1, 7)] = -dx * sy;
            a[(2 * i + 1, 8)] = -dx;
        }

        let ata = a.transpose() * &a;
        let eig = nalgebra::SymmetricEigen::new(ata);

        let min_idx = eig
            .eigenvalues
            .iter()
            .enumerate()
            .min_by(|(_, x), (_, y)| x.abs().total_cmp(&y.abs()))
            .map(|(i, _)| i)
            .ok_or_else(|| HomographyError::NumericalFailure("empty eigen system".into()))?;

        let h = |j: usize| eig.eigenvectors[(j, min_idx)];
        #[rustfmt::skip]
        let h_norm = Matrix3::new(
            h(0), h(1), h(2),
            h(3), h(4), h(5),
            h(6), h(7), h(8),
        );

        let t_dst_inv = t_dst
            .try_inverse()
            .ok_or_else(|| HomographyError::NumericalFailure("T_dst not invertible".into()))?;
        let mut matrix = t_dst_inv * h_norm * t_src;

        let scale = matrix[(2, 2)];
        if scale.abs() > W_EPSILON {
            matrix /= scale;
        }

        Self::new(matrix)
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.matrix
    }

    /// The inverse mapping.
    pub fn inverse(&self) -> Homography {
        // Invertibility is checked in `new`, the only constructor.
        let matrix = self
            .matrix
            .try_inverse()
            .expect("homography validated as invertible on construction");
        Homography { matrix }
    }

    /// Map a point set.
    pub fn apply(&self, points: &[[f64; 2]]) -> Vec<[f64; 2]> {
        points
            .iter()
            .map(|p| project(&self.matrix, p[0], p[1]))
            .collect()
    }

    /// Map a single point.
    pub fn apply_point(&self, p: Point2<f64>) -> Point2<f64> {
        let [x, y] = project(&self.matrix, p.x, p.y);
        Point2::new(x, y)
    }

    /// Root-mean-square distance between mapped `src` and `dst`.
    pub fn rms_error(&self, src: &[[f64; 2]], dst: &[[f64; 2]]) -> f64 {
        if src.is_empty() {
            return 0.0;
        }
        let sum_sq: f64 = src
            .iter()
            .zip(dst)
            .map(|(s, d)| {
                let p = project(&self.matrix, s[0], s[1]);
                (p[0] - d[0]).powi(2) + (p[1] - d[1]).powi(2)
            })
            .sum();
        (sum_sq / src.len() as f64).sqrt()
    }

    /// Jacobian of the mapping at `p`.
    pub fn jacobian(&self, p: Point2<f64>) -> Matrix2<f64> {
        let m = &self.matrix;
        let u = m[(0, 0)] * p.x + m[(0, 1)] * p.y + m[(0, 2)];
        let v = m[(1, 0)] * p.x + m[(1, 1)] * p.y + m[(1, 2)];
        let w = m[(2, 0)] * p.x + m[(2, 1)] * p.y + m[(2, 2)];
        let w2 = w * w;
        Matrix2::new(
            (m[(0, 0)] * w - u * m[(2, 0)]) / w2,
            (m[(0, 1)] * w - u * m[(2, 1)]) / w2,
            (m[(1, 0)] * w - v * m[(2, 0)]) / w2,
            (m[(1, 1)] * w - v * m[(2, 1)]) / w2,
        )
    }

    /// Isotropic scale of the mapping around `p` (output units per input unit).
    pub fn local_scale(&self, p: Point2<f64>) -> f64 {
        self.jacobian(p).determinant().abs().sqrt()
    }
}

/// Translate centroid to origin and scale so the mean distance is sqrt(2).
fn normalize_points(pts: &[[f64; 2]]) -> (Matrix3<f64>, Vec<[f64; 2]>) {
    let n = pts.len() as f64;
    let cx: f64 = pts.iter().map(|p| p[0]).sum::<f64>() / n;
    let cy: f64 = pts.iter().map(|p| p[1]).sum::<f64>() / n;

    let mean_dist: f64 = pts
        .iter()
        .map(|p| ((p[0] - cx).powi(2) + (p[1] - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;

    let s = if mean_dist > W_EPSILON {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };

    let t = Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0);
    let normalized = pts
        .iter()
        .map(|p| [s * (p[0] - cx), s * (p[1] - cy)])
        .collect();

    (t, normalized)
}
