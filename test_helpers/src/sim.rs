//! Simulated eye-in-hand camera over a planar work area.
//!
//! The camera rides on the robot flange, looking straight down, offset from
//! the tool point by `camera_offset_mm`. A world point `W` seen from robot
//! position `P` lands at pixel
//!
//! ```text
//! px = C + ppm(z) * A⁻¹ * (W - (P + camera_offset))
//! ```
//!
//! where `C` is the image center and `A` maps image axes onto robot axes.
//! `ppm(z)` scales inversely with the camera height above the work plane.

use std::sync::Arc;

use nalgebra::{Matrix2, Point2, Vector2};
use ndarray::Array2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use hardware::robot::{MockRobot, Pose6, PoseSource};
use shared::chessboard::ChessboardPattern;
use shared::contour::Contour;
use shared::vision::{MarkerDetection, VisionError, VisionFrame, VisionSource};

/// Marker edge length in millimetres.
const MARKER_SIZE_MM: f64 = 10.0;

/// Static description of the simulated cell
#[derive(Debug, Clone)]
pub struct SimWorld {
    /// Image width and height in pixels
    pub image_size: (usize, usize),
    /// Pixels per millimetre at `reference_height_mm`
    pub ppm: f64,
    /// Camera height above the work plane at which `ppm` holds
    pub reference_height_mm: f64,
    /// Work plane z in robot coordinates
    pub plane_z_mm: f64,
    /// Image axes to robot axes (orthonormal)
    pub image_to_robot: Matrix2<f64>,
    /// Camera optical center relative to the tool point, robot xy
    pub camera_offset_mm: Vector2<f64>,
    /// Fiducials: id and world position of the marker center
    pub markers: Vec<(u32, Point2<f64>)>,
    /// Chessboard: pattern and world position of the first inner corner
    pub chessboard: Option<(ChessboardPattern, Point2<f64>)>,
    /// Workpiece outlines in world millimetres
    pub workpieces: Vec<Contour>,
    /// Pose the robot starts at (calibration pose)
    pub home: Pose6,
}

impl SimWorld {
    /// A 3x3 marker grid and a 25 mm chessboard around (300, 0).
    pub fn calibration_cell() -> Self {
        let center = Point2::new(300.0, 0.0);
        let mut markers = Vec::new();
        for r in 0..3 {
            for c in 0..3 {
                let id = (r * 3 + c) as u32;
                markers.push((
                    id,
                    Point2::new(
                        center.x + (c as f64 - 1.0) * 60.0,
                        center.y + (r as f64 - 1.0) * 45.0,
                    ),
                ));
            }
        }
        let pattern = ChessboardPattern {
            cols: 5,
            rows: 4,
            square_size_mm: 25.0,
        };
        let plane_z_mm = 0.0;
        let reference_height_mm = 300.0;
        Self {
            image_size: (640, 480),
            ppm: 2.0,
            reference_height_mm,
            plane_z_mm,
            // Image x to robot -y, image y to robot -x (camera rotated on the flange)
            image_to_robot: Matrix2::new(0.0, -1.0, -1.0, 0.0),
            camera_offset_mm: Vector2::new(0.0, 0.0),
            markers,
            chessboard: Some((pattern, Point2::new(center.x - 20.0, center.y - 50.0))),
            workpieces: Vec::new(),
            home: Pose6::new(center.x, center.y, plane_z_mm + reference_height_mm, 180.0, 0.0, 0.0),
        }
    }

    /// Pixels per millimetre with the camera at robot height `z`.
    pub fn ppm_at(&self, z: f64) -> f64 {
        self.ppm * self.reference_height_mm / (z - self.plane_z_mm)
    }

    pub fn image_center(&self) -> Point2<f64> {
        Point2::new(
            self.image_size.0 as f64 / 2.0,
            self.image_size.1 as f64 / 2.0,
        )
    }

    /// Pixel of world point `w` seen from robot pose `pose`.
    pub fn project(&self, w: Point2<f64>, pose: &Pose6) -> Point2<f64> {
        let robot_to_image = self
            .image_to_robot
            .try_inverse()
            .unwrap_or_else(Matrix2::identity);
        let camera = Vector2::new(pose.x, pose.y) + self.camera_offset_mm;
        let rel = w.coords - camera;
        self.image_center() + robot_to_image * rel * self.ppm_at(pose.z)
    }

    fn in_view(&self, p: &Point2<f64>) -> bool {
        p.x >= 0.0
            && p.y >= 0.0
            && p.x < self.image_size.0 as f64
            && p.y < self.image_size.1 as f64
    }
}

/// [`VisionSource`] rendering a [`SimWorld`] from the mock robot's pose.
pub struct SimCamera {
    world: SimWorld,
    robot: Arc<MockRobot>,
    frame_number: u64,
    rng: ChaCha8Rng,
    pixel_noise: f64,
    hidden_markers: Vec<u32>,
    drop_marker_frames: Vec<(u32, usize)>,
}

impl SimCamera {
    pub fn new(world: SimWorld, robot: Arc<MockRobot>) -> Self {
        Self {
            world,
            robot,
            frame_number: 0,
            rng: ChaCha8Rng::seed_from_u64(42),
            pixel_noise: 0.0,
            hidden_markers: Vec::new(),
            drop_marker_frames: Vec::new(),
        }
    }

    /// Add uniform noise of +/- `amplitude` pixels to every detection.
    pub fn with_pixel_noise(mut self, amplitude: f64, seed: u64) -> Self {
        self.pixel_noise = amplitude;
        self.rng = ChaCha8Rng::seed_from_u64(seed);
        self
    }

    /// Never report marker `id`.
    pub fn hide_marker(mut self, id: u32) -> Self {
        self.hidden_markers.push(id);
        self
    }

    /// Miss marker `id` in the next `frames` frames where it would be visible.
    pub fn drop_marker(mut self, id: u32, frames: usize) -> Self {
        self.drop_marker_frames.push((id, frames));
        self
    }

    pub fn world(&self) -> &SimWorld {
        &self.world
    }

    fn noisy(&mut self, p: Point2<f64>) -> Point2<f64> {
        if self.pixel_noise == 0.0 {
            return p;
        }
        let a = self.pixel_noise;
        Point2::new(
            p.x + self.rng.gen_range(-a..=a),
            p.y + self.rng.gen_range(-a..=a),
        )
    }

    fn marker_dropped(&mut self, id: u32) -> bool {
        for (m, remaining) in self.drop_marker_frames.iter_mut() {
            if *m == id && *remaining > 0 {
                *remaining -= 1;
                return true;
            }
        }
        false
    }
}

impl VisionSource for SimCamera {
    fn capture(&mut self) -> Result<VisionFrame, VisionError> {
        let pose = self
            .robot
            .read_pose()
            .map_err(|e| VisionError::Capture(e.to_string()))?;
        self.frame_number += 1;

        let ppm = self.world.ppm_at(pose.z);
        let half = MARKER_SIZE_MM / 2.0 * ppm;

        let mut markers = Vec::new();
        let world_markers = self.world.markers.clone();
        for (id, w) in world_markers {
            if self.hidden_markers.contains(&id) {
                continue;
            }
            let center = self.world.project(w, &pose);
            if !self.world.in_view(&center) || self.marker_dropped(id) {
                continue;
            }
            let c = self.noisy(center);
            markers.push(MarkerDetection {
                id,
                corners: [
                    Point2::new(c.x - half, c.y - half),
                    Point2::new(c.x + half, c.y - half),
                    Point2::new(c.x + half, c.y + half),
                    Point2::new(c.x - half, c.y + half),
                ],
            });
        }

        let chessboard_corners = match self.world.chessboard.clone() {
            Some((pattern, origin)) => {
                let mut corners = Vec::with_capacity(pattern.corner_count());
                for r in 0..pattern.rows {
                    for c in 0..pattern.cols {
                        let w = Point2::new(
                            origin.x + c as f64 * pattern.square_size_mm,
                            origin.y + r as f64 * pattern.square_size_mm,
                        );
                        corners.push(self.world.project(w, &pose));
                    }
                }
                if corners.iter().all(|p| self.world.in_view(p)) {
                    Some(corners.into_iter().map(|p| self.noisy(p)).collect())
                } else {
                    None
                }
            }
            None => None,
        };

        let contours = self
            .world
            .workpieces
            .iter()
            .map(|outline| {
                Contour::new(
                    outline
                        .points()
                        .iter()
                        .map(|p| self.world.project(*p, &pose))
                        .collect(),
                )
            })
            .collect();

        let (w, h) = self.world.image_size;
        Ok(VisionFrame {
            frame_number: self.frame_number,
            image: Array2::zeros((h, w)),
            contours,
            markers,
            chessboard_corners,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_home_sees_all_markers_and_board() {
        let world = SimWorld::calibration_cell();
        let robot = Arc::new(MockRobot::new(world.home));
        let mut camera = SimCamera::new(world, robot);

        let frame = camera.capture().unwrap();
        assert_eq!(frame.markers.len(), 9);
        assert!(frame.chessboard_corners.is_some());
    }

    #[test]
    fn test_marker_under_camera_is_centered() {
        let world = SimWorld::calibration_cell();
        let (_, w) = world.markers[4];
        let pose = Pose6::new(w.x, w.y, world.home.z, 180.0, 0.0, 0.0);
        let px = world.project(w, &pose);
        let c = world.image_center();
        assert!((px - c).norm() < 1e-9);
    }
}
