use serde::{Deserialize, Serialize};

/// Tool pose: position in millimetres, orientation as Euler angles in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose6 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub rx: f64,
    pub ry: f64,
    pub rz: f64,
}

impl Pose6 {
    pub fn new(x: f64, y: f64, z: f64, rx: f64, ry: f64, rz: f64) -> Self {
        Self {
            x,
            y,
            z,
            rx,
            ry,
            rz,
        }
    }

    /// Pure translation offset, used for relative moves.
    pub fn translation(dx: f64, dy: f64, dz: f64) -> Self {
        Self::new(dx, dy, dz, 0.0, 0.0, 0.0)
    }

    /// Euclidean distance between positions, ignoring orientation.
    pub fn distance_to(&self, other: &Pose6) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2) + (self.z - other.z).powi(2))
            .sqrt()
    }

    /// Component-wise sum.
    pub fn offset_by(&self, delta: &Pose6) -> Pose6 {
        Pose6::new(
            self.x + delta.x,
            self.y + delta.y,
            self.z + delta.z,
            self.rx + delta.rx,
            self.ry + delta.ry,
            self.rz + delta.rz,
        )
    }

    pub fn as_array(&self) -> [f64; 6] {
        [self.x, self.y, self.z, self.rx, self.ry, self.rz]
    }
}

/// Per-move motion parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionParams {
    /// Velocity in percent of the robot maximum
    pub velocity: f64,
    /// Acceleration in percent of the robot maximum
    pub acceleration: f64,
    /// Tool frame id
    pub tool: u8,
    /// User (work object) frame id
    pub user: u8,
    /// Blend radius for chained linear moves, in millimetres
    pub blend_radius: f64,
}

impl Default for MotionParams {
    fn default() -> Self {
        Self {
            velocity: 30.0,
            acceleration: 30.0,
            tool: 0,
            user: 0,
            blend_radius: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_distance_ignores_orientation() {
        let a = Pose6::new(0.0, 0.0, 0.0, 180.0, 0.0, 0.0);
        let b = Pose6::new(3.0, 4.0, 0.0, 0.0, 0.0, 90.0);
        assert_abs_diff_eq!(a.distance_to(&b), 5.0, epsilon = 1e-12);
    }

    #[test]
    fn test_offset_by_translation() {
        let p = Pose6::new(1.0, 2.0, 3.0, 180.0, 0.0, 45.0);
        let q = p.offset_by(&Pose6::translation(0.5, -1.0, 10.0));
        assert_eq!(q, Pose6::new(1.5, 1.0, 13.0, 180.0, 0.0, 45.0));
    }
}
