//! Robot arm interface
//!
//! The arm vendor SDK is an external collaborator. [`RobotInterface`] is the
//! seam the motion and calibration layers drive; implementations translate
//! the SDK's integer return codes into [`RobotError`].

mod mock;
mod pose;

use thiserror::Error;

pub use mock::{MockRobot, RobotCommand};
pub use pose::{MotionParams, Pose6};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RobotError {
    /// SDK returned a nonzero result code
    #[error("robot rejected {command} with code {code}")]
    Rejected { command: &'static str, code: i32 },

    /// Controller link failure
    #[error("robot communication error: {0}")]
    Communication(String),
}

/// Map an SDK return code to a result; zero means success.
pub fn check_code(command: &'static str, code: i32) -> Result<(), RobotError> {
    if code == 0 {
        Ok(())
    } else {
        Err(RobotError::Rejected { command, code })
    }
}

/// Source of the current tool pose.
pub trait PoseSource: Send + Sync {
    fn read_pose(&self) -> Result<Pose6, RobotError>;
}

/// Motion command surface of the arm.
///
/// Methods take `&self`: the SDK handle is shared between the control thread
/// (the only writer) and the kinematic sampler (read-only).
pub trait RobotInterface: PoseSource {
    /// Point-to-point move to an absolute pose.
    fn move_to(&self, target: &Pose6, params: &MotionParams) -> Result<(), RobotError>;

    /// Linear (Cartesian) move, blended with the next one by `params.blend_radius`.
    fn move_linear(&self, target: &Pose6, params: &MotionParams) -> Result<(), RobotError>;

    /// Linear move by an offset from the current pose.
    fn move_relative(&self, delta: &Pose6, params: &MotionParams) -> Result<(), RobotError>;

    /// Abort the current motion.
    fn stop(&self) -> Result<(), RobotError>;
}
