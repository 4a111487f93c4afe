use std::time::Duration;

use hardware::{ActuatorError, RobotError};
use thiserror::Error;
use workpiece::WorkpieceError;

use crate::MotionState;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MotionError {
    /// The arm rejected a command
    #[error("robot command failed in {state:?}: {source}")]
    Robot {
        state: MotionState,
        #[source]
        source: RobotError,
    },

    /// The arm did not settle within the allowed time
    #[error("robot not stationary at target within {timeout:?}")]
    StationaryTimeout { timeout: Duration },

    /// Stop was requested while executing
    #[error("motion aborted by stop request")]
    Aborted,

    #[error("tool actuation failed: {0}")]
    Tool(#[from] ActuatorError),

    #[error("path error: {0}")]
    Path(#[from] WorkpieceError),

    /// No room left on the work plane
    #[error("work plane full: cannot place {width:.1} x {depth:.1} mm item")]
    PlaneFull { width: f64, depth: f64 },

    #[error("unknown gripper id {0}")]
    UnknownGripper(u32),

    /// Dropping a gripper into a slot that already holds one
    #[error("tool changer slot for gripper {0} is occupied")]
    SlotOccupied(u32),

    /// Picking a gripper whose slot is empty
    #[error("tool changer slot for gripper {0} is empty")]
    SlotEmpty(u32),
}
