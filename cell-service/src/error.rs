use calibration::{CalibrationError, StorageError};
use hardware::{ActuatorError, ModbusError, RobotError};
use motion::MotionError;
use shared::vision::VisionError;
use thiserror::Error;
use workpiece::WorkpieceError;

use crate::SettingsError;

/// Failure of one request. Every variant aborts only the request that
/// raised it.
#[derive(Error, Debug)]
pub enum CellError {
    /// Missing or invalid input: no contour, no match, unknown gripper
    #[error("validation error: {0}")]
    Validation(String),

    /// Bus or robot link failure after the transport's own retries
    #[error("hardware communication error: {0}")]
    HardwareCommunication(String),

    /// Robot rejected a command or the path executor faulted
    #[error("motion error: {0}")]
    Motion(String),

    #[error("calibration error: {0}")]
    Calibration(#[from] CalibrationError),

    /// A required calibration artifact is missing
    #[error("system is not calibrated: {0}")]
    Uncalibrated(&'static str),

    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),
}

impl From<WorkpieceError> for CellError {
    fn from(e: WorkpieceError) -> Self {
        CellError::Validation(e.to_string())
    }
}

impl From<ActuatorError> for CellError {
    fn from(e: ActuatorError) -> Self {
        match e {
            ActuatorError::Bus(_) => CellError::HardwareCommunication(e.to_string()),
            other => CellError::Validation(other.to_string()),
        }
    }
}

impl From<ModbusError> for CellError {
    fn from(e: ModbusError) -> Self {
        CellError::HardwareCommunication(e.to_string())
    }
}

impl From<RobotError> for CellError {
    fn from(e: RobotError) -> Self {
        match e {
            RobotError::Communication(_) => CellError::HardwareCommunication(e.to_string()),
            RobotError::Rejected { .. } => CellError::Motion(e.to_string()),
        }
    }
}

impl From<MotionError> for CellError {
    fn from(e: MotionError) -> Self {
        match e {
            MotionError::Tool(inner) => inner.into(),
            MotionError::Path(inner) => inner.into(),
            MotionError::UnknownGripper(_) | MotionError::PlaneFull { .. } => {
                CellError::Validation(e.to_string())
            }
            other => CellError::Motion(other.to_string()),
        }
    }
}

impl From<VisionError> for CellError {
    fn from(e: VisionError) -> Self {
        CellError::HardwareCommunication(e.to_string())
    }
}

impl From<StorageError> for CellError {
    fn from(e: StorageError) -> Self {
        CellError::Calibration(CalibrationError::Storage(e))
    }
}
