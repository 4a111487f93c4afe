use cell_math::HomographyError;
use hardware::RobotError;
use motion::MotionError;
use shared::chessboard::ChessboardError;
use shared::vision::VisionError;
use thiserror::Error;

use crate::StorageError;

#[derive(Error, Debug)]
pub enum CalibrationError {
    #[error("chessboard not found in {frames} frames")]
    ChessboardNotFound { frames: usize },

    #[error("chessboard error: {0}")]
    Chessboard(#[from] ChessboardError),

    #[error("missing markers {missing:?} after {frames} frames")]
    MissingMarkers { missing: Vec<u32>, frames: usize },

    #[error("marker {id} lost after robot move ({retries} re-detections)")]
    MarkerLost { id: u32, retries: usize },

    #[error("marker {id} still {residual_px:.2} px off center after {iterations} servo iterations")]
    ServoDidNotConverge {
        id: u32,
        iterations: usize,
        residual_px: f64,
    },

    #[error("need {needed} chessboard images, collected {got}")]
    NotEnoughImages { needed: usize, got: usize },

    #[error("homography: {0}")]
    Homography(#[from] HomographyError),

    #[error("robot: {0}")]
    Robot(#[from] RobotError),

    #[error("motion: {0}")]
    Motion(#[from] MotionError),

    #[error("vision: {0}")]
    Vision(#[from] VisionError),

    #[error("storage: {0}")]
    Storage(#[from] StorageError),

    #[error("invalid calibration configuration: {0}")]
    InvalidConfig(String),
}
