//! Structured request results

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use shared::contour::Contour;
use tracing::{info, warn};

use crate::CellError;

/// Outcome of a request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellResponse {
    pub success: bool,
    pub message: String,
}

impl CellResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn error(error: &CellError) -> Self {
        Self {
            success: false,
            message: error.to_string(),
        }
    }

    /// Log and convert the result of `operation`.
    pub fn from_result(operation: &str, result: Result<String, CellError>) -> Self {
        match result {
            Ok(message) => {
                info!("{operation}: {message}");
                Self::ok(message)
            }
            Err(e) => {
                warn!("{operation} failed: {e}");
                Self::error(&e)
            }
        }
    }
}

/// Measurement of a new workpiece placed under the camera
#[derive(Debug, Clone)]
pub struct WorkpieceCapture {
    pub height_mm: f64,
    /// Outline area in square pixels
    pub contour_area: f64,
    /// Largest contour in the frame
    pub contour: Contour,
    /// Millimetres per pixel at the contour centroid
    pub scale_factor: f64,
    pub image: Array2<u8>,
    /// Every contour found in the frame
    pub raw_contours: Vec<Contour>,
}

#[derive(Debug, Clone)]
pub struct CreateWorkpieceResponse {
    pub response: CellResponse,
    pub capture: Option<WorkpieceCapture>,
}

#[derive(Debug, Clone)]
pub struct CalibrateRobotResponse {
    pub response: CellResponse,
    /// Annotated last frame when calibration failed
    pub debug_image: Option<Array2<u8>>,
}
