//! Camera and camera-to-robot calibration for the glue cell.
//!
//! - [`pipeline`] - chessboard scale, fiducial search and visual servo producing
//!   the pixel-to-robot homography
//! - [`camera`] - intrinsics and perspective correction from chessboard views
//! - [`storage`] - persisted calibration artifacts

pub mod camera;
pub mod config;
pub mod correspondence;
pub mod error;
pub mod pipeline;
pub mod state;
pub mod storage;

pub use camera::{calibrate_camera, CameraCalibration};
pub use config::CalibrationConfig;
pub use correspondence::{fit_homography, CalibrationCorrespondence, ManualCalibration};
pub use error::CalibrationError;
pub use pipeline::{CalibrationPipeline, CalibrationRig, MarkerOffset, RobotCalibration};
pub use state::{transition, CalibrationEvent, CalibrationState};
pub use storage::{CalibrationArtifacts, CalibrationStore, Stamped, StorageError};
