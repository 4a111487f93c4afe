//! Persisted calibration artifacts.
//!
//! Three JSON files live under one root directory: the camera intrinsics,
//! the perspective correction and the camera-to-robot homography. Each is
//! wrapped with the time it was produced. The homography file is the only one
//! contour matching and path generation depend on.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use cell_math::Homography;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use shared::vision::CameraIntrinsics;
use thiserror::Error;
use tracing::info;

const INTRINSICS_FILE: &str = "camera_intrinsics.json";
const PERSPECTIVE_FILE: &str = "perspective.json";
const CAMERA_TO_ROBOT_FILE: &str = "camera_to_robot.json";

/// Error while reading or writing calibration files
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid calibration data in {path}: {reason}")]
    Invalid { path: PathBuf, reason: String },
}

/// A calibration result with the time it was computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stamped<T> {
    /// RFC 3339 timestamp
    pub calibration_timestamp: Option<String>,
    pub value: T,
}

impl<T> Stamped<T> {
    pub fn now(value: T) -> Self {
        Self {
            calibration_timestamp: Some(chrono::Utc::now().to_rfc3339()),
            value,
        }
    }
}

/// Everything found on disk.
#[derive(Debug, Clone, Default)]
pub struct CalibrationArtifacts {
    pub intrinsics: Option<CameraIntrinsics>,
    pub perspective: Option<Homography>,
    pub camera_to_robot: Option<Homography>,
}

impl CalibrationArtifacts {
    pub fn is_complete(&self) -> bool {
        self.intrinsics.is_some() && self.perspective.is_some() && self.camera_to_robot.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct CalibrationStore {
    root_path: PathBuf,
}

impl CalibrationStore {
    pub fn with_path(root_path: impl Into<PathBuf>) -> Self {
        Self {
            root_path: root_path.into(),
        }
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    /// Camera intrinsics, or None when never calibrated.
    pub fn get_intrinsics(&self) -> Option<Result<Stamped<CameraIntrinsics>, StorageError>> {
        let path = self.root_path.join(INTRINSICS_FILE);
        if !path.exists() {
            return None;
        }
        Some(read_json(&path).and_then(|stamped: Stamped<CameraIntrinsics>| {
            check_intrinsics(&path, &stamped.value)?;
            Ok(stamped)
        }))
    }

    pub fn save_intrinsics(&self, intrinsics: &CameraIntrinsics) -> Result<PathBuf, StorageError> {
        self.save(INTRINSICS_FILE, &Stamped::now(intrinsics))
    }

    pub fn get_perspective(&self) -> Option<Result<Stamped<Homography>, StorageError>> {
        self.get(PERSPECTIVE_FILE)
    }

    pub fn save_perspective(&self, perspective: &Homography) -> Result<PathBuf, StorageError> {
        self.save(PERSPECTIVE_FILE, &Stamped::now(perspective))
    }

    /// Camera-to-robot homography, or None when the robot was never calibrated.
    pub fn get_camera_to_robot(&self) -> Option<Result<Stamped<Homography>, StorageError>> {
        self.get(CAMERA_TO_ROBOT_FILE)
    }

    pub fn save_camera_to_robot(&self, homography: &Homography) -> Result<PathBuf, StorageError> {
        self.save(CAMERA_TO_ROBOT_FILE, &Stamped::now(homography))
    }

    /// Load every artifact present. A file that exists but fails to load is
    /// an error, a missing file is not.
    pub fn load_all(&self) -> Result<CalibrationArtifacts, StorageError> {
        Ok(CalibrationArtifacts {
            intrinsics: self.get_intrinsics().transpose()?.map(|s| s.value),
            perspective: self.get_perspective().transpose()?.map(|s| s.value),
            camera_to_robot: self.get_camera_to_robot().transpose()?.map(|s| s.value),
        })
    }

    fn get<T: DeserializeOwned>(&self, name: &str) -> Option<Result<Stamped<T>, StorageError>> {
        let path = self.root_path.join(name);
        if !path.exists() {
            return None;
        }
        Some(read_json(&path))
    }

    fn save<T: Serialize>(&self, name: &str, value: &Stamped<&T>) -> Result<PathBuf, StorageError> {
        std::fs::create_dir_all(&self.root_path)?;
        let path = self.root_path.join(name);
        let writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(writer, value)?;
        info!("Saved calibration to {}", path.display());
        Ok(path)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StorageError> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

fn check_intrinsics(path: &Path, intrinsics: &CameraIntrinsics) -> Result<(), StorageError> {
    let m = &intrinsics.camera_matrix;
    let det = m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0]);
    if !det.is_finite() || det.abs() < 1e-12 {
        return Err(StorageError::Invalid {
            path: path.to_path_buf(),
            reason: format!("camera matrix is singular (det = {det:e})"),
        });
    }
    Ok(())
}
