//! cell-math - Planar geometry for the glue dispensing cell
//!
//! This crate holds the small amount of numeric machinery shared by the
//! matching, alignment and calibration layers:
//!
//! - **Rotation** - rotating points and contours about a pivot
//! - **Angle** - wrapping of angles into the half-open `[-180, 180)` range
//! - **Homography** - DLT estimation and perspective point mapping between
//!   the camera and robot planes
//!
//! # Example
//!
//! ```text
//! use cell_math::{Homography, normalize_angle_deg};
//!
//! let h = Homography::estimate(&pixels, &robot_mm)?;
//! let robot = h.apply(&[[640.0, 360.0]]);
//! let back = h.inverse().apply(&robot);
//! ```

pub mod angle;
pub mod homography;
pub mod rotation;

pub use angle::normalize_angle_deg;
pub use homography::{Homography, HomographyError};
pub use rotation::{rotate_about, rotate_points_about, rotation_deg};
