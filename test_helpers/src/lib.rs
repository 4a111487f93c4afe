//! Test helpers for the glue cell crates
//!
//! Synthetic contours and a simulated eye-in-hand camera riding on a mock
//! robot, so matching, motion and calibration can be exercised end to end
//! without hardware.

pub mod contours;
pub mod sim;

pub use contours::{l_shape, rectangle, resample, transformed};
pub use sim::{SimCamera, SimWorld};
