//! Workpiece templates and the matching chain that places them.
//!
//! Detected contours + templates -> [`ContourMatcher`] -> [`AlignmentEngine`]
//! -> [`PathGenerator`] (through the camera-to-robot homography) -> robot
//! paths ready for execution.

pub mod alignment;
pub mod error;
pub mod matcher;
pub mod path;
pub mod template;

pub use alignment::{AlignedWorkpiece, AlignmentConfig, AlignmentEngine};
pub use error::WorkpieceError;
pub use matcher::{
    ContourMatcher, HuMomentScorer, Match, MatchResult, ShapeScorer, SIMILARITY_THRESHOLD,
};
pub use path::{PathAction, PathGenerator, RobotPath};
pub use template::{Segment, SegmentSettings, SprayPattern, WorkpieceTemplate};
