use thiserror::Error;

/// Errors from template handling, matching and path generation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorkpieceError {
    /// Template failed validation
    #[error("invalid template {id}: {reason}")]
    InvalidTemplate { id: u32, reason: String },

    /// No detected contour matched any template
    #[error("no workpiece matched ({detected} contours detected)")]
    NoMatches { detected: usize },

    /// A segment produced no poses
    #[error("segment '{label}' has no points")]
    EmptyPath { label: String },

    /// Homography mapped a point to infinity
    #[error("segment '{label}' maps outside the robot plane")]
    UnmappablePoint { label: String },
}
