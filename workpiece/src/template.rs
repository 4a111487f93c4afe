//! Workpiece template data model
//!
//! Templates are loaded from an external store once per run. The stored
//! original is never mutated: alignment always works on a clone.

use serde::{Deserialize, Serialize};
use shared::contour::Contour;

use crate::WorkpieceError;

/// Process settings attached to one spray segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentSettings {
    /// Nozzle height above the workpiece top, in millimetres
    pub spray_height_mm: f64,
    /// Velocity in percent of the robot maximum
    pub velocity: f64,
    /// Acceleration in percent of the robot maximum
    pub acceleration: f64,
    /// Tool rotation about z added to the workpiece rotation, in degrees
    pub rz_angle_deg: f64,
    /// Glue type dispensed on this segment
    pub glue_type: String,
}

impl Default for SegmentSettings {
    fn default() -> Self {
        Self {
            spray_height_mm: 10.0,
            velocity: 30.0,
            acceleration: 30.0,
            rz_angle_deg: 0.0,
            glue_type: "Type A".to_string(),
        }
    }
}

/// A stroke or fill sub-path in template (camera pixel) coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub contour: Contour,
    pub settings: SegmentSettings,
}

/// Programmed spray geometry of a workpiece
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SprayPattern {
    /// Outline-following paths
    pub stroke: Vec<Segment>,
    /// Area-covering paths
    pub fill: Vec<Segment>,
}

impl SprayPattern {
    pub fn is_empty(&self) -> bool {
        self.stroke.is_empty() && self.fill.is_empty()
    }

    /// Stroke segments followed by fill segments.
    pub fn segments(&self) -> impl Iterator<Item = &Segment> {
        self.stroke.iter().chain(self.fill.iter())
    }

    pub fn segments_mut(&mut self) -> impl Iterator<Item = &mut Segment> {
        self.stroke.iter_mut().chain(self.fill.iter_mut())
    }
}

/// Calibrated workpiece template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkpieceTemplate {
    pub id: u32,
    #[serde(default)]
    pub name: String,
    /// Workpiece thickness above the work plane, in millimetres
    pub height_mm: f64,
    /// Outline in camera pixels
    pub outline: Contour,
    #[serde(default)]
    pub spray_pattern: SprayPattern,
    /// Gripper needed to handle this workpiece in pick-and-place
    #[serde(default)]
    pub gripper_id: Option<u32>,
}

impl WorkpieceTemplate {
    pub fn new(id: u32, height_mm: f64, outline: Contour) -> Self {
        Self {
            id,
            name: String::new(),
            height_mm,
            outline,
            spray_pattern: SprayPattern::default(),
            gripper_id: None,
        }
    }

    pub fn with_stroke(mut self, contour: Contour, settings: SegmentSettings) -> Self {
        self.spray_pattern.stroke.push(Segment { contour, settings });
        self
    }

    pub fn with_fill(mut self, contour: Contour, settings: SegmentSettings) -> Self {
        self.spray_pattern.fill.push(Segment { contour, settings });
        self
    }

    pub fn validate(&self) -> Result<(), WorkpieceError> {
        let invalid = |reason: String| WorkpieceError::InvalidTemplate {
            id: self.id,
            reason,
        };
        if self.outline.len() < 3 {
            return Err(invalid(format!(
                "outline needs at least 3 points, has {}",
                self.outline.len()
            )));
        }
        if !(self.height_mm.is_finite() && self.height_mm >= 0.0) {
            return Err(invalid(format!("height {} is not valid", self.height_mm)));
        }
        for (i, segment) in self.spray_pattern.segments().enumerate() {
            if segment.contour.is_empty() {
                return Err(invalid(format!("segment {i} has no points")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_outline() -> Contour {
        Contour::from_xy(&[[0.0, 0.0], [10.0, 0.0], [10.0, 5.0], [0.0, 5.0]])
    }

    #[test]
    fn test_segments_order_stroke_then_fill() {
        let t = WorkpieceTemplate::new(1, 4.0, make_outline())
            .with_fill(Contour::from_xy(&[[1.0, 1.0]]), SegmentSettings::default())
            .with_stroke(Contour::from_xy(&[[2.0, 2.0]]), SegmentSettings::default());
        let firsts: Vec<f64> = t
            .spray_pattern
            .segments()
            .map(|s| s.contour.points()[0].x)
            .collect();
        assert_eq!(firsts, vec![2.0, 1.0]);
    }

    #[test]
    fn test_validate_rejects_short_outline() {
        let t = WorkpieceTemplate::new(3, 1.0, Contour::from_xy(&[[0.0, 0.0], [1.0, 1.0]]));
        assert!(matches!(
            t.validate(),
            Err(WorkpieceError::InvalidTemplate { id: 3, .. })
        ));
    }

    #[test]
    fn test_validate_rejects_empty_segment() {
        let t = WorkpieceTemplate::new(4, 1.0, make_outline())
            .with_stroke(Contour::default(), SegmentSettings::default());
        assert!(t.validate().is_err());
    }

    #[test]
    fn test_deserialize_defaults() {
        let json = r#"{"id": 7, "height_mm": 3.5,
            "outline": {"points": [[0,0],[1,0],[1,1]]}}"#;
        let t: WorkpieceTemplate = serde_json::from_str(json).unwrap();
        assert_eq!(t.id, 7);
        assert!(t.spray_pattern.is_empty());
        assert!(t.validate().is_ok());
    }
}
