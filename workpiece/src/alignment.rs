//! Rigid alignment of a matched template onto its detected contour
//!
//! The template copy is rotated about its own centroid, optionally flipped by
//! 180 degrees when its concavity points the wrong way, then translated. The
//! outline and every spray segment receive the identical transform.

use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{Match, WorkpieceTemplate};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlignmentConfig {
    /// Resolve the 180 degree orientation ambiguity with convexity defects
    pub defect_disambiguation: bool,
    /// Maximum defect disagreement before flipping, in pixels
    pub defect_threshold_px: f64,
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            defect_disambiguation: false,
            defect_threshold_px: 20.0,
        }
    }
}

/// Template geometry moved onto the detected workpiece.
#[derive(Debug, Clone)]
pub struct AlignedWorkpiece {
    pub template: WorkpieceTemplate,
    /// Orientation of the detected contour, used for the tool RZ
    pub orientation_deg: f64,
    /// Total rotation applied, in `[-180, 180)`
    pub rotation_deg: f64,
    pub translation: Vector2<f64>,
    /// True when the defect check added a half turn
    pub flipped: bool,
}

#[derive(Debug, Clone, Default)]
pub struct AlignmentEngine {
    config: AlignmentConfig,
}

impl AlignmentEngine {
    pub fn new(config: AlignmentConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AlignmentConfig {
        &self.config
    }

    /// Transform a copy of the matched template onto the detected pose.
    pub fn align(&self, m: &Match<'_>) -> AlignedWorkpiece {
        let mut template = m.template.clone();
        let pivot = template.outline.centroid();
        let mut rotation_deg = m.rotation_delta_deg;

        rotate_template(&mut template, pivot, rotation_deg);

        let mut flipped = false;
        if self.config.defect_disambiguation
            && self.defects_disagree(&template, m, m.centroid_delta)
        {
            rotate_template(&mut template, pivot, 180.0);
            rotation_deg += 180.0;
            flipped = true;
        }

        translate_template(&mut template, m.centroid_delta);

        let rotation_deg = cell_math::normalize_angle_deg(rotation_deg);
        info!(
            "Aligned template {}: rotation {rotation_deg:.2} deg, translation ({:.1}, {:.1}){}",
            template.id,
            m.centroid_delta.x,
            m.centroid_delta.y,
            if flipped { ", flipped" } else { "" }
        );

        AlignedWorkpiece {
            template,
            orientation_deg: m.orientation_deg,
            rotation_deg,
            translation: m.centroid_delta,
            flipped,
        }
    }

    /// Compare the deepest defects of the rotated template and the detected
    /// contour, both taken relative to the detected pose.
    fn defects_disagree(
        &self,
        rotated: &WorkpieceTemplate,
        m: &Match<'_>,
        delta: Vector2<f64>,
    ) -> bool {
        let (Some(template_defect), Some(detected_defect)) = (
            rotated.outline.farthest_defect(),
            m.detected.farthest_defect(),
        ) else {
            debug!("Defect check skipped: contour without concavity");
            return false;
        };

        let distance = (template_defect + delta - detected_defect).norm();
        debug!(
            "Defect distance {distance:.2} px (threshold {:.2})",
            self.config.defect_threshold_px
        );
        distance > self.config.defect_threshold_px
    }
}

fn rotate_template(template: &mut WorkpieceTemplate, pivot: Point2<f64>, angle_deg: f64) {
    template.outline.rotate_about(pivot, angle_deg);
    for segment in template.spray_pattern.segments_mut() {
        segment.contour.rotate_about(pivot, angle_deg);
    }
}

fn translate_template(template: &mut WorkpieceTemplate, delta: Vector2<f64>) {
    template.outline.translate(delta);
    for segment in template.spray_pattern.segments_mut() {
        segment.contour.translate(delta);
    }
}
