//! Robot path generation from aligned template geometry

use cell_math::Homography;
use hardware::robot::Pose6;
use serde::{Deserialize, Serialize};
use shared::contour::Contour;
use tracing::debug;

use crate::{AlignedWorkpiece, SegmentSettings, WorkpieceError, WorkpieceTemplate};

/// What the active tool does over a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathAction {
    Dispense,
    Pick,
    Place,
}

/// Ordered robot poses for one segment. Never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct RobotPath {
    poses: Vec<Pose6>,
    pub settings: SegmentSettings,
    pub action: PathAction,
    pub label: String,
}

impl RobotPath {
    pub fn new(
        label: impl Into<String>,
        poses: Vec<Pose6>,
        settings: SegmentSettings,
        action: PathAction,
    ) -> Result<Self, WorkpieceError> {
        let label = label.into();
        if poses.is_empty() {
            return Err(WorkpieceError::EmptyPath { label });
        }
        Ok(Self {
            poses,
            settings,
            action,
            label,
        })
    }

    pub fn poses(&self) -> &[Pose6] {
        &self.poses
    }

    pub fn first(&self) -> &Pose6 {
        &self.poses[0]
    }

    pub fn last(&self) -> &Pose6 {
        &self.poses[self.poses.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }
}

/// Builds robot paths from pixel geometry through the camera-to-robot homography.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathGenerator {
    /// Robot z of the work plane, in millimetres
    pub work_plane_z_mm: f64,
    pub rx: f64,
    pub ry: f64,
}

impl PathGenerator {
    pub fn new(work_plane_z_mm: f64) -> Self {
        Self {
            work_plane_z_mm,
            rx: 180.0,
            ry: 0.0,
        }
    }

    /// Paths for an aligned workpiece: strokes, then fills, or the closed
    /// outline with `defaults` when no spray pattern was programmed.
    pub fn build_paths(
        &self,
        aligned: &AlignedWorkpiece,
        homography: &Homography,
        defaults: &SegmentSettings,
    ) -> Result<Vec<RobotPath>, WorkpieceError> {
        self.paths_for(&aligned.template, aligned.orientation_deg, homography, defaults)
    }

    /// Paths from a template's stored geometry, without any alignment.
    pub fn build_template_paths(
        &self,
        template: &WorkpieceTemplate,
        homography: &Homography,
        defaults: &SegmentSettings,
    ) -> Result<Vec<RobotPath>, WorkpieceError> {
        self.paths_for(template, 0.0, homography, defaults)
    }

    fn paths_for(
        &self,
        template: &WorkpieceTemplate,
        orientation_deg: f64,
        homography: &Homography,
        defaults: &SegmentSettings,
    ) -> Result<Vec<RobotPath>, WorkpieceError> {
        let pattern = &template.spray_pattern;
        if pattern.is_empty() {
            let label = format!("workpiece {} outline", template.id);
            let path = self.segment_path(
                label,
                &template.outline.closed(),
                defaults,
                template.height_mm,
                orientation_deg,
                homography,
            )?;
            return Ok(vec![path]);
        }

        let strokes = pattern.stroke.iter().enumerate().map(|(i, s)| ("stroke", i, s));
        let fills = pattern.fill.iter().enumerate().map(|(i, s)| ("fill", i, s));
        strokes
            .chain(fills)
            .map(|(kind, i, segment)| {
                self.segment_path(
                    format!("workpiece {} {kind} {i}", template.id),
                    &segment.contour,
                    &segment.settings,
                    template.height_mm,
                    orientation_deg,
                    homography,
                )
            })
            .collect()
    }

    fn segment_path(
        &self,
        label: String,
        contour: &Contour,
        settings: &SegmentSettings,
        height_mm: f64,
        orientation_deg: f64,
        homography: &Homography,
    ) -> Result<RobotPath, WorkpieceError> {
        let z = self.work_plane_z_mm + height_mm + settings.spray_height_mm;
        let rz = cell_math::normalize_angle_deg(settings.rz_angle_deg + orientation_deg);

        let mut poses = Vec::with_capacity(contour.len());
        for [x, y] in homography.apply(&contour.to_xy()) {
            if !(x.is_finite() && y.is_finite()) {
                return Err(WorkpieceError::UnmappablePoint { label });
            }
            poses.push(Pose6::new(x, y, z, self.rx, self.ry, rz));
        }
        debug!("Built path '{label}' with {} poses at z={z:.2}", poses.len());

        RobotPath::new(label, poses, settings.clone(), PathAction::Dispense)
    }
}
