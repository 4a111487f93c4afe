//! Camera-to-robot calibration by visual servoing onto fiducials
//!
//! Starting from the calibration pose, the pipeline measures pixels per
//! millimetre on a chessboard, locates every required fiducial, and then for
//! each one drives the camera over it until it sits in the image center. The
//! robot position at convergence, paired with the fiducial's pixel position in
//! the calibration view, is one correspondence of the final homography.
//!
//! With the camera looking straight down, a fiducial at pixel `p` lies at
//! `A * (p - C) / ppm` millimetres from the camera axis, where `C` is the image
//! center and `A` the configured image-to-robot axis matrix. That relation
//! gives both the initial move and every servo correction.

use std::collections::BTreeMap;

use cell_math::Homography;
use hardware::{MotionParams, Pose6, PoseSource, RobotInterface};
use motion::{KinematicMonitor, MotionError, StopSignal};
use nalgebra::{Point2, Vector2};
use ndarray::Array2;
use shared::overlay::{draw_cross, draw_polygon};
use shared::vision::{MarkerDetection, VisionFrame, VisionSource};
use tracing::{debug, error, info, warn};

use crate::{
    fit_homography, transition, CalibrationConfig, CalibrationCorrespondence, CalibrationError,
    CalibrationEvent, CalibrationState,
};

/// Position tolerance when waiting for a move to settle
const SETTLE_TOLERANCE_MM: f64 = 0.5;

const MARKER_OUTLINE_VALUE: u8 = 200;
const CENTER_CROSS_VALUE: u8 = 255;
const CHESSBOARD_CROSS_VALUE: u8 = 128;

/// Collaborators the pipeline drives. All borrowed for one run.
pub struct CalibrationRig<'a> {
    pub robot: &'a dyn RobotInterface,
    pub camera: &'a mut dyn VisionSource,
    pub monitor: &'a KinematicMonitor,
    pub stop: &'a StopSignal,
}

/// Where a fiducial was seen from the calibration pose
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerOffset {
    pub id: u32,
    /// Mean detected center, in pixels
    pub pixel: Point2<f64>,
    /// Offset from the image center, in image-axis millimetres
    pub offset_mm: Vector2<f64>,
    /// Robot xy move that brings the camera over the fiducial
    pub robot_delta: Vector2<f64>,
}

/// Result of a successful run
#[derive(Debug, Clone)]
pub struct RobotCalibration {
    pub ppm: f64,
    /// Pixel (calibration view) to robot millimetres
    pub homography: Homography,
    pub rms_error_mm: f64,
    pub correspondences: Vec<CalibrationCorrespondence>,
}

pub struct CalibrationPipeline {
    config: CalibrationConfig,
    state: CalibrationState,
    history: Vec<CalibrationState>,
    last_frame: Option<VisionFrame>,
    debug_image: Option<Array2<u8>>,
}

impl CalibrationPipeline {
    pub fn new(config: CalibrationConfig) -> Self {
        Self {
            config,
            state: CalibrationState::Initializing,
            history: vec![CalibrationState::Initializing],
            last_frame: None,
            debug_image: None,
        }
    }

    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    pub fn state(&self) -> CalibrationState {
        self.state
    }

    /// States visited during the last run, in order.
    pub fn history(&self) -> &[CalibrationState] {
        &self.history
    }

    /// Annotated last frame, kept after a failed run.
    pub fn debug_image(&self) -> Option<&Array2<u8>> {
        self.debug_image.as_ref()
    }

    /// Run the full calibration from the robot's current pose.
    ///
    /// On failure the state machine stays where it failed and a debug image
    /// of the last frame is retained.
    pub fn run(
        &mut self,
        rig: &mut CalibrationRig<'_>,
    ) -> Result<RobotCalibration, CalibrationError> {
        self.state = CalibrationState::Initializing;
        self.history = vec![CalibrationState::Initializing];
        self.last_frame = None;
        self.debug_image = None;

        let result = self.config.validate().and_then(|()| self.run_steps(rig));
        if let Err(e) = &result {
            error!("Calibration failed in {:?}: {e}", self.state);
            self.debug_image = self.render_debug_image();
        }
        result
    }

    fn run_steps(
        &mut self,
        rig: &mut CalibrationRig<'_>,
    ) -> Result<RobotCalibration, CalibrationError> {
        let calibration_pose = rig.robot.read_pose()?;
        if calibration_pose.z + self.config.servo_z_offset_mm <= self.config.work_plane_z_mm {
            return Err(CalibrationError::InvalidConfig(format!(
                "servo height {:.1} mm is not above the work plane at {:.1} mm",
                calibration_pose.z + self.config.servo_z_offset_mm,
                self.config.work_plane_z_mm
            )));
        }
        info!("Calibrating from pose {:?}", calibration_pose);
        self.process_event(CalibrationEvent::Started);

        let ppm = self.find_chessboard(rig)?;
        let pixels = self.find_markers(rig)?;
        let offsets = self.compute_offsets(&pixels, ppm)?;

        let mut correspondences = Vec::with_capacity(offsets.len());
        for (i, offset) in offsets.iter().enumerate() {
            if i > 0 {
                self.process_event(CalibrationEvent::NextMarker);
            }
            let point = self.align_marker(rig, &calibration_pose, ppm, offset)?;
            correspondences.push(point);
            self.process_event(CalibrationEvent::MarkerAligned);
        }

        let (homography, rms_error_mm) = fit_homography(&correspondences)?;

        // Leave the arm where it started
        rig.robot.move_to(&calibration_pose, &self.motion_params())?;
        self.wait_settled(rig, &calibration_pose)?;

        info!(
            "Calibration done: {} points, {:.4} px/mm, RMS {:.3} mm",
            correspondences.len(),
            ppm,
            rms_error_mm
        );
        Ok(RobotCalibration {
            ppm,
            homography,
            rms_error_mm,
            correspondences,
        })
    }

    fn process_event(&mut self, event: CalibrationEvent) {
        match transition(self.state, event) {
            Some(next) => {
                debug!("{:?} --{:?}--> {:?}", self.state, event, next);
                self.state = next;
                self.history.push(next);
            }
            None => warn!("Invalid transition: {:?} in {:?}", event, self.state),
        }
    }

    fn capture(&mut self, rig: &mut CalibrationRig<'_>) -> Result<&VisionFrame, CalibrationError> {
        check_stop(rig)?;
        let frame = rig.camera.capture()?;
        Ok(self.last_frame.insert(frame))
    }

    fn motion_params(&self) -> MotionParams {
        MotionParams {
            velocity: self.config.velocity,
            acceleration: self.config.acceleration,
            ..MotionParams::default()
        }
    }

    fn wait_settled(
        &self,
        rig: &CalibrationRig<'_>,
        target: &Pose6,
    ) -> Result<(), CalibrationError> {
        rig.monitor.wait_settled_at(
            target,
            SETTLE_TOLERANCE_MM,
            self.config.settle_timeout(),
            self.config.poll_interval(),
            rig.stop,
        )?;
        Ok(())
    }

    /// Scale from the first frame showing the whole board.
    fn find_chessboard(&mut self, rig: &mut CalibrationRig<'_>) -> Result<f64, CalibrationError> {
        let pattern = self.config.chessboard.clone();
        for attempt in 1..=self.config.max_chessboard_frames {
            let frame = self.capture(rig)?;
            let Some(corners) = frame
                .chessboard_corners
                .as_ref()
                .filter(|c| c.len() == pattern.corner_count())
            else {
                debug!("Chessboard not visible (attempt {attempt})");
                continue;
            };
            let ppm = pattern.pixels_per_mm(corners)?;
            self.process_event(CalibrationEvent::ChessboardDetected);

            info!("Chessboard found: {:.4} px/mm", ppm);
            self.process_event(CalibrationEvent::ScaleComputed);
            return Ok(ppm);
        }
        Err(CalibrationError::ChessboardNotFound {
            frames: self.config.max_chessboard_frames,
        })
    }

    /// Mean pixel center of every required fiducial, accumulated over frames
    /// until each has been seen at least once.
    fn find_markers(
        &mut self,
        rig: &mut CalibrationRig<'_>,
    ) -> Result<BTreeMap<u32, Point2<f64>>, CalibrationError> {
        let required = self.config.required_marker_ids.clone();
        let mut sums: BTreeMap<u32, (Vector2<f64>, usize)> = BTreeMap::new();

        for _ in 0..self.config.max_marker_frames {
            let frame = self.capture(rig)?;
            for marker in frame.markers.iter().filter(|m| required.contains(&m.id)) {
                let entry = sums.entry(marker.id).or_insert((Vector2::zeros(), 0));
                entry.0 += marker.center().coords;
                entry.1 += 1;
            }
            if sums.len() == required.len() {
                break;
            }
        }

        let missing: Vec<u32> = required
            .iter()
            .copied()
            .filter(|id| !sums.contains_key(id))
            .collect();
        if !missing.is_empty() {
            return Err(CalibrationError::MissingMarkers {
                missing,
                frames: self.config.max_marker_frames,
            });
        }

        self.process_event(CalibrationEvent::AllMarkersSeen);
        info!("All {} fiducials found", required.len());
        self.process_event(CalibrationEvent::MarkersLocked);

        Ok(sums
            .into_iter()
            .map(|(id, (sum, n))| (id, Point2::from(sum / n as f64)))
            .collect())
    }

    fn compute_offsets(
        &mut self,
        pixels: &BTreeMap<u32, Point2<f64>>,
        ppm: f64,
    ) -> Result<Vec<MarkerOffset>, CalibrationError> {
        let center = self
            .last_frame
            .as_ref()
            .map(VisionFrame::center)
            .ok_or(CalibrationError::ChessboardNotFound { frames: 0 })?;
        let image_to_robot = self.config.image_to_robot();

        let offsets: Vec<MarkerOffset> = self
            .config
            .required_marker_ids
            .iter()
            .filter_map(|id| pixels.get(id).map(|p| (*id, *p)))
            .map(|(id, pixel)| {
                let offset_mm = (pixel - center) / ppm;
                let offset = MarkerOffset {
                    id,
                    pixel,
                    offset_mm,
                    robot_delta: image_to_robot * offset_mm,
                };
                debug!(
                    "Fiducial {id}: pixel ({:.1}, {:.1}), robot delta ({:.2}, {:.2}) mm",
                    pixel.x, pixel.y, offset.robot_delta.x, offset.robot_delta.y
                );
                offset
            })
            .collect();

        self.process_event(CalibrationEvent::OffsetsComputed);
        Ok(offsets)
    }

    /// Servo the camera onto one fiducial and record the correspondence.
    fn align_marker(
        &mut self,
        rig: &mut CalibrationRig<'_>,
        calibration_pose: &Pose6,
        ppm: f64,
        offset: &MarkerOffset,
    ) -> Result<CalibrationCorrespondence, CalibrationError> {
        let params = self.motion_params();
        let plane = self.config.work_plane_z_mm;
        let target = Pose6 {
            x: calibration_pose.x + offset.robot_delta.x,
            y: calibration_pose.y + offset.robot_delta.y,
            z: calibration_pose.z + self.config.servo_z_offset_mm,
            ..*calibration_pose
        };
        // Scale is inversely proportional to the camera height above the plane
        let servo_ppm = ppm * (calibration_pose.z - plane) / (target.z - plane);
        let image_to_robot = self.config.image_to_robot();

        check_stop(rig)?;
        rig.robot.move_to(&target, &params)?;
        self.wait_settled(rig, &target)?;

        let mut residual_px = f64::INFINITY;
        for iteration in 0..=self.config.max_servo_iterations {
            let (error_px, image_center) = {
                let frame = self.capture_marker(rig, offset.id)?;
                let marker = frame
                    .marker(offset.id)
                    .map(MarkerDetection::center)
                    .ok_or(CalibrationError::MarkerLost {
                        id: offset.id,
                        retries: 0,
                    })?;
                (marker - frame.center(), frame.center())
            };
            residual_px = error_px.norm();
            debug!(
                "Fiducial {} servo step {}: {:.2} px from center ({:.1}, {:.1})",
                offset.id, iteration, residual_px, image_center.x, image_center.y
            );

            if residual_px <= self.config.servo_tolerance_px {
                let pose = rig.robot.read_pose()?;
                let tool = Vector2::new(pose.x, pose.y) + self.config.tool_offset();
                info!(
                    "Fiducial {} aligned after {} correction(s) at ({:.2}, {:.2}) mm",
                    offset.id, iteration, tool.x, tool.y
                );
                return Ok(CalibrationCorrespondence {
                    marker_id: offset.id,
                    pixel: offset.pixel,
                    robot: [tool.x, tool.y, pose.z],
                });
            }
            if iteration == self.config.max_servo_iterations {
                break;
            }

            let correction = image_to_robot * error_px / servo_ppm;
            let current = rig.robot.read_pose()?;
            let delta = Pose6::translation(correction.x, correction.y, 0.0);
            check_stop(rig)?;
            rig.robot.move_relative(&delta, &params)?;
            self.wait_settled(rig, &current.offset_by(&delta))?;
        }

        Err(CalibrationError::ServoDidNotConverge {
            id: offset.id,
            iterations: self.config.max_servo_iterations,
            residual_px,
        })
    }

    /// Capture until fiducial `id` is visible, within the re-detection bound.
    fn capture_marker(
        &mut self,
        rig: &mut CalibrationRig<'_>,
        id: u32,
    ) -> Result<&VisionFrame, CalibrationError> {
        let retries = self.config.max_marker_lost_retries;
        for attempt in 0..=retries {
            if self.capture(rig)?.marker(id).is_some() {
                break;
            }
            if attempt == retries {
                return Err(CalibrationError::MarkerLost { id, retries });
            }
            warn!("Fiducial {id} not visible, re-detecting ({}/{retries})", attempt + 1);
        }
        self.last_frame
            .as_ref()
            .ok_or(CalibrationError::MarkerLost { id, retries })
    }

    /// Last frame with detected fiducials, chessboard corners and the image
    /// center drawn in.
    fn render_debug_image(&self) -> Option<Array2<u8>> {
        let frame = self.last_frame.as_ref()?;
        let mut image = frame.image.clone();
        for marker in &frame.markers {
            draw_polygon(&mut image, &marker.corners, MARKER_OUTLINE_VALUE);
        }
        if let Some(corners) = &frame.chessboard_corners {
            for c in corners {
                draw_cross(&mut image, *c, 3, CHESSBOARD_CROSS_VALUE);
            }
        }
        draw_cross(&mut image, frame.center(), 10, CENTER_CROSS_VALUE);
        Some(image)
    }
}

fn check_stop(rig: &CalibrationRig<'_>) -> Result<(), CalibrationError> {
    if rig.stop.is_requested() {
        warn!("Stop requested, aborting calibration");
        if let Err(e) = rig.robot.stop() {
            warn!("Robot stop command failed: {e}");
        }
        return Err(MotionError::Aborted.into());
    }
    Ok(())
}
