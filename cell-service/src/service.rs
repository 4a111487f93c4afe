//! The cell's request boundary.
//!
//! [`GlueCellService`] owns the collaborators and the state machines and
//! exposes one method per operator request. Every request returns a
//! structured response; errors never escape as panics or `Err` values.

use std::collections::BTreeMap;
use std::sync::Arc;

use calibration::{
    calibrate_camera, CalibrationArtifacts, CalibrationCorrespondence, CalibrationError,
    CalibrationPipeline, CalibrationRig, CalibrationStore, ManualCalibration,
};
use cell_math::Homography;
use hardware::{ActuatorSet, MotionParams, Pose6, PoseSource, RobotInterface};
use motion::{
    EventBus, GlueDispenser, KinematicMonitor, MotionState, PickAndPlaceRunner, PickItem,
    RobotMotionController, RowPacker, StopSignal, ToolActuator, ToolChanger, VacuumGripper,
};
use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};
use shared::contour::Contour;
use shared::vision::{HeightSensor, IntrinsicsSolver, VisionFrame, VisionSource};
use tracing::{info, warn};
use workpiece::{AlignmentEngine, ContourMatcher, MatchResult, PathGenerator, WorkpieceTemplate};

use crate::{
    CalibrateRobotResponse, CellError, CellResponse, CellSettings, CreateWorkpieceResponse,
    TemplateStore, WorkpieceCapture,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JogAxis {
    X,
    Y,
    Z,
    Rz,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JogDirection {
    Plus,
    Minus,
}

/// External devices of the cell other than the robot
pub struct CellDevices {
    pub actuators: Arc<ActuatorSet>,
    pub camera: Box<dyn VisionSource>,
    pub height_sensor: Box<dyn HeightSensor>,
    pub intrinsics_solver: Box<dyn IntrinsicsSolver>,
    pub templates: Box<dyn TemplateStore>,
}

pub struct GlueCellService {
    settings: CellSettings,
    robot: Arc<dyn RobotInterface>,
    actuators: Arc<ActuatorSet>,
    camera: Box<dyn VisionSource>,
    height_sensor: Box<dyn HeightSensor>,
    intrinsics_solver: Box<dyn IntrinsicsSolver>,
    templates: Box<dyn TemplateStore>,
    events: Arc<EventBus>,
    monitor: Arc<KinematicMonitor>,
    controller: RobotMotionController,
    dispenser: GlueDispenser,
    matcher: ContourMatcher,
    aligner: AlignmentEngine,
    path_generator: PathGenerator,
    pick_place: PickAndPlaceRunner,
    store: CalibrationStore,
    artifacts: CalibrationArtifacts,
    /// Fiducial pixels seen from the calibration pose, for manual calibration
    calibration_view: BTreeMap<u32, Point2<f64>>,
    manual: ManualCalibration,
    stop: StopSignal,
}

impl GlueCellService {
    /// Validate `settings`, start the kinematic monitor and load whatever
    /// calibration is on disk.
    pub fn new<R: RobotInterface + 'static>(
        settings: CellSettings,
        robot: Arc<R>,
        devices: CellDevices,
    ) -> Result<Self, CellError> {
        settings.validate()?;

        let events = Arc::new(EventBus::new());
        let monitor = Arc::new(KinematicMonitor::spawn(
            robot.clone(),
            settings.kinematics.clone(),
            Some(events.clone()),
        ));
        let stop = StopSignal::new();

        let store = CalibrationStore::with_path(&settings.storage.calibration_dir);
        let artifacts = store.load_all().unwrap_or_else(|e| {
            warn!("Ignoring unreadable calibration in {}: {e}", store.root_path().display());
            CalibrationArtifacts::default()
        });
        if artifacts.is_complete() {
            info!("Calibration loaded from {}", store.root_path().display());
        } else {
            warn!("Cell is not calibrated; contour-based operation is disabled");
        }
        events.set_homography(artifacts.camera_to_robot.as_ref());

        let robot: Arc<dyn RobotInterface> = robot;
        let controller =
            RobotMotionController::new(robot.clone(), monitor.clone(), settings.motion_config())
                .with_stop_signal(stop.clone());
        let dispenser = GlueDispenser::new(
            devices.actuators.clone(),
            settings.hardware.glue_channels.clone(),
            settings.glue.dispense_settings(),
        )
        .with_events(events.clone());

        let matcher =
            ContourMatcher::default().with_threshold(settings.matching.similarity_threshold);
        let aligner = AlignmentEngine::new(settings.matching.alignment);
        let path_generator = PathGenerator::new(settings.calibration.work_plane_z_mm);
        let pick_place = Self::build_pick_place(&settings);
        let manual = ManualCalibration::new(settings.calibration.required_marker_ids.len());

        Ok(Self {
            settings,
            robot,
            actuators: devices.actuators,
            camera: devices.camera,
            height_sensor: devices.height_sensor,
            intrinsics_solver: devices.intrinsics_solver,
            templates: devices.templates,
            events,
            monitor,
            controller,
            dispenser,
            matcher,
            aligner,
            path_generator,
            pick_place,
            store,
            artifacts,
            calibration_view: BTreeMap::new(),
            manual,
            stop,
        })
    }

    fn build_pick_place(settings: &CellSettings) -> PickAndPlaceRunner {
        let p = &settings.pick_place;
        let packer = RowPacker::new(
            Point2::new(p.plane_origin[0], p.plane_origin[1]),
            p.plane_width_mm,
            p.plane_depth_mm,
            p.spacing_mm,
        );
        let changer = p.tool_slots.iter().fold(
            ToolChanger::new(
                p.motion.approach_mm,
                settings.glue.segment_defaults(&settings.robot),
            ),
            |changer, slot| changer.with_slot(slot.gripper_id, slot.pose),
        );
        PickAndPlaceRunner::new(packer, changer, p.motion.clone())
    }

    pub fn settings(&self) -> &CellSettings {
        &self.settings
    }

    /// Topics for presentation collaborators.
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Flag another thread can raise to abort the running request.
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn is_calibrated(&self) -> bool {
        self.artifacts.is_complete()
    }

    pub fn camera_to_robot(&self) -> Option<&Homography> {
        self.artifacts.camera_to_robot.as_ref()
    }

    pub fn motion_state(&self) -> MotionState {
        self.controller.state()
    }

    /// States visited by the last path execution.
    pub fn motion_history(&self) -> &[MotionState] {
        self.controller.history()
    }

    /// Dispense glue on every workpiece.
    ///
    /// With `contour_matching` the workpieces are located in a fresh frame;
    /// without it the templates' stored geometry is used as is.
    pub fn start(&mut self, contour_matching: bool) -> CellResponse {
        let result = self.run_start(contour_matching);
        CellResponse::from_result("start", result)
    }

    fn run_start(&mut self, contour_matching: bool) -> Result<String, CellError> {
        self.stop.reset();
        let homography = self.require_calibration()?;
        let templates = self.load_templates()?;
        let defaults = self.settings.glue.segment_defaults(&self.settings.robot);

        let mut paths = Vec::new();
        let mut note = String::new();
        if contour_matching {
            let frame = self.capture_at_calibration_pose()?;
            let result = self.match_frame(&templates, frame)?;
            for m in &result.matches {
                let aligned = self.aligner.align(m);
                paths.extend(self.path_generator.build_paths(&aligned, &homography, &defaults)?);
            }
            note = format!(
                " for {} workpiece(s), {} contour(s) unmatched",
                result.matches.len(),
                result.unmatched.len()
            );
        } else {
            for template in &templates {
                paths.extend(
                    self.path_generator
                        .build_template_paths(template, &homography, &defaults)?,
                );
            }
        }

        let report = self.controller.execute(paths, &self.dispenser)?;
        Ok(format!(
            "Executed {} path(s), {} pose(s){note}",
            report.paths_completed, report.poses_sent
        ))
    }

    /// Pick every matched workpiece and pack it onto the placement plane.
    pub fn pick_and_place(&mut self) -> CellResponse {
        let result = self.run_pick_and_place();
        CellResponse::from_result("pick and place", result)
    }

    fn run_pick_and_place(&mut self) -> Result<String, CellError> {
        self.stop.reset();
        let homography = self.require_calibration()?;
        let templates = self.load_templates()?;
        let frame = self.capture_at_calibration_pose()?;
        let result = self.match_frame(&templates, frame)?;
        let items: Vec<PickItem> = result
            .matches
            .iter()
            .map(|m| PickItem::from_aligned(&self.aligner.align(m), &homography))
            .collect();

        self.pick_place.clear_plane();
        let gripper = VacuumGripper::new(self.actuators.clone());
        let report = self
            .pick_place
            .run(&items, &mut self.controller, &gripper)?;
        Ok(format!(
            "Placed {} workpiece(s) with {} tool change(s)",
            report.placed, report.tool_changes
        ))
    }

    /// Measure the workpiece currently under the camera.
    pub fn create_workpiece(&mut self) -> CreateWorkpieceResponse {
        match self.run_create_workpiece() {
            Ok(capture) => {
                let message = format!(
                    "Workpiece captured: area {:.0} px², height {:.1} mm, {:.4} mm/px",
                    capture.contour_area, capture.height_mm, capture.scale_factor
                );
                info!("create workpiece: {message}");
                CreateWorkpieceResponse {
                    response: CellResponse::ok(message),
                    capture: Some(capture),
                }
            }
            Err(e) => CreateWorkpieceResponse {
                response: CellResponse::from_result("create workpiece", Err(e)),
                capture: None,
            },
        }
    }

    fn run_create_workpiece(&mut self) -> Result<WorkpieceCapture, CellError> {
        self.stop.reset();
        let homography = self
            .artifacts
            .camera_to_robot
            .clone()
            .ok_or(CellError::Uncalibrated("camera-to-robot homography missing"))?;

        let frame = self.capture_at_calibration_pose()?;
        let contour = frame
            .contours
            .iter()
            .max_by(|a, b| a.area().abs().total_cmp(&b.area().abs()))
            .cloned()
            .ok_or_else(|| CellError::Validation("no contour detected".to_string()))?;
        if contour.len() < 3 {
            return Err(CellError::Validation(format!(
                "largest contour has only {} point(s)",
                contour.len()
            )));
        }

        let height_mm = self.height_sensor.measure_height_mm()?;
        Ok(WorkpieceCapture {
            height_mm,
            contour_area: contour.area().abs(),
            scale_factor: homography.local_scale(contour.centroid()),
            contour,
            image: frame.image,
            raw_contours: frame.contours,
        })
    }

    /// Run the automatic camera-to-robot calibration and persist the result.
    pub fn calibrate_robot(&mut self) -> CalibrateRobotResponse {
        self.stop.reset();
        if let Err(e) = self.go_to_calibration_pose() {
            return CalibrateRobotResponse {
                response: CellResponse::from_result("calibrate robot", Err(e)),
                debug_image: None,
            };
        }

        let mut pipeline = CalibrationPipeline::new(self.settings.calibration.clone());
        let outcome = {
            let mut rig = CalibrationRig {
                robot: self.robot.as_ref(),
                camera: self.camera.as_mut(),
                monitor: &self.monitor,
                stop: &self.stop,
            };
            pipeline.run(&mut rig)
        };

        let result = outcome.map_err(CellError::from).and_then(|calibration| {
            self.store.save_camera_to_robot(&calibration.homography)?;
            let message = format!(
                "Robot calibrated from {} fiducials, RMS {:.3} mm",
                calibration.correspondences.len(),
                calibration.rms_error_mm
            );
            self.set_camera_to_robot(calibration.homography);
            Ok(message)
        });
        let failed = result.is_err();
        CalibrateRobotResponse {
            response: CellResponse::from_result("calibrate robot", result),
            debug_image: if failed {
                pipeline.debug_image().cloned()
            } else {
                None
            },
        }
    }

    /// Calibrate intrinsics and perspective from chessboard views and
    /// persist both.
    pub fn calibrate_camera(&mut self) -> CellResponse {
        let result = self.run_calibrate_camera();
        CellResponse::from_result("calibrate camera", result)
    }

    fn run_calibrate_camera(&mut self) -> Result<String, CellError> {
        let config = &self.settings.calibration;
        let calibration = calibrate_camera(
            self.camera.as_mut(),
            self.intrinsics_solver.as_ref(),
            &config.chessboard,
            config.min_camera_images,
            config.max_camera_frames,
        )?;
        self.store.save_intrinsics(&calibration.intrinsics)?;
        self.store.save_perspective(&calibration.perspective)?;

        let message = format!(
            "Camera calibrated from {} views, RMS {:.3} px",
            calibration.views_used, calibration.intrinsics.rms_error
        );
        self.artifacts.intrinsics = Some(calibration.intrinsics);
        self.artifacts.perspective = Some(calibration.perspective);
        Ok(message)
    }

    /// Move the tool one jog step along `axis`.
    pub fn jog(&mut self, axis: JogAxis, direction: JogDirection) -> CellResponse {
        let result = self.run_jog(axis, direction);
        CellResponse::from_result("jog", result)
    }

    fn run_jog(&mut self, axis: JogAxis, direction: JogDirection) -> Result<String, CellError> {
        let step = match direction {
            JogDirection::Plus => self.settings.robot.jog_step_mm,
            JogDirection::Minus => -self.settings.robot.jog_step_mm,
        };
        let mut delta = Pose6::default();
        match axis {
            JogAxis::X => delta.x = step,
            JogAxis::Y => delta.y = step,
            JogAxis::Z => delta.z = step,
            JogAxis::Rz => delta.rz = step,
        }
        self.robot.move_relative(&delta, &self.motion_params())?;
        Ok(format!("Jogged {axis:?} by {step:+.2}"))
    }

    /// Move to the calibration pose and record the fiducials visible there.
    pub fn move_to_calibration_pose(&mut self) -> CellResponse {
        let result = self.run_move_to_calibration_pose();
        CellResponse::from_result("move to calibration pose", result)
    }

    fn run_move_to_calibration_pose(&mut self) -> Result<String, CellError> {
        self.stop.reset();
        let frame = self.capture_at_calibration_pose()?;
        self.calibration_view = frame
            .markers
            .iter()
            .map(|m| (m.id, m.center()))
            .collect();
        Ok(format!(
            "At calibration pose, {} fiducial(s) visible",
            self.calibration_view.len()
        ))
    }

    /// Abort the running request and halt the robot.
    pub fn stop(&self) -> CellResponse {
        self.stop.request();
        self.dispenser.abort();
        let result = self
            .robot
            .stop()
            .map(|()| "Stop requested".to_string())
            .map_err(CellError::from);
        CellResponse::from_result("stop", result)
    }

    /// Record the current tool position against fiducial `marker_id` as seen
    /// from the calibration pose. Once every required fiducial has a point,
    /// the homography is refitted and persisted.
    pub fn save_calibration_point(&mut self, marker_id: u32) -> CellResponse {
        let result = self.run_save_calibration_point(marker_id);
        CellResponse::from_result("save calibration point", result)
    }

    fn run_save_calibration_point(&mut self, marker_id: u32) -> Result<String, CellError> {
        let pixel = *self.calibration_view.get(&marker_id).ok_or_else(|| {
            CellError::Validation(format!(
                "fiducial {marker_id} was not seen from the calibration pose"
            ))
        })?;
        let pose = self.robot.read_pose()?;
        let tool = Vector2::new(pose.x, pose.y) + self.settings.calibration.tool_offset();
        let held = self.manual.record(CalibrationCorrespondence {
            marker_id,
            pixel,
            robot: [tool.x, tool.y, pose.z],
        });

        let Some(fit) = self.manual.fit() else {
            return Ok(format!(
                "Saved point for fiducial {marker_id} ({held}/{})",
                self.settings.calibration.required_marker_ids.len()
            ));
        };
        let (homography, rms) = fit.map_err(CalibrationError::from)?;
        self.store.save_camera_to_robot(&homography)?;
        self.set_camera_to_robot(homography);
        Ok(format!(
            "Saved fiducial {marker_id}; homography updated from {held} points, RMS {rms:.3} mm"
        ))
    }

    fn set_camera_to_robot(&mut self, homography: Homography) {
        self.events.set_homography(Some(&homography));
        self.artifacts.camera_to_robot = Some(homography);
    }

    fn require_calibration(&self) -> Result<Homography, CellError> {
        if self.artifacts.intrinsics.is_none() {
            return Err(CellError::Uncalibrated("camera intrinsics missing"));
        }
        if self.artifacts.perspective.is_none() {
            return Err(CellError::Uncalibrated("perspective correction missing"));
        }
        self.artifacts
            .camera_to_robot
            .clone()
            .ok_or(CellError::Uncalibrated("camera-to-robot homography missing"))
    }

    fn load_templates(&self) -> Result<Vec<WorkpieceTemplate>, CellError> {
        let templates = self.templates.load_templates()?;
        if templates.is_empty() {
            return Err(CellError::Validation("no workpiece templates".to_string()));
        }
        Ok(templates)
    }

    fn match_frame<'a>(
        &self,
        templates: &'a [WorkpieceTemplate],
        frame: VisionFrame,
    ) -> Result<MatchResult<'a>, CellError> {
        let contours: Vec<Contour> = frame.contours;
        Ok(self
            .matcher
            .match_contours(templates, contours)
            .require_matches()?)
    }

    fn motion_params(&self) -> MotionParams {
        MotionParams {
            velocity: self.settings.robot.velocity,
            acceleration: self.settings.robot.acceleration,
            tool: self.settings.robot.tool_frame,
            user: self.settings.robot.user_frame,
            blend_radius: 0.0,
        }
    }

    fn go_to_calibration_pose(&self) -> Result<(), CellError> {
        let pose = self.settings.robot.calibration_pose;
        self.robot.move_to(&pose, &self.motion_params())?;
        let motion = &self.settings.motion;
        self.monitor.wait_settled_at(
            &pose,
            self.settings.glue.reach_start_mm,
            motion.stationary_timeout(),
            motion.poll_interval(),
            &self.stop,
        )?;
        Ok(())
    }

    /// Frames must come from the calibration pose for the homography to hold.
    fn capture_at_calibration_pose(&mut self) -> Result<VisionFrame, CellError> {
        self.go_to_calibration_pose()?;
        Ok(self.camera.capture()?)
    }
}
