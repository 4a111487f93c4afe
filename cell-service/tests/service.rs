//! Operator requests against the simulated cell.

use std::sync::Arc;

use approx::assert_abs_diff_eq;
use cell_service::{CellDevices, CellSettings, GlueCellService, JogAxis, JogDirection};
use hardware::modbus::MockTransport;
use hardware::robot::{MockRobot, RobotCommand};
use hardware::{ActuatorSet, MotionParams, ModbusClient, Pose6, RobotInterface};
use nalgebra::{Matrix2, Point2, Vector2};
use shared::chessboard::ChessboardPattern;
use shared::contour::Contour;
use shared::vision::{
    CameraIntrinsics, ChessboardView, HeightSensor, IntrinsicsSolver, VisionError,
};
use tempfile::TempDir;
use test_helpers::{rectangle, transformed, SimCamera, SimWorld};
use workpiece::WorkpieceTemplate;

const WORKPIECE_HEIGHT_MM: f64 = 5.0;

struct FixedHeight;

impl HeightSensor for FixedHeight {
    fn measure_height_mm(&mut self) -> Result<f64, VisionError> {
        Ok(WORKPIECE_HEIGHT_MM)
    }
}

struct PinholeSolver;

impl IntrinsicsSolver for PinholeSolver {
    fn solve(
        &self,
        views: &[ChessboardView],
        _pattern: &ChessboardPattern,
    ) -> Result<CameraIntrinsics, VisionError> {
        let (w, h) = views[0].image_size;
        Ok(CameraIntrinsics {
            camera_matrix: [
                [600.0, 0.0, w as f64 / 2.0],
                [0.0, 600.0, h as f64 / 2.0],
                [0.0, 0.0, 1.0],
            ],
            distortion: vec![0.0; 5],
            rms_error: 0.05,
        })
    }
}

fn as_axes(m: &Matrix2<f64>) -> [[f64; 2]; 2] {
    [[m[(0, 0)], m[(0, 1)]], [m[(1, 0)], m[(1, 1)]]]
}

struct Cell {
    _dir: TempDir,
    world: SimWorld,
    workpiece_mm: Contour,
    robot: Arc<MockRobot>,
    bus: MockTransport,
    settings: CellSettings,
    service: GlueCellService,
}

impl Cell {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let unrotated = rectangle(60.0, 30.0, Point2::new(310.0, 10.0));
        let mut world = SimWorld::calibration_cell();
        world.workpieces = vec![transformed(&unrotated, 20.0, Vector2::zeros())];

        let mut settings = CellSettings::with_storage_root(dir.path());
        settings.robot.calibration_pose = world.home;
        settings.kinematics.sample_period_ms = 2;
        settings.motion.stationary_timeout_s = 2.0;
        settings.motion.poll_interval_ms = 1;
        settings.glue.reverse_duration_ms = 1;
        let cal = &mut settings.calibration;
        cal.chessboard = ChessboardPattern {
            cols: 5,
            rows: 4,
            square_size_mm: 25.0,
        };
        cal.image_to_robot = as_axes(&world.image_to_robot);
        cal.servo_z_offset_mm = -100.0;
        cal.servo_tolerance_px = 0.5;
        cal.settle_timeout_s = 2.0;
        cal.poll_interval_ms = 1;
        cal.min_camera_images = 3;

        // Template drawn in calibration-view pixels, unrotated
        let outline = Contour::new(
            unrotated
                .points()
                .iter()
                .map(|p| world.project(*p, &world.home))
                .collect(),
        );
        let templates = vec![WorkpieceTemplate::new(7, WORKPIECE_HEIGHT_MM, outline)];

        let robot = Arc::new(MockRobot::new(world.home));
        let bus = MockTransport::new();
        let actuators = Arc::new(ActuatorSet::new(
            ModbusClient::new(Box::new(bus.clone()), settings.hardware.slave_id),
            &settings.hardware,
        ));
        let devices = CellDevices {
            actuators,
            camera: Box::new(SimCamera::new(world.clone(), robot.clone())),
            height_sensor: Box::new(FixedHeight),
            intrinsics_solver: Box::new(PinholeSolver),
            templates: Box::new(templates),
        };
        let service = GlueCellService::new(settings.clone(), robot.clone(), devices).unwrap();

        Self {
            _dir: dir,
            workpiece_mm: world.workpieces[0].clone(),
            world,
            robot,
            bus,
            settings,
            service,
        }
    }

    fn calibrate(&mut self) {
        let camera = self.service.calibrate_camera();
        assert!(camera.success, "{}", camera.message);
        let robot = self.service.calibrate_robot();
        assert!(robot.response.success, "{}", robot.response.message);
        assert!(robot.debug_image.is_none());
        assert!(self.service.is_calibrated());
    }

    fn linear_moves(&self) -> Vec<Pose6> {
        self.robot
            .commands()
            .into_iter()
            .filter_map(|c| match c {
                RobotCommand::MoveLinear(p) => Some(p),
                _ => None,
            })
            .collect()
    }
}

#[test]
fn start_requires_calibration() {
    let mut cell = Cell::new();
    let response = cell.service.start(true);
    assert!(!response.success);
    assert!(response.message.contains("not calibrated"), "{}", response.message);
    assert!(cell.robot.commands().is_empty());
}

#[test]
fn calibration_is_persisted() {
    let mut cell = Cell::new();
    cell.calibrate();

    let dir = &cell.settings.storage.calibration_dir;
    for file in ["camera_intrinsics.json", "perspective.json", "camera_to_robot.json"] {
        assert!(dir.join(file).exists(), "{file} missing");
    }

    let h = cell.service.camera_to_robot().unwrap();
    let (_, center) = cell.world.markers[4];
    let mapped = h.apply_point(cell.world.project(center, &cell.world.home));
    assert!((mapped - center).norm() < 1.0);
}

#[test]
fn start_with_matching_dispenses_on_the_detected_workpiece() {
    let mut cell = Cell::new();
    cell.calibrate();
    let glue = cell.service.events().subscribe_glue_type();
    let before = cell.linear_moves().len();

    let response = cell.service.start(true);
    assert!(response.success, "{}", response.message);

    // Closed outline: four corners plus the repeated first one
    let moves = cell.linear_moves();
    assert_eq!(moves.len() - before, 4);

    let corners = cell.workpiece_mm.points();
    for pose in &moves[before..] {
        let z = WORKPIECE_HEIGHT_MM + cell.settings.glue.spray_height_mm;
        assert_abs_diff_eq!(pose.z, z, epsilon = 1e-6);
        let nearest = corners
            .iter()
            .map(|c| (Point2::new(pose.x, pose.y) - c).norm())
            .fold(f64::INFINITY, f64::min);
        assert!(nearest < 1.0, "pose {pose:?} is {nearest:.2} mm from any corner");
    }

    let regs = &cell.settings.hardware.registers;
    assert_eq!(cell.bus.register_writes(regs.motor_speed_base), vec![500, 300, 0]);
    assert_eq!(cell.bus.register(regs.fan_speed), 100);
    assert_eq!(glue.try_recv().as_deref(), Some("Type A"));
}

#[test]
fn start_without_matching_uses_template_geometry() {
    let mut cell = Cell::new();
    cell.calibrate();
    let before = cell.linear_moves().len();

    let response = cell.service.start(false);
    assert!(response.success, "{}", response.message);

    let unrotated = rectangle(60.0, 30.0, Point2::new(310.0, 10.0));
    let first = cell
        .robot
        .commands()
        .into_iter()
        .rev()
        .find_map(|c| match c {
            RobotCommand::MoveTo(p) => Some(p),
            _ => None,
        })
        .unwrap();
    assert!(unrotated
        .points()
        .iter()
        .any(|c| (Point2::new(first.x, first.y) - c).norm() < 1.0));
    assert_eq!(cell.linear_moves().len() - before, 4);
}

#[test]
fn create_workpiece_measures_the_largest_contour() {
    let mut cell = Cell::new();
    cell.calibrate();

    let result = cell.service.create_workpiece();
    assert!(result.response.success, "{}", result.response.message);
    let capture = result.capture.unwrap();

    let ppm = cell.world.ppm;
    assert_abs_diff_eq!(capture.contour_area, 60.0 * 30.0 * ppm * ppm, epsilon = 1.0);
    assert_abs_diff_eq!(capture.scale_factor, 1.0 / ppm, epsilon = 0.01);
    assert_abs_diff_eq!(capture.height_mm, WORKPIECE_HEIGHT_MM);
    assert_eq!(capture.raw_contours.len(), 1);
}

#[test]
fn pick_and_place_moves_the_workpiece_with_vacuum() {
    let mut cell = Cell::new();
    cell.calibrate();

    let response = cell.service.pick_and_place();
    assert!(response.success, "{}", response.message);

    let coil = cell.settings.hardware.registers.vacuum_coil;
    assert_eq!(cell.bus.coil_writes(coil), vec![true, false]);
}

#[test]
fn manual_calibration_fits_after_every_fiducial() {
    let mut cell = Cell::new();
    let response = cell.service.move_to_calibration_pose();
    assert!(response.success, "{}", response.message);

    let unknown = cell.service.save_calibration_point(42);
    assert!(!unknown.success);

    let markers = cell.world.markers.clone();
    let mut last = None;
    for (id, w) in &markers {
        // Operator jogs the tool onto the fiducial
        let pose = Pose6 {
            x: w.x,
            y: w.y,
            ..cell.world.home
        };
        cell.robot.move_to(&pose, &MotionParams::default()).unwrap();
        last = Some(cell.service.save_calibration_point(*id));
    }

    let last = last.unwrap();
    assert!(last.success, "{}", last.message);
    assert!(last.message.contains("homography updated"));
    assert!(cell.service.camera_to_robot().is_some());
    // Intrinsics were never calibrated
    assert!(!cell.service.is_calibrated());
}

#[test]
fn jog_and_stop() {
    let mut cell = Cell::new();
    let start = cell.robot.pose();

    assert!(cell.service.jog(JogAxis::Z, JogDirection::Minus).success);
    assert_abs_diff_eq!(cell.robot.pose().z, start.z - cell.settings.robot.jog_step_mm);

    let response = cell.service.stop();
    assert!(response.success);
    assert_eq!(cell.robot.commands().last(), Some(&RobotCommand::Stop));
}
