//! Path execution state machine
//!
//! [`RobotMotionController::execute`] walks a queue of [`RobotPath`]s:
//!
//! ```text
//! Starting -> MovingToFirstPoint -> ExecutingPath -> TransitionBetweenPaths
//!    ^                                                      |
//!    +------------------------ next path -------------------+--> Completed
//! ```
//!
//! Any rejected command, settle timeout, tool failure or stop request moves
//! the machine to `Error` and no further commands are issued. There is no
//! automatic retreat or retry.

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread;

use hardware::{MotionParams, RobotInterface};
use tracing::{debug, error, info, warn};
use workpiece::RobotPath;

use crate::{
    transition, KinematicMonitor, MotionConfig, MotionError, MotionEvent, MotionState,
    StopSignal, ToolActuator,
};

/// Summary of a successful run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecutionReport {
    pub paths_completed: usize,
    pub poses_sent: usize,
}

pub struct RobotMotionController {
    robot: Arc<dyn RobotInterface>,
    monitor: Arc<KinematicMonitor>,
    config: MotionConfig,
    stop: StopSignal,
    state: MotionState,
    history: Vec<MotionState>,
}

impl RobotMotionController {
    pub fn new(
        robot: Arc<dyn RobotInterface>,
        monitor: Arc<KinematicMonitor>,
        config: MotionConfig,
    ) -> Self {
        Self {
            robot,
            monitor,
            config,
            stop: StopSignal::new(),
            state: MotionState::Starting,
            history: Vec::new(),
        }
    }

    /// Share an externally owned stop flag.
    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn state(&self) -> MotionState {
        self.state
    }

    /// States visited during the last `execute`, in order.
    pub fn history(&self) -> &[MotionState] {
        &self.history
    }

    pub fn config(&self) -> &MotionConfig {
        &self.config
    }

    pub fn monitor(&self) -> &KinematicMonitor {
        &self.monitor
    }

    /// Execute `paths` in order, actuating `tool` at path boundaries.
    pub fn execute(
        &mut self,
        paths: Vec<RobotPath>,
        tool: &dyn ToolActuator,
    ) -> Result<ExecutionReport, MotionError> {
        self.state = MotionState::Starting;
        self.history = vec![MotionState::Starting];

        info!(
            "Executing {} path(s) with tool '{}'",
            paths.len(),
            tool.name()
        );

        let mut queue: VecDeque<RobotPath> = paths.into();
        let mut report = ExecutionReport::default();

        while let Some(path) = queue.pop_front() {
            let issued = self.start_path(&path);
            self.advance(issued, tool)?;

            let reached = self.reach_first_point(&path, tool);
            self.advance(reached, tool)?;

            let finished = self.run_path(&path, tool, &mut report);
            self.advance(finished, tool)?;

            let event = if queue.is_empty() {
                MotionEvent::AllPathsDone
            } else {
                MotionEvent::NextPath
            };
            self.process_event(event);
        }

        if self.state == MotionState::Starting {
            self.process_event(MotionEvent::QueueEmpty);
        }
        info!(
            "All paths completed ({} paths, {} poses)",
            report.paths_completed, report.poses_sent
        );
        Ok(report)
    }

    /// Apply the outcome of one step; failures move the machine to `Error`.
    fn advance(
        &mut self,
        step: Result<MotionEvent, MotionError>,
        tool: &dyn ToolActuator,
    ) -> Result<(), MotionError> {
        match step {
            Ok(event) => {
                self.process_event(event);
                Ok(())
            }
            Err(e) => {
                error!("Path execution failed in {:?}: {e}", self.state);
                let event = if e == MotionError::Aborted {
                    MotionEvent::Abort
                } else {
                    MotionEvent::Fault
                };
                self.process_event(event);
                tool.abort();
                Err(e)
            }
        }
    }

    fn process_event(&mut self, event: MotionEvent) {
        match transition(self.state, event) {
            Some(next) => {
                debug!("{:?} --{:?}--> {:?}", self.state, event, next);
                self.state = next;
                self.history.push(next);
            }
            None => warn!("Invalid transition: {:?} in {:?}", event, self.state),
        }
    }

    fn check_stop(&self) -> Result<(), MotionError> {
        if self.stop.is_requested() {
            warn!("Stop requested, halting robot");
            if let Err(e) = self.robot.stop() {
                warn!("Robot stop command failed: {e}");
            }
            return Err(MotionError::Aborted);
        }
        Ok(())
    }

    fn params_for(&self, path: &RobotPath, blend_radius: f64) -> MotionParams {
        MotionParams {
            velocity: path.settings.velocity,
            acceleration: path.settings.acceleration,
            tool: self.config.tool_frame,
            user: self.config.user_frame,
            blend_radius,
        }
    }

    fn start_path(&self, path: &RobotPath) -> Result<MotionEvent, MotionError> {
        self.check_stop()?;

        debug!("Moving to start of '{}'", path.label);
        let params = self.params_for(path, 0.0);
        self.robot
            .move_to(path.first(), &params)
            .map_err(|source| MotionError::Robot {
                state: self.state,
                source,
            })?;
        Ok(MotionEvent::StartIssued)
    }

    fn reach_first_point(
        &self,
        path: &RobotPath,
        tool: &dyn ToolActuator,
    ) -> Result<MotionEvent, MotionError> {
        self.monitor.wait_settled_at(
            path.first(),
            self.config.reach_start_mm,
            self.config.stationary_timeout(),
            self.config.poll_interval(),
            &self.stop,
        )?;

        let warm_up = self.config.warm_up_delay();
        if !warm_up.is_zero() {
            debug!("Holding {:?} before actuation", warm_up);
            thread::sleep(warm_up);
        }

        self.check_stop()?;
        tool.on_path_start(path)?;
        Ok(MotionEvent::FirstPointReached)
    }

    fn run_path(
        &self,
        path: &RobotPath,
        tool: &dyn ToolActuator,
        report: &mut ExecutionReport,
    ) -> Result<MotionEvent, MotionError> {
        let poses = path.poses();
        for (i, pose) in poses.iter().enumerate().skip(1) {
            self.check_stop()?;
            // Blend into the next pose; stop exactly on the last one
            let blend = if i + 1 < poses.len() {
                self.config.blend_radius_mm
            } else {
                0.0
            };
            self.robot
                .move_linear(pose, &self.params_for(path, blend))
                .map_err(|source| MotionError::Robot {
                    state: self.state,
                    source,
                })?;
            report.poses_sent += 1;
        }
        report.poses_sent += 1;

        self.monitor.wait_settled_at(
            path.last(),
            self.config.reach_end_mm,
            self.config.stationary_timeout(),
            self.config.poll_interval(),
            &self.stop,
        )?;

        tool.on_path_end(path)?;
        report.paths_completed += 1;
        info!("Finished '{}' ({} poses)", path.label, poses.len());
        Ok(MotionEvent::PathFinished)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{KinematicConfig, NoTool};
    use hardware::robot::{MockRobot, RobotCommand};
    use hardware::{ActuatorError, Pose6};
    use std::sync::Mutex;
    use workpiece::{PathAction, SegmentSettings};

    fn make_controller(robot: Arc<MockRobot>) -> RobotMotionController {
        let kin = KinematicConfig {
            sample_period_ms: 2,
            ..KinematicConfig::default()
        };
        let monitor = Arc::new(KinematicMonitor::spawn(robot.clone(), kin, None));
        let config = MotionConfig {
            stationary_timeout_s: 2.0,
            poll_interval_ms: 1,
            ..MotionConfig::default()
        };
        RobotMotionController::new(robot, monitor, config)
    }

    fn make_path(label: &str, x0: f64, n: usize) -> RobotPath {
        let poses = (0..n)
            .map(|i| Pose6::new(x0 + 10.0 * i as f64, 0.0, 50.0, 180.0, 0.0, 0.0))
            .collect();
        RobotPath::new(label, poses, SegmentSettings::default(), PathAction::Dispense).unwrap()
    }

    #[derive(Default)]
    struct RecordingTool {
        events: Mutex<Vec<String>>,
        fail_start: bool,
    }

    impl ToolActuator for RecordingTool {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn on_path_start(&self, path: &RobotPath) -> Result<(), ActuatorError> {
            if self.fail_start {
                return Err(ActuatorError::UnknownGlueType("none".to_string()));
            }
            self.events.lock().unwrap().push(format!("start {}", path.label));
            Ok(())
        }

        fn on_path_end(&self, path: &RobotPath) -> Result<(), ActuatorError> {
            self.events.lock().unwrap().push(format!("end {}", path.label));
            Ok(())
        }

        fn abort(&self) {
            self.events.lock().unwrap().push("abort".to_string());
        }
    }

    #[test]
    fn test_executes_paths_in_order() {
        let robot = Arc::new(MockRobot::new(Pose6::default()));
        let mut controller = make_controller(robot.clone());
        let tool = RecordingTool::default();

        let report = controller
            .execute(vec![make_path("a", 0.0, 3), make_path("b", 100.0, 2)], &tool)
            .unwrap();

        assert_eq!(report.paths_completed, 2);
        assert_eq!(report.poses_sent, 5);
        assert_eq!(controller.state(), MotionState::Completed);
        assert_eq!(
            *tool.events.lock().unwrap(),
            vec!["start a", "end a", "start b", "end b"]
        );

        let commands = robot.commands();
        assert!(matches!(commands[0], RobotCommand::MoveTo(p) if p.x == 0.0));
        assert!(matches!(commands[3], RobotCommand::MoveTo(p) if p.x == 100.0));
        assert_eq!(commands.len(), 5);
    }

    #[test]
    fn test_empty_queue_completes() {
        let robot = Arc::new(MockRobot::new(Pose6::default()));
        let mut controller = make_controller(robot.clone());
        let report = controller.execute(vec![], &NoTool).unwrap();
        assert_eq!(report.paths_completed, 0);
        assert_eq!(
            controller.history(),
            &[MotionState::Starting, MotionState::Completed]
        );
        assert!(robot.commands().is_empty());
    }

    #[test]
    fn test_failure_mid_path_stops_commands() {
        let robot = Arc::new(MockRobot::new(Pose6::default()));
        // move_to ok, first linear ok, second linear rejected
        robot.push_result_code(0);
        robot.push_result_code(0);
        robot.push_result_code(-7);
        let mut controller = make_controller(robot.clone());
        let tool = RecordingTool::default();

        let err = controller
            .execute(vec![make_path("a", 0.0, 4), make_path("b", 100.0, 2)], &tool)
            .unwrap_err();

        assert!(matches!(
            err,
            MotionError::Robot {
                state: MotionState::ExecutingPath,
                ..
            }
        ));
        assert_eq!(controller.state(), MotionState::Error);
        assert_eq!(robot.motion_command_count(), 3);
        assert_eq!(*tool.events.lock().unwrap(), vec!["start a", "abort"]);
        let errors = controller
            .history()
            .iter()
            .filter(|s| **s == MotionState::Error)
            .count();
        assert_eq!(errors, 1);
    }

    #[test]
    fn test_tool_failure_is_fault() {
        let robot = Arc::new(MockRobot::new(Pose6::default()));
        let mut controller = make_controller(robot.clone());
        let tool = RecordingTool {
            fail_start: true,
            ..RecordingTool::default()
        };
        let err = controller
            .execute(vec![make_path("a", 0.0, 3)], &tool)
            .unwrap_err();
        assert!(matches!(err, MotionError::Tool(_)));
        assert_eq!(robot.motion_command_count(), 1);
    }

    #[test]
    fn test_stop_request_aborts() {
        let robot = Arc::new(MockRobot::new(Pose6::default()));
        let mut controller = make_controller(robot.clone());
        controller.stop_signal().request();

        let err = controller
            .execute(vec![make_path("a", 0.0, 3)], &NoTool)
            .unwrap_err();
        assert_eq!(err, MotionError::Aborted);
        assert_eq!(controller.state(), MotionState::Error);
        assert_eq!(robot.commands(), vec![RobotCommand::Stop]);
    }
}
