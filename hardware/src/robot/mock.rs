//! Recording robot for tests and dry runs
//!
//! Moves complete instantly: the reported pose jumps to the commanded target.
//! Return codes can be scripted per command to exercise failure handling.

use std::collections::VecDeque;
use std::sync::Mutex;

use super::{check_code, MotionParams, Pose6, PoseSource, RobotError, RobotInterface};

/// A command received by [`MockRobot`]
#[derive(Debug, Clone, PartialEq)]
pub enum RobotCommand {
    MoveTo(Pose6),
    MoveLinear(Pose6),
    MoveRelative(Pose6),
    Stop,
}

impl RobotCommand {
    pub fn is_motion(&self) -> bool {
        !matches!(self, RobotCommand::Stop)
    }
}

#[derive(Default)]
struct MockRobotState {
    pose: Pose6,
    commands: Vec<RobotCommand>,
    scripted_codes: VecDeque<i32>,
    failing_reads: usize,
}

#[derive(Default)]
pub struct MockRobot {
    state: Mutex<MockRobotState>,
}

impl MockRobot {
    pub fn new(initial: Pose6) -> Self {
        Self {
            state: Mutex::new(MockRobotState {
                pose: initial,
                ..Default::default()
            }),
        }
    }

    /// Queue a return code for the next motion command (0 = success).
    pub fn push_result_code(&self, code: i32) {
        self.state.lock().unwrap().scripted_codes.push_back(code);
    }

    /// Make the next `count` pose reads fail.
    pub fn fail_next_reads(&self, count: usize) {
        self.state.lock().unwrap().failing_reads = count;
    }

    pub fn commands(&self) -> Vec<RobotCommand> {
        self.state.lock().unwrap().commands.clone()
    }

    pub fn motion_command_count(&self) -> usize {
        self.commands().iter().filter(|c| c.is_motion()).count()
    }

    pub fn pose(&self) -> Pose6 {
        self.state.lock().unwrap().pose
    }

    fn execute(
        &self,
        name: &'static str,
        command: RobotCommand,
        target: impl FnOnce(&Pose6) -> Pose6,
    ) -> Result<(), RobotError> {
        let mut state = self.state.lock().unwrap();
        state.commands.push(command);
        let code = state.scripted_codes.pop_front().unwrap_or(0);
        check_code(name, code)?;
        state.pose = target(&state.pose);
        Ok(())
    }
}

impl PoseSource for MockRobot {
    fn read_pose(&self) -> Result<Pose6, RobotError> {
        let mut state = self.state.lock().unwrap();
        if state.failing_reads > 0 {
            state.failing_reads -= 1;
            return Err(RobotError::Communication("scripted read failure".into()));
        }
        Ok(state.pose)
    }
}

impl RobotInterface for MockRobot {
    fn move_to(&self, target: &Pose6, _params: &MotionParams) -> Result<(), RobotError> {
        let t = *target;
        self.execute("move_to", RobotCommand::MoveTo(t), |_| t)
    }

    fn move_linear(&self, target: &Pose6, _params: &MotionParams) -> Result<(), RobotError> {
        let t = *target;
        self.execute("move_linear", RobotCommand::MoveLinear(t), |_| t)
    }

    fn move_relative(&self, delta: &Pose6, _params: &MotionParams) -> Result<(), RobotError> {
        let d = *delta;
        self.execute("move_relative", RobotCommand::MoveRelative(d), |p| {
            p.offset_by(&d)
        })
    }

    fn stop(&self) -> Result<(), RobotError> {
        self.state.lock().unwrap().commands.push(RobotCommand::Stop);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_move_updates_pose() {
        let robot = MockRobot::new(Pose6::default());
        let target = Pose6::new(100.0, 50.0, 300.0, 180.0, 0.0, 0.0);
        robot.move_to(&target, &MotionParams::default()).unwrap();
        assert_eq!(robot.read_pose().unwrap(), target);

        robot
            .move_relative(&Pose6::translation(1.0, 0.0, 0.0), &MotionParams::default())
            .unwrap();
        assert_eq!(robot.pose().x, 101.0);
    }

    #[test]
    fn test_scripted_failure_leaves_pose() {
        let robot = MockRobot::new(Pose6::default());
        robot.push_result_code(-2);
        let err = robot
            .move_linear(&Pose6::translation(5.0, 5.0, 5.0), &MotionParams::default())
            .unwrap_err();
        assert_eq!(
            err,
            RobotError::Rejected {
                command: "move_linear",
                code: -2
            }
        );
        assert_eq!(robot.pose(), Pose6::default());
        assert_eq!(robot.motion_command_count(), 1);
    }

    #[test]
    fn test_failing_reads() {
        let robot = MockRobot::new(Pose6::default());
        robot.fail_next_reads(1);
        assert!(robot.read_pose().is_err());
        assert!(robot.read_pose().is_ok());
    }
}
