//! Pick-and-place sequencing
//!
//! Items are packed onto the placement plane first, so a plane overflow is
//! reported before the arm moves. Each item then runs as a pick path and a
//! place path through the motion controller with the vacuum gripper,
//! preceded by a tool change whenever the item needs a different gripper.

use cell_math::Homography;
use hardware::Pose6;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use tracing::info;
use workpiece::{AlignedWorkpiece, PathAction, RobotPath, SegmentSettings};

use crate::{MotionError, NoTool, RobotMotionController, RowPacker, ToolActuator, ToolChanger};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickAndPlaceConfig {
    /// Robot z of the pick and place surfaces
    pub plane_z_mm: f64,
    /// Height above the grasp pose for approach and retreat
    pub approach_mm: f64,
    /// Velocity and acceleration of pick and place moves
    pub velocity: f64,
    pub acceleration: f64,
}

impl Default for PickAndPlaceConfig {
    fn default() -> Self {
        Self {
            plane_z_mm: 0.0,
            approach_mm: 50.0,
            velocity: 30.0,
            acceleration: 30.0,
        }
    }
}

/// A workpiece to move, in robot coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct PickItem {
    pub label: String,
    /// Grasp position on the top face
    pub center: Point2<f64>,
    pub rz_deg: f64,
    pub width_mm: f64,
    pub depth_mm: f64,
    pub height_mm: f64,
    pub gripper_id: Option<u32>,
}

impl PickItem {
    /// Item for an aligned workpiece, using the homography to find its
    /// centroid and robot-space footprint.
    pub fn from_aligned(aligned: &AlignedWorkpiece, homography: &Homography) -> Self {
        let template = &aligned.template;
        let outline = homography.apply(&template.outline.to_xy());
        let (mut min, mut max) = ([f64::MAX; 2], [f64::MIN; 2]);
        for p in &outline {
            for axis in 0..2 {
                min[axis] = min[axis].min(p[axis]);
                max[axis] = max[axis].max(p[axis]);
            }
        }
        Self {
            label: format!("workpiece {}", template.id),
            center: homography.apply_point(template.outline.centroid()),
            rz_deg: aligned.orientation_deg,
            width_mm: max[0] - min[0],
            depth_mm: max[1] - min[1],
            height_mm: template.height_mm,
            gripper_id: template.gripper_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PickPlaceReport {
    pub placed: usize,
    pub tool_changes: usize,
}

pub struct PickAndPlaceRunner {
    packer: RowPacker,
    changer: ToolChanger,
    config: PickAndPlaceConfig,
}

impl PickAndPlaceRunner {
    pub fn new(packer: RowPacker, changer: ToolChanger, config: PickAndPlaceConfig) -> Self {
        Self {
            packer,
            changer,
            config,
        }
    }

    pub fn tool_changer(&self) -> &ToolChanger {
        &self.changer
    }

    /// Empty the placement plane. The mounted gripper is kept.
    pub fn clear_plane(&mut self) {
        self.packer.reset();
    }

    /// Pick and place paths for every item, packing them on the plane.
    pub fn plan(&mut self, items: &[PickItem]) -> Result<Vec<Vec<RobotPath>>, MotionError> {
        items
            .iter()
            .map(|item| {
                if let Some(g) = item.gripper_id {
                    if !self.changer.knows(g) {
                        return Err(MotionError::UnknownGripper(g));
                    }
                }
                let target = self.packer.place(item.width_mm, item.depth_mm)?;
                self.item_paths(item, target)
            })
            .collect()
    }

    /// Move every item, changing grippers between items as needed.
    pub fn run(
        &mut self,
        items: &[PickItem],
        controller: &mut RobotMotionController,
        gripper: &dyn ToolActuator,
    ) -> Result<PickPlaceReport, MotionError> {
        let plans = self.plan(items)?;
        let mut report = PickPlaceReport::default();

        for (item, paths) in items.iter().zip(plans) {
            if let Some(g) = item.gripper_id {
                if let Some(change) = self.changer.plan_change(g)? {
                    controller.execute(change.paths.clone(), &NoTool)?;
                    self.changer.complete(&change);
                    report.tool_changes += 1;
                }
            }

            controller.execute(paths, gripper)?;
            report.placed += 1;
            info!("Placed '{}' ({}/{})", item.label, report.placed, items.len());
        }
        Ok(report)
    }

    fn item_paths(
        &self,
        item: &PickItem,
        target: Point2<f64>,
    ) -> Result<Vec<RobotPath>, MotionError> {
        let top = self.config.plane_z_mm + item.height_mm;
        let grasp = Pose6::new(item.center.x, item.center.y, top, 180.0, 0.0, item.rz_deg);
        let drop = Pose6::new(target.x, target.y, top, 180.0, 0.0, 0.0);
        let lift = Pose6::translation(0.0, 0.0, self.config.approach_mm);

        let settings = SegmentSettings {
            velocity: self.config.velocity,
            acceleration: self.config.acceleration,
            ..SegmentSettings::default()
        };
        let pick = RobotPath::new(
            format!("pick {}", item.label),
            vec![grasp.offset_by(&lift), grasp],
            settings.clone(),
            PathAction::Pick,
        )?;
        let place = RobotPath::new(
            format!("place {}", item.label),
            vec![grasp.offset_by(&lift), drop.offset_by(&lift), drop],
            settings,
            PathAction::Place,
        )?;
        Ok(vec![pick, place])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{KinematicConfig, KinematicMonitor, MotionConfig, VacuumGripper};
    use approx::assert_abs_diff_eq;
    use hardware::modbus::MockTransport;
    use hardware::robot::{MockRobot, RobotCommand};
    use hardware::{ActuatorSet, HardwareConfig, ModbusClient};
    use std::sync::Arc;

    fn make_item(label: &str, gripper: Option<u32>) -> PickItem {
        PickItem {
            label: label.to_string(),
            center: Point2::new(300.0, 0.0),
            rz_deg: 15.0,
            width_mm: 40.0,
            depth_mm: 30.0,
            height_mm: 5.0,
            gripper_id: gripper,
        }
    }

    fn make_runner() -> PickAndPlaceRunner {
        let changer = ToolChanger::new(40.0, SegmentSettings::default())
            .with_slot(1, Pose6::new(500.0, 300.0, 20.0, 180.0, 0.0, 0.0))
            .with_slot(2, Pose6::new(550.0, 300.0, 20.0, 180.0, 0.0, 0.0));
        PickAndPlaceRunner::new(
            RowPacker::new(Point2::new(0.0, 200.0), 100.0, 100.0, 10.0),
            changer,
            PickAndPlaceConfig::default(),
        )
    }

    #[test]
    fn test_plan_paths_and_packing() {
        let mut runner = make_runner();
        let plans = runner
            .plan(&[make_item("a", None), make_item("b", None)])
            .unwrap();

        assert_eq!(plans.len(), 2);
        let [pick, place] = &plans[0][..] else {
            panic!("expected pick and place paths");
        };
        assert_eq!(pick.action, PathAction::Pick);
        assert_abs_diff_eq!(pick.last().z, 5.0);
        assert_abs_diff_eq!(pick.last().rz, 15.0);
        assert_eq!(place.action, PathAction::Place);
        assert_abs_diff_eq!(place.last().x, 20.0);
        assert_abs_diff_eq!(place.last().y, 215.0);
        assert_abs_diff_eq!(plans[1][1].last().x, 70.0);
    }

    #[test]
    fn test_plan_rejects_unknown_gripper() {
        let mut runner = make_runner();
        assert_eq!(
            runner.plan(&[make_item("a", Some(7))]).unwrap_err(),
            MotionError::UnknownGripper(7)
        );
    }

    #[test]
    fn test_run_changes_gripper_only_when_needed() {
        let robot = Arc::new(MockRobot::new(Pose6::new(300.0, 0.0, 200.0, 180.0, 0.0, 0.0)));
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
        let mut controller = RobotMotionController::new(robot.clone(), monitor, config);

        let mock = MockTransport::new();
        let hw = HardwareConfig::default();
        let actuators = Arc::new(ActuatorSet::new(
            ModbusClient::new(Box::new(mock.clone()), hw.slave_id),
            &hw,
        ));
        let gripper = VacuumGripper::new(actuators);

        let mut runner = make_runner();
        let items = [
            make_item("a", Some(1)),
            make_item("b", Some(1)),
            make_item("c", Some(2)),
        ];
        let report = runner.run(&items, &mut controller, &gripper).unwrap();

        assert_eq!(report.placed, 3);
        assert_eq!(report.tool_changes, 2);
        assert_eq!(runner.tool_changer().mounted(), Some(2));
        assert_eq!(
            mock.coil_writes(hw.registers.vacuum_coil),
            vec![true, false, true, false, true, false]
        );
        assert!(robot.commands().iter().all(RobotCommand::is_motion));
    }
}
