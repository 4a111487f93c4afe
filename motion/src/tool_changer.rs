//! Gripper tool changer with slot occupancy
//!
//! Every gripper has a home slot. Changing tools drops the mounted gripper
//! into its (empty) slot and picks the requested one from its (occupied)
//! slot. Occupancy is only updated once the change motion succeeded.

use std::collections::BTreeMap;

use hardware::Pose6;
use tracing::info;
use workpiece::{PathAction, RobotPath, SegmentSettings};

use crate::MotionError;

/// Rack position of one gripper
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToolSlot {
    pub pose: Pose6,
    pub occupied: bool,
}

/// Motions for one tool change, applied with [`ToolChanger::complete`].
#[derive(Debug, Clone)]
pub struct ToolChangePlan {
    pub from: Option<u32>,
    pub to: u32,
    pub paths: Vec<RobotPath>,
}

#[derive(Debug, Clone)]
pub struct ToolChanger {
    slots: BTreeMap<u32, ToolSlot>,
    mounted: Option<u32>,
    approach_mm: f64,
    settings: SegmentSettings,
}

impl ToolChanger {
    pub fn new(approach_mm: f64, settings: SegmentSettings) -> Self {
        Self {
            slots: BTreeMap::new(),
            mounted: None,
            approach_mm,
            settings,
        }
    }

    /// Register a gripper's slot. The gripper starts in its slot.
    pub fn with_slot(mut self, gripper: u32, pose: Pose6) -> Self {
        self.slots.insert(
            gripper,
            ToolSlot {
                pose,
                occupied: true,
            },
        );
        self
    }

    pub fn mounted(&self) -> Option<u32> {
        self.mounted
    }

    pub fn slot(&self, gripper: u32) -> Option<&ToolSlot> {
        self.slots.get(&gripper)
    }

    pub fn knows(&self, gripper: u32) -> bool {
        self.slots.contains_key(&gripper)
    }

    /// Plan the motions to mount `gripper`. `None` if it is already mounted.
    pub fn plan_change(&self, gripper: u32) -> Result<Option<ToolChangePlan>, MotionError> {
        if self.mounted == Some(gripper) {
            return Ok(None);
        }
        let target = self
            .slots
            .get(&gripper)
            .ok_or(MotionError::UnknownGripper(gripper))?;
        if !target.occupied {
            return Err(MotionError::SlotEmpty(gripper));
        }

        let mut paths = Vec::with_capacity(2);
        if let Some(current) = self.mounted {
            let home = self
                .slots
                .get(&current)
                .ok_or(MotionError::UnknownGripper(current))?;
            if home.occupied {
                return Err(MotionError::SlotOccupied(current));
            }
            paths.push(self.dip_path(
                format!("drop gripper {current}"),
                &home.pose,
                PathAction::Place,
            )?);
        }
        paths.push(self.dip_path(
            format!("pick gripper {gripper}"),
            &target.pose,
            PathAction::Pick,
        )?);

        Ok(Some(ToolChangePlan {
            from: self.mounted,
            to: gripper,
            paths,
        }))
    }

    /// Record a successfully executed change.
    pub fn complete(&mut self, plan: &ToolChangePlan) {
        if let Some(from) = plan.from {
            if let Some(slot) = self.slots.get_mut(&from) {
                slot.occupied = true;
            }
        }
        if let Some(slot) = self.slots.get_mut(&plan.to) {
            slot.occupied = false;
        }
        self.mounted = Some(plan.to);
        info!("Tool changer: mounted gripper {} (was {:?})", plan.to, plan.from);
    }

    /// Approach above the slot, descend, and come back up.
    fn dip_path(
        &self,
        label: String,
        slot: &Pose6,
        action: PathAction,
    ) -> Result<RobotPath, MotionError> {
        let above = slot.offset_by(&Pose6::translation(0.0, 0.0, self.approach_mm));
        Ok(RobotPath::new(
            label,
            vec![above, *slot, above],
            self.settings.clone(),
            action,
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_changer() -> ToolChanger {
        ToolChanger::new(50.0, SegmentSettings::default())
            .with_slot(1, Pose6::new(0.0, 400.0, 10.0, 180.0, 0.0, 0.0))
            .with_slot(2, Pose6::new(100.0, 400.0, 10.0, 180.0, 0.0, 0.0))
    }

    #[test]
    fn test_first_mount_only_picks() {
        let mut changer = make_changer();
        let plan = changer.plan_change(1).unwrap().unwrap();
        assert_eq!(plan.paths.len(), 1);
        assert_eq!(plan.paths[0].action, PathAction::Pick);
        assert_eq!(plan.paths[0].first().z, 60.0);

        changer.complete(&plan);
        assert_eq!(changer.mounted(), Some(1));
        assert!(!changer.slot(1).unwrap().occupied);
        assert!(changer.plan_change(1).unwrap().is_none());
    }

    #[test]
    fn test_swap_drops_then_picks() {
        let mut changer = make_changer();
        let first = changer.plan_change(1).unwrap().unwrap();
        changer.complete(&first);

        let swap = changer.plan_change(2).unwrap().unwrap();
        assert_eq!(swap.paths.len(), 2);
        assert_eq!(swap.paths[0].label, "drop gripper 1");
        assert_eq!(swap.paths[1].label, "pick gripper 2");

        changer.complete(&swap);
        assert!(changer.slot(1).unwrap().occupied);
        assert!(!changer.slot(2).unwrap().occupied);
        assert_eq!(changer.mounted(), Some(2));
    }

    #[test]
    fn test_unknown_gripper() {
        assert_eq!(
            make_changer().plan_change(9).unwrap_err(),
            MotionError::UnknownGripper(9)
        );
    }

    #[test]
    fn test_uncommitted_plan_leaves_occupancy() {
        let changer = make_changer();
        let _ = changer.plan_change(2).unwrap();
        assert!(changer.slot(2).unwrap().occupied);
        assert_eq!(changer.mounted(), None);
    }
}
