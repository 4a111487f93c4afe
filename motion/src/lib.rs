//! Trajectory execution for the glue cell.
//!
//! - [`controller`] - the path execution state machine driving the arm
//! - [`kinematics`] - background pose sampler classifying arm motion
//! - [`tool`] - glue and vacuum actuation at path boundaries
//! - [`pick_place`] - row packing, tool changes and pick/place sequencing
//! - [`events`] - typed topics for presentation collaborators

pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod kinematics;
pub mod packing;
pub mod pick_place;
pub mod state;
pub mod stop;
pub mod tool;
pub mod tool_changer;

pub use config::{KinematicConfig, MotionConfig};
pub use controller::{ExecutionReport, RobotMotionController};
pub use error::MotionError;
pub use events::{EventBus, TrajectoryPoint};
pub use kinematics::{KinematicEstimator, KinematicMonitor, KinematicSnapshot, KinematicState};
pub use packing::RowPacker;
pub use pick_place::{PickAndPlaceConfig, PickAndPlaceRunner, PickItem, PickPlaceReport};
pub use state::{transition, MotionEvent, MotionState};
pub use stop::StopSignal;
pub use tool::{DispenseSettings, GlueDispenser, NoTool, ToolActuator, VacuumGripper};
pub use tool_changer::{ToolChangePlan, ToolChanger, ToolSlot};
