//! Request boundary of the glue dispensing cell.
//!
//! - [`settings`] - typed, validated cell configuration
//! - [`service`] - operator requests over the robot, camera and actuators
//! - [`response`] - structured request results

pub mod error;
pub mod response;
pub mod service;
pub mod settings;
pub mod templates;

pub use error::CellError;
pub use response::{CalibrateRobotResponse, CellResponse, CreateWorkpieceResponse, WorkpieceCapture};
pub use service::{CellDevices, GlueCellService, JogAxis, JogDirection};
pub use settings::{
    CellSettings, GlueSettings, MatchingConfig, PickPlaceSettings, RobotSettings, SettingsError,
    StorageConfig, ToolSlotSettings,
};
pub use templates::{JsonTemplateStore, TemplateStore};
