//! Dispensing actuators on the Modbus controller board
//!
//! Thin domain operations composed from register and coil writes:
//! - [`GlueMotor`] - per-channel glue pump with reverse pulse on stop
//! - [`Fan`] - cooling fan speed
//! - [`Generator`] - heat generator with idle-timeout safety shutoff
//! - [`VacuumPump`] - gripper vacuum

mod fan;
mod generator;
mod glue_motor;
mod vacuum;

use thiserror::Error;

use crate::modbus::ModbusError;

pub use fan::Fan;
pub use generator::{Generator, UsageCounter};
pub use glue_motor::GlueMotor;
pub use vacuum::VacuumPump;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ActuatorError {
    #[error("bus error: {0}")]
    Bus(#[from] ModbusError),

    #[error("glue channel {channel} out of range (board has {available})")]
    InvalidChannel { channel: u8, available: u8 },

    #[error("no pump channel wired for glue type '{0}'")]
    UnknownGlueType(String),
}
