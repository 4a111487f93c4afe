//! Hardware access for the glue dispensing cell.
//!
//! - [`modbus`] - serialized Modbus RTU bus with the write-retry policy
//! - [`actuators`] - glue motor, fan, generator and vacuum on that bus
//! - [`robot`] - robot arm command interface and pose types
//! - [`config`] - bus and register configuration

pub mod actuators;
pub mod config;
pub mod modbus;
pub mod robot;

pub use actuators::{ActuatorError, Fan, Generator, GlueMotor, VacuumPump};
pub use config::{HardwareConfig, HardwareConfigError, RegisterMap};
pub use modbus::{ModbusClient, ModbusError, WriteOutcome};
pub use robot::{MotionParams, Pose6, PoseSource, RobotError, RobotInterface};

/// All actuators of one dispensing station, sharing one bus.
pub struct ActuatorSet {
    pub motor: GlueMotor,
    pub fan: Fan,
    pub generator: Generator,
    pub vacuum: VacuumPump,
    bus: ModbusClient,
}

impl ActuatorSet {
    /// Build every actuator on `client` according to `config`.
    pub fn new(client: ModbusClient, config: &HardwareConfig) -> Self {
        let regs = &config.registers;
        Self {
            motor: GlueMotor::new(client.clone(), regs, config.motor_channels),
            fan: Fan::new(client.clone(), regs.fan_speed),
            generator: Generator::new(
                client.clone(),
                regs.generator_coil,
                config.generator_idle_timeout(),
            ),
            vacuum: VacuumPump::new(client.clone(), regs.vacuum_coil),
            bus: client,
        }
    }

    /// The shared bus, for raw register access.
    pub fn bus(&self) -> &ModbusClient {
        &self.bus
    }

    /// Open the serial bus described by `config` and build the actuators.
    pub fn open(config: &HardwareConfig) -> Result<Self, ModbusError> {
        let transport = modbus::SerialTransport::open(&config.serial)?;
        Ok(Self::new(
            ModbusClient::new(Box::new(transport), config.slave_id),
            config,
        ))
    }
}
