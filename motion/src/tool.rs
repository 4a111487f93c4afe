//! Tool actuation at path boundaries
//!
//! The controller calls [`ToolActuator::on_path_start`] once the arm has
//! settled on a path's first pose and [`ToolActuator::on_path_end`] once it
//! has settled on the last one. Actuation is tied to these boundaries, not to
//! timers.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use hardware::config::GlueChannel;
use hardware::{ActuatorError, ActuatorSet};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use workpiece::{PathAction, RobotPath};

use crate::EventBus;

pub trait ToolActuator: Send + Sync {
    fn name(&self) -> &'static str;

    fn on_path_start(&self, path: &RobotPath) -> Result<(), ActuatorError>;

    fn on_path_end(&self, path: &RobotPath) -> Result<(), ActuatorError>;

    /// Best-effort shutdown after a failed path.
    fn abort(&self) {}
}

/// Moves without actuation, e.g. tool changes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTool;

impl ToolActuator for NoTool {
    fn name(&self) -> &'static str {
        "none"
    }

    fn on_path_start(&self, _path: &RobotPath) -> Result<(), ActuatorError> {
        Ok(())
    }

    fn on_path_end(&self, _path: &RobotPath) -> Result<(), ActuatorError> {
        Ok(())
    }
}

/// Dispensing process values shared by every path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispenseSettings {
    /// Fan speed in percent
    pub fan_speed: u16,
    /// Forward pump speed
    pub motor_speed: u16,
    /// Pump speed of the anti-drip pull back
    pub reverse_speed: u16,
    /// Duration of the anti-drip pull back, in milliseconds
    pub reverse_duration_ms: u64,
    /// Delay between generator on and pump on, in milliseconds
    pub generator_to_glue_delay_ms: u64,
}

impl Default for DispenseSettings {
    fn default() -> Self {
        Self {
            fan_speed: 100,
            motor_speed: 500,
            reverse_speed: 300,
            reverse_duration_ms: 200,
            generator_to_glue_delay_ms: 0,
        }
    }
}

/// Glue dispensing: fan, heat generator and per-glue-type pump.
pub struct GlueDispenser {
    actuators: Arc<ActuatorSet>,
    channels: Vec<GlueChannel>,
    settings: DispenseSettings,
    events: Option<Arc<EventBus>>,
    active_channel: Mutex<Option<u8>>,
}

impl GlueDispenser {
    pub fn new(
        actuators: Arc<ActuatorSet>,
        channels: Vec<GlueChannel>,
        settings: DispenseSettings,
    ) -> Self {
        Self {
            actuators,
            channels,
            settings,
            events: None,
            active_channel: Mutex::new(None),
        }
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    fn channel_for(&self, glue_type: &str) -> Result<u8, ActuatorError> {
        self.channels
            .iter()
            .find(|g| g.glue_type == glue_type)
            .map(|g| g.channel)
            .ok_or_else(|| ActuatorError::UnknownGlueType(glue_type.to_string()))
    }
}

impl ToolActuator for GlueDispenser {
    fn name(&self) -> &'static str {
        "glue"
    }

    fn on_path_start(&self, path: &RobotPath) -> Result<(), ActuatorError> {
        if path.action != PathAction::Dispense {
            return Ok(());
        }
        let glue_type = &path.settings.glue_type;
        let channel = self.channel_for(glue_type)?;

        self.actuators.fan.on(self.settings.fan_speed)?;
        self.actuators.generator.turn_on()?;

        let delay = Duration::from_millis(self.settings.generator_to_glue_delay_ms);
        if !delay.is_zero() {
            thread::sleep(delay);
        }

        self.actuators.motor.on(channel, self.settings.motor_speed)?;
        *self.active_channel.lock().unwrap() = Some(channel);

        if let Some(events) = &self.events {
            events.publish_glue_type(glue_type);
        }
        info!("Dispensing '{glue_type}' on channel {channel} for '{}'", path.label);
        Ok(())
    }

    fn on_path_end(&self, path: &RobotPath) -> Result<(), ActuatorError> {
        let Some(channel) = self.active_channel.lock().unwrap().take() else {
            return Ok(());
        };
        self.actuators.motor.off(
            channel,
            self.settings.reverse_speed,
            Duration::from_millis(self.settings.reverse_duration_ms),
        )?;
        // Generator stays hot between paths; its idle monitor shuts it off
        self.actuators.generator.touch();
        info!("Dispensing stopped after '{}'", path.label);
        Ok(())
    }

    fn abort(&self) {
        if let Some(channel) = self.active_channel.lock().unwrap().take() {
            if let Err(e) = self.actuators.motor.off(channel, 0, Duration::ZERO) {
                warn!("Failed to stop glue motor {channel} after fault: {e}");
            }
        }
    }
}

/// Vacuum gripper for pick-and-place: grips at the end of pick paths and
/// releases at the end of place paths.
pub struct VacuumGripper {
    actuators: Arc<ActuatorSet>,
}

impl VacuumGripper {
    pub fn new(actuators: Arc<ActuatorSet>) -> Self {
        Self { actuators }
    }
}

impl ToolActuator for VacuumGripper {
    fn name(&self) -> &'static str {
        "vacuum"
    }

    fn on_path_start(&self, _path: &RobotPath) -> Result<(), ActuatorError> {
        Ok(())
    }

    fn on_path_end(&self, path: &RobotPath) -> Result<(), ActuatorError> {
        match path.action {
            PathAction::Pick => self.actuators.vacuum.on(),
            PathAction::Place => self.actuators.vacuum.off(),
            PathAction::Dispense => Ok(()),
        }
    }
}
