use std::thread;
use std::time::Duration;

use tracing::info;

use super::ActuatorError;
use crate::config::RegisterMap;
use crate::modbus::ModbusClient;

/// Glue pump motors, one per channel.
pub struct GlueMotor {
    client: ModbusClient,
    speed_base: u16,
    reverse_base: u16,
    channels: u8,
}

impl GlueMotor {
    pub fn new(client: ModbusClient, registers: &RegisterMap, channels: u8) -> Self {
        Self {
            client,
            speed_base: registers.motor_speed_base,
            reverse_base: registers.motor_reverse_coil_base,
            channels,
        }
    }

    fn check(&self, channel: u8) -> Result<(), ActuatorError> {
        if channel >= self.channels {
            return Err(ActuatorError::InvalidChannel {
                channel,
                available: self.channels,
            });
        }
        Ok(())
    }

    fn speed_register(&self, channel: u8) -> u16 {
        self.speed_base + channel as u16
    }

    fn reverse_coil(&self, channel: u8) -> u16 {
        self.reverse_base + channel as u16
    }

    /// Run `channel` forward at `speed`.
    pub fn on(&self, channel: u8, speed: u16) -> Result<(), ActuatorError> {
        self.check(channel)?;
        info!("Glue motor {channel} on at speed {speed}");
        self.client.write_coil(self.reverse_coil(channel), false)?;
        self.client.write_register(self.speed_register(channel), speed)?;
        Ok(())
    }

    /// Stop `channel`, first pulling glue back at `reverse_speed` for
    /// `reverse_duration` to prevent dripping. A zero duration stops directly.
    pub fn off(
        &self,
        channel: u8,
        reverse_speed: u16,
        reverse_duration: Duration,
    ) -> Result<(), ActuatorError> {
        self.check(channel)?;
        if !reverse_duration.is_zero() && reverse_speed > 0 {
            info!(
                "Glue motor {channel} reversing at {reverse_speed} for {:?}",
                reverse_duration
            );
            self.client.write_coil(self.reverse_coil(channel), true)?;
            self.client
                .write_register(self.speed_register(channel), reverse_speed)?;
            thread::sleep(reverse_duration);
        }
        self.client.write_register(self.speed_register(channel), 0)?;
        self.client.write_coil(self.reverse_coil(channel), false)?;
        info!("Glue motor {channel} off");
        Ok(())
    }

    /// Current commanded speed of `channel`.
    pub fn speed(&self, channel: u8) -> Result<u16, ActuatorError> {
        self.check(channel)?;
        let regs = self
            .client
            .read_holding_registers(self.speed_register(channel), 1)?;
        Ok(regs.first().copied().unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modbus::MockTransport;

    fn make_motor() -> (GlueMotor, MockTransport) {
        let mock = MockTransport::new();
        let client = ModbusClient::new(Box::new(mock.clone()), 1);
        (GlueMotor::new(client, &RegisterMap::default(), 4), mock)
    }

    #[test]
    fn test_on_sets_speed() {
        let (motor, mock) = make_motor();
        motor.on(2, 1500).unwrap();
        assert_eq!(mock.register(2), 1500);
        assert_eq!(motor.speed(2).unwrap(), 1500);
    }

    #[test]
    fn test_off_reverses_then_stops() {
        let (motor, mock) = make_motor();
        motor.on(1, 900).unwrap();
        motor.off(1, 300, Duration::from_millis(5)).unwrap();

        assert_eq!(mock.register_writes(1), vec![900, 300, 0]);
        assert_eq!(mock.coil_writes(1), vec![false, true, false]);
    }

    #[test]
    fn test_off_without_reverse() {
        let (motor, mock) = make_motor();
        motor.off(0, 300, Duration::ZERO).unwrap();
        assert_eq!(mock.register_writes(0), vec![0]);
    }

    #[test]
    fn test_invalid_channel() {
        let (motor, mock) = make_motor();
        assert_eq!(
            motor.on(4, 10),
            Err(ActuatorError::InvalidChannel {
                channel: 4,
                available: 4
            })
        );
        assert_eq!(mock.transaction_count(), 0);
    }
}
