use tracing::info;

use super::ActuatorError;
use crate::modbus::ModbusClient;

/// Cooling fan with a percentage speed register.
pub struct Fan {
    client: ModbusClient,
    register: u16,
}

impl Fan {
    pub fn new(client: ModbusClient, register: u16) -> Self {
        Self { client, register }
    }

    /// Set fan speed in percent; values above 100 are clamped.
    pub fn on(&self, speed_percent: u16) -> Result<(), ActuatorError> {
        let speed = speed_percent.min(100);
        info!("Fan on at {speed}%");
        self.client.write_register(self.register, speed)?;
        Ok(())
    }

    pub fn off(&self) -> Result<(), ActuatorError> {
        info!("Fan off");
        self.client.write_register(self.register, 0)?;
        Ok(())
    }

    pub fn speed(&self) -> Result<u16, ActuatorError> {
        let regs = self.client.read_holding_registers(self.register, 1)?;
        Ok(regs.first().copied().unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modbus::MockTransport;

    #[test]
    fn test_speed_clamped() {
        let mock = MockTransport::new();
        let fan = Fan::new(ModbusClient::new(Box::new(mock.clone()), 1), 10);

        fan.on(250).unwrap();
        assert_eq!(fan.speed().unwrap(), 100);
        fan.off().unwrap();
        assert_eq!(mock.register(10), 0);
    }
}
