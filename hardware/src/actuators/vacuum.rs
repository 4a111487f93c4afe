use tracing::info;

use super::ActuatorError;
use crate::modbus::ModbusClient;

/// Vacuum pump feeding the suction gripper.
pub struct VacuumPump {
    client: ModbusClient,
    coil: u16,
}

impl VacuumPump {
    pub fn new(client: ModbusClient, coil: u16) -> Self {
        Self { client, coil }
    }

    pub fn on(&self) -> Result<(), ActuatorError> {
        info!("Vacuum on");
        self.client.write_coil(self.coil, true)?;
        Ok(())
    }

    pub fn off(&self) -> Result<(), ActuatorError> {
        info!("Vacuum off");
        self.client.write_coil(self.coil, false)?;
        Ok(())
    }

    pub fn is_on(&self) -> Result<bool, ActuatorError> {
        let coils = self.client.read_coils(self.coil, 1)?;
        Ok(coils.first().copied().unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modbus::MockTransport;

    #[test]
    fn test_toggle() {
        let mock = MockTransport::new();
        let pump = VacuumPump::new(ModbusClient::new(Box::new(mock), 1), 17);
        pump.on().unwrap();
        assert!(pump.is_on().unwrap());
        pump.off().unwrap();
        assert!(!pump.is_on().unwrap());
    }
}
