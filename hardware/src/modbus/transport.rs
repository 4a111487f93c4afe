//! Byte transports for Modbus RTU frames.

use std::io::{Read, Write};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serialport::SerialPort;
use tracing::debug;

use super::frame::{EXCEPTION_FLAG, EXCEPTION_FRAME_LEN};
use super::ModbusError;

/// Sends one request frame and returns the raw reply frame.
pub trait Transport: Send {
    /// Write `request` and read back a reply of `expected_len` bytes (or a
    /// shorter exception frame).
    fn transact(&mut self, request: &[u8], expected_len: usize) -> Result<Vec<u8>, ModbusError>;
}

/// Serial parity setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    None,
    Even,
    Odd,
}

impl From<Parity> for serialport::Parity {
    fn from(p: Parity) -> Self {
        match p {
            Parity::None => serialport::Parity::None,
            Parity::Even => serialport::Parity::Even,
            Parity::Odd => serialport::Parity::Odd,
        }
    }
}

/// Serial endpoint parameters for one bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Device path, e.g. `/dev/ttyUSB0`
    pub port: String,
    pub baud_rate: u32,
    pub parity: Parity,
    /// 1 or 2
    pub stop_bits: u8,
    /// Per-transaction read timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 115_200,
            parity: Parity::None,
            stop_bits: 1,
            timeout_ms: 200,
        }
    }
}

impl SerialConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.port.is_empty() {
            return Err("serial port path is empty".to_string());
        }
        if self.baud_rate == 0 {
            return Err("baud rate must be positive".to_string());
        }
        if !matches!(self.stop_bits, 1 | 2) {
            return Err(format!("stop bits must be 1 or 2, got {}", self.stop_bits));
        }
        if self.timeout_ms == 0 {
            return Err("timeout must be positive".to_string());
        }
        Ok(())
    }
}

/// Modbus RTU over a serial port.
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    /// Open and configure the serial port described by `config`.
    pub fn open(config: &SerialConfig) -> Result<Self, ModbusError> {
        config.validate().map_err(ModbusError::Port)?;
        let stop_bits = match config.stop_bits {
            2 => serialport::StopBits::Two,
            _ => serialport::StopBits::One,
        };
        let port = serialport::new(&config.port, config.baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(config.parity.into())
            .stop_bits(stop_bits)
            .timeout(config.timeout())
            .open()
            .map_err(|e| ModbusError::Port(format!("failed to open {}: {e}", config.port)))?;
        Ok(Self { port })
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), ModbusError> {
        self.port.read_exact(buf).map_err(|e| match e.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::UnexpectedEof => {
                ModbusError::Timeout
            }
            _ => ModbusError::Io(e.to_string()),
        })
    }
}

impl Transport for SerialTransport {
    fn transact(&mut self, request: &[u8], expected_len: usize) -> Result<Vec<u8>, ModbusError> {
        // Discard stale bytes from an earlier timed-out exchange.
        self.port
            .clear(serialport::ClearBuffer::Input)
            .map_err(|e| ModbusError::Io(e.to_string()))?;
        self.port
            .write_all(request)
            .map_err(|e| ModbusError::Io(e.to_string()))?;
        self.port
            .flush()
            .map_err(|e| ModbusError::Io(e.to_string()))?;

        let mut header = [0u8; 2];
        self.read_exact(&mut header)?;
        let total = if header[1] & EXCEPTION_FLAG != 0 {
            EXCEPTION_FRAME_LEN
        } else {
            expected_len
        };

        let mut reply = vec![0u8; total.max(2)];
        reply[..2].copy_from_slice(&header);
        self.read_exact(&mut reply[2..])?;
        debug!("modbus tx {:02X?} rx {:02X?}", request, reply);
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(SerialConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_stop_bits() {
        let config = SerialConfig {
            stop_bits: 3,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parity_deserializes_lowercase() {
        let p: Parity = serde_json::from_str("\"even\"").unwrap();
        assert_eq!(p, Parity::Even);
    }

    #[test]
    fn test_open_missing_port_fails() {
        let config = SerialConfig {
            port: "/dev/does-not-exist-glue-bus".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            SerialTransport::open(&config),
            Err(ModbusError::Port(_))
        ));
    }
}
