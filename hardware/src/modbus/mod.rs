//! Modbus RTU bus access
//!
//! One physical RS-485 bus carries every actuator controller. All register
//! and coil traffic goes through a [`ModbusClient`], which serializes
//! transactions behind a single lock shared by every client cloned from it.

pub mod client;
pub mod crc;
pub mod frame;
pub mod mock;
pub mod transport;

use thiserror::Error;

pub use client::{ModbusClient, WriteOutcome};
pub use frame::{Request, Response};
pub use mock::MockTransport;
pub use transport::{Parity, SerialConfig, SerialTransport, Transport};

/// Errors raised on the actuation bus
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModbusError {
    /// No (complete) reply within the transport timeout
    #[error("bus timeout")]
    Timeout,

    /// Serial port I/O failure
    #[error("bus I/O error: {0}")]
    Io(String),

    /// Reply CRC did not match its contents
    #[error("checksum mismatch: computed 0x{computed:04X}, frame carries 0x{stored:04X}")]
    Checksum { computed: u16, stored: u16 },

    /// Device answered with a Modbus exception
    #[error("device exception 0x{code:02X} for function 0x{function:02X}")]
    Exception { function: u8, code: u8 },

    /// Reply did not fit the request
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Port could not be opened or configured
    #[error("serial port error: {0}")]
    Port(String),
}

impl ModbusError {
    /// Whether a failed write should be attempted again.
    ///
    /// Checksum errors are not retried: the device most likely executed the
    /// write and only the reply was corrupted.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ModbusError::Checksum { .. } | ModbusError::Port(_))
    }
}
