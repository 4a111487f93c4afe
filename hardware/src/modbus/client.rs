//! Serialized Modbus client with the bus write-retry policy.

use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use super::frame::{decode_response, Request, Response};
use super::{ModbusError, Transport};

/// How a write completed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Acknowledged on the first attempt
    Acknowledged,
    /// Acknowledged on the single retry
    Retried,
    /// Reply failed its checksum; the write is assumed to have landed
    ChecksumIgnored,
}

/// Handle to one slave on the shared bus.
///
/// Cloning (or [`ModbusClient::for_slave`]) shares the same bus lock, so at
/// most one transaction is on the wire at any time.
#[derive(Clone)]
pub struct ModbusClient {
    bus: Arc<Mutex<Box<dyn Transport>>>,
    slave: u8,
}

impl ModbusClient {
    pub fn new(transport: Box<dyn Transport>, slave: u8) -> Self {
        Self {
            bus: Arc::new(Mutex::new(transport)),
            slave,
        }
    }

    /// A client for another slave address on the same bus.
    pub fn for_slave(&self, slave: u8) -> Self {
        Self {
            bus: Arc::clone(&self.bus),
            slave,
        }
    }

    pub fn slave(&self) -> u8 {
        self.slave
    }

    fn transact_locked(
        &self,
        bus: &mut Box<dyn Transport>,
        request: &Request,
    ) -> Result<Response, ModbusError> {
        let frame = request.encode(self.slave);
        let reply = bus.transact(&frame, request.response_len())?;
        decode_response(request, self.slave, &reply)
    }

    /// Single-attempt transaction.
    fn read(&self, request: &Request) -> Result<Response, ModbusError> {
        let mut bus = self.bus.lock().unwrap();
        self.transact_locked(&mut bus, request)
    }

    /// Write with at most one retry. The bus lock is held across the retry.
    fn write(&self, request: &Request) -> Result<WriteOutcome, ModbusError> {
        let mut bus = self.bus.lock().unwrap();

        let first = match self.transact_locked(&mut bus, request) {
            Ok(_) => return Ok(WriteOutcome::Acknowledged),
            Err(ModbusError::Checksum { computed, stored }) => {
                warn!(
                    "Slave {} write {:?}: crc 0x{computed:04X} != 0x{stored:04X}, accepting",
                    self.slave, request
                );
                return Ok(WriteOutcome::ChecksumIgnored);
            }
            Err(e) if e.is_retryable() => e,
            Err(e) => return Err(e),
        };

        warn!(
            "Slave {} write {:?} failed ({first}), retrying once",
            self.slave, request
        );

        match self.transact_locked(&mut bus, request) {
            Ok(_) => Ok(WriteOutcome::Retried),
            Err(ModbusError::Checksum { .. }) => {
                warn!(
                    "Slave {} retry reply failed checksum, accepting",
                    self.slave
                );
                Ok(WriteOutcome::ChecksumIgnored)
            }
            Err(e) => Err(e),
        }
    }

    pub fn read_holding_registers(
        &self,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>, ModbusError> {
        match self.read(&Request::ReadHoldingRegisters { address, count })? {
            Response::Registers(values) => Ok(values),
            other => Err(ModbusError::UnexpectedResponse(format!("{other:?}"))),
        }
    }

    pub fn read_coils(&self, address: u16, count: u16) -> Result<Vec<bool>, ModbusError> {
        match self.read(&Request::ReadCoils { address, count })? {
            Response::Coils(values) => Ok(values),
            other => Err(ModbusError::UnexpectedResponse(format!("{other:?}"))),
        }
    }

    pub fn write_register(&self, address: u16, value: u16) -> Result<WriteOutcome, ModbusError> {
        debug!("Slave {} register {address} <- {value}", self.slave);
        self.write(&Request::WriteSingleRegister { address, value })
    }

    pub fn write_registers(
        &self,
        address: u16,
        values: &[u16],
    ) -> Result<WriteOutcome, ModbusError> {
        debug!("Slave {} registers {address}.. <- {values:?}", self.slave);
        self.write(&Request::WriteMultipleRegisters {
            address,
            values: values.to_vec(),
        })
    }

    pub fn write_coil(&self, address: u16, value: bool) -> Result<WriteOutcome, ModbusError> {
        debug!("Slave {} coil {address} <- {value}", self.slave);
        self.write(&Request::WriteSingleCoil { address, value })
    }
}
