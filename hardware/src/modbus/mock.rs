//! In-memory Modbus device for testing
//!
//! Decodes each request, applies it to a register/coil file and answers with
//! a well-formed reply. Faults can be queued to make individual transactions
//! time out, fail or come back with a corrupted checksum. All slave addresses
//! share one register file.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use super::frame::{encode_response, Request};
use super::{ModbusError, Transport};

#[derive(Debug, Clone)]
enum Fault {
    /// Transaction fails before reaching the device
    Error(ModbusError),
    /// Device executes the request but the reply CRC is corrupted
    CorruptReply,
}

#[derive(Default)]
struct MockState {
    registers: HashMap<u16, u16>,
    coils: HashMap<u16, bool>,
    faults: VecDeque<Fault>,
    requests: Vec<(u8, Request)>,
}

/// Scriptable in-memory transport. Clones share state.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next transaction with `error`.
    pub fn inject_fault(&self, error: ModbusError) {
        self.state
            .lock()
            .unwrap()
            .faults
            .push_back(Fault::Error(error));
    }

    /// Execute the next request but corrupt its reply checksum.
    pub fn corrupt_next_reply(&self) {
        self.state
            .lock()
            .unwrap()
            .faults
            .push_back(Fault::CorruptReply);
    }

    pub fn register(&self, address: u16) -> u16 {
        self.state
            .lock()
            .unwrap()
            .registers
            .get(&address)
            .copied()
            .unwrap_or(0)
    }

    pub fn set_register(&self, address: u16, value: u16) {
        self.state.lock().unwrap().registers.insert(address, value);
    }

    pub fn coil(&self, address: u16) -> bool {
        self.state
            .lock()
            .unwrap()
            .coils
            .get(&address)
            .copied()
            .unwrap_or(false)
    }

    /// Every request seen so far, including failed attempts.
    pub fn requests(&self) -> Vec<(u8, Request)> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn transaction_count(&self) -> usize {
        self.state.lock().unwrap().requests.len()
    }

    /// Values written to `address`, in order.
    pub fn register_writes(&self, address: u16) -> Vec<u16> {
        self.requests()
            .into_iter()
            .filter_map(|(_, r)| match r {
                Request::WriteSingleRegister { address: a, value } if a == address => Some(value),
                _ => None,
            })
            .collect()
    }

    /// Values written to coil `address`, in order.
    pub fn coil_writes(&self, address: u16) -> Vec<bool> {
        self.requests()
            .into_iter()
            .filter_map(|(_, r)| match r {
                Request::WriteSingleCoil { address: a, value } if a == address => Some(value),
                _ => None,
            })
            .collect()
    }
}

impl MockState {
    fn apply(&mut self, request: &Request) -> (Vec<bool>, Vec<u16>) {
        match request {
            Request::ReadCoils { address, count } => (
                (0..*count)
                    .map(|i| {
                        self.coils
                            .get(&address.wrapping_add(i))
                            .copied()
                            .unwrap_or(false)
                    })
                    .collect(),
                vec![],
            ),
            Request::ReadHoldingRegisters { address, count } => (
                vec![],
                (0..*count)
                    .map(|i| {
                        self.registers
                            .get(&address.wrapping_add(i))
                            .copied()
                            .unwrap_or(0)
                    })
                    .collect(),
            ),
            Request::WriteSingleCoil { address, value } => {
                self.coils.insert(*address, *value);
                (vec![], vec![])
            }
            Request::WriteSingleRegister { address, value } => {
                self.registers.insert(*address, *value);
                (vec![], vec![])
            }
            Request::WriteMultipleRegisters { address, values } => {
                for (i, v) in values.iter().enumerate() {
                    self.registers.insert(address.wrapping_add(i as u16), *v);
                }
                (vec![], vec![])
            }
        }
    }
}

impl Transport for MockTransport {
    fn transact(&mut self, request: &[u8], _expected_len: usize) -> Result<Vec<u8>, ModbusError> {
        let (slave, decoded) = Request::decode(request)?;
        let mut state = self.state.lock().unwrap();
        state.requests.push((slave, decoded.clone()));

        let fault = state.faults.pop_front();
        if let Some(Fault::Error(e)) = fault {
            return Err(e);
        }

        let (coils, registers) = state.apply(&decoded);
        let mut reply = encode_response(slave, &decoded, &coils, &registers);
        if let Some(Fault::CorruptReply) = fault {
            if let Some(last) = reply.last_mut() {
                *last ^= 0xFF;
            }
        }
        Ok(reply)
    }
}
