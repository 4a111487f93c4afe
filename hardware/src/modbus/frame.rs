//! Modbus RTU request/response framing
//!
//! Frame layout: `[slave][function][payload...][crc_lo][crc_hi]`.
//! Exception responses set the high bit of the function code and carry a
//! single exception code byte.

use super::crc::{append_crc, verify_crc};
use super::ModbusError;

pub const READ_COILS: u8 = 0x01;
pub const READ_HOLDING_REGISTERS: u8 = 0x03;
pub const WRITE_SINGLE_COIL: u8 = 0x05;
pub const WRITE_SINGLE_REGISTER: u8 = 0x06;
pub const WRITE_MULTIPLE_REGISTERS: u8 = 0x10;

/// Bit set on the function code of an exception response.
pub const EXCEPTION_FLAG: u8 = 0x80;

/// Length of an exception response including CRC.
pub const EXCEPTION_FRAME_LEN: usize = 5;

const COIL_ON: u16 = 0xFF00;

/// A single Modbus request
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    ReadCoils { address: u16, count: u16 },
    ReadHoldingRegisters { address: u16, count: u16 },
    WriteSingleCoil { address: u16, value: bool },
    WriteSingleRegister { address: u16, value: u16 },
    WriteMultipleRegisters { address: u16, values: Vec<u16> },
}

/// Decoded response payload
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Coils(Vec<bool>),
    Registers(Vec<u16>),
    /// Echo of a write: address and value (or register count for multi-writes)
    WriteAck { address: u16, value: u16 },
}

impl Request {
    pub fn function_code(&self) -> u8 {
        match self {
            Request::ReadCoils { .. } => READ_COILS,
            Request::ReadHoldingRegisters { .. } => READ_HOLDING_REGISTERS,
            Request::WriteSingleCoil { .. } => WRITE_SINGLE_COIL,
            Request::WriteSingleRegister { .. } => WRITE_SINGLE_REGISTER,
            Request::WriteMultipleRegisters { .. } => WRITE_MULTIPLE_REGISTERS,
        }
    }

    pub fn is_write(&self) -> bool {
        !matches!(
            self,
            Request::ReadCoils { .. } | Request::ReadHoldingRegisters { .. }
        )
    }

    /// Encode into a complete RTU frame with CRC.
    pub fn encode(&self, slave: u8) -> Vec<u8> {
        let mut frame = vec![slave, self.function_code()];
        match self {
            Request::ReadCoils { address, count }
            | Request::ReadHoldingRegisters { address, count } => {
                frame.extend_from_slice(&address.to_be_bytes());
                frame.extend_from_slice(&count.to_be_bytes());
            }
            Request::WriteSingleCoil { address, value } => {
                frame.extend_from_slice(&address.to_be_bytes());
                let v = if *value { COIL_ON } else { 0 };
                frame.extend_from_slice(&v.to_be_bytes());
            }
            Request::WriteSingleRegister { address, value } => {
                frame.extend_from_slice(&address.to_be_bytes());
                frame.extend_from_slice(&value.to_be_bytes());
            }
            Request::WriteMultipleRegisters { address, values } => {
                frame.extend_from_slice(&address.to_be_bytes());
                frame.extend_from_slice(&(values.len() as u16).to_be_bytes());
                frame.push((values.len() * 2) as u8);
                for v in values {
                    frame.extend_from_slice(&v.to_be_bytes());
                }
            }
        }
        append_crc(&mut frame);
        frame
    }

    /// Length of a successful response frame including CRC.
    pub fn response_len(&self) -> usize {
        match self {
            Request::ReadCoils { count, .. } => 5 + (*count as usize).div_ceil(8),
            Request::ReadHoldingRegisters { count, .. } => 5 + 2 * *count as usize,
            Request::WriteSingleCoil { .. }
            | Request::WriteSingleRegister { .. }
            | Request::WriteMultipleRegisters { .. } => 8,
        }
    }

    /// Parse a request frame, returning the slave id and request.
    pub fn decode(frame: &[u8]) -> Result<(u8, Request), ModbusError> {
        let payload = checked_payload(frame)?;
        if payload.len() < 6 {
            return Err(ModbusError::UnexpectedResponse(format!(
                "request too short: {} bytes",
                payload.len()
            )));
        }
        let slave = payload[0];
        let address = u16::from_be_bytes([payload[2], payload[3]]);
        let word = u16::from_be_bytes([payload[4], payload[5]]);

        let request = match payload[1] {
            READ_COILS => Request::ReadCoils {
                address,
                count: word,
            },
            READ_HOLDING_REGISTERS => Request::ReadHoldingRegisters {
                address,
                count: word,
            },
            WRITE_SINGLE_COIL => Request::WriteSingleCoil {
                address,
                value: word == COIL_ON,
            },
            WRITE_SINGLE_REGISTER => Request::WriteSingleRegister {
                address,
                value: word,
            },
            WRITE_MULTIPLE_REGISTERS => {
                let data = payload.get(7..).unwrap_or_default();
                if data.len() != 2 * word as usize {
                    return Err(ModbusError::UnexpectedResponse(format!(
                        "multi-write declares {word} registers but carries {} bytes",
                        data.len()
                    )));
                }
                Request::WriteMultipleRegisters {
                    address,
                    values: data
                        .chunks_exact(2)
                        .map(|c| u16::from_be_bytes([c[0], c[1]]))
                        .collect(),
                }
            }
            other => {
                return Err(ModbusError::UnexpectedResponse(format!(
                    "unsupported function code 0x{other:02X}"
                )))
            }
        };
        Ok((slave, request))
    }
}

fn checked_payload(frame: &[u8]) -> Result<&[u8], ModbusError> {
    verify_crc(frame).map_err(|(computed, stored)| ModbusError::Checksum { computed, stored })
}

/// Decode the response to `request` received from `slave`.
pub fn decode_response(
    request: &Request,
    slave: u8,
    frame: &[u8],
) -> Result<Response, ModbusError> {
    let payload = checked_payload(frame)?;
    if payload.len() < 3 {
        return Err(ModbusError::UnexpectedResponse(format!(
            "response too short: {} bytes",
            frame.len()
        )));
    }
    if payload[0] != slave {
        return Err(ModbusError::UnexpectedResponse(format!(
            "response from slave {} but expected {slave}",
            payload[0]
        )));
    }

    let function = request.function_code();
    if payload[1] == function | EXCEPTION_FLAG {
        return Err(ModbusError::Exception {
            function,
            code: payload[2],
        });
    }
    if payload[1] != function {
        return Err(ModbusError::UnexpectedResponse(format!(
            "function code 0x{:02X} does not match request 0x{function:02X}",
            payload[1]
        )));
    }

    match request {
        Request::ReadCoils { count, .. } => {
            let data = byte_counted(payload)?;
            Ok(Response::Coils(
                (0..*count as usize)
                    .map(|i| data.get(i / 8).is_some_and(|b| b & (1 << (i % 8)) != 0))
                    .collect(),
            ))
        }
        Request::ReadHoldingRegisters { count, .. } => {
            let data = byte_counted(payload)?;
            if data.len() != 2 * *count as usize {
                return Err(ModbusError::UnexpectedResponse(format!(
                    "expected {count} registers, got {} bytes",
                    data.len()
                )));
            }
            Ok(Response::Registers(
                data.chunks_exact(2)
                    .map(|c| u16::from_be_bytes([c[0], c[1]]))
                    .collect(),
            ))
        }
        _ => {
            if payload.len() != 6 {
                return Err(ModbusError::UnexpectedResponse(format!(
                    "write echo has {} bytes",
                    payload.len()
                )));
            }
            Ok(Response::WriteAck {
                address: u16::from_be_bytes([payload[2], payload[3]]),
                value: u16::from_be_bytes([payload[4], payload[5]]),
            })
        }
    }
}

fn byte_counted(payload: &[u8]) -> Result<&[u8], ModbusError> {
    let count = payload[2] as usize;
    payload.get(3..3 + count).ok_or_else(|| {
        ModbusError::UnexpectedResponse(format!(
            "byte count {count} exceeds payload of {} bytes",
            payload.len()
        ))
    })
}

/// Build the normal response frame a device would send for `request`.
///
/// `coils` / `registers` supply the data for read requests.
pub fn encode_response(slave: u8, request: &Request, coils: &[bool], registers: &[u16]) -> Vec<u8> {
    let mut frame = vec![slave, request.function_code()];
    match request {
        Request::ReadCoils { .. } => {
            let mut bytes = vec![0u8; coils.len().div_ceil(8)];
            for (i, on) in coils.iter().enumerate() {
                if *on {
                    bytes[i / 8] |= 1 << (i % 8);
                }
            }
            frame.push(bytes.len() as u8);
            frame.extend_from_slice(&bytes);
        }
        Request::ReadHoldingRegisters { .. } => {
            frame.push((registers.len() * 2) as u8);
            for r in registers {
                frame.extend_from_slice(&r.to_be_bytes());
            }
        }
        Request::WriteSingleCoil { address, value } => {
            frame.extend_from_slice(&address.to_be_bytes());
            let v = if *value { COIL_ON } else { 0 };
            frame.extend_from_slice(&v.to_be_bytes());
        }
        Request::WriteSingleRegister { address, value } => {
            frame.extend_from_slice(&address.to_be_bytes());
            frame.extend_from_slice(&value.to_be_bytes());
        }
        Request::WriteMultipleRegisters { address, values } => {
            frame.extend_from_slice(&address.to_be_bytes());
            frame.extend_from_slice(&(values.len() as u16).to_be_bytes());
        }
    }
    append_crc(&mut frame);
    frame
}

/// Build an exception response frame.
pub fn encode_exception(slave: u8, function: u8, code: u8) -> Vec<u8> {
    let mut frame = vec![slave, function | EXCEPTION_FLAG, code];
    append_crc(&mut frame);
    frame
}
