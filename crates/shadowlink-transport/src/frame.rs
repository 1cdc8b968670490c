//! Request/response frame header
//!
//! Every datagram starts with an 8-byte header followed by the body:
//!
//! ```text
//! byte 0    : reserved(3) | version(2) | op(3)
//! byte 1    : request flags, or the status code in a response
//! bytes 2-3 : body length (big-endian)
//! bytes 4-7 : token (big-endian), echoed by the responder
//! ```
//!
//! A request body is the UTF-8 target path; a response body is the raw
//! representation returned by the device.

use shadowlink_core::Status;

pub const HEADER_LEN: usize = 8;
pub const VERSION: u8 = 1;

/// Request flag: deliver without confirmation
pub const FLAG_LOW_PRIORITY: u8 = 0x01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Response,
    Retrieve,
}

impl Op {
    fn bits(self) -> u8 {
        match self {
            Op::Response => 0,
            Op::Retrieve => 1,
        }
    }

    fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(Op::Response),
            1 => Some(Op::Retrieve),
            _ => None,
        }
    }
}

/// Delivery priority of an outbound request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Priority {
    #[default]
    Low,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub op: Op,
    /// Flags for requests, status code for responses
    pub code: u8,
    pub body_len: u16,
    pub token: u32,
}

impl FrameHeader {
    pub fn request(op: Op, priority: Priority, body_len: u16, token: u32) -> Self {
        let code = match priority {
            Priority::Low => FLAG_LOW_PRIORITY,
            Priority::High => 0,
        };
        Self { op, code, body_len, token }
    }

    pub fn response(status: Status, body_len: u16, token: u32) -> Self {
        Self {
            op: Op::Response,
            code: status.0,
            body_len,
            token,
        }
    }

    pub fn status(&self) -> Status {
        Status(self.code)
    }

    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut header = [0u8; HEADER_LEN];
        header[0] = (VERSION << 3) | self.op.bits();
        header[1] = self.code;
        header[2..4].copy_from_slice(&self.body_len.to_be_bytes());
        header[4..8].copy_from_slice(&self.token.to_be_bytes());
        header
    }

    pub fn decode(data: &[u8]) -> Option<Self> {
        if data.len() < HEADER_LEN {
            return None;
        }
        if (data[0] >> 3) & 0x03 != VERSION {
            return None;
        }
        let op = Op::from_bits(data[0] & 0x07)?;
        Some(Self {
            op,
            code: data[1],
            body_len: u16::from_be_bytes([data[2], data[3]]),
            token: u32::from_be_bytes([data[4], data[5], data[6], data[7]]),
        })
    }
}

/// Header plus body as one datagram
pub fn encode_frame(header: &FrameHeader, body: &[u8]) -> Vec<u8> {
    let mut packet = Vec::with_capacity(HEADER_LEN + body.len());
    packet.extend_from_slice(&header.encode());
    packet.extend_from_slice(body);
    packet
}
