//! Length-prefixed framing.
//!
//! Every frame is `opcode: u32 LE`, `length: u32 LE`, then `length` bytes of
//! JSON payload.

use crate::FrameError;
use serde::{Serialize, de::DeserializeOwned};

/// Size of the opcode + length header.
pub const HEADER_LEN: usize = 8;

/// Largest payload either side will accept.
pub const MAX_PAYLOAD_LEN: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Opcode {
    Handshake = 0,
    Frame = 1,
    Close = 2,
    Ping = 3,
    Pong = 4,
}

impl TryFrom<u32> for Opcode {
    type Error = FrameError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Opcode::Handshake),
            1 => Ok(Opcode::Frame),
            2 => Ok(Opcode::Close),
            3 => Ok(Opcode::Ping),
            4 => Ok(Opcode::Pong),
            other => Err(FrameError::UnknownOpcode(other)),
        }
    }
}

/// One opcode-tagged message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub opcode: Opcode,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(opcode: Opcode, payload: Vec<u8>) -> Self {
        Self { opcode, payload }
    }

    /// Build a frame whose payload is `value` as JSON.
    pub fn json<T: Serialize>(opcode: Opcode, value: &T) -> Result<Self, FrameError> {
        let payload = serde_json::to_vec(value)?;
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(FrameError::TooLarge(payload.len()));
        }
        Ok(Self { opcode, payload })
    }

    /// Decode the payload as JSON.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, FrameError> {
        Ok(serde_json::from_slice(&self.payload)?)
    }

    /// Serialize header and payload into one buffer.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + self.payload.len());
        buf.extend_from_slice(&(self.opcode as u32).to_le_bytes());
        buf.extend_from_slice(&(self.payload.len() as u32).to_le_bytes());
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// Parse a header into its opcode and payload length.
    pub fn parse_header(header: [u8; HEADER_LEN]) -> Result<(Opcode, usize), FrameError> {
        let [a, b, c, d, e, f, g, h] = header;
        let opcode = Opcode::try_from(u32::from_le_bytes([a, b, c, d]))?;
        let len = u32::from_le_bytes([e, f, g, h]) as usize;
        if len > MAX_PAYLOAD_LEN {
            return Err(FrameError::TooLarge(len));
        }
        Ok((opcode, len))
    }

    /// Decode one frame from the front of `buf`, returning it and the number
    /// of bytes consumed.
    pub fn decode(buf: &[u8]) -> Result<(Self, usize), FrameError> {
        let Some(header) = buf.first_chunk::<HEADER_LEN>() else {
            return Err(FrameError::Truncated {
                needed: HEADER_LEN,
                available: buf.len(),
            });
        };
        let (opcode, len) = Self::parse_header(*header)?;
        let total = HEADER_LEN + len;
        if buf.len() < total {
            return Err(FrameError::Truncated {
                needed: total,
                available: buf.len(),
            });
        }
        let payload = buf[HEADER_LEN..total].to_vec();
        Ok((Self { opcode, payload }, total))
    }
}
