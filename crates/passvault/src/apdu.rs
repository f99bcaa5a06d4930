//! Command and response framing for the applet protocol.
//!
//! Commands carry a fixed five-byte header (CLA, INS, P1, P2, Lc) followed
//! by at most 255 payload bytes; anything larger is chunked by the caller,
//! never here. Responses are raw bytes terminated by a two-byte status
//! trailer. All multi-byte fields on the wire are big-endian and go through
//! [`read_u16_be`]/[`write_u16_be`].

use crate::constants::{CLA_PASSVAULT, SW_SUCCESS};
use crate::error::{Error, Result};

/// A command frame addressed to the card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandApdu {
    cla: u8,
    ins: u8,
    p1: u8,
    p2: u8,
    data: Vec<u8>,
    le: Option<u8>,
}

impl CommandApdu {
    /// Largest payload a single frame can carry.
    pub const MAX_PAYLOAD: usize = 255;

    /// Create a command with an empty payload.
    pub const fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: Vec::new(),
            le: None,
        }
    }

    /// Create an applet command with an empty payload.
    ///
    /// P1 and P2 are always zero in this protocol.
    pub const fn applet(ins: u8) -> Self {
        Self::new(CLA_PASSVAULT, ins, 0x00, 0x00)
    }

    /// Create an applet command carrying `data`.
    pub fn applet_with_data(ins: u8, data: impl Into<Vec<u8>>) -> Result<Self> {
        Self::applet(ins).with_data(data)
    }

    /// Attach a payload to the command.
    ///
    /// Fails with [`Error::PayloadTooLarge`] if `data` does not fit the
    /// single-byte length field.
    pub fn with_data(mut self, data: impl Into<Vec<u8>>) -> Result<Self> {
        let data = data.into();
        if data.len() > Self::MAX_PAYLOAD {
            return Err(Error::PayloadTooLarge(data.len()));
        }
        self.data = data;
        Ok(self)
    }

    /// Attach an expected-length byte to the command.
    pub const fn with_le(mut self, le: u8) -> Self {
        self.le = Some(le);
        self
    }

    /// The instruction byte.
    pub const fn ins(&self) -> u8 {
        self.ins
    }

    /// The command payload.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Serialize the frame.
    ///
    /// The length byte is always present, even for empty payloads; the
    /// applet's dispatcher expects a five-byte header.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(5 + self.data.len() + 1);
        bytes.push(self.cla);
        bytes.push(self.ins);
        bytes.push(self.p1);
        bytes.push(self.p2);
        bytes.push(self.data.len() as u8);
        bytes.extend_from_slice(&self.data);
        if let Some(le) = self.le {
            bytes.push(le);
        }
        bytes
    }
}

/// A response frame received from the card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseApdu {
    bytes: Vec<u8>,
}

impl ResponseApdu {
    /// Wrap raw response bytes.
    ///
    /// Fails if the response is shorter than the two-byte status trailer.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();
        if bytes.len() < 2 {
            return Err(Error::MalformedResponse(
                "response shorter than the status trailer",
            ));
        }
        Ok(Self { bytes })
    }

    /// The full response, trailer included.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The response data, trailer excluded.
    pub fn data(&self) -> &[u8] {
        &self.bytes[..self.bytes.len() - 2]
    }

    /// The two-byte status trailer as one word.
    pub fn status_word(&self) -> u16 {
        read_u16_be(&self.bytes, self.bytes.len() - 2)
    }

    /// Whether the card reported transport-level success.
    pub fn is_success(&self) -> bool {
        self.status_word() == SW_SUCCESS
    }

    /// The leading logical result byte, if the response carries data.
    pub fn result_code(&self) -> Option<u8> {
        self.data().first().copied()
    }
}

/// Check a raw response against one of the two recognized success shapes.
///
/// A control command succeeds with exactly `{0x90, 0x00}`
/// (`expected_len == 2`); a data-returning command acknowledged without data
/// succeeds with exactly `{0x01, 0x90, 0x00}` (`expected_len == 3`). Any
/// length or byte mismatch is a failure.
///
/// # Panics
///
/// Panics on any other `expected_len`; that is a programming error, not a
/// card behavior.
#[must_use]
pub fn is_success(response: &[u8], expected_len: usize) -> bool {
    if response.len() != expected_len {
        return false;
    }
    match expected_len {
        2 => response == [0x90, 0x00],
        3 => response == [0x01, 0x90, 0x00],
        other => panic!("is_success: unsupported expected length {other}"),
    }
}

/// Read a big-endian 16-bit field at `idx`.
///
/// # Panics
///
/// Panics if `buf` is shorter than `idx + 2`; callers check lengths first.
#[must_use]
pub fn read_u16_be(buf: &[u8], idx: usize) -> u16 {
    u16::from_be_bytes([buf[idx], buf[idx + 1]])
}

/// Write `value` as a big-endian 16-bit field at `idx`.
///
/// # Panics
///
/// Panics if `buf` is shorter than `idx + 2`.
pub fn write_u16_be(buf: &mut [u8], idx: usize, value: u16) {
    buf[idx..idx + 2].copy_from_slice(&value.to_be_bytes());
}
