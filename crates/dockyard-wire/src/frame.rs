//! Frame header codec for multiplexed stdout/stderr streams.
//!
//! Every frame starts with an 8-byte header:
//!
//! ```text
//! +------+------+------+------+------+------+------+------+
//! | type |  0   |  0   |  0   |   payload length (u32 BE) |
//! +------+------+------+------+------+------+------+------+
//! ```
//!
//! followed by exactly `length` payload bytes. Type `1` is stdout, `2` is
//! stderr; anything else, or a nonzero reserved byte, is a protocol
//! violation.

use std::fmt;
use std::io::{self, Read};

use crate::error::FrameError;

/// Length of a frame header in bytes.
pub const HEADER_LEN: usize = 8;

/// Logical stream carried by a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StreamType {
    /// Primary output (type byte 1).
    Stdout = 1,
    /// Secondary output (type byte 2).
    Stderr = 2,
}

impl StreamType {
    /// Both stream types, in wire-value order.
    pub const ALL: [Self; 2] = [Self::Stdout, Self::Stderr];

    /// Wire value of this stream type.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }

    /// Parse a wire value.
    pub const fn from_byte(byte: u8) -> Result<Self, FrameError> {
        match byte {
            1 => Ok(Self::Stdout),
            2 => Ok(Self::Stderr),
            other => Err(FrameError::UnknownStreamType(other)),
        }
    }

    /// The sibling stream type.
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::Stdout => Self::Stderr,
            Self::Stderr => Self::Stdout,
        }
    }

    pub(crate) const fn index(self) -> usize {
        match self {
            Self::Stdout => 0,
            Self::Stderr => 1,
        }
    }

    /// Engine query parameter name for this stream.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Header with validated reserved bytes and an uninterpreted type byte.
///
/// Dedicated connections compare the type byte against a single expected
/// stream and report their own error, so they decode to this form first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawFrameHeader {
    /// Byte 0 as found on the wire.
    pub type_byte: u8,
    /// Payload length.
    pub length: u32,
}

impl RawFrameHeader {
    /// Decode a header, checking only the reserved bytes.
    pub fn decode(bytes: &[u8; HEADER_LEN]) -> Result<Self, FrameError> {
        let reserved = [bytes[1], bytes[2], bytes[3]];
        if reserved != [0, 0, 0] {
            return Err(FrameError::InvalidReserved(reserved));
        }
        Ok(Self {
            type_byte: bytes[0],
            length: u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        })
    }
}

/// A fully validated frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Logical stream of the payload.
    pub stream_type: StreamType,
    /// Payload length in bytes.
    pub length: u32,
}

impl FrameHeader {
    /// Create a header.
    #[must_use]
    pub const fn new(stream_type: StreamType, length: u32) -> Self {
        Self {
            stream_type,
            length,
        }
    }

    /// Encode into the 8-byte wire form.
    #[must_use]
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let len = self.length.to_be_bytes();
        [
            self.stream_type.as_byte(),
            0,
            0,
            0,
            len[0],
            len[1],
            len[2],
            len[3],
        ]
    }

    /// Decode and validate a header.
    ///
    /// Reserved bytes are checked before the type byte.
    pub fn decode(bytes: &[u8; HEADER_LEN]) -> Result<Self, FrameError> {
        let raw = RawFrameHeader::decode(bytes)?;
        Ok(Self {
            stream_type: StreamType::from_byte(raw.type_byte)?,
            length: raw.length,
        })
    }
}

/// Read the next 8 header bytes.
///
/// Returns `Ok(None)` when the reader is exhausted exactly at a header
/// boundary. A header cut short by end-of-stream is an `UnexpectedEof`
/// error: the connection died, the peer did not misbehave.
pub fn read_header<R: Read + ?Sized>(reader: &mut R) -> io::Result<Option<[u8; HEADER_LEN]>> {
    let mut buf = [0u8; HEADER_LEN];
    let mut filled = 0;
    while filled < HEADER_LEN {
        match reader.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("stream ended after {filled} of {HEADER_LEN} frame header bytes"),
                ));
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(Some(buf))
}

/// Read into `buf`, retrying interrupted reads.
pub(crate) fn read_retrying<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match reader.read(buf) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            other => return other,
        }
    }
}

pub(crate) fn truncated_payload(remaining: usize) -> io::Error {
    io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!("stream ended with {remaining} frame payload bytes outstanding"),
    )
}

/// Encode one complete frame (header followed by payload).
///
/// Payloads must fit the 32-bit length field.
#[must_use]
pub fn encode_frame(stream_type: StreamType, payload: &[u8]) -> Vec<u8> {
    debug_assert!(u32::try_from(payload.len()).is_ok());
    let header = FrameHeader::new(stream_type, payload.len() as u32);
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(&header.encode());
    out.extend_from_slice(payload);
    out
}
