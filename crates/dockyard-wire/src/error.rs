//! Error types for the dockyard-wire crate.

use std::io;

use thiserror::Error;

use crate::frame::StreamType;

/// Errors raised while parsing or encoding image references.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageRefError {
    /// Input was empty.
    #[error("image reference input is empty")]
    Empty,

    /// Input did not match the reference grammar.
    #[error("invalid image reference {value:?}: {reason}")]
    InvalidFormat {
        /// The rejected input.
        value: String,
        /// Which part of the grammar was violated.
        reason: &'static str,
    },
}

impl ImageRefError {
    pub(crate) fn invalid(value: &str, reason: &'static str) -> Self {
        Self::InvalidFormat {
            value: value.to_string(),
            reason,
        }
    }
}

/// Violations of the stdout/stderr framing protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrameError {
    /// Header bytes 1..4 were not zero.
    #[error("frame header reserved bytes must be zero, got {0:?}")]
    InvalidReserved([u8; 3]),

    /// Header byte 0 named neither stdout nor stderr.
    #[error("unknown frame stream type {0}")]
    UnknownStreamType(u8),

    /// A dedicated connection delivered a frame for another stream.
    #[error("expected {expected} frame, got stream type {actual}")]
    UnexpectedStreamType {
        /// Stream type this connection was opened for.
        expected: StreamType,
        /// Type byte found on the wire.
        actual: u8,
    },
}

impl FrameError {
    /// Recover a framing violation carried inside an I/O error.
    ///
    /// Stream readers implement [`std::io::Read`], so protocol violations
    /// travel as `io::ErrorKind::InvalidData` errors wrapping a `FrameError`.
    pub fn from_io(err: &io::Error) -> Option<Self> {
        err.get_ref()
            .and_then(|inner| inner.downcast_ref::<Self>())
            .copied()
    }

    /// Wrap this violation in an `io::Error` of kind `InvalidData`.
    pub fn into_io(self) -> io::Error {
        io::Error::new(io::ErrorKind::InvalidData, self)
    }
}

/// Errors raised while decoding a pull-progress feed.
#[derive(Debug, Error)]
pub enum ProgressError {
    /// The body was not a sequence of well-formed JSON values.
    #[error("malformed progress stream: {0}")]
    Malformed(#[source] serde_json::Error),

    /// Reading the body failed.
    #[error("progress stream read failed: {0}")]
    Io(#[source] io::Error),
}

impl From<serde_json::Error> for ProgressError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_io() {
            Self::Io(err.into())
        } else {
            Self::Malformed(err)
        }
    }
}

/// Result type for image reference operations.
pub type ImageRefResult<T> = std::result::Result<T, ImageRefError>;
