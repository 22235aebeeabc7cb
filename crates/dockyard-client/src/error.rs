//! Client error types.

use std::fmt;
use std::io;

use dockyard_wire::{FrameError, ImageRefError, ProgressError};
use thiserror::Error;

/// Failure kind, independent of the carried detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The engine has no such container.
    ContainerNotFound,
    /// The engine or registry has no such image.
    ImageNotFound,
    /// The engine answered HTTP 500. Other 5xx codes are
    /// [`UnexpectedResponse`](Self::UnexpectedResponse).
    Server,
    /// Frame or JSON grammar violated.
    Protocol,
    /// Connection-level failure.
    Transport,
    /// Status code outside the documented set.
    UnexpectedResponse,
    /// Pull reported a failure inside a successful response.
    PullFailed,
    /// Caller-supplied value rejected before any request was made.
    InvalidInput,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ContainerNotFound => "container not found",
            Self::ImageNotFound => "image not found",
            Self::Server => "server error",
            Self::Protocol => "protocol error",
            Self::Transport => "transport error",
            Self::UnexpectedResponse => "unexpected response",
            Self::PullFailed => "pull failed",
            Self::InvalidInput => "invalid input",
        };
        f.write_str(name)
    }
}

/// Docker Engine API client errors.
#[derive(Debug, Error)]
pub enum DockerError {
    /// Container not found.
    #[error("container not found: {id}")]
    ContainerNotFound {
        /// Container ID or name.
        id: String,
    },

    /// Image not found.
    #[error("image not found: {image}")]
    ImageNotFound {
        /// Image reference.
        image: String,
    },

    /// Engine answered HTTP 500.
    #[error("engine error (HTTP {status}): {message}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Message reported by the engine.
        message: String,
    },

    /// Response did not follow the wire protocol.
    #[error("protocol error: {message}")]
    Protocol {
        /// What was violated.
        message: String,
        /// Underlying decoding failure.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Connection to the engine failed.
    #[error("transport error: {message}")]
    Transport {
        /// Request or stage that failed.
        message: String,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },

    /// Status code outside the set documented for the operation.
    #[error("unexpected response (HTTP {status}): {message}")]
    UnexpectedResponse {
        /// HTTP status code.
        status: u16,
        /// Message reported by the engine.
        message: String,
    },

    /// Pull finished with an error event.
    #[error("pull of {image} failed: {message}")]
    PullFailed {
        /// Image reference.
        image: String,
        /// Error code from the terminal event, if any.
        code: Option<i64>,
        /// Error message from the terminal event.
        message: String,
    },

    /// Invalid argument or configuration.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl DockerError {
    /// The taxonomy tag of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ContainerNotFound { .. } => ErrorKind::ContainerNotFound,
            Self::ImageNotFound { .. } => ErrorKind::ImageNotFound,
            Self::Server { .. } => ErrorKind::Server,
            Self::Protocol { .. } => ErrorKind::Protocol,
            Self::Transport { .. } => ErrorKind::Transport,
            Self::UnexpectedResponse { .. } => ErrorKind::UnexpectedResponse,
            Self::PullFailed { .. } => ErrorKind::PullFailed,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
        }
    }

    /// Whether the target container or image does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::ContainerNotFound | ErrorKind::ImageNotFound
        )
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::ContainerNotFound { .. } | Self::ImageNotFound { .. } => Some(404),
            Self::Server { status, .. } | Self::UnexpectedResponse { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub(crate) fn transport(message: impl Into<String>, source: io::Error) -> Self {
        Self::Transport {
            message: message.into(),
            source,
        }
    }

    pub(crate) fn protocol(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Protocol {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Classify a failure while decoding a JSON response body.
    pub(crate) fn from_json(context: &str, err: serde_json::Error) -> Self {
        if err.is_io() {
            Self::transport(context, io::Error::from(err))
        } else {
            Self::protocol(context, err)
        }
    }

    /// Classify a failure while reading a stream body.
    pub(crate) fn from_io(context: &str, err: io::Error) -> Self {
        match FrameError::from_io(&err) {
            Some(frame) => Self::protocol(context, frame),
            None => Self::transport(context, err),
        }
    }
}

impl From<ImageRefError> for DockerError {
    fn from(err: ImageRefError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}

impl From<io::Error> for DockerError {
    /// Classify a failed read on an attach stream.
    fn from(err: io::Error) -> Self {
        Self::from_io("reading attached stream", err)
    }
}

impl From<ProgressError> for DockerError {
    fn from(err: ProgressError) -> Self {
        match err {
            ProgressError::Malformed(source) => Self::protocol("malformed pull progress", source),
            ProgressError::Io(source) => Self::transport("reading pull progress", source),
        }
    }
}

/// Result type for client operations.
pub type DockerResult<T> = std::result::Result<T, DockerError>;
