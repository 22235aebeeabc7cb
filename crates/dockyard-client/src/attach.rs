//! Attach options and the streams an attach returns.

use std::io::{self, Read};

use dockyard_wire::{SingleTypeFrameStream, StreamType};

use crate::transport::ResponseBody;

/// Framed stream over a dedicated attach connection.
pub type AttachStream = SingleTypeFrameStream<ResponseBody>;

/// Which channels to attach to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachOptions {
    /// Attach stdout.
    pub stdout: bool,
    /// Attach stderr.
    pub stderr: bool,
    /// Replay output produced before the attach.
    pub logs: bool,
    /// Keep streaming new output.
    pub stream: bool,
}

impl Default for AttachOptions {
    fn default() -> Self {
        Self::both()
    }
}

impl AttachOptions {
    /// Attach stdout and stderr.
    #[must_use]
    pub fn both() -> Self {
        Self {
            stdout: true,
            stderr: true,
            logs: false,
            stream: true,
        }
    }

    /// Attach stdout only.
    #[must_use]
    pub fn stdout_only() -> Self {
        Self {
            stderr: false,
            ..Self::both()
        }
    }

    /// Attach stderr only.
    #[must_use]
    pub fn stderr_only() -> Self {
        Self {
            stdout: false,
            ..Self::both()
        }
    }

    /// Attach nothing.
    #[must_use]
    pub fn none() -> Self {
        Self {
            stdout: false,
            stderr: false,
            ..Self::both()
        }
    }

    /// Replay earlier output.
    #[must_use]
    pub fn with_logs(mut self) -> Self {
        self.logs = true;
        self
    }

    /// Return after the replay instead of following new output.
    #[must_use]
    pub fn without_stream(mut self) -> Self {
        self.stream = false;
        self
    }

    /// Requested channels, stdout first.
    pub fn channels(&self) -> impl Iterator<Item = StreamType> + '_ {
        StreamType::ALL.into_iter().filter(move |stream_type| match stream_type {
            StreamType::Stdout => self.stdout,
            StreamType::Stderr => self.stderr,
        })
    }
}

/// Streams returned by [`DockerApiClient::attach_container`](crate::DockerApiClient::attach_container).
///
/// A channel that was not requested is `None`. Each stream owns its own
/// connection, so the two can be read from different threads.
#[derive(Debug, Default)]
pub struct AttachedStreams {
    /// Container stdout.
    pub stdout: Option<AttachStream>,
    /// Container stderr.
    pub stderr: Option<AttachStream>,
}

impl AttachedStreams {
    /// Whether no channel is attached.
    pub fn is_empty(&self) -> bool {
        self.stdout.is_none() && self.stderr.is_none()
    }

    /// Detach the stream for `stream_type`.
    pub fn take(&mut self, stream_type: StreamType) -> Option<AttachStream> {
        match stream_type {
            StreamType::Stdout => self.stdout.take(),
            StreamType::Stderr => self.stderr.take(),
        }
    }

    /// Close every attached connection, interrupting reads in flight.
    pub fn close(&self) {
        for stream in [&self.stdout, &self.stderr].into_iter().flatten() {
            stream.close();
        }
    }

    /// Read both channels to completion, stdout first.
    ///
    /// Only safe when the container does not block on a full stderr pipe
    /// while stdout is drained; read from two threads otherwise.
    pub fn read_all(mut self) -> io::Result<(Vec<u8>, Vec<u8>)> {
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        if let Some(stream) = self.stdout.as_mut() {
            stream.read_to_end(&mut stdout)?;
        }
        if let Some(stream) = self.stderr.as_mut() {
            stream.read_to_end(&mut stderr)?;
        }
        Ok((stdout, stderr))
    }
}
