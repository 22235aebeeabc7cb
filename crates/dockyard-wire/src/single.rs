//! Reader for a connection that carries frames of one stream type only.

use std::fmt;
use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::FrameError;
use crate::frame::{self, RawFrameHeader, StreamType};
use crate::interrupt::InterruptHandle;

/// Strips frame headers from a dedicated stdout or stderr connection.
///
/// Unlike [`FrameDemultiplexer`](crate::FrameDemultiplexer) there is no
/// sibling to hand foreign frames to, so a frame of the wrong type is a
/// protocol violation. After a violation the connection is dropped and
/// every later read repeats the error.
///
/// `Read` is implemented for `&SingleTypeFrameStream` too, so a supervising
/// thread sharing the stream through an `Arc` can [`close`](Self::close) it
/// while another thread is blocked in `read`. The close fires the stream's
/// [`Interrupt`](crate::Interrupt) and the blocked read returns `Ok(0)`.
pub struct SingleTypeFrameStream<R> {
    expected: StreamType,
    closed: AtomicBool,
    interrupt: Option<InterruptHandle>,
    reader: Mutex<FrameReader<R>>,
}

struct FrameReader<R> {
    source: Option<R>,
    remaining: usize,
    failure: Option<FrameError>,
}

impl<R: Read> SingleTypeFrameStream<R> {
    /// Wrap a connection that should only carry `expected` frames.
    pub fn new(source: R, expected: StreamType) -> Self {
        Self {
            expected,
            closed: AtomicBool::new(false),
            interrupt: None,
            reader: Mutex::new(FrameReader {
                source: Some(source),
                remaining: 0,
                failure: None,
            }),
        }
    }

    /// Fire `interrupt` on close, so a reader blocked on the connection returns.
    #[must_use]
    pub fn with_interrupt(mut self, interrupt: InterruptHandle) -> Self {
        self.interrupt = Some(interrupt);
        self
    }

    /// The stream type this connection carries.
    pub fn stream_type(&self) -> StreamType {
        self.expected
    }

    /// Close the stream and drop the connection. Idempotent.
    ///
    /// A read in flight on another thread is interrupted; that reader drops
    /// the connection when it returns.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!(stream = %self.expected, "closed dedicated stream");
        if let Some(interrupt) = &self.interrupt {
            interrupt.interrupt();
        }
        if let Some(mut reader) = self.reader.try_lock() {
            reader.source = None;
        }
    }

    /// Whether the stream has been closed or failed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn read_shared(&self, buf: &mut [u8]) -> io::Result<usize> {
        let mut reader = self.reader.lock();
        if let Some(err) = reader.failure {
            return Err(err.into_io());
        }
        if buf.is_empty() {
            return Ok(0);
        }
        if self.is_closed() {
            reader.source = None;
            return Ok(0);
        }

        let result = self.read_frames(&mut reader, buf);
        if reader.failure.is_none() && self.is_closed() {
            // Closed while the read was in flight.
            reader.source = None;
            return result.or(Ok(0));
        }
        result
    }

    fn read_frames(&self, reader: &mut FrameReader<R>, buf: &mut [u8]) -> io::Result<usize> {
        let Some(source) = reader.source.as_mut() else {
            return Ok(0);
        };

        while reader.remaining == 0 {
            let Some(bytes) = frame::read_header(source)? else {
                return Ok(0);
            };
            let header = match RawFrameHeader::decode(&bytes) {
                Ok(header) => header,
                Err(err) => return Err(self.fail(reader, err)),
            };
            if header.type_byte != self.expected.as_byte() {
                let err = FrameError::UnexpectedStreamType {
                    expected: self.expected,
                    actual: header.type_byte,
                };
                return Err(self.fail(reader, err));
            }
            reader.remaining = header.length as usize;
        }

        let want = reader.remaining.min(buf.len());
        let n = frame::read_retrying(source, &mut buf[..want])?;
        if n == 0 {
            return Err(frame::truncated_payload(reader.remaining));
        }
        reader.remaining -= n;
        Ok(n)
    }

    fn fail(&self, reader: &mut FrameReader<R>, err: FrameError) -> io::Error {
        warn!(stream = %self.expected, error = %err, "frame protocol violation");
        reader.failure = Some(err);
        reader.source = None;
        self.closed.store(true, Ordering::Release);
        err.into_io()
    }
}

impl<R: Read> Read for SingleTypeFrameStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_shared(buf)
    }
}

impl<R: Read> Read for &SingleTypeFrameStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_shared(buf)
    }
}

impl<R> fmt::Debug for SingleTypeFrameStream<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingleTypeFrameStream")
            .field("expected", &self.expected)
            .field("closed", &self.closed.load(Ordering::Acquire))
            .field("interruptible", &self.interrupt.is_some())
            .finish_non_exhaustive()
    }
}
