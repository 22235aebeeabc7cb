//! Demultiplexing of one framed connection into stdout and stderr readers.
//!
//! The two readers usually live on different threads. They share a single
//! cursor over the physical stream, guarded by one mutex and handed back and
//! forth through one condition variable:
//!
//! - a reader may touch the physical stream only while no other I/O is in
//!   flight and the cursor is not owned by its (still open) sibling;
//! - a frame for the sibling hands ownership to the sibling and wakes it;
//! - a frame for a closed stream is discarded, so one side giving up early
//!   never stalls the other;
//! - a framing violation fails both readers, an I/O failure fails only the
//!   reader that hit it and the sibling sees end-of-stream.
//!
//! The physical stream is dropped exactly once: when both readers have been
//! closed, or when the pair fails. If a reader is parked inside a physical
//! read at that moment, the [`Interrupt`] supplied with
//! [`FrameDemultiplexer::with_interrupt`] fires so the read returns and the
//! reader sees end-of-stream. Closing only one side never interrupts, since
//! the sibling still needs the connection; that side stops at the next
//! frame boundary.

use std::fmt;
use std::io::{self, Read};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, trace, warn};

use crate::error::FrameError;
use crate::frame::{self, FrameHeader, StreamType};
use crate::interrupt::InterruptHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cursor {
    /// The next bytes on the wire are a frame header.
    Header,
    /// Payload bytes of the current frame are still on the wire.
    Payload {
        stream_type: StreamType,
        remaining: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Terminal {
    Open,
    /// Physical stream ended at a header boundary.
    Eof,
    /// Framing violation; reported to both readers.
    Failed(FrameError),
    /// I/O failure; already reported to the reader that hit it.
    Aborted,
}

struct State<R> {
    /// `None` while checked out for I/O, and after release.
    source: Option<R>,
    interrupt: Option<InterruptHandle>,
    busy: bool,
    released: bool,
    cursor: Cursor,
    owner: Option<StreamType>,
    closed: [bool; 2],
    terminal: Terminal,
}

impl<R> State<R> {
    fn owned_by_other(&self, me: StreamType) -> bool {
        matches!(self.owner, Some(owner) if owner != me && !self.closed[owner.index()])
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        // While a read is in flight the source is checked out; that reader
        // drops it when it returns.
        if let Some(source) = self.source.take() {
            drop(source);
            debug!("released demultiplexed connection");
        }
        if let Some(interrupt) = &self.interrupt {
            debug!(in_flight = self.busy, "interrupting demultiplexed connection");
            interrupt.interrupt();
        }
    }
}

/// Outcome of I/O performed with the lock released.
enum Flight<T> {
    Done(io::Result<T>),
    /// Both sides closed while the read was in flight.
    Released,
}

struct Shared<R> {
    state: Mutex<State<R>>,
    turn: Condvar,
}

impl<R: Read> Shared<R> {
    /// Run `op` against the physical stream with the lock released.
    fn with_source<T>(
        &self,
        state: &mut MutexGuard<'_, State<R>>,
        op: impl FnOnce(&mut R) -> io::Result<T>,
    ) -> Flight<T> {
        let Some(mut source) = state.source.take() else {
            return Flight::Released;
        };
        state.busy = true;
        let result = MutexGuard::unlocked(state, || op(&mut source));
        state.busy = false;
        self.turn.notify_all();
        if state.released {
            drop(source);
            debug!("released demultiplexed connection after in-flight read");
            return Flight::Released;
        }
        state.source = Some(source);
        Flight::Done(result)
    }

    fn abort(&self, state: &mut State<R>, terminal: Terminal) {
        state.terminal = terminal;
        state.owner = None;
        state.release();
        self.turn.notify_all();
    }

    fn read(&self, me: StreamType, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.state.lock();
        loop {
            match state.terminal {
                Terminal::Failed(err) => return Err(err.into_io()),
                Terminal::Eof | Terminal::Aborted => return Ok(0),
                Terminal::Open => {}
            }
            if state.closed[me.index()] || buf.is_empty() {
                return Ok(0);
            }
            if state.busy || state.owned_by_other(me) {
                self.turn.wait(&mut state);
                continue;
            }
            state.owner = Some(me);

            let cursor = state.cursor;
            match cursor {
                Cursor::Header => {
                    let Flight::Done(result) = self.with_source(&mut state, |source| frame::read_header(source)) else {
                        return Ok(0);
                    };
                    let bytes = match result {
                        Ok(Some(bytes)) => bytes,
                        Ok(None) => {
                            trace!(stream = %me, "demultiplexed connection reached end of stream");
                            state.terminal = Terminal::Eof;
                            state.owner = None;
                            self.turn.notify_all();
                            return Ok(0);
                        }
                        Err(e) => {
                            warn!(stream = %me, error = %e, "demultiplexed connection failed reading header");
                            self.abort(&mut state, Terminal::Aborted);
                            return Err(e);
                        }
                    };
                    let header = match FrameHeader::decode(&bytes) {
                        Ok(header) => header,
                        Err(err) => {
                            warn!(stream = %me, header = ?bytes, error = %err, "frame protocol violation");
                            self.abort(&mut state, Terminal::Failed(err));
                            return Err(err.into_io());
                        }
                    };
                    trace!(stream = %header.stream_type, length = header.length, "frame header");
                    if header.length == 0 {
                        continue;
                    }
                    state.cursor = Cursor::Payload {
                        stream_type: header.stream_type,
                        remaining: header.length as usize,
                    };
                }
                Cursor::Payload {
                    stream_type,
                    remaining,
                } if stream_type == me => {
                    let want = remaining.min(buf.len());
                    let chunk = &mut buf[..want];
                    let Flight::Done(result) = self.with_source(&mut state, |source| frame::read_retrying(source, chunk)) else {
                        return Ok(0);
                    };
                    match result {
                        Ok(0) => {
                            let err = frame::truncated_payload(remaining);
                            warn!(stream = %me, error = %err, "demultiplexed connection truncated");
                            self.abort(&mut state, Terminal::Aborted);
                            return Err(err);
                        }
                        Ok(n) => {
                            let left = remaining - n;
                            if left == 0 {
                                state.cursor = Cursor::Header;
                                state.owner = None;
                                self.turn.notify_all();
                            } else {
                                state.cursor = Cursor::Payload {
                                    stream_type,
                                    remaining: left,
                                };
                            }
                            return Ok(n);
                        }
                        Err(e) => {
                            warn!(stream = %me, error = %e, "demultiplexed connection failed reading payload");
                            self.abort(&mut state, Terminal::Aborted);
                            return Err(e);
                        }
                    }
                }
                Cursor::Payload {
                    stream_type,
                    remaining,
                } if state.closed[stream_type.index()] => {
                    let Flight::Done(skipped) = self.with_source(&mut state, |source| {
                        io::copy(&mut source.by_ref().take(remaining as u64), &mut io::sink())
                    }) else {
                        return Ok(0);
                    };
                    match skipped {
                        Ok(n) if n == remaining as u64 => {
                            trace!(stream = %stream_type, bytes = remaining, "discarded frame for closed stream");
                            state.cursor = Cursor::Header;
                        }
                        Ok(n) => {
                            let err = frame::truncated_payload(remaining - n as usize);
                            warn!(stream = %me, error = %err, "demultiplexed connection truncated");
                            self.abort(&mut state, Terminal::Aborted);
                            return Err(err);
                        }
                        Err(e) => {
                            warn!(stream = %me, error = %e, "demultiplexed connection failed skipping payload");
                            self.abort(&mut state, Terminal::Aborted);
                            return Err(e);
                        }
                    }
                }
                Cursor::Payload { stream_type, .. } => {
                    trace!(from = %me, to = %stream_type, "handing frame to sibling");
                    state.owner = Some(stream_type);
                    self.turn.notify_all();
                }
            }
        }
    }

    fn close(&self, me: StreamType) {
        let mut state = self.state.lock();
        if state.closed[me.index()] {
            return;
        }
        state.closed[me.index()] = true;
        if state.owner == Some(me) && !state.busy {
            state.owner = None;
        }
        debug!(stream = %me, "closed demultiplexed stream");
        if state.closed.iter().all(|closed| *closed) {
            state.release();
        }
        self.turn.notify_all();
    }
}

/// Splits one framed physical stream into stdout and stderr readers.
///
/// # Example
///
/// ```
/// use std::io::{Cursor, Read};
/// use dockyard_wire::{encode_frame, FrameDemultiplexer, StreamType};
///
/// let mut wire = encode_frame(StreamType::Stdout, b"hello ");
/// wire.extend(encode_frame(StreamType::Stderr, b"ignored"));
/// wire.extend(encode_frame(StreamType::Stdout, b"world"));
///
/// let (mut stdout, stderr) = FrameDemultiplexer::new(Cursor::new(wire)).split();
/// drop(stderr);
///
/// let mut out = String::new();
/// stdout.read_to_string(&mut out)?;
/// assert_eq!(out, "hello world");
/// # Ok::<(), std::io::Error>(())
/// ```
pub struct FrameDemultiplexer<R> {
    shared: Arc<Shared<R>>,
}

impl<R: Read> FrameDemultiplexer<R> {
    /// Wrap a physical stream positioned at a frame header.
    pub fn new(source: R) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    source: Some(source),
                    interrupt: None,
                    busy: false,
                    released: false,
                    cursor: Cursor::Header,
                    owner: None,
                    closed: [false; 2],
                    terminal: Terminal::Open,
                }),
                turn: Condvar::new(),
            }),
        }
    }

    /// Fire `interrupt` when the connection is released, so a reader parked
    /// in a physical read returns once both sides are closed.
    #[must_use]
    pub fn with_interrupt(self, interrupt: InterruptHandle) -> Self {
        self.shared.state.lock().interrupt = Some(interrupt);
        self
    }

    /// Read payload bytes of `stream_type`, blocking until it owns the cursor.
    ///
    /// Returns `Ok(0)` at end of stream or once `stream_type` was closed.
    pub fn read(&self, stream_type: StreamType, buf: &mut [u8]) -> io::Result<usize> {
        self.shared.read(stream_type, buf)
    }

    /// Close one logical stream. Idempotent.
    pub fn close(&self, stream_type: StreamType) {
        self.shared.close(stream_type);
    }

    /// Whether the physical stream has been dropped.
    pub fn is_released(&self) -> bool {
        self.shared.state.lock().released
    }

    /// Hand out the stdout and stderr readers.
    pub fn split(self) -> (DemuxStream<R>, DemuxStream<R>) {
        let stdout = DemuxStream {
            demux: Self {
                shared: Arc::clone(&self.shared),
            },
            stream_type: StreamType::Stdout,
        };
        let stderr = DemuxStream {
            demux: self,
            stream_type: StreamType::Stderr,
        };
        (stdout, stderr)
    }
}

impl<R> Clone for FrameDemultiplexer<R> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<R> fmt::Debug for FrameDemultiplexer<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("FrameDemultiplexer")
            .field("cursor", &state.cursor)
            .field("owner", &state.owner)
            .field("closed", &state.closed)
            .field("terminal", &state.terminal)
            .field("released", &state.released)
            .field("interruptible", &state.interrupt.is_some())
            .finish()
    }
}

/// One logical side of a [`FrameDemultiplexer`].
///
/// `Read` is implemented for `&DemuxStream` as well, so a supervising
/// thread holding an `Arc` can [`close`](Self::close) the stream while its
/// owner is blocked in `read`. Once both sides are closed a reader blocked
/// on the connection is interrupted and returns `Ok(0)`. Dropping the
/// stream closes it.
pub struct DemuxStream<R: Read> {
    demux: FrameDemultiplexer<R>,
    stream_type: StreamType,
}

impl<R: Read> DemuxStream<R> {
    /// The logical stream this reader yields.
    pub fn stream_type(&self) -> StreamType {
        self.stream_type
    }

    /// Close this side; wakes a sibling waiting for the cursor.
    pub fn close(&self) {
        self.demux.close(self.stream_type);
    }

    /// Whether the shared physical stream has been dropped.
    pub fn is_released(&self) -> bool {
        self.demux.is_released()
    }
}

impl<R: Read> Read for DemuxStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.demux.read(self.stream_type, buf)
    }
}

impl<R: Read> Read for &DemuxStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.demux.read(self.stream_type, buf)
    }
}

impl<R: Read> Drop for DemuxStream<R> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<R: Read> fmt::Debug for DemuxStream<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DemuxStream")
            .field("stream_type", &self.stream_type)
            .finish_non_exhaustive()
    }
}
