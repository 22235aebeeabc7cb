//! # dockyard-wire
//!
//! Wire protocols spoken by the Docker Engine API, independent of any HTTP
//! stack:
//!
//! - **Image references** - parsing and validating `[host[:port]/]name[/name][:tag]`
//!   and escaping arbitrary strings into tag characters
//! - **Frame codec** - the 8-byte header that interleaves stdout and stderr
//!   on attach and logs connections
//! - **Demultiplexer** - splits one framed connection into two readers that
//!   can be drained from two threads
//! - **Dedicated streams** - strips framing from a connection that carries a
//!   single stream type
//! - **Interrupts** - let a supervising thread unblock a reader parked on a
//!   silent connection
//! - **Pull progress** - incremental decoding of the concatenated-JSON feed
//!   emitted while an image downloads
//!
//! ## Example
//!
//! ```rust
//! use std::io::{Cursor, Read};
//! use std::thread;
//! use dockyard_wire::{encode_frame, FrameDemultiplexer, StreamType};
//!
//! let mut wire = encode_frame(StreamType::Stdout, b"ab");
//! wire.extend(encode_frame(StreamType::Stderr, b"cd"));
//! wire.extend(encode_frame(StreamType::Stdout, b"ef"));
//!
//! let (mut stdout, mut stderr) = FrameDemultiplexer::new(Cursor::new(wire)).split();
//! let err_reader = thread::spawn(move || {
//!     let mut out = Vec::new();
//!     stderr.read_to_end(&mut out).map(|_| out)
//! });
//!
//! let mut out = Vec::new();
//! stdout.read_to_end(&mut out)?;
//! assert_eq!(out, b"abef");
//! assert_eq!(err_reader.join().expect("stderr thread").expect("stderr read"), b"cd");
//! # Ok::<(), std::io::Error>(())
//! ```

#![warn(missing_docs)]

pub mod demux;
pub mod error;
pub mod frame;
pub mod image_ref;
pub mod interrupt;
pub mod progress;
pub mod single;

// Re-exports
pub use demux::{DemuxStream, FrameDemultiplexer};
pub use error::{FrameError, ImageRefError, ImageRefResult, ProgressError};
pub use frame::{encode_frame, FrameHeader, RawFrameHeader, StreamType, HEADER_LEN};
pub use image_ref::{decode_tag, encode_tag, ImageReference, DEFAULT_TAG};
pub use interrupt::{Interrupt, InterruptHandle};
pub use progress::{DiscardProgress, ProgressEvent, ProgressHandler, PullProgressReader};
pub use single::SingleTypeFrameStream;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
