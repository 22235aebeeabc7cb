//! Incremental decoding of the image pull progress feed.
//!
//! While an image downloads the engine streams a sequence of JSON objects
//! with no separators and no enclosing array:
//!
//! ```text
//! {"status":"Pulling from library/alpine","id":"3.19"}{"status":"Downloading","progressDetail":{"current":1024,"total":4096},"id":"a1b2"}
//! ```
//!
//! A failure is reported inside this feed, typically as the final object:
//!
//! ```text
//! {"errorDetail":{"code":404,"message":"manifest unknown"},"error":"manifest unknown"}
//! ```

use std::io::{BufReader, Read};

use serde::{Deserialize, Serialize};
use serde_json::de::{IoRead, StreamDeserializer};
use serde_json::Value;
use tracing::{debug, trace};

use crate::error::ProgressError;

/// One decoded object of the progress feed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    /// Human-readable status line.
    pub status: String,
    /// Layer or tag the event refers to.
    pub id: String,
    /// Pre-rendered progress bar, if the engine sent one.
    pub progress: String,
    /// Error message of a terminal failure.
    pub error_message: Option<String>,
    /// Error code of a terminal failure.
    pub error_code: Option<i64>,
    /// Bytes done; never exceeds `total` when `total > 0`.
    pub current: i64,
    /// Bytes expected, 0 when unknown.
    pub total: i64,
    /// Unix timestamp the step started at, 0 when unknown.
    pub start: i64,
}

impl ProgressEvent {
    /// Whether this event reports a failure.
    pub fn is_error(&self) -> bool {
        self.error_code.is_some() || self.error_message.is_some()
    }

    /// Best description of the event: the error message, else the status.
    pub fn message(&self) -> &str {
        self.error_message.as_deref().unwrap_or(&self.status)
    }
}

#[derive(Debug, Default, Deserialize)]
struct WireEvent {
    status: Option<String>,
    error: Option<String>,
    #[serde(rename = "errorDetail")]
    error_detail: Option<WireErrorDetail>,
    id: Option<String>,
    progress: Option<String>,
    #[serde(rename = "progressDetail")]
    progress_detail: Option<WireProgressDetail>,
}

#[derive(Debug, Default, Deserialize)]
struct WireErrorDetail {
    code: Option<i64>,
    message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct WireProgressDetail {
    current: Option<i64>,
    total: Option<i64>,
    start: Option<i64>,
}

impl From<WireEvent> for ProgressEvent {
    fn from(wire: WireEvent) -> Self {
        let detail = wire.progress_detail.unwrap_or_default();
        let total = detail.total.unwrap_or(0);
        let mut current = detail.current.unwrap_or(0);
        if total > 0 {
            current = current.min(total);
        }
        let (error_code, detail_message) = wire
            .error_detail
            .map_or((None, None), |d| (d.code, d.message));
        Self {
            status: wire.status.unwrap_or_default(),
            id: wire.id.unwrap_or_default(),
            progress: wire.progress.unwrap_or_default(),
            error_message: detail_message.or(wire.error),
            error_code,
            current,
            total,
            start: detail.start.unwrap_or(0),
        }
    }
}

/// Receives progress events as they are decoded.
pub trait ProgressHandler {
    /// Called once per event, in stream order.
    fn on_progress(&mut self, event: &ProgressEvent);
}

impl<F: FnMut(&ProgressEvent)> ProgressHandler for F {
    fn on_progress(&mut self, event: &ProgressEvent) {
        self(event);
    }
}

/// Handler that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardProgress;

impl ProgressHandler for DiscardProgress {
    fn on_progress(&mut self, _event: &ProgressEvent) {}
}

/// Streaming parser over a concatenated-JSON progress body.
pub struct PullProgressReader<R: Read> {
    values: StreamDeserializer<'static, IoRead<BufReader<R>>, Value>,
    last: Option<ProgressEvent>,
    done: bool,
}

impl<R: Read> PullProgressReader<R> {
    /// Wrap a response body.
    pub fn new(body: R) -> Self {
        Self {
            values: serde_json::Deserializer::from_reader(BufReader::new(body)).into_iter(),
            last: None,
            done: false,
        }
    }

    /// Decode the next event, blocking until a full object has arrived.
    ///
    /// Returns `Ok(None)` at end of stream. Non-object values are skipped.
    pub fn next_event(&mut self) -> Result<Option<ProgressEvent>, ProgressError> {
        if self.done {
            return Ok(None);
        }
        for value in self.values.by_ref() {
            let value = match value {
                Ok(value) => value,
                Err(err) => {
                    self.done = true;
                    return Err(err.into());
                }
            };
            if !value.is_object() {
                debug!(value = %value, "skipping non-object value in progress stream");
                continue;
            }
            let wire: WireEvent = match serde_json::from_value(value) {
                Ok(wire) => wire,
                Err(err) => {
                    self.done = true;
                    return Err(ProgressError::Malformed(err));
                }
            };
            let event = ProgressEvent::from(wire);
            trace!(status = %event.status, id = %event.id, current = event.current, total = event.total, "pull progress");
            self.last = Some(event.clone());
            return Ok(Some(event));
        }
        self.done = true;
        Ok(None)
    }

    /// The most recently decoded event.
    pub fn last_event(&self) -> Option<&ProgressEvent> {
        self.last.as_ref()
    }

    /// Feed every event to `handler` and return the terminal one.
    ///
    /// # Example
    ///
    /// ```
    /// use dockyard_wire::PullProgressReader;
    ///
    /// let body = br#"{"status":"a"}{"status":"b","progress":"50%"}"#;
    /// let mut seen = Vec::new();
    /// let last = PullProgressReader::new(&body[..])
    ///     .drain(&mut |event: &dockyard_wire::ProgressEvent| seen.push(event.status.clone()))?;
    /// assert_eq!(seen, ["a", "b"]);
    /// assert_eq!(last.map(|e| e.progress), Some("50%".to_string()));
    /// # Ok::<(), dockyard_wire::ProgressError>(())
    /// ```
    pub fn drain<H: ProgressHandler + ?Sized>(
        mut self,
        handler: &mut H,
    ) -> Result<Option<ProgressEvent>, ProgressError> {
        while let Some(event) = self.next_event()? {
            handler.on_progress(&event);
        }
        Ok(self.last)
    }
}

impl<R: Read> Iterator for PullProgressReader<R> {
    type Item = Result<ProgressEvent, ProgressError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_event().transpose()
    }
}
