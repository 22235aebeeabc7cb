//! HTTP transport seam.
//!
//! The client never opens sockets itself. Each operation builds an
//! [`HttpRequest`] and hands it to a [`Transport`], which returns the status,
//! headers and a blocking body reader. Attach requests ask for a connection
//! upgrade; a transport that supports them returns the raw upgraded stream as
//! the body, together with an [`Interrupt`] that shuts the connection down so
//! a caller can cancel a reader blocked on a silent container.

use std::fmt;
use std::io::{self, Read};
use std::sync::Arc;

use dockyard_wire::{Interrupt, InterruptHandle};
use url::Url;

/// HTTP method used by the engine API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `DELETE`
    Delete,
}

impl Method {
    /// Upper-case method name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outgoing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Method.
    pub method: Method,
    /// Absolute URL, query included.
    pub url: Url,
    /// Header name/value pairs in insertion order.
    pub headers: Vec<(String, String)>,
    /// Request body.
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// Request without headers or body.
    #[must_use]
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            body: None,
        }
    }

    /// Append a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Attach a body.
    #[must_use]
    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    /// First header with `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// Blocking response body.
pub type ResponseBody = Box<dyn Read + Send>;

/// Response returned by a [`Transport`].
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Header name/value pairs.
    pub headers: Vec<(String, String)>,
    /// Body, read lazily.
    pub body: ResponseBody,
    /// Unblocks a read in flight on `body`, if the transport supports it.
    pub interrupt: Option<InterruptHandle>,
}

impl HttpResponse {
    /// Response with the given status and body.
    pub fn new(status: u16, body: impl Read + Send + 'static) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Box::new(body),
            interrupt: None,
        }
    }

    /// Response with an empty body.
    pub fn empty(status: u16) -> Self {
        Self::new(status, io::empty())
    }

    /// Append a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Let callers unblock a read in flight on the body, typically by
    /// shutting down the socket it reads from.
    #[must_use]
    pub fn with_interrupt(mut self, interrupt: impl Interrupt + 'static) -> Self {
        self.interrupt = Some(Arc::new(interrupt));
        self
    }

    /// First header with `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("interruptible", &self.interrupt.is_some())
            .finish_non_exhaustive()
    }
}

/// Issues requests against the engine.
///
/// Implementations must be usable from several threads at once; every call
/// owns its own connection and response body. Responses to upgraded attach
/// requests should carry an interrupt (see [`HttpResponse::with_interrupt`]);
/// without one, closing an attached stream cannot end a read that is waiting
/// on a silent container.
pub trait Transport: Send + Sync {
    /// Send `request` and return once the status line and headers arrived.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the connection cannot be established or the
    /// response head cannot be read.
    fn send(&self, request: HttpRequest) -> io::Result<HttpResponse>;
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url() -> Url {
        Url::parse("http://localhost:2375/_ping").expect("valid url")
    }

    #[test]
    fn test_request_headers_case_insensitive() {
        let request = HttpRequest::new(Method::Get, url())
            .with_header("User-Agent", "dockyard/test")
            .with_header("X-Registry-Auth", "e30=");
        assert_eq!(request.header("user-agent"), Some("dockyard/test"));
        assert_eq!(request.header("x-registry-auth"), Some("e30="));
        assert_eq!(request.header("content-type"), None);
    }

    #[test]
    fn test_request_body() {
        let request = HttpRequest::new(Method::Post, url()).with_body(b"{}".to_vec());
        assert_eq!(request.body.as_deref(), Some(&b"{}"[..]));
    }

    #[test]
    fn test_response_success_range() {
        assert!(HttpResponse::empty(200).is_success());
        assert!(HttpResponse::empty(204).is_success());
        assert!(!HttpResponse::empty(304).is_success());
        assert!(!HttpResponse::empty(404).is_success());
    }

    #[test]
    fn test_response_body_readable() {
        let mut response = HttpResponse::new(200, &b"OK"[..]).with_header("Api-Version", "1.43");
        let mut body = String::new();
        response.body.read_to_string(&mut body).expect("read");
        assert_eq!(body, "OK");
        assert_eq!(response.header("api-version"), Some("1.43"));
    }

    #[test]
    fn test_response_interrupt() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        let response = HttpResponse::empty(101).with_interrupt(move || flag.store(true, Ordering::SeqCst));
        assert!(HttpResponse::empty(101).interrupt.is_none());

        let interrupt = response.interrupt.expect("interrupt attached");
        interrupt.interrupt();
        assert!(fired.load(Ordering::SeqCst));
    }

    #[test]
    fn test_method_display() {
        assert_eq!(Method::Delete.to_string(), "DELETE");
    }
}
