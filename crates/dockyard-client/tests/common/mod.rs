//! Scripted transport shared by the client integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::io::{self, Cursor, Read};
use std::sync::Arc;

use dockyard_client::{ClientConfig, DockerApiClient, HttpRequest, HttpResponse, Transport};
use parking_lot::Mutex;

enum Reply {
    Respond(HttpResponse),
    Fail(io::ErrorKind),
}

/// Transport that replays canned responses and records every request.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue a response with a text body.
    pub fn reply(&self, status: u16, body: &str) -> &Self {
        self.reply_bytes(status, body.as_bytes().to_vec())
    }

    /// Queue a response with a raw body.
    pub fn reply_bytes(&self, status: u16, body: Vec<u8>) -> &Self {
        self.reply_stream(status, Cursor::new(body))
    }

    /// Queue a response whose body is read lazily.
    pub fn reply_stream(&self, status: u16, body: impl Read + Send + 'static) -> &Self {
        self.replies
            .lock()
            .push_back(Reply::Respond(HttpResponse::new(status, body)));
        self
    }

    /// Queue a fully built response.
    pub fn reply_response(&self, response: HttpResponse) -> &Self {
        self.replies.lock().push_back(Reply::Respond(response));
        self
    }

    /// Queue a connection failure.
    pub fn fail(&self, kind: io::ErrorKind) -> &Self {
        self.replies.lock().push_back(Reply::Fail(kind));
        self
    }

    /// Every request sent so far.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    /// The most recent request.
    pub fn last_request(&self) -> HttpRequest {
        self.requests
            .lock()
            .last()
            .cloned()
            .expect("at least one request was sent")
    }
}

impl Transport for ScriptedTransport {
    fn send(&self, request: HttpRequest) -> io::Result<HttpResponse> {
        self.requests.lock().push(request);
        match self.replies.lock().pop_front() {
            Some(Reply::Respond(response)) => Ok(response),
            Some(Reply::Fail(kind)) => Err(io::Error::new(kind, "scripted failure")),
            None => Err(io::Error::other("no scripted reply left")),
        }
    }
}

pub fn client(transport: &Arc<ScriptedTransport>) -> DockerApiClient {
    init_tracing();
    let config = ClientConfig::default()
        .with_api_version("1.43")
        .with_user_agent("dockyard-tests/1.0");
    DockerApiClient::new(config, Arc::clone(transport) as Arc<dyn Transport>)
        .expect("valid test configuration")
}

pub fn client_with(config: ClientConfig, transport: &Arc<ScriptedTransport>) -> DockerApiClient {
    init_tracing();
    DockerApiClient::new(config, Arc::clone(transport) as Arc<dyn Transport>)
        .expect("valid test configuration")
}

/// Query parameters of a request.
pub fn query(request: &HttpRequest) -> HashMap<String, String> {
    request.url.query_pairs().into_owned().collect()
}

/// Opt into log output with `RUST_LOG=debug cargo test`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
