//! Docker Engine API client.

use std::fmt;
use std::io::{BufReader, Read};
use std::sync::Arc;

use dockyard_wire::{
    DemuxStream, FrameDemultiplexer, ImageReference, ProgressEvent, ProgressHandler,
    PullProgressReader, SingleTypeFrameStream, StreamType,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::attach::{AttachOptions, AttachedStreams};
use crate::config::ClientConfig;
use crate::container::{
    CommitRequest, CommitResponse, ContainerInspect, CreateContainerRequest,
    CreateContainerResponse, KillOptions, RemoveOptions, StopOptions, WaitCondition, WaitResponse,
};
use crate::error::{DockerError, DockerResult};
use crate::image::{ImageDeleteItem, PullOptions, RemoveImageOptions};
use crate::transport::{HttpRequest, HttpResponse, Method, ResponseBody, Transport};

/// Error bodies larger than this are truncated before decoding.
const MAX_ERROR_BODY: u64 = 64 * 1024;

const NO_QUERY: &[(&str, &str)] = &[];

/// What a 404 from an operation refers to.
#[derive(Debug, Clone, Copy)]
enum Subject<'a> {
    Container(&'a str),
    Image(&'a str),
    None,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Blocking client for the Docker Engine API.
///
/// Safe to share between threads; every call opens its own connection
/// through the [`Transport`] and owns the response body.
pub struct DockerApiClient {
    config: ClientConfig,
    base_url: Url,
    transport: Arc<dyn Transport>,
}

impl DockerApiClient {
    /// Create a client.
    ///
    /// # Errors
    ///
    /// Returns [`DockerError::InvalidInput`] if the configuration is invalid.
    pub fn new(config: ClientConfig, transport: Arc<dyn Transport>) -> DockerResult<Self> {
        config.validate()?;
        let base_url = config.base_url()?;
        debug!(endpoint = %base_url, "docker client configured");
        Ok(Self {
            config,
            base_url,
            transport,
        })
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // ==================== Containers ====================

    /// Create a container. A 404 means the image is missing locally.
    pub fn create_container(
        &self,
        request: &CreateContainerRequest,
    ) -> DockerResult<CreateContainerResponse> {
        request.validate()?;
        debug!(name = ?request.name, image = %request.image, "creating container");

        let query: Vec<(&str, &str)> = request
            .name
            .as_deref()
            .map(|name| ("name", name))
            .into_iter()
            .collect();
        let url = self.url(&["containers", "create"], &query)?;
        let http = with_json(self.request(Method::Post, url), request)?;
        let response = expect_status(self.send(http)?, &[], Subject::Image(&request.image))?;
        let created: CreateContainerResponse = decode(response, "decoding create response")?;

        for warning in created.warnings.iter().flatten() {
            warn!(id = %created.short_id(), warning = %warning, "engine warning on create");
        }
        info!(id = %created.short_id(), image = %request.image, "container created");
        Ok(created)
    }

    /// Start a container. Starting a running container succeeds.
    pub fn start_container(&self, id: &str) -> DockerResult<()> {
        ensure_id(id)?;
        debug!(id = %id, "starting container");

        let url = self.url(&["containers", id, "start"], NO_QUERY)?;
        let response = self.send(self.request(Method::Post, url))?;
        let response = expect_status(response, &[304], Subject::Container(id))?;

        if response.status == 304 {
            debug!(id = %id, "container already running");
        } else {
            info!(id = %id, "container started");
        }
        Ok(())
    }

    /// Stop a container. Stopping a stopped container succeeds.
    pub fn stop_container(&self, id: &str, options: &StopOptions) -> DockerResult<()> {
        ensure_id(id)?;
        debug!(id = %id, timeout = ?options.timeout_secs, "stopping container");

        let query: Vec<(&str, String)> = options
            .timeout_secs
            .map(|secs| ("t", secs.to_string()))
            .into_iter()
            .collect();
        let url = self.url(&["containers", id, "stop"], &query)?;
        let response = self.send(self.request(Method::Post, url))?;
        let response = expect_status(response, &[304], Subject::Container(id))?;

        if response.status == 304 {
            debug!(id = %id, "container already stopped");
        } else {
            info!(id = %id, "container stopped");
        }
        Ok(())
    }

    /// Send a signal to a container.
    pub fn kill_container(&self, id: &str, options: &KillOptions) -> DockerResult<()> {
        ensure_id(id)?;
        debug!(id = %id, signal = ?options.signal, "killing container");

        let query: Vec<(&str, &str)> = options
            .signal
            .as_deref()
            .map(|signal| ("signal", signal))
            .into_iter()
            .collect();
        let url = self.url(&["containers", id, "kill"], &query)?;
        let response = self.send(self.request(Method::Post, url))?;
        expect_status(response, &[], Subject::Container(id))?;

        info!(id = %id, "container killed");
        Ok(())
    }

    /// Remove a container. A container that does not exist counts as removed.
    pub fn remove_container(&self, id: &str, options: &RemoveOptions) -> DockerResult<()> {
        ensure_id(id)?;
        debug!(id = %id, force = options.force, "removing container");

        let query = [
            ("v", bool_param(options.volumes)),
            ("force", bool_param(options.force)),
        ];
        let url = self.url(&["containers", id], &query)?;
        let response = self.send(self.request(Method::Delete, url))?;
        if response.status == 404 {
            debug!(id = %id, "container already absent");
            return Ok(());
        }
        expect_status(response, &[], Subject::Container(id))?;

        info!(id = %id, "container removed");
        Ok(())
    }

    /// Block until the container reaches `condition`.
    pub fn wait_container(&self, id: &str, condition: WaitCondition) -> DockerResult<WaitResponse> {
        ensure_id(id)?;
        debug!(id = %id, condition = condition.as_str(), "waiting for container");

        let url = self.url(&["containers", id, "wait"], &[("condition", condition.as_str())])?;
        let response = self.send(self.request(Method::Post, url))?;
        let response = expect_status(response, &[], Subject::Container(id))?;
        let waited: WaitResponse = decode(response, "decoding wait response")?;

        info!(id = %id, exit_code = waited.status_code, "container finished");
        Ok(waited)
    }

    /// Snapshot a container into a new image.
    pub fn commit_container(&self, request: &CommitRequest) -> DockerResult<CommitResponse> {
        ensure_id(&request.container)?;
        debug!(container = %request.container, target = ?request.target, "committing container");

        let mut query: Vec<(&str, String)> = vec![("container", request.container.clone())];
        if let Some(target) = &request.target {
            query.push(("repo", target.repository().to_string()));
            query.push(("tag", target.tag().to_string()));
        }
        if let Some(comment) = &request.comment {
            query.push(("comment", comment.clone()));
        }
        if let Some(author) = &request.author {
            query.push(("author", author.clone()));
        }
        query.push(("pause", bool_param(request.pause).to_string()));
        for change in &request.changes {
            query.push(("changes", change.clone()));
        }

        let url = self.url(&["commit"], &query)?;
        let mut http = self.request(Method::Post, url);
        if let Some(config) = &request.config {
            http = with_json(http, config)?;
        }
        let response = expect_status(self.send(http)?, &[], Subject::Container(&request.container))?;
        let committed: CommitResponse = decode(response, "decoding commit response")?;

        info!(container = %request.container, image = %committed.id, "container committed");
        Ok(committed)
    }

    /// Low-level information about a container.
    pub fn inspect_container(&self, id: &str) -> DockerResult<ContainerInspect> {
        ensure_id(id)?;
        let url = self.url(&["containers", id, "json"], NO_QUERY)?;
        let response = self.send(self.request(Method::Get, url))?;
        let response = expect_status(response, &[], Subject::Container(id))?;
        decode(response, "decoding container inspect")
    }

    // ==================== Images ====================

    /// Pull an image, feeding every progress event to `handler`.
    ///
    /// The engine reports most pull failures inside a 200 response, so the
    /// terminal event is checked as well as the status code. Returns the
    /// terminal event, or `None` if the engine sent no events.
    pub fn pull_image<H: ProgressHandler + ?Sized>(
        &self,
        image: &ImageReference,
        handler: &mut H,
    ) -> DockerResult<Option<ProgressEvent>> {
        self.pull_image_with(image, &PullOptions::default(), handler)
    }

    /// [`pull_image`](Self::pull_image) with explicit options.
    pub fn pull_image_with<H: ProgressHandler + ?Sized>(
        &self,
        image: &ImageReference,
        options: &PullOptions,
        handler: &mut H,
    ) -> DockerResult<Option<ProgressEvent>> {
        let name = image.to_string();
        debug!(image = %name, platform = ?options.platform, "pulling image");

        let mut query = vec![("fromImage", image.repository()), ("tag", image.tag())];
        if let Some(platform) = &options.platform {
            query.push(("platform", platform.as_str()));
        }
        let url = self.url(&["images", "create"], &query)?;
        let mut request = self.request(Method::Post, url);
        if let Some(auth) = &self.config.registry_auth {
            request = request.with_header("X-Registry-Auth", auth.header_value()?);
        }
        let response = expect_status(self.send(request)?, &[], Subject::Image(&name))?;

        let terminal = PullProgressReader::new(response.body).drain(handler)?;
        let Some(event) = terminal else {
            info!(image = %name, "image pulled without progress events");
            return Ok(None);
        };
        if event.error_code == Some(404) {
            warn!(image = %name, message = %event.message(), "pull reported missing image");
            return Err(DockerError::ImageNotFound { image: name });
        }
        if event.is_error() {
            warn!(image = %name, code = ?event.error_code, message = %event.message(), "pull failed");
            return Err(DockerError::PullFailed {
                image: name,
                code: event.error_code,
                message: event.message().to_string(),
            });
        }
        info!(image = %name, status = %event.status, "image pulled");
        Ok(Some(event))
    }

    /// Remove an image. An image that does not exist counts as removed.
    pub fn remove_image(
        &self,
        image: &ImageReference,
        options: &RemoveImageOptions,
    ) -> DockerResult<Vec<ImageDeleteItem>> {
        let name = image.to_string();
        debug!(image = %name, force = options.force, "removing image");

        let mut segments = vec!["images"];
        segments.extend(name.split('/'));
        let query = [
            ("force", bool_param(options.force)),
            ("noprune", bool_param(options.no_prune)),
        ];
        let url = self.url(&segments, &query)?;
        let response = self.send(self.request(Method::Delete, url))?;
        if response.status == 404 {
            debug!(image = %name, "image already absent");
            return Ok(Vec::new());
        }
        let response = expect_status(response, &[], Subject::Image(&name))?;
        let removed: Vec<ImageDeleteItem> = decode(response, "decoding image delete response")?;

        info!(image = %name, entries = removed.len(), "image removed");
        Ok(removed)
    }

    // ==================== Streams ====================

    /// Attach to a container's output, one connection per requested channel.
    ///
    /// Each connection is asked for a single channel, so every frame on it
    /// must carry that channel's type. Requesting no channel returns empty
    /// streams without contacting the engine.
    pub fn attach_container(&self, id: &str, options: &AttachOptions) -> DockerResult<AttachedStreams> {
        let mut streams = AttachedStreams::default();
        if options.channels().next().is_none() {
            debug!(id = %id, "attach without channels");
            return Ok(streams);
        }
        ensure_id(id)?;

        for stream_type in options.channels() {
            debug!(id = %id, stream = %stream_type, "attaching to container");
            let response = self.open_attach(id, options.logs, options.stream, &[stream_type])?;
            let mut stream = SingleTypeFrameStream::new(response.body, stream_type);
            if let Some(interrupt) = response.interrupt {
                stream = stream.with_interrupt(interrupt);
            }
            match stream_type {
                StreamType::Stdout => streams.stdout = Some(stream),
                StreamType::Stderr => streams.stderr = Some(stream),
            }
        }

        info!(id = %id, stdout = options.stdout, stderr = options.stderr, "attached to container");
        Ok(streams)
    }

    /// Attach to stdout and stderr over one shared connection.
    ///
    /// The returned readers are meant for two threads; see
    /// [`FrameDemultiplexer`].
    pub fn attach_container_multiplexed(
        &self,
        id: &str,
        logs: bool,
    ) -> DockerResult<(DemuxStream<ResponseBody>, DemuxStream<ResponseBody>)> {
        ensure_id(id)?;
        debug!(id = %id, logs, "attaching to container over one connection");

        let response = self.open_attach(id, logs, true, &StreamType::ALL)?;
        let mut demux = FrameDemultiplexer::new(response.body);
        if let Some(interrupt) = response.interrupt {
            demux = demux.with_interrupt(interrupt);
        }

        info!(id = %id, "attached to container");
        Ok(demux.split())
    }

    // ==================== System ====================

    /// Check that the engine answers.
    pub fn ping(&self) -> DockerResult<()> {
        let url = self.url(&["_ping"], NO_QUERY)?;
        let response = self.send(self.request(Method::Get, url))?;
        let response = expect_status(response, &[], Subject::None)?;
        if let Some(version) = response.header("Api-Version") {
            debug!(api_version = %version, "engine answered ping");
        }
        Ok(())
    }

    // ==================== Plumbing ====================

    fn url<V: AsRef<str>>(&self, segments: &[&str], query: &[(&str, V)]) -> DockerResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                DockerError::InvalidInput(format!(
                    "endpoint cannot be a base: {}",
                    self.config.endpoint
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(key, value)| (*key, value.as_ref())));
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> HttpRequest {
        HttpRequest::new(method, url).with_header("User-Agent", self.config.user_agent.as_str())
    }

    fn send(&self, request: HttpRequest) -> DockerResult<HttpResponse> {
        let context = format!("{} {}", request.method, request.url.path());
        trace!(request = %context, "sending request");
        let response = self
            .transport
            .send(request)
            .map_err(|e| DockerError::transport(context.as_str(), e))?;
        trace!(request = %context, status = response.status, "received response");
        Ok(response)
    }

    fn open_attach(
        &self,
        id: &str,
        logs: bool,
        stream: bool,
        channels: &[StreamType],
    ) -> DockerResult<HttpResponse> {
        let wants = |stream_type: StreamType| bool_param(channels.contains(&stream_type));
        let query = [
            ("stream", bool_param(stream)),
            ("logs", bool_param(logs)),
            ("stdout", wants(StreamType::Stdout)),
            ("stderr", wants(StreamType::Stderr)),
        ];
        let url = self.url(&["containers", id, "attach"], &query)?;
        let request = self
            .request(Method::Post, url)
            .with_header("Connection", "Upgrade")
            .with_header("Upgrade", "tcp");
        expect_status(self.send(request)?, &[101], Subject::Container(id))
    }
}

impl fmt::Debug for DockerApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DockerApiClient")
            .field("base_url", &self.base_url.as_str())
            .field("user_agent", &self.config.user_agent)
            .finish_non_exhaustive()
    }
}

fn ensure_id(id: &str) -> DockerResult<()> {
    if id.trim().is_empty() {
        return Err(DockerError::InvalidInput(
            "container ID cannot be empty".to_string(),
        ));
    }
    Ok(())
}

fn bool_param(value: bool) -> &'static str {
    if value { "1" } else { "0" }
}

fn with_json<T: Serialize + ?Sized>(request: HttpRequest, body: &T) -> DockerResult<HttpRequest> {
    let bytes = serde_json::to_vec(body)
        .map_err(|e| DockerError::InvalidInput(format!("cannot encode request body: {e}")))?;
    Ok(request
        .with_header("Content-Type", "application/json")
        .with_body(bytes))
}

fn decode<T: DeserializeOwned>(response: HttpResponse, context: &str) -> DockerResult<T> {
    serde_json::from_reader(BufReader::new(response.body))
        .map_err(|e| DockerError::from_json(context, e))
}

/// Accept any 2xx plus `extra`; map everything else to an error.
fn expect_status(
    response: HttpResponse,
    extra: &[u16],
    subject: Subject<'_>,
) -> DockerResult<HttpResponse> {
    if response.is_success() || extra.contains(&response.status) {
        return Ok(response);
    }
    let status = response.status;
    let message = error_message(response.body);
    debug!(status, message = %message, "engine returned an error status");
    Err(status_error(status, message, subject))
}

fn status_error(status: u16, message: String, subject: Subject<'_>) -> DockerError {
    match (status, subject) {
        (404, Subject::Container(id)) => DockerError::ContainerNotFound { id: id.to_string() },
        (404, Subject::Image(image)) => DockerError::ImageNotFound {
            image: image.to_string(),
        },
        (500, _) => DockerError::Server { status, message },
        _ => DockerError::UnexpectedResponse { status, message },
    }
}

/// `{"message": ...}` if the body has that shape, else the trimmed text.
fn error_message(body: ResponseBody) -> String {
    let mut raw = Vec::new();
    if let Err(e) = body.take(MAX_ERROR_BODY).read_to_end(&mut raw) {
        debug!(error = %e, "could not read error body");
    }
    match serde_json::from_slice::<ErrorBody>(&raw) {
        Ok(body) => body.message,
        Err(_) => String::from_utf8_lossy(&raw).trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::io::{self, Cursor};
    use test_case::test_case;

    struct NoTransport;

    impl Transport for NoTransport {
        fn send(&self, _request: HttpRequest) -> io::Result<HttpResponse> {
            Err(io::Error::new(io::ErrorKind::ConnectionRefused, "no engine"))
        }
    }

    fn client(config: ClientConfig) -> DockerApiClient {
        DockerApiClient::new(config, Arc::new(NoTransport)).expect("valid config")
    }

    fn body(text: &str) -> ResponseBody {
        Box::new(Cursor::new(text.as_bytes().to_vec()))
    }

    #[test_case(404, Subject::Container("c1"), ErrorKind::ContainerNotFound ; "missing container")]
    #[test_case(404, Subject::Image("app:v1"), ErrorKind::ImageNotFound ; "missing image")]
    #[test_case(404, Subject::None, ErrorKind::UnexpectedResponse ; "404 without subject")]
    #[test_case(500, Subject::Container("c1"), ErrorKind::Server ; "server error")]
    #[test_case(409, Subject::Container("c1"), ErrorKind::UnexpectedResponse ; "conflict")]
    #[test_case(503, Subject::None, ErrorKind::UnexpectedResponse ; "unavailable")]
    fn test_status_mapping(status: u16, subject: Subject<'_>, kind: ErrorKind) {
        assert_eq!(status_error(status, String::new(), subject).kind(), kind);
    }

    #[test]
    fn test_unexpected_response_carries_status() {
        let err = status_error(409, "name in use".to_string(), Subject::Container("c1"));
        assert!(matches!(
            err,
            DockerError::UnexpectedResponse { status: 409, ref message } if message == "name in use"
        ));
    }

    #[test]
    fn test_error_message_from_json() {
        assert_eq!(error_message(body(r#"{"message":"no such container"}"#)), "no such container");
    }

    #[test]
    fn test_error_message_falls_back_to_text() {
        assert_eq!(error_message(body("  plain failure\n")), "plain failure");
        assert_eq!(error_message(body("")), "");
    }

    #[test]
    fn test_url_with_version_and_query() {
        let client = client(ClientConfig::default().with_api_version("1.43"));
        let url = client
            .url(&["containers", "abc", "stop"], &[("t", "5")])
            .expect("valid");
        assert_eq!(url.as_str(), "http://localhost:2375/v1.43/containers/abc/stop?t=5");
    }

    #[test]
    fn test_url_without_query_has_no_question_mark() {
        let client = client(ClientConfig::default());
        let url = client.url(&["_ping"], NO_QUERY).expect("valid");
        assert_eq!(url.as_str(), "http://localhost:2375/_ping");
    }

    #[test]
    fn test_url_escapes_segments_and_values() {
        let client = client(ClientConfig::default());
        let url = client
            .url(&["containers", "a b", "kill"], &[("signal", "SIG&X")])
            .expect("valid");
        assert_eq!(url.path(), "/containers/a%20b/kill");
        assert_eq!(url.query(), Some("signal=SIG%26X"));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = DockerApiClient::new(ClientConfig::new("ftp://engine"), Arc::new(NoTransport));
        assert!(matches!(result, Err(DockerError::InvalidInput(_))));
    }

    #[test]
    fn test_transport_failure_is_transport_error() {
        let err = client(ClientConfig::default()).ping().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(err.to_string().contains("GET /_ping"));
    }

    #[test]
    fn test_empty_id_rejected_before_sending() {
        let err = client(ClientConfig::default()).start_container("").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_client_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DockerApiClient>();
    }
}
