//! Integration tests for container and image operations.

mod common;

use std::io;

use common::{client, query, ScriptedTransport};
use dockyard_client::{
    CommitConfig, CommitRequest, CreateContainerRequest, DockerError, ErrorKind, HostConfig,
    ImageReference, KillOptions, Method, RemoveImageOptions, RemoveOptions, StopOptions,
    WaitCondition,
};

// ==================== Helper Functions ====================

fn image(value: &str) -> ImageReference {
    ImageReference::parse(value).expect("valid image reference")
}

fn json_body(request: &dockyard_client::HttpRequest) -> serde_json::Value {
    serde_json::from_slice(request.body.as_deref().expect("request has a body"))
        .expect("body is JSON")
}

// ==================== Create ====================

#[test]
fn test_create_container_sends_config() {
    let transport = ScriptedTransport::new();
    transport.reply(201, r#"{"Id":"4f2b8c9d0e1a2b3c4d5e","Warnings":[]}"#);

    let request = CreateContainerRequest::new(&image("alpine:3.19"))
        .with_name("worker-1")
        .with_cmd(["echo", "hi"])
        .with_host_config(HostConfig::default().auto_remove());
    let created = client(&transport)
        .create_container(&request)
        .expect("container created");

    assert_eq!(created.id, "4f2b8c9d0e1a2b3c4d5e");
    let sent = transport.last_request();
    assert_eq!(sent.method, Method::Post);
    assert_eq!(sent.url.path(), "/v1.43/containers/create");
    assert_eq!(query(&sent).get("name").map(String::as_str), Some("worker-1"));
    assert_eq!(sent.header("content-type"), Some("application/json"));
    assert_eq!(sent.header("user-agent"), Some("dockyard-tests/1.0"));

    let body = json_body(&sent);
    assert_eq!(body["Image"], "alpine:3.19");
    assert_eq!(body["Cmd"][1], "hi");
    assert_eq!(body["HostConfig"]["AutoRemove"], true);
}

#[test]
fn test_create_without_name_has_no_query() {
    let transport = ScriptedTransport::new();
    transport.reply(201, r#"{"Id":"abc"}"#);

    client(&transport)
        .create_container(&CreateContainerRequest::new(&image("app")))
        .expect("container created");
    assert_eq!(transport.last_request().url.query(), None);
}

#[test]
fn test_create_missing_image() {
    let transport = ScriptedTransport::new();
    transport.reply(404, r#"{"message":"No such image: app:v9"}"#);

    let err = client(&transport)
        .create_container(&CreateContainerRequest::new(&image("app:v9")))
        .unwrap_err();
    assert!(matches!(err, DockerError::ImageNotFound { ref image } if image == "app:v9"));
}

#[test]
fn test_create_conflict_is_unexpected_response() {
    let transport = ScriptedTransport::new();
    transport.reply(409, r#"{"message":"Conflict. The container name \"/worker-1\" is already in use"}"#);

    let err = client(&transport)
        .create_container(&CreateContainerRequest::new(&image("app")).with_name("worker-1"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnexpectedResponse);
    assert_eq!(err.status(), Some(409));
    assert!(err.to_string().contains("already in use"));
}

#[test]
fn test_create_invalid_name_rejected_locally() {
    let transport = ScriptedTransport::new();
    let err = client(&transport)
        .create_container(&CreateContainerRequest::new(&image("app")).with_name("bad name"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert!(transport.requests().is_empty());
}

#[test]
fn test_create_malformed_reply_is_protocol_error() {
    let transport = ScriptedTransport::new();
    transport.reply(201, "{\"Id\":");

    let err = client(&transport)
        .create_container(&CreateContainerRequest::new(&image("app")))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Protocol);
}

// ==================== Start / Stop / Kill ====================

#[test]
fn test_start_container() {
    let transport = ScriptedTransport::new();
    transport.reply(204, "").reply(304, "");

    let client = client(&transport);
    client.start_container("abc").expect("started");
    client.start_container("abc").expect("already running is fine");

    let requests = transport.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].url.path(), "/v1.43/containers/abc/start");
    assert!(requests[0].body.is_none());
}

#[test]
fn test_start_missing_container() {
    let transport = ScriptedTransport::new();
    transport.reply(404, r#"{"message":"No such container: ghost"}"#);

    let err = client(&transport).start_container("ghost").unwrap_err();
    assert!(matches!(err, DockerError::ContainerNotFound { ref id } if id == "ghost"));
}

#[test]
fn test_start_server_error_carries_message() {
    let transport = ScriptedTransport::new();
    transport.reply(500, r#"{"message":"driver failed programming external connectivity"}"#);

    let err = client(&transport).start_container("abc").unwrap_err();
    assert!(matches!(
        err,
        DockerError::Server { status: 500, ref message } if message.contains("driver failed")
    ));
}

#[test]
fn test_stop_container_timeout() {
    let transport = ScriptedTransport::new();
    transport.reply(204, "").reply(304, "");

    let client = client(&transport);
    client
        .stop_container("abc", &StopOptions::with_timeout(5))
        .expect("stopped");
    client
        .stop_container("abc", &StopOptions { timeout_secs: None })
        .expect("already stopped is fine");

    let requests = transport.requests();
    assert_eq!(requests[0].url.path(), "/v1.43/containers/abc/stop");
    assert_eq!(query(&requests[0]).get("t").map(String::as_str), Some("5"));
    assert_eq!(requests[1].url.query(), None);
}

#[test]
fn test_kill_container_signal() {
    let transport = ScriptedTransport::new();
    transport.reply(204, "");

    client(&transport)
        .kill_container("abc", &KillOptions::signal("SIGTERM"))
        .expect("killed");
    let sent = transport.last_request();
    assert_eq!(sent.url.path(), "/v1.43/containers/abc/kill");
    assert_eq!(query(&sent).get("signal").map(String::as_str), Some("SIGTERM"));
}

#[test]
fn test_kill_stopped_container_is_conflict() {
    let transport = ScriptedTransport::new();
    transport.reply(409, r#"{"message":"Container abc is not running"}"#);

    let err = client(&transport)
        .kill_container("abc", &KillOptions::default())
        .unwrap_err();
    assert_eq!(err.status(), Some(409));
}

// ==================== Remove ====================

#[test]
fn test_remove_container() {
    let transport = ScriptedTransport::new();
    transport.reply(204, "");

    client(&transport)
        .remove_container("abc", &RemoveOptions::force().with_volumes())
        .expect("removed");
    let sent = transport.last_request();
    assert_eq!(sent.method, Method::Delete);
    assert_eq!(sent.url.path(), "/v1.43/containers/abc");
    let params = query(&sent);
    assert_eq!(params.get("force").map(String::as_str), Some("1"));
    assert_eq!(params.get("v").map(String::as_str), Some("1"));
}

#[test]
fn test_remove_missing_container_succeeds() {
    let transport = ScriptedTransport::new();
    transport.reply(404, r#"{"message":"No such container: abc"}"#);

    client(&transport)
        .remove_container("abc", &RemoveOptions::default())
        .expect("absence is the goal");
}

#[test]
fn test_remove_running_container_without_force() {
    let transport = ScriptedTransport::new();
    transport.reply(409, r#"{"message":"You cannot remove a running container"}"#);

    let err = client(&transport)
        .remove_container("abc", &RemoveOptions::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnexpectedResponse);
}

#[test]
fn test_remove_image_missing_succeeds() {
    let transport = ScriptedTransport::new();
    transport.reply(404, r#"{"message":"No such image"}"#);

    let removed = client(&transport)
        .remove_image(&image("app:v1"), &RemoveImageOptions::default())
        .expect("absence is the goal");
    assert!(removed.is_empty());
}

#[test]
fn test_remove_image_path_keeps_registry_and_namespace() {
    let transport = ScriptedTransport::new();
    transport.reply(200, r#"[{"Untagged":"registry.example.com:5000/team/app:v1"},{"Deleted":"sha256:0f1e"}]"#);

    let removed = client(&transport)
        .remove_image(
            &image("registry.example.com:5000/team/app:v1"),
            &RemoveImageOptions::force(),
        )
        .expect("removed");
    assert_eq!(removed.len(), 2);
    assert_eq!(removed[1].deleted.as_deref(), Some("sha256:0f1e"));

    let sent = transport.last_request();
    assert_eq!(sent.method, Method::Delete);
    assert_eq!(sent.url.path(), "/v1.43/images/registry.example.com:5000/team/app:v1");
    assert_eq!(query(&sent).get("force").map(String::as_str), Some("1"));
    assert_eq!(query(&sent).get("noprune").map(String::as_str), Some("0"));
}

// ==================== Wait / Commit / Inspect ====================

#[test]
fn test_wait_container() {
    let transport = ScriptedTransport::new();
    transport.reply(200, r#"{"StatusCode":3,"Error":null}"#);

    let waited = client(&transport)
        .wait_container("abc", WaitCondition::NextExit)
        .expect("waited");
    assert_eq!(waited.status_code, 3);
    assert!(!waited.success());

    let sent = transport.last_request();
    assert_eq!(sent.url.path(), "/v1.43/containers/abc/wait");
    assert_eq!(query(&sent).get("condition").map(String::as_str), Some("next-exit"));
}

#[test]
fn test_wait_missing_container() {
    let transport = ScriptedTransport::new();
    transport.reply(404, "page not found");

    let err = client(&transport)
        .wait_container("ghost", WaitCondition::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ContainerNotFound);
}

#[test]
fn test_commit_container() {
    let transport = ScriptedTransport::new();
    transport.reply(201, r#"{"Id":"sha256:9a8b"}"#);

    let request = CommitRequest::new("abc")
        .with_target(image("team/snapshot:build-42"))
        .with_comment("after tests")
        .with_change("ENV STAGE=done")
        .with_config(CommitConfig {
            cmd: Some(vec!["/bin/sh".to_string()]),
            ..CommitConfig::default()
        });
    let committed = client(&transport)
        .commit_container(&request)
        .expect("committed");
    assert_eq!(committed.id, "sha256:9a8b");

    let sent = transport.last_request();
    assert_eq!(sent.url.path(), "/v1.43/commit");
    let params = query(&sent);
    assert_eq!(params.get("container").map(String::as_str), Some("abc"));
    assert_eq!(params.get("repo").map(String::as_str), Some("team/snapshot"));
    assert_eq!(params.get("tag").map(String::as_str), Some("build-42"));
    assert_eq!(params.get("comment").map(String::as_str), Some("after tests"));
    assert_eq!(params.get("pause").map(String::as_str), Some("1"));
    assert_eq!(params.get("changes").map(String::as_str), Some("ENV STAGE=done"));
    assert_eq!(json_body(&sent)["Cmd"][0], "/bin/sh");
}

#[test]
fn test_commit_without_config_has_no_body() {
    let transport = ScriptedTransport::new();
    transport.reply(201, r#"{"Id":"sha256:1"}"#);

    client(&transport)
        .commit_container(&CommitRequest::new("abc"))
        .expect("committed");
    let sent = transport.last_request();
    assert!(sent.body.is_none());
    assert!(!query(&sent).contains_key("repo"));
}

#[test]
fn test_inspect_container() {
    let transport = ScriptedTransport::new();
    transport.reply(
        200,
        r#"{"Id":"abc","Name":"/worker-1","Image":"sha256:1","State":{"Status":"running","Running":true,"Pid":4242}}"#,
    );

    let inspect = client(&transport).inspect_container("abc").expect("inspected");
    assert_eq!(inspect.name, "/worker-1");
    assert!(inspect.state.running);
    assert_eq!(inspect.state.pid, 4242);
    assert_eq!(transport.last_request().method, Method::Get);
    assert_eq!(transport.last_request().url.path(), "/v1.43/containers/abc/json");
}

// ==================== System ====================

#[test]
fn test_ping() {
    let transport = ScriptedTransport::new();
    transport.reply(200, "OK");

    client(&transport).ping().expect("engine answers");
    assert_eq!(transport.last_request().url.path(), "/v1.43/_ping");
}

#[test]
fn test_connection_failure_is_transport_error() {
    let transport = ScriptedTransport::new();
    transport.fail(io::ErrorKind::ConnectionRefused);

    let err = client(&transport).start_container("abc").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    let source = std::error::Error::source(&err).expect("wraps the I/O error");
    assert!(source.to_string().contains("scripted failure"));
}

#[test]
fn test_unversioned_client_paths() {
    let transport = ScriptedTransport::new();
    transport.reply(204, "");

    let client = common::client_with(
        dockyard_client::ClientConfig::new("http://engine.internal:2375"),
        &transport,
    );
    client.start_container("abc").expect("started");
    assert_eq!(
        transport.last_request().url.as_str(),
        "http://engine.internal:2375/containers/abc/start"
    );
}
