//! Container request and response types.
//!
//! Field names follow the engine's JSON (PascalCase).

use std::collections::HashMap;

use dockyard_wire::ImageReference;
use serde::{Deserialize, Serialize};

use crate::error::{DockerError, DockerResult};

/// Placeholder value of the engine's set-as-map encoding (`{"80/tcp": {}}`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmptyObject {}

/// Host port a container port is published on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PortBinding {
    /// Host interface.
    pub host_ip: String,
    /// Host port.
    pub host_port: String,
}

/// Restart behaviour applied by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RestartPolicy {
    /// `no`, `always`, `unless-stopped` or `on-failure`.
    pub name: String,
    /// Retry limit for `on-failure`.
    #[serde(default)]
    pub maximum_retry_count: i64,
}

impl RestartPolicy {
    /// Restart on failure up to `retries` times.
    #[must_use]
    pub fn on_failure(retries: i64) -> Self {
        Self {
            name: "on-failure".to_string(),
            maximum_retry_count: retries,
        }
    }

    /// Restart unless explicitly stopped.
    #[must_use]
    pub fn unless_stopped() -> Self {
        Self {
            name: "unless-stopped".to_string(),
            maximum_retry_count: 0,
        }
    }
}

/// Host-side settings of a new container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HostConfig {
    /// Memory limit in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<i64>,
    /// CPU quota in units of 1e-9 CPUs.
    #[serde(default, rename = "NanoCpus", skip_serializing_if = "Option::is_none")]
    pub nano_cpus: Option<i64>,
    /// Bind mounts, `host:container[:mode]`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub binds: Vec<String>,
    /// Network mode, e.g. `bridge` or `host`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_mode: Option<String>,
    /// Published ports keyed by `port/proto`.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub port_bindings: HashMap<String, Vec<PortBinding>>,
    /// Restart policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restart_policy: Option<RestartPolicy>,
    /// Run privileged.
    #[serde(default)]
    pub privileged: bool,
    /// Remove the container when it exits.
    #[serde(default)]
    pub auto_remove: bool,
}

impl HostConfig {
    /// Set the memory limit in bytes.
    #[must_use]
    pub fn with_memory_limit(mut self, bytes: i64) -> Self {
        self.memory = Some(bytes);
        self
    }

    /// Limit CPU usage to a possibly fractional number of CPUs.
    ///
    /// # Errors
    ///
    /// Returns [`DockerError::InvalidInput`] unless `cpus` is finite and
    /// amounts to at least one nano-CPU.
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn with_cpus(self, cpus: f64) -> DockerResult<Self> {
        let nano = (cpus * 1e9).round();
        if !nano.is_finite() || nano < 1.0 || nano >= i64::MAX as f64 {
            return Err(DockerError::InvalidInput(format!(
                "invalid CPU limit: {cpus}"
            )));
        }
        Ok(self.with_nano_cpus(nano as i64))
    }

    /// Limit CPU usage in units of 1e-9 CPUs.
    #[must_use]
    pub fn with_nano_cpus(mut self, nano_cpus: i64) -> Self {
        self.nano_cpus = Some(nano_cpus);
        self
    }

    /// Add a bind mount.
    #[must_use]
    pub fn with_bind(mut self, host: &str, container: &str) -> Self {
        self.binds.push(format!("{host}:{container}"));
        self
    }

    /// Set the network mode.
    #[must_use]
    pub fn with_network_mode(mut self, mode: impl Into<String>) -> Self {
        self.network_mode = Some(mode.into());
        self
    }

    /// Publish a TCP port on all host interfaces.
    #[must_use]
    pub fn with_port_binding(mut self, container_port: u16, host_port: u16) -> Self {
        self.port_bindings
            .entry(format!("{container_port}/tcp"))
            .or_default()
            .push(PortBinding {
                host_ip: "0.0.0.0".to_string(),
                host_port: host_port.to_string(),
            });
        self
    }

    /// Set the restart policy.
    #[must_use]
    pub fn with_restart_policy(mut self, policy: RestartPolicy) -> Self {
        self.restart_policy = Some(policy);
        self
    }

    /// Run privileged.
    #[must_use]
    pub fn privileged(mut self) -> Self {
        self.privileged = true;
        self
    }

    /// Remove the container on exit.
    #[must_use]
    pub fn auto_remove(mut self) -> Self {
        self.auto_remove = true;
        self
    }
}

/// Body of `POST /containers/create`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateContainerRequest {
    /// Container name, sent as a query parameter.
    #[serde(skip)]
    pub name: Option<String>,
    /// Image to run.
    pub image: String,
    /// Command, overriding the image default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cmd: Option<Vec<String>>,
    /// Entrypoint, overriding the image default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<Vec<String>>,
    /// Environment, `KEY=value`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<String>,
    /// Working directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
    /// User to run as.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Hostname.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    /// Labels.
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,
    /// Exposed ports keyed by `port/proto`.
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub exposed_ports: HashMap<String, EmptyObject>,
    /// Allocate a TTY. Output of a TTY container is not framed.
    pub tty: bool,
    /// Keep stdin open.
    pub open_stdin: bool,
    /// Attach stdout on start.
    pub attach_stdout: bool,
    /// Attach stderr on start.
    pub attach_stderr: bool,
    /// Host-side settings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_config: Option<HostConfig>,
}

impl CreateContainerRequest {
    /// Request for a container running `image`.
    #[must_use]
    pub fn new(image: &ImageReference) -> Self {
        Self {
            name: None,
            image: image.to_string(),
            cmd: None,
            entrypoint: None,
            env: Vec::new(),
            working_dir: None,
            user: None,
            hostname: None,
            labels: HashMap::new(),
            exposed_ports: HashMap::new(),
            tty: false,
            open_stdin: false,
            attach_stdout: true,
            attach_stderr: true,
            host_config: None,
        }
    }

    /// Set the container name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the command.
    #[must_use]
    pub fn with_cmd<I, S>(mut self, cmd: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cmd = Some(cmd.into_iter().map(Into::into).collect());
        self
    }

    /// Set the entrypoint.
    #[must_use]
    pub fn with_entrypoint<I, S>(mut self, entrypoint: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entrypoint = Some(entrypoint.into_iter().map(Into::into).collect());
        self
    }

    /// Add an environment variable.
    #[must_use]
    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.env.push(format!("{key}={value}"));
        self
    }

    /// Set the working directory.
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<String>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Set the user.
    #[must_use]
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Set the hostname.
    #[must_use]
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    /// Add a label.
    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Expose a TCP port.
    #[must_use]
    pub fn with_exposed_port(mut self, port: u16) -> Self {
        self.exposed_ports.insert(format!("{port}/tcp"), EmptyObject {});
        self
    }

    /// Allocate a TTY.
    #[must_use]
    pub fn with_tty(mut self) -> Self {
        self.tty = true;
        self
    }

    /// Keep stdin open.
    #[must_use]
    pub fn with_open_stdin(mut self) -> Self {
        self.open_stdin = true;
        self
    }

    /// Set host-side settings.
    #[must_use]
    pub fn with_host_config(mut self, host_config: HostConfig) -> Self {
        self.host_config = Some(host_config);
        self
    }

    /// Validate fields the engine would reject.
    pub fn validate(&self) -> DockerResult<()> {
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(nano_cpus) = self.host_config.as_ref().and_then(|host| host.nano_cpus) {
            if nano_cpus <= 0 {
                return Err(DockerError::InvalidInput(format!(
                    "invalid CPU limit: {nano_cpus} nano-CPUs"
                )));
            }
        }
        for entry in &self.env {
            if entry.starts_with('=') || !entry.contains('=') {
                return Err(DockerError::InvalidInput(format!(
                    "invalid environment entry: {entry}"
                )));
            }
        }
        Ok(())
    }
}

/// Container names: `/?[a-zA-Z0-9][a-zA-Z0-9_.-]+`.
fn validate_name(name: &str) -> DockerResult<()> {
    let bare = name.strip_prefix('/').unwrap_or(name);
    let mut chars = bare.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphanumeric())
        && bare.len() >= 2
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
    if valid {
        Ok(())
    } else {
        Err(DockerError::InvalidInput(format!(
            "invalid container name: {name}"
        )))
    }
}

/// Reply to `POST /containers/create`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateContainerResponse {
    /// ID of the new container.
    pub id: String,
    /// Warnings raised while creating it.
    #[serde(default)]
    pub warnings: Option<Vec<String>>,
}

impl CreateContainerResponse {
    /// Short form (first 12 characters) of the ID.
    pub fn short_id(&self) -> &str {
        self.id.get(..12).unwrap_or(&self.id)
    }
}

/// Options for stopping a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopOptions {
    /// Seconds to wait before killing; engine default if unset.
    pub timeout_secs: Option<u32>,
}

impl Default for StopOptions {
    fn default() -> Self {
        Self {
            timeout_secs: Some(10),
        }
    }
}

impl StopOptions {
    /// Wait `secs` seconds before killing.
    #[must_use]
    pub fn with_timeout(secs: u32) -> Self {
        Self {
            timeout_secs: Some(secs),
        }
    }

    /// Kill immediately.
    #[must_use]
    pub fn immediate() -> Self {
        Self::with_timeout(0)
    }
}

/// Options for killing a container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KillOptions {
    /// Signal name or number; `SIGKILL` if unset.
    pub signal: Option<String>,
}

impl KillOptions {
    /// Send `signal`, e.g. `SIGTERM` or `9`.
    #[must_use]
    pub fn signal(signal: impl Into<String>) -> Self {
        Self {
            signal: Some(signal.into()),
        }
    }
}

/// Options for removing a container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoveOptions {
    /// Kill the container first if it is running.
    pub force: bool,
    /// Remove anonymous volumes.
    pub volumes: bool,
}

impl RemoveOptions {
    /// Force removal of a running container.
    #[must_use]
    pub fn force() -> Self {
        Self {
            force: true,
            volumes: false,
        }
    }

    /// Remove volumes along with the container.
    #[must_use]
    pub fn with_volumes(mut self) -> Self {
        self.volumes = true;
        self
    }
}

/// State transition `wait` blocks for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WaitCondition {
    /// Container is not running (engine default).
    #[default]
    NotRunning,
    /// Container exits after the wait started.
    NextExit,
    /// Container has been removed.
    Removed,
}

impl WaitCondition {
    /// Query parameter value.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotRunning => "not-running",
            Self::NextExit => "next-exit",
            Self::Removed => "removed",
        }
    }
}

/// Reply to `POST /containers/{id}/wait`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WaitResponse {
    /// Exit code of the container.
    pub status_code: i64,
    /// Error raised while waiting.
    #[serde(default)]
    pub error: Option<WaitError>,
}

impl WaitResponse {
    /// Whether the container exited with code 0 and no wait error.
    pub fn success(&self) -> bool {
        self.status_code == 0 && self.error.is_none()
    }
}

/// Error detail of a wait.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WaitError {
    /// Error message.
    #[serde(default)]
    pub message: String,
}

/// Configuration overrides recorded in a committed image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CommitConfig {
    /// Default command.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cmd: Option<Vec<String>>,
    /// Default entrypoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<Vec<String>>,
    /// Environment, `KEY=value`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<String>,
    /// Labels.
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,
    /// Working directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
    /// User.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

/// Parameters of `POST /commit`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRequest {
    /// Container to snapshot.
    pub container: String,
    /// Target repository and tag.
    pub target: Option<ImageReference>,
    /// Commit message.
    pub comment: Option<String>,
    /// Author.
    pub author: Option<String>,
    /// Pause the container while committing.
    pub pause: bool,
    /// Dockerfile instructions applied to the image.
    pub changes: Vec<String>,
    /// Configuration overrides.
    pub config: Option<CommitConfig>,
}

impl CommitRequest {
    /// Commit `container` as an untagged image.
    #[must_use]
    pub fn new(container: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            target: None,
            comment: None,
            author: None,
            pause: true,
            changes: Vec::new(),
            config: None,
        }
    }

    /// Tag the resulting image.
    #[must_use]
    pub fn with_target(mut self, target: ImageReference) -> Self {
        self.target = Some(target);
        self
    }

    /// Set the commit message.
    #[must_use]
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Set the author.
    #[must_use]
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Do not pause the container.
    #[must_use]
    pub fn without_pause(mut self) -> Self {
        self.pause = false;
        self
    }

    /// Add a Dockerfile instruction, e.g. `ENV DEBUG=1`.
    #[must_use]
    pub fn with_change(mut self, change: impl Into<String>) -> Self {
        self.changes.push(change.into());
        self
    }

    /// Set configuration overrides.
    #[must_use]
    pub fn with_config(mut self, config: CommitConfig) -> Self {
        self.config = Some(config);
        self
    }
}

/// Reply to `POST /commit`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CommitResponse {
    /// ID of the new image.
    pub id: String,
}

/// Runtime state from `GET /containers/{id}/json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ContainerState {
    /// `created`, `running`, `paused`, `restarting`, `removing`, `exited` or `dead`.
    pub status: String,
    /// Whether the container is running.
    pub running: bool,
    /// Whether the container is paused.
    pub paused: bool,
    /// Whether the container was killed by the OOM killer.
    #[serde(rename = "OOMKilled")]
    pub oom_killed: bool,
    /// Main process ID.
    pub pid: i64,
    /// Exit code of the last run.
    pub exit_code: i64,
    /// Error of the last run.
    pub error: String,
}

/// Subset of `GET /containers/{id}/json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ContainerInspect {
    /// Full ID.
    pub id: String,
    /// Name, with the leading `/`.
    pub name: String,
    /// Image ID.
    pub image: String,
    /// Creation time (RFC 3339).
    pub created: String,
    /// Runtime state.
    pub state: ContainerState,
}
