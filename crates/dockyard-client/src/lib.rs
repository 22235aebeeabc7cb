//! # dockyard-client
//!
//! Blocking client for the Docker Engine API.
//!
//! The client builds requests, hands them to a caller-supplied
//! [`Transport`] and translates the replies:
//!
//! - **Status mapping** - every operation turns the status code into a
//!   typed [`DockerError`] (404 becomes container or image not found)
//! - **Image pulls** - the progress feed is decoded as it arrives and the
//!   terminal event is checked for an embedded failure
//! - **Attach** - output is returned as framed readers, either one
//!   connection per channel or one shared connection split in two
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::io::Read;
//! use std::sync::Arc;
//!
//! use dockyard_client::{
//!     AttachOptions, ClientConfig, CreateContainerRequest, DiscardProgress, DockerApiClient,
//!     ImageReference, Transport,
//! };
//!
//! # fn run(transport: Arc<dyn Transport>) -> Result<(), Box<dyn std::error::Error>> {
//! let client = DockerApiClient::new(ClientConfig::from_env(), transport)?;
//!
//! let image = ImageReference::parse("alpine:3.19")?;
//! client.pull_image(&image, &mut DiscardProgress)?;
//!
//! let created = client.create_container(
//!     &CreateContainerRequest::new(&image).with_cmd(["echo", "hello"]),
//! )?;
//! let mut streams = client.attach_container(&created.id, &AttachOptions::stdout_only())?;
//! client.start_container(&created.id)?;
//!
//! let mut output = String::new();
//! if let Some(stdout) = streams.stdout.as_mut() {
//!     stdout.read_to_string(&mut output)?;
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod attach;
pub mod client;
pub mod config;
pub mod container;
pub mod error;
pub mod image;
pub mod transport;

// Re-exports
pub use attach::{AttachOptions, AttachStream, AttachedStreams};
pub use client::DockerApiClient;
pub use config::{ClientConfig, RegistryAuth, DEFAULT_ENDPOINT};
pub use container::{
    CommitConfig, CommitRequest, CommitResponse, ContainerInspect, ContainerState,
    CreateContainerRequest, CreateContainerResponse, HostConfig, KillOptions, PortBinding,
    RemoveOptions, RestartPolicy, StopOptions, WaitCondition, WaitResponse,
};
pub use error::{DockerError, DockerResult, ErrorKind};
pub use image::{ImageDeleteItem, PullOptions, RemoveImageOptions};
pub use transport::{HttpRequest, HttpResponse, Method, ResponseBody, Transport};

pub use dockyard_wire::{
    DemuxStream, DiscardProgress, ImageReference, Interrupt, InterruptHandle, ProgressEvent,
    ProgressHandler, StreamType,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
