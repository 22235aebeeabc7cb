//! Client configuration.

use std::fmt;

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{DockerError, DockerResult};

/// Engine endpoint used when nothing else is configured.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:2375";

/// Environment variable naming the engine endpoint.
pub const DOCKER_HOST_ENV: &str = "DOCKER_HOST";

/// Environment variable pinning the API version.
pub const DOCKER_API_VERSION_ENV: &str = "DOCKER_API_VERSION";

/// Credentials forwarded to the registry on pull.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryAuth {
    /// Registry user name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Registry password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Registry address, e.g. `registry.example.com:5000`.
    #[serde(
        default,
        rename = "serveraddress",
        skip_serializing_if = "Option::is_none"
    )]
    pub server_address: Option<String>,
    /// Token issued by the registry instead of a password.
    #[serde(
        default,
        rename = "identitytoken",
        skip_serializing_if = "Option::is_none"
    )]
    pub identity_token: Option<String>,
}

impl RegistryAuth {
    /// Credentials from a user name and password.
    #[must_use]
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(password.into()),
            server_address: None,
            identity_token: None,
        }
    }

    /// Credentials from an identity token.
    #[must_use]
    pub fn token(token: impl Into<String>) -> Self {
        Self {
            username: None,
            password: None,
            server_address: None,
            identity_token: Some(token.into()),
        }
    }

    /// Set the registry address.
    #[must_use]
    pub fn with_server_address(mut self, address: impl Into<String>) -> Self {
        self.server_address = Some(address.into());
        self
    }

    /// Value of the `X-Registry-Auth` header: URL-safe base64 of the JSON form.
    pub fn header_value(&self) -> DockerResult<String> {
        let json = serde_json::to_vec(self)
            .map_err(|e| DockerError::InvalidInput(format!("registry credentials: {e}")))?;
        Ok(URL_SAFE.encode(json))
    }
}

impl fmt::Debug for RegistryAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryAuth")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("server_address", &self.server_address)
            .field("identity_token", &self.identity_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Configuration for [`DockerApiClient`](crate::DockerApiClient).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the engine, `http` or `https`.
    pub endpoint: String,
    /// API version prefixed to every path (`/v1.43/...`); unversioned if unset.
    pub api_version: Option<String>,
    /// `User-Agent` sent with every request.
    pub user_agent: String,
    /// Credentials sent on image pulls.
    pub registry_auth: Option<RegistryAuth>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_version: None,
            user_agent: format!("dockyard/{}", crate::VERSION),
            registry_auth: None,
        }
    }
}

impl ClientConfig {
    /// Configuration for the given endpoint.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    /// Configuration from `DOCKER_HOST` and `DOCKER_API_VERSION`.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Configuration from an arbitrary variable source.
    ///
    /// `tcp://` endpoints are rewritten to `http://`; empty values are ignored.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(host) = lookup(DOCKER_HOST_ENV).filter(|v| !v.trim().is_empty()) {
            let host = host.trim();
            config.endpoint = match host.strip_prefix("tcp://") {
                Some(rest) => format!("http://{rest}"),
                None => host.to_string(),
            };
        }
        if let Some(version) = lookup(DOCKER_API_VERSION_ENV).filter(|v| !v.trim().is_empty()) {
            config.api_version = Some(version.trim().trim_start_matches('v').to_string());
        }
        config
    }

    /// Pin the API version, e.g. `"1.43"`.
    #[must_use]
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    /// Set the `User-Agent`.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set registry credentials for pulls.
    #[must_use]
    pub fn with_registry_auth(mut self, auth: RegistryAuth) -> Self {
        self.registry_auth = Some(auth);
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> DockerResult<()> {
        self.base_url().map(|_| ())?;
        if self.user_agent.trim().is_empty() {
            return Err(DockerError::InvalidInput(
                "user agent cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Endpoint URL with the version segment applied.
    pub fn base_url(&self) -> DockerResult<Url> {
        let mut url = Url::parse(&self.endpoint).map_err(|e| {
            DockerError::InvalidInput(format!("invalid endpoint {}: {e}", self.endpoint))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(DockerError::InvalidInput(format!(
                "unsupported endpoint scheme: {}",
                url.scheme()
            )));
        }
        if url.query().is_some() || url.fragment().is_some() {
            return Err(DockerError::InvalidInput(format!(
                "endpoint must not carry a query or fragment: {}",
                self.endpoint
            )));
        }
        if let Some(version) = &self.api_version {
            if !is_api_version(version) {
                return Err(DockerError::InvalidInput(format!(
                    "invalid API version: {version}"
                )));
            }
            url.path_segments_mut()
                .map_err(|()| {
                    DockerError::InvalidInput(format!("endpoint cannot be a base: {}", self.endpoint))
                })?
                .pop_if_empty()
                .push(&format!("v{version}"));
        }
        Ok(url)
    }
}

/// `major.minor`, both numeric.
fn is_api_version(version: &str) -> bool {
    let mut parts = version.split('.');
    let numeric = |part: Option<&str>| {
        part.is_some_and(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
    };
    numeric(parts.next()) && numeric(parts.next()) && parts.next().is_none()
}
