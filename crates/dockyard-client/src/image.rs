//! Image request and response types.

use serde::Deserialize;

/// Options for pulling an image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullOptions {
    /// Platform to pull, e.g. `linux/arm64`; engine default if unset.
    pub platform: Option<String>,
}

impl PullOptions {
    /// Pull for a specific platform.
    #[must_use]
    pub fn platform(platform: impl Into<String>) -> Self {
        Self {
            platform: Some(platform.into()),
        }
    }
}

/// Options for removing an image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoveImageOptions {
    /// Remove even if containers use the image.
    pub force: bool,
    /// Keep untagged parent images.
    pub no_prune: bool,
}

impl RemoveImageOptions {
    /// Force removal.
    #[must_use]
    pub fn force() -> Self {
        Self {
            force: true,
            no_prune: false,
        }
    }

    /// Keep untagged parents.
    #[must_use]
    pub fn with_no_prune(mut self) -> Self {
        self.no_prune = true;
        self
    }
}

/// One entry of the `DELETE /images/{name}` reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ImageDeleteItem {
    /// Tag that was removed.
    pub untagged: Option<String>,
    /// Image or layer that was deleted.
    pub deleted: Option<String>,
}
