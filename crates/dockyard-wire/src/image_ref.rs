//! Image reference parsing, validation and tag escaping.
//!
//! An image reference is `[registry-host[:port]/]name[/name][:tag]`. The
//! first component is only taken as a registry host when it looks like one
//! (contains a `.`, carries a `:port`, or is `localhost`), so `team/app` is
//! a two-segment repository and `a/b/c` is rejected.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ImageRefError, ImageRefResult};

/// Tag used when a reference omits one.
pub const DEFAULT_TAG: &str = "latest";

const REPOSITORY_PATTERN: &str = r"(?:(?:localhost(?::[0-9]+)?|[A-Za-z0-9-]+(?:\.[A-Za-z0-9-]+)+(?::[0-9]+)?|[A-Za-z0-9-]+:[0-9]+)/)?[a-z0-9_-]+(?:/[a-z0-9_-]+)?";

const TAG_PATTERN: &str = r"[A-Za-z0-9_.-]+";

/// Full reference: repository with an optional tag.
static REFERENCE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^(?P<repository>{REPOSITORY_PATTERN})(?::(?P<tag>{TAG_PATTERN}))?$"
    ))
    .unwrap_or_else(|_| unreachable!())
});

static REPOSITORY_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!("^{REPOSITORY_PATTERN}$")).unwrap_or_else(|_| unreachable!())
});

static TAG_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!("^{TAG_PATTERN}$")).unwrap_or_else(|_| unreachable!()));

/// A validated `(repository, tag)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ImageReference {
    repository: String,
    tag: String,
}

impl ImageReference {
    /// Build a reference from its parts, validating both.
    ///
    /// # Example
    ///
    /// ```
    /// use dockyard_wire::ImageReference;
    ///
    /// let image = ImageReference::new("library/ubuntu", "22.04")?;
    /// assert_eq!(image.to_string(), "library/ubuntu:22.04");
    /// # Ok::<(), dockyard_wire::ImageRefError>(())
    /// ```
    pub fn new(repository: impl Into<String>, tag: impl Into<String>) -> ImageRefResult<Self> {
        let repository = repository.into();
        let tag = tag.into();
        if repository.is_empty() || tag.is_empty() {
            return Err(ImageRefError::Empty);
        }
        if !REPOSITORY_REGEX.is_match(&repository) {
            return Err(ImageRefError::invalid(
                &repository,
                "repository must be [host[:port]/]name[/name] with lowercase names",
            ));
        }
        if !TAG_REGEX.is_match(&tag) {
            return Err(ImageRefError::invalid(&tag, "tag must match [A-Za-z0-9_.-]+"));
        }
        Ok(Self { repository, tag })
    }

    /// Parse `repository[:tag]`, defaulting the tag to `latest`.
    ///
    /// # Example
    ///
    /// ```
    /// use dockyard_wire::ImageReference;
    ///
    /// let image = ImageReference::parse("registry.example.com:5000/team/app:v1.2")?;
    /// assert_eq!(image.repository(), "registry.example.com:5000/team/app");
    /// assert_eq!(image.tag(), "v1.2");
    /// # Ok::<(), dockyard_wire::ImageRefError>(())
    /// ```
    pub fn parse(value: &str) -> ImageRefResult<Self> {
        if value.is_empty() {
            return Err(ImageRefError::Empty);
        }
        let captures = REFERENCE_REGEX.captures(value).ok_or_else(|| {
            ImageRefError::invalid(value, "expected [host[:port]/]name[/name][:tag]")
        })?;
        let repository = captures
            .name("repository")
            .map_or("", |m| m.as_str())
            .to_string();
        let tag = captures
            .name("tag")
            .map_or(DEFAULT_TAG, |m| m.as_str())
            .to_string();
        Ok(Self { repository, tag })
    }

    /// Repository part, including any registry host.
    #[must_use]
    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// Tag part.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Copy of this reference with another tag.
    pub fn with_tag(&self, tag: impl Into<String>) -> ImageRefResult<Self> {
        Self::new(self.repository.clone(), tag)
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repository, self.tag)
    }
}

impl FromStr for ImageReference {
    type Err = ImageRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ImageReference {
    type Error = ImageRefError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ImageReference> for String {
    fn from(image: ImageReference) -> Self {
        image.to_string()
    }
}

const fn is_plain_tag_char(c: char) -> bool {
    (c.is_ascii_alphanumeric() && c != 'z' && c != 'Z') || matches!(c, '_' | '.' | '-')
}

/// Escape an arbitrary string into tag characters.
///
/// `z` and `Z` introduce escapes: `z` becomes `zz`, `Z` becomes `ZZ`, any
/// other character outside `[A-Za-z0-9_.-]` becomes `z` plus two hex digits
/// when its code point fits a byte, otherwise `Z` plus four hex digits per
/// UTF-16 code unit. Distinct inputs always yield distinct outputs.
///
/// # Example
///
/// ```
/// use dockyard_wire::encode_tag;
///
/// assert_eq!(encode_tag("feature/x")?, "featurez2Fx");
/// assert_eq!(encode_tag("lazy")?, "lazzy");
/// # Ok::<(), dockyard_wire::ImageRefError>(())
/// ```
pub fn encode_tag(value: &str) -> ImageRefResult<String> {
    if value.is_empty() {
        return Err(ImageRefError::Empty);
    }
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            'z' => out.push_str("zz"),
            'Z' => out.push_str("ZZ"),
            c if is_plain_tag_char(c) => out.push(c),
            c if u32::from(c) <= 0xFF => {
                out.push_str(&format!("z{:02X}", u32::from(c)));
            }
            c => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    out.push_str(&format!("Z{unit:04X}"));
                }
            }
        }
    }
    Ok(out)
}

/// Reverse [`encode_tag`].
pub fn decode_tag(value: &str) -> ImageRefResult<String> {
    if value.is_empty() {
        return Err(ImageRefError::Empty);
    }
    let malformed = || ImageRefError::invalid(value, "malformed tag escape");
    let mut units: Vec<u16> = Vec::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        match c {
            'z' | 'Z' => {
                let width = if c == 'z' { 2 } else { 4 };
                let mut rest = chars.clone();
                if rest.next() == Some(c) {
                    chars = rest;
                    units.push(c as u16);
                    continue;
                }
                let hex: String = chars.by_ref().take(width).collect();
                let upper_hex = hex
                    .chars()
                    .all(|h| h.is_ascii_digit() || ('A'..='F').contains(&h));
                if hex.len() != width || !upper_hex {
                    return Err(malformed());
                }
                let unit = u16::from_str_radix(&hex, 16).map_err(|_| malformed())?;
                units.push(unit);
            }
            c if is_plain_tag_char(c) => units.push(c as u16),
            _ => return Err(malformed()),
        }
    }
    String::from_utf16(&units).map_err(|_| malformed())
}
