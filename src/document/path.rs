//! Slash-delimited addressing into the document tree.

use std::fmt;
use std::str::FromStr;

use crate::error::PathError;

/// A parsed path such as `openvpn/openvpn-server/0/local_port`.
///
/// The empty path addresses the root. A trailing `/` marks an append:
/// `openvpn/openvpn-server/` adds a new element to that list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConfigPath {
    segments: Vec<String>,
    append: bool,
}

impl ConfigPath {
    /// The root of the document.
    pub fn root() -> Self {
        Self {
            segments: Vec::new(),
            append: false,
        }
    }

    pub fn parse(raw: &str) -> Result<Self, PathError> {
        if raw.is_empty() {
            return Ok(Self::root());
        }
        if raw.starts_with('/') {
            return Err(PathError::LeadingSlash {
                path: raw.to_string(),
            });
        }

        let (body, append) = match raw.strip_suffix('/') {
            Some(body) => (body, true),
            None => (raw, false),
        };

        let mut segments = Vec::new();
        for (position, segment) in body.split('/').enumerate() {
            if segment.is_empty() {
                return Err(PathError::EmptySegment {
                    path: raw.to_string(),
                    position,
                });
            }
            segments.push(segment.to_string());
        }

        Ok(Self { segments, append })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn is_append(&self) -> bool {
        self.append
    }

    /// Path made of a child key under this one.
    pub fn join(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self {
            segments,
            append: false,
        }
    }

    /// The first `len` segments rendered as a path string.
    pub fn prefix(&self, len: usize) -> String {
        self.segments[..len.min(self.segments.len())].join("/")
    }
}

impl FromStr for ConfigPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ConfigPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))?;
        if self.append {
            write!(f, "/")?;
        }
        Ok(())
    }
}
