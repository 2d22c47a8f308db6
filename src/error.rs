//! Error types for the configuration store.
//!
//! Every store operation either returns a value or one of these typed
//! errors; none of them leaves the committed document partially updated.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Malformed path syntax or an impossible write target.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("path '{path}' must not start with '/'")]
    LeadingSlash { path: String },

    #[error("path '{path}' has an empty segment at position {position}")]
    EmptySegment { path: String, position: usize },

    #[error("append marker (trailing '/') is only valid when setting a value: '{path}'")]
    AppendNotAllowed { path: String },

    #[error("'{segment}' is not a list index in path '{path}'")]
    InvalidIndex { path: String, segment: String },

    #[error("index {index} is past the end of the list (length {len}) in path '{path}'")]
    IndexOutOfBounds {
        path: String,
        index: usize,
        len: usize,
    },

    #[error("cannot descend into scalar at '{at}' while resolving '{path}'")]
    NotAContainer { path: String, at: String },

    #[error("cannot append to '{path}': existing node is not a list")]
    NotAList { path: String },

    #[error("the document root must be a map")]
    RootNotMap,

    #[error("the document root cannot be deleted")]
    RootNotRemovable,
}

/// A single structural problem found in a staged document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    /// Concrete path of the offending node (empty for the root).
    pub path: String,
    pub message: String,
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "<root>: {}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// The staged document failed schema validation.
///
/// Carries every violation found, not just the first.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct ValidationError {
    pub violations: Vec<SchemaViolation>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validation failed: ")?;
        for (i, violation) in self.violations.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", violation)?;
        }
        Ok(())
    }
}

/// Durable write failures. The previously committed document stays current.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("Failed to acquire commit lock '{path}': {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode document: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Errors returned by [`ConfigStore`](crate::store::ConfigStore) operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    #[error("Failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode '{path}': {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Revision {0} not found")]
    RevisionNotFound(u64),

    #[error("No usable configuration document in '{dir}'")]
    NoUsableDocument { dir: PathBuf },
}
