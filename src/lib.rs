//! Hierarchical configuration store with validated, durable, revisioned
//! commits.

pub mod config;
pub mod document;
pub mod error;
pub mod logging;
pub mod schema;
pub mod store;

pub use document::{ConfigMap, ConfigNode, ConfigPath, NodeKind, Scalar};
pub use error::{PathError, PersistError, StoreError, ValidationError};
pub use store::{ConfigStore, Revision, RevisionInfo, Snapshot, WorkingCopy};
