//! Store settings: where the document lives, how many revisions to keep,
//! and which schema rules apply.

pub mod loader;
pub mod types;

pub use loader::ConfigError;
pub use types::{SchemaRuleConfig, StoreSettings};
