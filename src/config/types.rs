use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Settings for a configuration store instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Directory holding the active document, revision files and lock file.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// File name of the active document inside `data_dir`.
    #[serde(default = "default_document_file")]
    pub document_file: String,
    /// Number of revision files kept; oldest are pruned first.
    #[serde(default = "default_max_revisions")]
    pub max_revisions: usize,
    /// Apply the built-in rules for well-known subtrees.
    #[serde(default = "default_builtin_schema")]
    pub builtin_schema: bool,
    /// Extra structural rules, checked after the built-in ones.
    #[serde(default)]
    pub schema: Vec<SchemaRuleConfig>,
}

/// One `[[schema]]` entry in the settings file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaRuleConfig {
    /// Path pattern; `*` matches any key or index.
    pub path: String,
    /// One of "map", "list", "scalar", "any".
    #[serde(default = "default_rule_kind")]
    pub kind: String,
    /// Keys that must be present when the node is a map.
    #[serde(default)]
    pub required: Vec<String>,
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("confstore")
}

fn default_document_file() -> String {
    "config.json".to_string()
}

fn default_max_revisions() -> usize {
    30
}

fn default_builtin_schema() -> bool {
    true
}

fn default_rule_kind() -> String {
    "any".to_string()
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            document_file: default_document_file(),
            max_revisions: default_max_revisions(),
            builtin_schema: default_builtin_schema(),
            schema: Vec::new(),
        }
    }
}

impl StoreSettings {
    /// Defaults rooted at `data_dir`.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    pub fn document_path(&self) -> PathBuf {
        self.data_dir.join(&self.document_file)
    }

    pub fn revision_dir(&self) -> PathBuf {
        self.data_dir.join("backup")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.data_dir.join("confstore.lock")
    }
}
