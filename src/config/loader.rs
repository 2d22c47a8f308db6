use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::types::StoreSettings;
use crate::schema::{KindRule, Schema, SchemaRule};

/// Errors that can occur when loading store settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read settings file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse settings file '{path}': {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Settings validation failed: {message}")]
    ValidationError { message: String },
}

impl StoreSettings {
    /// Returns the path to the settings file.
    ///
    /// Uses `~/.config/confstore/settings.toml` on Unix/macOS,
    /// or equivalent on other platforms via `dirs::config_dir()`.
    /// Falls back to current directory if config_dir is unavailable.
    pub fn settings_path() -> PathBuf {
        let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        config_dir.join("confstore").join("settings.toml")
    }

    /// Loads settings from the default settings file.
    ///
    /// - If the file doesn't exist, returns `StoreSettings::default()`.
    /// - Otherwise behaves like [`StoreSettings::load_from`].
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::settings_path();

        if !path.exists() {
            return Ok(StoreSettings::default());
        }

        Self::load_from(&path)
    }

    /// Loads and validates settings from a specific TOML file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let settings: StoreSettings =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.to_path_buf(),
                source: e,
            })?;

        settings.validate()?;
        Ok(settings)
    }

    /// Validates the settings.
    ///
    /// Checks:
    /// - At least one revision is retained
    /// - The document file is a bare file name
    /// - Every schema rule has a valid pattern and kind
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_revisions == 0 {
            return Err(ConfigError::ValidationError {
                message: "max_revisions must be at least 1".to_string(),
            });
        }

        let file = Path::new(&self.document_file);
        let is_bare = file.file_name().map(|n| n == file.as_os_str()).unwrap_or(false);
        if self.document_file.is_empty() || !is_bare {
            return Err(ConfigError::ValidationError {
                message: format!(
                    "document_file '{}' must be a plain file name",
                    self.document_file
                ),
            });
        }

        self.build_schema().map(|_| ())
    }

    /// Assemble the schema described by these settings.
    pub fn build_schema(&self) -> Result<Schema, ConfigError> {
        let mut schema = if self.builtin_schema {
            Schema::builtin()
        } else {
            Schema::empty()
        };

        for rule in &self.schema {
            let kind = KindRule::parse(&rule.kind).ok_or_else(|| ConfigError::ValidationError {
                message: format!(
                    "schema rule '{}' has unknown kind '{}' (expected map, list, scalar or any)",
                    rule.path, rule.kind
                ),
            })?;
            let required: Vec<&str> = rule.required.iter().map(String::as_str).collect();
            let built = SchemaRule::new(&rule.path, kind, &required).map_err(|e| {
                ConfigError::ValidationError {
                    message: format!("schema rule '{}': {}", rule.path, e),
                }
            })?;
            schema.push(built);
        }

        Ok(schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_settings(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join("settings.toml");
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_minimal_settings_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_settings(temp_dir.path(), "data_dir = \"/var/db/confstore\"\n");

        let settings = StoreSettings::load_from(&path).unwrap();
        assert_eq!(settings.data_dir, PathBuf::from("/var/db/confstore"));
        assert_eq!(settings.document_file, "config.json");
        assert_eq!(settings.max_revisions, 30);
        assert!(settings.builtin_schema);
        assert!(settings.schema.is_empty());
    }

    #[test]
    fn test_load_schema_rules() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_settings(
            temp_dir.path(),
            r#"
data_dir = "/tmp/cs"
max_revisions = 5
builtin_schema = false

[[schema]]
path = "interfaces/*"
kind = "map"
required = ["if"]
"#,
        );

        let settings = StoreSettings::load_from(&path).unwrap();
        let schema = settings.build_schema().unwrap();
        assert_eq!(schema.rules().len(), 1);
        assert_eq!(schema.rules()[0].pattern(), "interfaces/*");
    }

    #[test]
    fn test_rejects_zero_retention() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_settings(temp_dir.path(), "max_revisions = 0\n");

        match StoreSettings::load_from(&path).unwrap_err() {
            ConfigError::ValidationError { message } => {
                assert!(message.contains("max_revisions"), "got: {message}")
            }
            other => panic!("Expected ValidationError, got: {other:?}"),
        }
    }

    #[test]
    fn test_rejects_document_file_with_directory() {
        let mut settings = StoreSettings::with_data_dir("/tmp/cs");
        settings.document_file = "../escape.json".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_rejects_unknown_rule_kind() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_settings(
            temp_dir.path(),
            r#"
[[schema]]
path = "interfaces"
kind = "tree"
"#,
        );
        let err = StoreSettings::load_from(&path).unwrap_err().to_string();
        assert!(err.contains("tree"), "got: {err}");
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_settings(temp_dir.path(), "invalid { toml }");
        assert!(matches!(
            StoreSettings::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }
}
