use std::fs;

use confstore::config::{ConfigError, StoreSettings};
use confstore::{ConfigNode, ConfigStore, StoreError};
use tempfile::TempDir;

fn write_settings(dir: &TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("settings.toml");
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_settings_path_ends_with_expected() {
    let path = StoreSettings::settings_path();
    assert!(path.ends_with("confstore/settings.toml"));
}

#[test]
fn test_custom_schema_rule_is_enforced_on_commit() {
    let temp_dir = TempDir::new().unwrap();
    let data_dir = temp_dir.path().join("data");
    let path = write_settings(
        &temp_dir,
        &format!(
            r#"
data_dir = "{}"
max_revisions = 5

[[schema]]
path = "interfaces/*"
kind = "map"
required = ["if"]
"#,
            data_dir.display()
        ),
    );

    let settings = StoreSettings::load_from(&path).unwrap();
    assert_eq!(settings.max_revisions, 5);
    let store = ConfigStore::open(settings).unwrap();

    store
        .set("interfaces/lan/descr", ConfigNode::from("LAN"))
        .unwrap();
    let err = store.commit("Add lan").unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));

    store.set("interfaces/lan/if", ConfigNode::from("em1")).unwrap();
    store
        .set("interfaces/lan/descr", ConfigNode::from("LAN"))
        .unwrap();
    store.commit("Add lan").unwrap();
    assert!(data_dir.join("config.json").exists());
}

#[test]
fn test_builtin_schema_can_be_disabled() {
    let temp_dir = TempDir::new().unwrap();
    let mut settings = StoreSettings::with_data_dir(temp_dir.path());
    settings.builtin_schema = false;
    let store = ConfigStore::open(settings).unwrap();

    // "crl" must be a list under the built-in rules.
    store.set("crl", ConfigNode::from("anything")).unwrap();
    assert!(store.commit("Loose document").is_ok());
}

#[test]
fn test_unknown_rule_kind_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_settings(
        &temp_dir,
        r#"
[[schema]]
path = "system"
kind = "tree"
"#,
    );

    let result = StoreSettings::load_from(&path);
    assert!(matches!(result, Err(ConfigError::ValidationError { .. })));
}
