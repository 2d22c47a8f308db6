//! Shared test utilities.

#![allow(dead_code, unused_imports)]

use confstore::config::StoreSettings;
use confstore::{ConfigMap, ConfigNode, ConfigStore};
use std::path::Path;
use tempfile::TempDir;

/// Open a store rooted in a fresh temp dir with default settings.
pub fn temp_store() -> (TempDir, ConfigStore) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let store = open_store(temp_dir.path());
    (temp_dir, store)
}

pub fn open_store(dir: &Path) -> ConfigStore {
    ConfigStore::open(StoreSettings::with_data_dir(dir)).expect("Failed to open store")
}

/// Open a store with a custom retention limit.
pub fn open_store_with_retention(dir: &Path, max_revisions: usize) -> ConfigStore {
    let mut settings = StoreSettings::with_data_dir(dir);
    settings.max_revisions = max_revisions;
    ConfigStore::open(settings).expect("Failed to open store")
}

/// Build a map node from key/value pairs.
pub fn map(entries: &[(&str, ConfigNode)]) -> ConfigNode {
    ConfigNode::Map(
        entries
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect::<ConfigMap>(),
    )
}

pub fn gateway_group(name: &str) -> ConfigNode {
    map(&[
        ("name", ConfigNode::from(name)),
        (
            "item",
            ConfigNode::from(vec![ConfigNode::from("WAN_DHCP|1|address")]),
        ),
        ("trigger", ConfigNode::from("down")),
    ])
}

/// String value at `path` in the committed document.
pub fn text(store: &ConfigStore, path: &str) -> Option<String> {
    store
        .try_get(path)
        .ok()
        .flatten()
        .and_then(|node| node.as_str().map(str::to_string))
}
