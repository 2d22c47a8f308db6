//! Tests for the `confstore` binary.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use confstore::document::codec;
use confstore::ConfigNode;
use tempfile::TempDir;

/// Run the binary against `dir`, with an empty settings file so the user's
/// own settings never leak in.
fn confstore(dir: &Path, args: &[&str]) -> Output {
    let settings = dir.join("settings.toml");
    if !settings.exists() {
        fs::write(&settings, "").expect("Failed to write settings");
    }
    Command::new(env!("CARGO_BIN_EXE_confstore"))
        .arg("--settings")
        .arg(&settings)
        .arg("--data-dir")
        .arg(dir.join("data"))
        .args(args)
        .env_remove("CONFSTORE_LOG")
        .output()
        .expect("Failed to execute command")
}

fn stdout_node(output: &Output) -> ConfigNode {
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    codec::decode(&output.stdout).expect("stdout is not a document")
}

#[test]
fn test_set_parses_json_values() {
    let temp_dir = TempDir::new().unwrap();

    let output = confstore(temp_dir.path(), &["set", "system/mtu", "1500"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("Committed revision 1"));

    let output = confstore(temp_dir.path(), &["get", "system/mtu"]);
    assert_eq!(stdout_node(&output), ConfigNode::from(1500_i64));

    confstore(temp_dir.path(), &["set", "system/acb", r#"{"enable": true}"#]);
    let output = confstore(temp_dir.path(), &["get", "system/acb/enable"]);
    assert_eq!(stdout_node(&output), ConfigNode::from(true));
}

#[test]
fn test_set_falls_back_to_plain_string() {
    let temp_dir = TempDir::new().unwrap();

    let output = confstore(temp_dir.path(), &["set", "system/hostname", "fw.home.arpa"]);
    assert!(output.status.success());

    let output = confstore(temp_dir.path(), &["get", "system/hostname"]);
    assert_eq!(stdout_node(&output), ConfigNode::from("fw.home.arpa"));
}

#[test]
fn test_get_absent_path_prints_default() {
    let temp_dir = TempDir::new().unwrap();

    let output = confstore(
        temp_dir.path(),
        &["get", "gateways/gateway_group", "--default", "[]"],
    );
    assert_eq!(stdout_node(&output), ConfigNode::List(Vec::new()));

    let output = confstore(temp_dir.path(), &["get", "system/hostname"]);
    assert_eq!(stdout_node(&output), ConfigNode::from(""));
}

#[test]
fn test_invalid_default_exits_with_error() {
    let temp_dir = TempDir::new().unwrap();

    let output = confstore(
        temp_dir.path(),
        &["get", "system/hostname", "--default", "{not json"],
    );
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("--default is not valid JSON"));
}

#[test]
fn test_revisions_and_restore() {
    let temp_dir = TempDir::new().unwrap();
    confstore(temp_dir.path(), &["set", "system/hostname", "alpha", "-m", "First"]);
    confstore(temp_dir.path(), &["set", "system/hostname", "beta"]);

    let output = confstore(temp_dir.path(), &["revisions"]);
    let listing = String::from_utf8_lossy(&output.stdout).to_string();
    assert!(listing.contains("First"), "got: {listing}");
    assert!(listing.contains("Set system/hostname"), "got: {listing}");

    let output = confstore(temp_dir.path(), &["restore", "1"]);
    assert!(String::from_utf8_lossy(&output.stdout).contains("as revision 3"));

    let output = confstore(temp_dir.path(), &["get", "system/hostname"]);
    assert_eq!(stdout_node(&output), ConfigNode::from("alpha"));
}

#[test]
fn test_log_file_is_written_at_exact_path() {
    let temp_dir = TempDir::new().unwrap();
    let log_path = temp_dir.path().join("confstore.log");
    fs::write(temp_dir.path().join("settings.toml"), "").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_confstore"))
        .arg("--settings")
        .arg(temp_dir.path().join("settings.toml"))
        .arg("--data-dir")
        .arg(temp_dir.path().join("data"))
        .args(["set", "system/hostname", "fw"])
        .env("CONFSTORE_LOG", &log_path)
        .env("RUST_LOG", "info")
        .output()
        .expect("Failed to execute command");
    assert!(output.status.success());

    let log = fs::read_to_string(&log_path).expect("log file at the exact path");
    assert!(log.contains("Configuration committed"), "got: {log}");
}
