//! Integration tests for the banklink CLI
//!
//! These tests exercise the CLI commands end-to-end using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const WIND_GUID: &str = "{00000000-0000-0000-0000-00000000abcd}";
const CLICK_GUID: &str = "{00000000-0000-0000-0000-000000001234}";

const MASTER: &str = r#"
path: bank:/Master
events:
  - path: event:/amb/wind
    id: "{00000000-0000-0000-0000-00000000abcd}"
    is_3d: true
    min_distance: 1.0
    max_distance: 20.0
    parameters:
      - { name: Strength, id: [1, 2], min: 0.0, max: 1.0, default: 0.5 }
      - { name: TimeOfDay, id: [9, 9], min: 0.0, max: 24.0, global: true }
  - path: event:/ui/click
    id: "{00000000-0000-0000-0000-000000001234}"
    is_one_shot: true
    length: 120
global_parameters:
  - { name: TimeOfDay, id: [9, 9], min: 0.0, max: 24.0, global: true }
"#;

/// Helper to get a banklink command
fn banklink() -> Command {
    Command::cargo_bin("banklink").unwrap()
}

fn write_bank(root: &Path, name: &str, manifest: &str) {
    let dir = root.join("Build");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(name), format!("BANK {name}")).unwrap();
    fs::write(dir.join(format!("{name}.yaml")), manifest).unwrap();
}

/// Helper to create a project with a flat build folder holding one master bank
fn setup_test_project() -> TempDir {
    let tmp = TempDir::new().unwrap();
    write_bank(tmp.path(), "Master.strings.bank", "path: bank:/Master.strings\n");
    write_bank(tmp.path(), "Master.bank", MASTER);

    banklink()
        .current_dir(tmp.path())
        .args(["init", "--bank-path", "Build"])
        .assert()
        .success();
    tmp
}

// ============================================================================
// CLI Basic Tests
// ============================================================================

#[test]
fn test_help_displays() {
    banklink()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("event cache"));
}

#[test]
fn test_version_displays() {
    banklink()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("banklink"));
}

#[test]
fn test_completions_bash() {
    banklink()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("banklink"));
}

// ============================================================================
// Init Tests
// ============================================================================

#[test]
fn test_init_creates_project() {
    let tmp = TempDir::new().unwrap();

    banklink()
        .current_dir(tmp.path())
        .args(["init", "--bank-path", "Audio/Build", "--linkage", "guid"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized banklink project"));

    let config = fs::read_to_string(tmp.path().join(".banklink/config.yaml")).unwrap();
    assert!(config.contains("source_bank_path: \"Audio/Build\""));
    assert!(config.contains("linkage: guid"));
}

#[test]
fn test_init_twice_warns() {
    let tmp = setup_test_project();

    banklink()
        .current_dir(tmp.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}

#[test]
fn test_commands_outside_project_fail() {
    let tmp = TempDir::new().unwrap();

    banklink()
        .current_dir(tmp.path())
        .args(["event", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a banklink project"));
}

// ============================================================================
// Cache Tests
// ============================================================================

#[test]
fn test_cache_rebuild_reports_counts() {
    let tmp = setup_test_project();

    banklink()
        .current_dir(tmp.path())
        .args(["cache", "rebuild"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cache rebuilt"))
        .stdout(predicate::str::contains("Events:      2"));
}

#[test]
fn test_cache_refresh_after_rebuild_is_noop() {
    let tmp = setup_test_project();

    banklink()
        .current_dir(tmp.path())
        .args(["cache", "rebuild"])
        .assert()
        .success();

    banklink()
        .current_dir(tmp.path())
        .args(["cache", "refresh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("up to date"));
}

#[test]
fn test_cache_status_json() {
    let tmp = setup_test_project();

    let output = banklink()
        .current_dir(tmp.path())
        .args(["cache", "status", "-f", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stats: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(stats["events"], 2);
    assert_eq!(stats["master_banks"], 1);
    assert_eq!(stats["global_parameters"], 1);
}

#[test]
fn test_cache_query_read_only() {
    let tmp = setup_test_project();

    banklink()
        .current_dir(tmp.path())
        .args(["cache", "rebuild"])
        .assert()
        .success();

    banklink()
        .current_dir(tmp.path())
        .args(["cache", "query", "SELECT path FROM events ORDER BY path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("event:/amb/wind"));

    banklink()
        .current_dir(tmp.path())
        .args(["cache", "query", "DELETE FROM events"])
        .assert()
        .failure();
}

#[test]
fn test_cache_rebuild_without_strings_bank_fails() {
    let tmp = setup_test_project();
    fs::remove_file(tmp.path().join("Build/Master.strings.bank")).unwrap();

    banklink()
        .current_dir(tmp.path())
        .args(["cache", "rebuild"])
        .assert()
        .failure();
}

// ============================================================================
// Browse Tests
// ============================================================================

#[test]
fn test_event_list_and_search() {
    let tmp = setup_test_project();

    banklink()
        .current_dir(tmp.path())
        .args(["event", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("event:/amb/wind"))
        .stdout(predicate::str::contains("event:/ui/click"));

    banklink()
        .current_dir(tmp.path())
        .args(["event", "list", "--search", "WIND", "-f", "id"])
        .assert()
        .success()
        .stdout(predicate::str::diff("event:/amb/wind\n"));
}

#[test]
fn test_event_show_by_guid() {
    let tmp = setup_test_project();

    banklink()
        .current_dir(tmp.path())
        .args(["event", "show", WIND_GUID])
        .assert()
        .success()
        .stdout(predicate::str::contains("event:/amb/wind"))
        .stdout(predicate::str::contains("Strength"))
        .stdout(predicate::str::contains("TimeOfDay"));
}

#[test]
fn test_bank_list() {
    let tmp = setup_test_project();

    banklink()
        .current_dir(tmp.path())
        .args(["bank", "list", "-f", "tsv"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Master\tmaster"))
        .stdout(predicate::str::contains("Master.strings\tstrings"));
}

#[test]
fn test_param_list_for_event() {
    let tmp = setup_test_project();

    banklink()
        .current_dir(tmp.path())
        .args(["param", "list", "--event", "event:/amb/wind", "-f", "id"])
        .assert()
        .success()
        .stdout(predicate::str::diff("Strength\nTimeOfDay\n"));
}

// ============================================================================
// Resolve Tests
// ============================================================================

#[test]
fn test_resolve_valid_reference() {
    let tmp = setup_test_project();

    banklink()
        .current_dir(tmp.path())
        .args(["resolve", "--path", "event:/ui/click", "--guid", CLICK_GUID])
        .assert()
        .success()
        .stdout(predicate::str::contains("valid"));
}

#[test]
fn test_resolve_guid_mismatch_under_path_linkage() {
    let tmp = setup_test_project();

    banklink()
        .current_dir(tmp.path())
        .args(["resolve", "--path", "event:/ui/click", "--guid", WIND_GUID])
        .assert()
        .success()
        .stdout(predicate::str::contains("GUID doesn't match path"));
}

#[test]
fn test_resolve_path_mismatch_under_guid_linkage() {
    let tmp = setup_test_project();

    banklink()
        .current_dir(tmp.path())
        .args([
            "--linkage",
            "guid",
            "resolve",
            "--path",
            "event:/amb/old",
            "--guid",
            WIND_GUID,
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Path doesn't match GUID"));
}

#[test]
fn test_resolve_moved_event() {
    let tmp = setup_test_project();

    banklink()
        .current_dir(tmp.path())
        .args(["resolve", "--path", "event:/amb/breeze", "--guid", WIND_GUID])
        .assert()
        .success()
        .stdout(predicate::str::contains("Moved to event:/amb/wind"));
}

#[test]
fn test_resolve_unknown_event_fails() {
    let tmp = setup_test_project();

    banklink()
        .current_dir(tmp.path())
        .args(["resolve", "--path", "event:/nowhere"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("not found"));
}

// ============================================================================
// Reference File Tests
// ============================================================================

#[test]
fn test_refs_check_then_fix() {
    let tmp = setup_test_project();
    let refs = tmp.path().join("levels/forest.refs.yaml");
    fs::create_dir_all(refs.parent().unwrap()).unwrap();
    fs::write(
        &refs,
        format!(
            "- name: ambience\n  path: event:/amb/breeze\n  guid: \"{WIND_GUID}\"\n- name: click\n  path: event:/ui/click\n"
        ),
    )
    .unwrap();

    banklink()
        .current_dir(tmp.path())
        .args(["refs", "check"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Moved to event:/amb/wind"));

    banklink()
        .current_dir(tmp.path())
        .args(["refs", "fix", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Would repair 2 reference(s)"));
    assert!(fs::read_to_string(&refs).unwrap().contains("event:/amb/breeze"));

    banklink()
        .current_dir(tmp.path())
        .args(["refs", "fix"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Repaired 2 reference(s) in 1 file(s)"));

    let fixed = fs::read_to_string(&refs).unwrap();
    assert!(fixed.contains("event:/amb/wind"));
    assert!(fixed.contains(CLICK_GUID));

    banklink()
        .current_dir(tmp.path())
        .args(["refs", "check"])
        .assert()
        .success()
        .stdout(predicate::str::contains("up to date"));
}

// ============================================================================
// Config Tests
// ============================================================================

#[test]
fn test_config_set_linkage() {
    let tmp = setup_test_project();

    banklink()
        .current_dir(tmp.path())
        .args(["config", "set", "linkage", "guid"])
        .assert()
        .success();

    banklink()
        .current_dir(tmp.path())
        .args(["config", "show", "-f", "yaml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("linkage: guid"))
        .stdout(predicate::str::contains("source_bank_path: Build"));
}
