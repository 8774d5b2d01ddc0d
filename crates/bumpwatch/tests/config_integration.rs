//! Configuration integration tests.
//!
//! These tests verify config discovery, format parsing, and precedence
//! from an end-to-end perspective using the compiled binary. `info --json`
//! reports the resolved configuration, which makes precedence observable.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Returns a Command configured to run our binary.
#[allow(deprecated)]
fn cmd() -> Command {
    let mut cmd = Command::cargo_bin(env!("CARGO_PKG_NAME")).unwrap();
    cmd.env_remove("GITHUB_OUTPUT").env_remove("RUST_LOG");
    cmd
}

fn resolved(dir: &Path, extra: &[&str]) -> Value {
    let output = cmd()
        .args(["-C", dir.to_str().unwrap()])
        .args(extra)
        .args(["info", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    serde_json::from_slice(&output.stdout).unwrap()
}

// =============================================================================
// Config File Discovery
// =============================================================================

#[test]
fn runs_without_config_file() {
    let tmp = TempDir::new().unwrap();
    let info = resolved(tmp.path(), &[]);
    assert_eq!(info["config"]["file"], "package.json");
    assert_eq!(info["config"]["fetch_concurrency"], 8);
}

#[test]
fn discovers_dotfile_config_in_current_dir() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join(".bumpwatch.toml"),
        "[track]\nfile = \"Cargo.toml\"\n",
    )
    .unwrap();

    let info = resolved(tmp.path(), &[]);
    assert_eq!(info["config"]["file"], "Cargo.toml");
    assert!(
        info["config"]["config_file"]
            .as_str()
            .unwrap()
            .ends_with(".bumpwatch.toml")
    );
}

#[test]
fn discovers_config_in_parent_directory() {
    let tmp = TempDir::new().unwrap();
    let sub_dir = tmp.path().join("nested").join("deep");
    fs::create_dir_all(&sub_dir).unwrap();
    fs::write(
        tmp.path().join("bumpwatch.toml"),
        "[publish]\nregistry_version = \"3.1.4\"\n",
    )
    .unwrap();

    let info = resolved(&sub_dir, &[]);
    assert_eq!(info["config"]["registry_version"], "3.1.4");
}

#[test]
fn dotfile_takes_precedence_over_regular_name() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join(".bumpwatch.toml"), "[track]\nfile = \"dot.json\"\n").unwrap();
    fs::write(tmp.path().join("bumpwatch.toml"), "[track]\nfile = \"plain.json\"\n").unwrap();

    let info = resolved(tmp.path(), &[]);
    assert_eq!(info["config"]["file"], "dot.json");
}

// =============================================================================
// Config Format Parsing
// =============================================================================

#[test]
fn parses_yaml_config() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join(".bumpwatch.yaml"),
        "publish:\n  relevant_files:\n    - \"lib/**\"\n    - \"bin/*\"\n",
    )
    .unwrap();

    let info = resolved(tmp.path(), &[]);
    assert_eq!(info["config"]["relevant_files"][0], "lib/**");
    assert_eq!(info["config"]["relevant_files"][1], "bin/*");
}

#[test]
fn parses_json_config() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join(".bumpwatch.json"),
        r#"{"track": {"extraction": "regex:\"version\": \"([^\"]+)\""}}"#,
    )
    .unwrap();

    let info = resolved(tmp.path(), &[]);
    assert_eq!(
        info["config"]["extraction"],
        r#"regex:"version": "([^"]+)""#
    );
}

// =============================================================================
// Config Precedence
// =============================================================================

#[test]
fn closer_config_takes_precedence() {
    let tmp = TempDir::new().unwrap();
    let sub_dir = tmp.path().join("project");
    fs::create_dir_all(&sub_dir).unwrap();
    fs::write(tmp.path().join(".bumpwatch.toml"), "[track]\nfile = \"outer.json\"\n").unwrap();
    fs::write(sub_dir.join(".bumpwatch.toml"), "[track]\nfile = \"inner.json\"\n").unwrap();

    let info = resolved(&sub_dir, &[]);
    assert_eq!(info["config"]["file"], "inner.json");
}

#[test]
fn toml_preferred_over_yaml_in_same_directory() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join(".bumpwatch.toml"), "[track]\nfile = \"toml.json\"\n").unwrap();
    fs::write(tmp.path().join(".bumpwatch.yaml"), "track:\n  file: yaml.json\n").unwrap();

    let info = resolved(tmp.path(), &[]);
    assert_eq!(info["config"]["file"], "toml.json");
}

#[test]
fn explicit_config_flag_overrides_discovered() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join(".bumpwatch.toml"), "[track]\nfile = \"a.json\"\n").unwrap();
    let explicit = tmp.path().join("ci.toml");
    fs::write(&explicit, "[track]\nfile = \"b.json\"\n").unwrap();

    let info = resolved(tmp.path(), &["--config", explicit.to_str().unwrap()]);
    assert_eq!(info["config"]["file"], "b.json");
}

#[test]
fn config_drives_check() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("snapshot.json"),
        r#"{
  "commits": [
    { "sha": "a1", "parents": [], "message": "base" },
    { "sha": "b2", "parents": ["a1"], "message": "work" }
  ],
  "contents": {
    "a1": { "manifest.json": "{\"version\":\"0.0.40\"}" },
    "b2": { "manifest.json": "{\"version\":\"0.0.40\"}" }
  },
  "changed_files": [{ "filename": "lib/index.ts", "status": "modified" }]
}"#,
    )
    .unwrap();
    fs::write(
        tmp.path().join(".bumpwatch.toml"),
        r#"
[track]
file = "manifest.json"

[publish]
registry_version = "0.0.40"
relevant_files = ["lib/*.ts"]
"#,
    )
    .unwrap();

    let output = cmd()
        .args(["-C", tmp.path().to_str().unwrap()])
        .args(["--json", "check", "--snapshot", "snapshot.json", "--base", "a1", "--head", "b2"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let json: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["decision"]["publish"], true);
    assert_eq!(json["decision"]["version"], "0.0.41-0");
    assert_eq!(json["decision"]["rationale"], "relevant-files-increment");
}

// =============================================================================
// Error Cases
// =============================================================================

#[test]
fn invalid_toml_config_shows_error() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join(".bumpwatch.toml"), "this is not valid toml [[[").unwrap();

    cmd()
        .args(["-C", tmp.path().to_str().unwrap(), "info"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("configuration"));
}

#[test]
fn invalid_json_config_shows_error() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join(".bumpwatch.json"), "{not valid json}").unwrap();

    cmd()
        .args(["-C", tmp.path().to_str().unwrap(), "info"])
        .assert()
        .failure();
}

#[test]
fn missing_explicit_config_fails() {
    let tmp = TempDir::new().unwrap();
    cmd()
        .args(["-C", tmp.path().to_str().unwrap(), "--config", "absent.toml", "info"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("absent.toml"));
}

#[test]
fn unknown_config_field_is_ignored() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join(".bumpwatch.toml"),
        "log_level = \"info\"\nunknown_field = \"ignored\"\n",
    )
    .unwrap();

    cmd()
        .args(["-C", tmp.path().to_str().unwrap(), "info"])
        .assert()
        .success();
}

// =============================================================================
// Boundary Marker Tests
// =============================================================================

#[test]
fn git_boundary_stops_config_search() {
    let tmp = TempDir::new().unwrap();
    let parent = tmp.path().join("parent");
    let repo = parent.join("repo");
    let src = repo.join("src");
    fs::create_dir_all(&src).unwrap();
    fs::write(parent.join(".bumpwatch.toml"), "[track]\nfile = \"outside.json\"\n").unwrap();
    fs::create_dir(repo.join(".git")).unwrap();

    let info = resolved(&src, &[]);
    assert_eq!(info["config"]["file"], "package.json");
}

#[test]
fn config_in_same_dir_as_git_is_found() {
    let tmp = TempDir::new().unwrap();
    let repo = tmp.path().join("repo");
    let src = repo.join("src");
    fs::create_dir_all(&src).unwrap();
    fs::create_dir(repo.join(".git")).unwrap();
    fs::write(repo.join(".bumpwatch.toml"), "[track]\nfile = \"repo.json\"\n").unwrap();

    let info = resolved(&src, &[]);
    assert_eq!(info["config"]["file"], "repo.json");
}
