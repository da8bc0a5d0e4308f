//! CLI integration tests
//!
//! These tests drive the `snapvault` binary end to end against a temporary
//! store root and a temporary live collection.

use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

struct Fixture {
    dir: TempDir,
    store: PathBuf,
    live: PathBuf,
}

fn setup() -> Fixture {
    let dir = TempDir::new().unwrap();
    let store = dir.path().join("store");
    let live = dir.path().join("skills");
    fs::create_dir_all(live.join("pdf")).unwrap();
    fs::write(live.join("pdf/SKILL.md"), "v1\n").unwrap();
    Fixture { dir, store, live }
}

fn run(fx: &Fixture, args: &[&str]) -> Output {
    let cli_bin = env!("CARGO_BIN_EXE_snapvault");
    let root = format!("skills={}", fx.live.display());
    Command::new(cli_bin)
        .current_dir(fx.dir.path())
        .env("RUST_LOG", "off")
        .args(["--store-root", fx.store.to_str().unwrap(), "--root", &root])
        .args(args)
        .output()
        .expect("Failed to execute CLI")
}

fn run_ok(fx: &Fixture, args: &[&str]) -> String {
    let output = run(fx, args);
    assert!(
        output.status.success(),
        "CLI command {:?} should succeed. Stderr: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn run_json(fx: &Fixture, args: &[&str]) -> Value {
    let mut full = vec!["--json"];
    full.extend_from_slice(args);
    let stdout = run_ok(fx, &full);
    serde_json::from_str(&stdout).expect("stdout should be JSON")
}

fn create_snapshot(fx: &Fixture, message: &str) -> String {
    let snap = run_json(
        fx,
        &["snapshot", "create", "--collection", "skills", "-m", message],
    );
    snap["id"].as_str().unwrap().to_string()
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

#[test]
fn test_cli_snapshot_create_and_list() {
    let fx = setup();

    let first = create_snapshot(&fx, "first");
    let second = create_snapshot(&fx, "second");
    assert_ne!(first, second);

    let page = run_json(&fx, &["snapshot", "list", "--collection", "skills"]);
    let ids: Vec<&str> = page["snapshots"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec![second.as_str(), first.as_str()], "newest first");
    assert_eq!(page["snapshots"][0]["artifact_count"], 1);
}

#[test]
fn test_cli_snapshot_get_unknown_id_fails() {
    let fx = setup();
    create_snapshot(&fx, "only");

    let output = run(
        &fx,
        &["snapshot", "get", "--collection", "skills", "20000101-000000"],
    );
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Error:"));
}

#[test]
fn test_cli_unregistered_collection_fails() {
    let fx = setup();

    let output = run(&fx, &["snapshot", "create", "--collection", "agents"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("not registered"), "stderr: {}", stderr);
}

#[test]
fn test_cli_malformed_root_flag_fails() {
    let fx = setup();
    let cli_bin = env!("CARGO_BIN_EXE_snapvault");

    let output = Command::new(cli_bin)
        .args(["--store-root", fx.store.to_str().unwrap(), "--root", "skills"])
        .args(["snapshot", "list", "--collection", "skills"])
        .output()
        .expect("Failed to execute CLI");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("NAME=PATH"));
}

#[test]
fn test_cli_rollback_run_restores_and_audits() {
    let fx = setup();
    let target = create_snapshot(&fx, "v1");
    fs::write(fx.live.join("pdf/SKILL.md"), "v2\n").unwrap();
    create_snapshot(&fx, "v2");

    let analysis = run_json(
        &fx,
        &["rollback", "analyze", "--collection", "skills", &target],
    );
    assert_eq!(analysis["is_safe"], true);
    assert_eq!(analysis["files_safe_to_restore"][0], "pdf/SKILL.md");

    let result = run_json(&fx, &["rollback", "run", "--collection", "skills", &target]);
    assert_eq!(result["success"], true);
    assert_eq!(result["files_restored"], 1);
    assert!(result["safety_snapshot_id"].is_string());
    assert_eq!(read(&fx.live.join("pdf/SKILL.md")), "v1\n");

    let history = run_json(&fx, &["audit", "history", "--collection", "skills"]);
    let entries = history.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["target_snapshot_id"], target.as_str());
    assert_eq!(entries[0]["operation_type"], "intelligent");

    let entry_id = entries[0]["id"].as_str().unwrap();
    let shown = run_ok(&fx, &["audit", "show", "--collection", "skills", entry_id]);
    assert!(shown.contains(&target));
}

#[test]
fn test_cli_rollback_with_conflict_needs_yes() {
    let fx = setup();
    let target = create_snapshot(&fx, "v1");
    fs::write(fx.live.join("pdf/SKILL.md"), "v2\n").unwrap();
    create_snapshot(&fx, "v2");
    fs::write(fx.live.join("pdf/SKILL.md"), "local\n").unwrap();

    let output = run(&fx, &["rollback", "run", "--collection", "skills", &target]);
    assert!(!output.status.success(), "conflicts need --yes");
    assert_eq!(read(&fx.live.join("pdf/SKILL.md")), "local\n");

    let history = run_json(&fx, &["audit", "history", "--collection", "skills"]);
    assert!(history.as_array().unwrap().is_empty());

    let result = run_json(
        &fx,
        &["rollback", "run", "--collection", "skills", "--yes", &target],
    );
    assert_eq!(result["conflicts"][0]["file_path"], "pdf/SKILL.md");
    assert_eq!(read(&fx.live.join("pdf/SKILL.md")), "local\n");

    run_ok(
        &fx,
        &[
            "rollback",
            "resolve",
            "--collection",
            "skills",
            "--file",
            "pdf/SKILL.md",
            "--strategy",
            "use_remote",
            "--target",
            &target,
        ],
    );
    assert_eq!(read(&fx.live.join("pdf/SKILL.md")), "v1\n");
}

#[test]
fn test_cli_simple_rollback_requires_yes() {
    let fx = setup();
    let target = create_snapshot(&fx, "v1");
    fs::write(fx.live.join("pdf/SKILL.md"), "local\n").unwrap();
    fs::write(fx.live.join("extra.md"), "new\n").unwrap();

    let output = run(&fx, &["rollback", "simple", "--collection", "skills", &target]);
    assert!(!output.status.success());
    assert_eq!(read(&fx.live.join("pdf/SKILL.md")), "local\n");

    run_ok(
        &fx,
        &["rollback", "simple", "--collection", "skills", "--yes", &target],
    );
    assert_eq!(read(&fx.live.join("pdf/SKILL.md")), "v1\n");
    assert!(fx.live.join("extra.md").exists(), "absent from target, kept");
}

#[test]
fn test_cli_deploy_check_reports_drift() {
    let fx = setup();
    let deployed = fx.dir.path().join("project/pdf");
    fs::create_dir_all(&deployed).unwrap();
    fs::write(deployed.join("SKILL.md"), "v1\n").unwrap();
    let location = deployed.to_str().unwrap();

    run_json(
        &fx,
        &["deploy", "record-version", "--collection", "skills", "--artifact", "pdf"],
    );
    run_json(
        &fx,
        &["deploy", "register", "--artifact", "pdf", "--location", location],
    );

    let clean = run_json(&fx, &["deploy", "check"]);
    assert_eq!(clean[0]["is_modified"], false);

    fs::write(deployed.join("SKILL.md"), "edited\n").unwrap();
    let drifted = run_json(&fx, &["deploy", "check", "--artifact", "pdf"]);
    assert_eq!(drifted[0]["is_modified"], true);
    assert!(drifted[0]["modification_detected_at"].is_string());

    let graph = run_json(&fx, &["deploy", "graph", "--artifact", "pdf"]);
    assert_eq!(graph["statistics"]["total_deployments"], 1);
    assert_eq!(graph["statistics"]["modified_count"], 1);
}
