//! E2E tests for the `ep` binary: convert → inspect → run on a temp instance.
//!
//! Each test runs `ep` as a subprocess in an isolated temp directory.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Test Harness
// ---------------------------------------------------------------------------

/// Build a Command targeting the `ep` binary, rooted in `dir`.
fn ep_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("ep"));
    cmd.current_dir(dir);
    // Keep the per-user config out of the run.
    cmd.env("XDG_CONFIG_HOME", dir);
    cmd.env("HOME", dir);
    // Suppress tracing output that goes to stderr
    cmd.env("EDGEPROP_LOG", "error");
    cmd.env_remove("EDGEPROP_TIMING");
    cmd
}

/// Write a six-edge instance named `town` (two triangles sharing node 3)
/// plus a geometry side file, and convert it.
fn town(dir: &Path) {
    fs::write(dir.join("town.edges"), "1 2\n2 3\n3 1\n3 4\n4 5\n5 3\n").expect("edges");
    let geometry: String = (0..6)
        .map(|i| format!("{i}\tLINESTRING ({i} 0, {} 0)\n", i + 1))
        .collect();
    fs::write(dir.join("town.geometry"), geometry).expect("geometry");
    ep_cmd(dir)
        .args(["convert", "--input", "town.edges", "--output", "town.epg"])
        .assert()
        .success();
}

fn run_json(dir: &Path, extra: &[&str]) -> Value {
    let output = ep_cmd(dir)
        .args(["--json", "run", "--instance-dir", ".", "--name", "town"])
        .args(extra)
        .output()
        .expect("run should not crash");
    assert!(
        output.status.success(),
        "run failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("run --json should produce valid JSON")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn convert_reports_counts() {
    let tmp = TempDir::new().expect("tempdir");
    fs::write(tmp.path().join("loop.edges"), "a b\nb b\n").expect("edges");
    ep_cmd(tmp.path())
        .args(["convert", "--input", "loop.edges", "--output", "loop.epg"])
        .assert()
        .success()
        .stdout(predicate::str::contains("edges:"))
        .stdout(predicate::str::contains("self-loops:    1"));
    assert!(tmp.path().join("loop.epg").exists());
}

#[test]
fn inspect_json_describes_the_instance() {
    let tmp = TempDir::new().expect("tempdir");
    town(tmp.path());

    let output = ep_cmd(tmp.path())
        .args(["--json", "inspect", "--instance-dir", ".", "--name", "town"])
        .output()
        .expect("inspect should not crash");
    assert!(output.status.success());
    let json: Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(json["nodes"], 5);
    assert_eq!(json["edges"], 6);
    assert_eq!(json["degree"]["max"], 4);
    assert_eq!(json["attributes"], serde_json::json!(["geometry"]));
    assert!(json["content_hash"].as_str().is_some_and(|h| h.starts_with("blake3:")));
}

#[test]
fn run_writes_state_file_and_summary() {
    let tmp = TempDir::new().expect("tempdir");
    town(tmp.path());

    let json = run_json(tmp.path(), &["--states", "3", "--iterations", "20", "--seed", "5"]);
    assert_eq!(json["edges"], 6);
    assert_eq!(json["rounds"], 20);
    let counts: u64 = json["state_counts"]
        .as_array()
        .expect("counts")
        .iter()
        .filter_map(Value::as_u64)
        .sum();
    assert_eq!(counts, 6);

    let state = fs::read_to_string(tmp.path().join("town.state")).expect("state file");
    let lines: Vec<&str> = state.lines().collect();
    assert_eq!(lines.len(), 6);
    for (i, line) in lines.iter().enumerate() {
        let (id, label) = line.split_once('\t').expect("tab separated");
        assert_eq!(id, i.to_string());
        assert!(label.parse::<u32>().expect("numeric label") < 3);
    }
}

#[test]
fn same_seed_same_state_file() {
    let tmp = TempDir::new().expect("tempdir");
    town(tmp.path());

    let args = ["--percent-zero", "0.3", "--percent-nonzero", "0.3", "--seed", "42"];
    run_json(tmp.path(), &args);
    let first = fs::read_to_string(tmp.path().join("town.state")).expect("first");
    run_json(tmp.path(), &args);
    let second = fs::read_to_string(tmp.path().join("town.state")).expect("second");
    assert_eq!(first, second);
}

#[test]
fn known_seeds_and_projection() {
    let tmp = TempDir::new().expect("tempdir");
    town(tmp.path());
    fs::write(tmp.path().join("town.seeds"), "0\t2\n").expect("seeds");

    let json = run_json(
        tmp.path(),
        &[
            "--states",
            "3",
            "--percent-zero",
            "0",
            "--percent-nonzero",
            "0",
            "--projection",
            "town.jsonl",
            "--no-state-file",
        ],
    );
    assert_eq!(json["seeds"]["known"], 1);
    assert!(json.get("state_file").is_none());
    assert!(!tmp.path().join("town.state").exists());

    let projection = fs::read_to_string(tmp.path().join("town.jsonl")).expect("projection");
    let rows: Vec<Value> = projection
        .lines()
        .map(|l| serde_json::from_str(l).expect("json line"))
        .collect();
    assert_eq!(rows.len(), 6);
    assert_eq!(rows[0]["state"], 2);
    assert_eq!(rows[0]["u"], "1");
    assert_eq!(rows[0]["geometry"], "LINESTRING (0 0, 1 0)");
    // Only one labeled source, so every edge follows it.
    assert!(rows.iter().all(|r| r["state"] == 2));
}

#[test]
fn config_file_is_applied_and_flags_win() {
    let tmp = TempDir::new().expect("tempdir");
    town(tmp.path());
    fs::write(tmp.path().join("run.toml"), "states = 4\niterations = 3\n").expect("config");

    let json = run_json(tmp.path(), &["--config", "run.toml", "--iterations", "5"]);
    assert_eq!(json["rounds"], 5);
    assert_eq!(json["state_counts"].as_array().map(Vec::len), Some(4));
}

#[test]
fn invalid_parameters_fail_with_error_code() {
    let tmp = TempDir::new().expect("tempdir");
    town(tmp.path());

    ep_cmd(tmp.path())
        .args(["run", "--instance-dir", ".", "--name", "town", "--states", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E2001"));

    ep_cmd(tmp.path())
        .args(["run", "--instance-dir", ".", "--name", "town", "--iterations", "-3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("iterations must be non-negative"));
}

#[test]
fn missing_instance_reports_json_error() {
    let tmp = TempDir::new().expect("tempdir");
    let output = ep_cmd(tmp.path())
        .args(["--json", "run", "--instance-dir", ".", "--name", "ghost"])
        .output()
        .expect("run should not crash");
    assert!(!output.status.success());
    let json: Value = serde_json::from_slice(&output.stderr).expect("json error");
    assert_eq!(json["error"]["error_code"], "E1001");
}

#[test]
fn mismatched_side_file_is_rejected() {
    let tmp = TempDir::new().expect("tempdir");
    town(tmp.path());
    fs::write(tmp.path().join("town.cost"), "0\t1.5\n").expect("cost");

    ep_cmd(tmp.path())
        .args(["run", "--instance-dir", ".", "--name", "town"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E3003"));
}

#[test]
fn timing_report_goes_to_stderr() {
    let tmp = TempDir::new().expect("tempdir");
    town(tmp.path());

    ep_cmd(tmp.path())
        .args(["--timing", "run", "--instance-dir", ".", "--name", "town", "--iterations", "2"])
        .assert()
        .success()
        .stderr(predicate::str::contains("timing report:"))
        .stderr(predicate::str::contains("diffuse"))
        .stderr(predicate::str::contains("sink"));
}
