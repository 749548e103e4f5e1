//! End-to-end CLI tests for `epidemic run` and `epidemic campaign`.
//!
//! Each test drives the `epidemic` binary as a subprocess against a temp
//! directory, matching the reference scenarios in SPEC_FULL.md §8.

use assert_cmd::Command;
use serde_json::Value;
use std::path::Path;

fn epidemic_cmd() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("epidemic"));
    cmd.env("EPIDEMIC_LOG", "error");
    cmd
}

fn write_workload(dir: &Path, lines: &[&str]) -> std::path::PathBuf {
    let path = dir.join("workload.jsonl");
    std::fs::write(&path, lines.join("\n")).unwrap();
    path
}

#[test]
fn run_with_no_workload_converges_trivially() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    epidemic_cmd()
        .args(["run", "--replicas", "3", "--ticks", "5", "--out"])
        .arg(&out)
        .assert()
        .success();
    assert!(out.join("summary.json").exists());
    let summary: Value =
        serde_json::from_str(&std::fs::read_to_string(out.join("summary.json")).unwrap()).unwrap();
    assert_eq!(summary["replicas"], 3);
}

#[test]
fn run_two_replicas_no_loss_direct_mail_converges() {
    let dir = tempfile::tempdir().unwrap();
    let workload = write_workload(
        dir.path(),
        &[r#"{"op_id":"R0:1","op":"SET","key":"a","value":1,"ts":[1,"R0"],"origin":"R0"}"#],
    );
    let out = dir.path().join("out");
    epidemic_cmd()
        .args([
            "run",
            "--algo",
            "direct-mail",
            "--replicas",
            "2",
            "--ticks",
            "50",
            "--drop-rate",
            "0",
        ])
        .arg("--workload")
        .arg(&workload)
        .arg("--out")
        .arg(&out)
        .assert()
        .success();

    let r0: Value = serde_json::from_str(
        &std::fs::read_to_string(out.join("final_states").join("R0.json")).unwrap(),
    )
    .unwrap();
    let r1: Value = serde_json::from_str(
        &std::fs::read_to_string(out.join("final_states").join("R1.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(r0["a"]["value"], 1);
    assert_eq!(r1["a"]["value"], 1);

    let summary: Value =
        serde_json::from_str(&std::fs::read_to_string(out.join("summary.json")).unwrap()).unwrap();
    assert!(summary["converged_at_tick"].is_number());
}

#[test]
fn run_rejects_invalid_replica_count() {
    let dir = tempfile::tempdir().unwrap();
    epidemic_cmd()
        .args(["run", "--replicas", "0", "--format", "json"])
        .current_dir(dir.path())
        .assert()
        .failure();
}

#[test]
fn run_json_format_emits_parseable_summary() {
    let dir = tempfile::tempdir().unwrap();
    let assert = epidemic_cmd()
        .args(["run", "--replicas", "3", "--ticks", "5", "--format", "json"])
        .current_dir(dir.path())
        .assert()
        .success();
    let output = assert.get_output();
    let _: Value = serde_json::from_slice(&output.stdout).expect("valid JSON summary");
}

#[test]
fn campaign_reports_seeds_run_in_json() {
    let dir = tempfile::tempdir().unwrap();
    let assert = epidemic_cmd()
        .args([
            "campaign",
            "--replicas",
            "4",
            "--ticks",
            "50",
            "--seeds",
            "3",
            "--format",
            "json",
        ])
        .current_dir(dir.path())
        .assert();
    let output = assert.get_output();
    let report: Value = serde_json::from_slice(&output.stdout).expect("valid JSON report");
    assert_eq!(report["seeds_run"], 3);
}

#[test]
fn completions_bash_emits_script() {
    epidemic_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicates::str::contains("epidemic"));
}
