//! CLI integration tests

use std::process::{Command, Output};

fn fixture(name: &str) -> String {
    format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name)
}

fn hpactl(args: &[&str]) -> Output {
    Command::new("cargo")
        .args(["run", "-q", "-p", "hpactl", "--"])
        .args(args)
        .env_remove("HPACTL_CONFIG")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute command")
}

fn stdout_json(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = hpactl(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("evaluate"), "Should show evaluate command");
    assert!(stdout.contains("gather"), "Should show gather command");
    assert!(stdout.contains("simulate"), "Should show simulate command");
    assert!(stdout.contains("--tolerance"), "Should show tolerance option");
    assert!(stdout.contains("--format"), "Should show format option");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = hpactl(&["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("hpactl"), "Should show binary name");
}

/// Test simulate subcommand help
#[test]
fn test_simulate_help() {
    let output = hpactl(&["simulate", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Simulate help should succeed");
    assert!(stdout.contains("--snapshot"), "Should show snapshot option");
    assert!(stdout.contains("--specs"), "Should show specs option");
    assert!(stdout.contains("--selector"), "Should show selector option");
    assert!(
        stdout.contains("--current-replicas"),
        "Should show current-replicas option"
    );
}

#[test]
fn test_evaluate_partial_failure_still_succeeds() {
    let output = hpactl(&[
        "--format",
        "json",
        "evaluate",
        "--input",
        &fixture("gathered.json"),
        "--current-replicas",
        "3",
    ]);

    assert!(output.status.success(), "Partial evaluation should succeed");

    let report = stdout_json(&output);
    assert_eq!(report["currentReplicas"], 3);
    assert_eq!(report["targetReplicas"], 5);
    assert_eq!(report["partial"], true);
    assert_eq!(report["proposals"].as_array().unwrap().len(), 2);
    assert_eq!(report["errors"][0]["metric"], "Pods/requests_per_second");
}

#[test]
fn test_evaluate_tolerance_override() {
    // The resource metric proposes 4 and the external one 5; a wide dead-band
    // keeps the current count for both.
    let output = hpactl(&[
        "--format",
        "json",
        "--tolerance",
        "2.0",
        "evaluate",
        "--input",
        &fixture("gathered.json"),
        "--current-replicas",
        "3",
    ]);

    assert!(output.status.success());
    assert_eq!(stdout_json(&output)["targetReplicas"], 3);
}

#[test]
fn test_evaluate_total_failure_exits_non_zero() {
    let output = hpactl(&[
        "--format",
        "json",
        "evaluate",
        "--input",
        &fixture("all_failing.json"),
        "--current-replicas",
        "3",
    ]);

    assert!(!output.status.success(), "Total failure should fail");

    let report = stdout_json(&output);
    assert!(report["targetReplicas"].is_null());
    assert_eq!(report["errors"].as_array().unwrap().len(), 1);

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid metrics"), "Should explain the failure");
}

#[test]
fn test_simulate_from_snapshot() {
    let output = hpactl(&[
        "--format",
        "json",
        "simulate",
        "--snapshot",
        &fixture("snapshot.json"),
        "--specs",
        &fixture("specs.json"),
        "--namespace",
        "shop",
        "-l",
        "app=web",
        "--current-replicas",
        "3",
    ]);

    assert!(output.status.success(), "Simulate should succeed");

    let report = stdout_json(&output);
    // cpu at 150% of request against a 50% target on two ready pods
    assert_eq!(report["targetReplicas"], 6);
    assert_eq!(report["proposals"].as_array().unwrap().len(), 3);

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("External/not_exported"),
        "Should warn about the metric that could not be gathered"
    );
}

#[test]
fn test_gather_writes_output_file() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("gathered.json");

    let output = hpactl(&[
        "gather",
        "--snapshot",
        &fixture("snapshot.json"),
        "--specs",
        &fixture("specs.json"),
        "--namespace",
        "shop",
        "--selector",
        "app=web",
        "--output",
        out.to_str().unwrap(),
    ]);

    assert!(output.status.success(), "Gather should succeed");

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    let metrics = written.as_array().unwrap();
    assert_eq!(metrics.len(), 3);
    assert_eq!(metrics[0]["resource"]["readyPodCount"], 2);
    assert_eq!(metrics[0]["resource"]["requests"]["web-1"], 200);
}

#[test]
fn test_metrics_file_written() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hpactl.prom");

    let output = hpactl(&[
        "--format",
        "json",
        "--metrics-file",
        path.to_str().unwrap(),
        "evaluate",
        "--input",
        &fixture("gathered.json"),
        "--current-replicas",
        "3",
    ]);

    assert!(output.status.success());

    let rendered = std::fs::read_to_string(&path).unwrap();
    assert!(rendered.contains("replica_evaluator_evaluations_total 1"));
    assert!(rendered.contains("replica_evaluator_partial_evaluations_total 1"));
}

/// Test invalid command error handling
#[test]
fn test_invalid_command() {
    let output = hpactl(&["invalid-command"]);

    assert!(!output.status.success(), "Invalid command should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("error") || stderr.contains("invalid"),
        "Should show error message"
    );
}

/// Test missing required argument error handling
#[test]
fn test_missing_argument() {
    let output = hpactl(&["evaluate", "--input", &fixture("gathered.json")]);

    assert!(!output.status.success(), "Missing argument should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("required") || stderr.contains("error"),
        "Should show error about missing argument"
    );
}
