//! Command line tests

use std::path::Path;
use std::process::Command;

fn pcbench(cwd: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_pcbench"));
    cmd.current_dir(cwd).env("RUST_LOG", "warn");
    cmd
}

fn is_empty(dir: &Path) -> bool {
    std::fs::read_dir(dir).unwrap().next().is_none()
}

#[test]
fn test_invalid_family_exits_without_output() {
    let dir = tempfile::tempdir().unwrap();
    let output = pcbench(dir.path()).args(["0", "FOO"]).output().unwrap();

    assert!(!output.status.success());
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("FOO"));
    assert!(is_empty(dir.path()));
}

#[test]
fn test_family_is_case_sensitive() {
    let dir = tempfile::tempdir().unwrap();
    let output = pcbench(dir.path()).args(["0", "hclt"]).output().unwrap();
    assert!(!output.status.success());
    assert!(is_empty(dir.path()));
}

#[test]
fn test_missing_arguments() {
    let dir = tempfile::tempdir().unwrap();
    let output = pcbench(dir.path()).output().unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Usage"));
    assert!(is_empty(dir.path()));
}

#[test]
fn test_invalid_config_value() {
    let dir = tempfile::tempdir().unwrap();
    let output = pcbench(dir.path())
        .args(["0", "HCLT", "--synthetic", "8x12", "--batch-size", "0"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("batch_size"));
    assert!(is_empty(dir.path()));
}

#[test]
fn test_hclt_synthetic_run_writes_report() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("bench.json");
    std::fs::write(&config, r#"{"budget_secs": 0.0, "batch_size": 4}"#).unwrap();
    let out = dir.path().join("out");
    std::fs::create_dir(&out).unwrap();

    // latents sweep up to 128 on a tiny dataset stays cheap
    let output = pcbench(dir.path())
        .args(["0", "HCLT", "--synthetic", "8x6", "--threads", "1", "--out-dir"])
        .arg(&out)
        .arg("--config")
        .arg(&config)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let report = out.join("pcs-jl-HCLT-trials.json");
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(report).unwrap()).unwrap();
    assert_eq!(json["latents"].as_array().unwrap().len(), 7);
    assert_eq!(json["latents"][6]["hparams"]["latents"], 128);
}
