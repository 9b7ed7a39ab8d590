//! CLI tests for the sft binary

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write_config(dir: &TempDir, transforms: &str) -> PathBuf {
    let path = dir.path().join("behavior-sft.yml");
    let content = format!(
        "model:\n  model-type: pi05\n  action-dim: 32\ndata:\n  repo-id: behavior-1k/demos\n  assets-dir: {}\n  transforms:\n{}",
        dir.path().join("assets").display(),
        transforms
    );
    fs::write(&path, content).unwrap();
    path
}

fn sft(config: &Path) -> Command {
    let mut cmd = Command::cargo_bin("sft").unwrap();
    cmd.arg("--config").arg(config).arg("--log-level").arg("warn");
    cmd
}

fn array(shape: &[usize], value: f32) -> serde_json::Value {
    let len: usize = shape.iter().product();
    serde_json::json!({ "shape": shape, "data": vec![value; len] })
}

fn dataset_line() -> String {
    serde_json::json!({
        "observation.images.rgb.head": array(&[2, 2, 3], 0.5),
        "observation.images.rgb.left_wrist": array(&[2, 2, 3], 0.5),
        "observation.images.rgb.right_wrist": array(&[2, 2, 3], 0.5),
        "observation.state": array(&[23], 1.0),
        "action": array(&[4, 23], 3.0),
        "prompt": "turn on the radio",
    })
    .to_string()
}

// =============================================================================
// Pipeline listing
// =============================================================================

#[test]
fn test_pipeline_lists_default_chain() {
    let temp = TempDir::new().unwrap();
    let config = write_config(&temp, "    subsample-action-stride: 1\n");

    sft(&config)
        .arg("pipeline")
        .assert()
        .success()
        .stdout(predicate::str::contains("repack"))
        .stdout(predicate::str::contains("behavior_inputs"))
        .stdout(predicate::str::contains("subsample_actions").not());
}

#[test]
fn test_pipeline_lists_optional_stages() {
    let temp = TempDir::new().unwrap();
    let config = write_config(&temp, "    subsample-action-stride: 2\n    delta-action-mask: [23]\n");

    sft(&config)
        .arg("pipeline")
        .assert()
        .success()
        .stdout(predicate::str::contains("subsample_actions"))
        .stdout(predicate::str::contains("delta_actions"))
        .stdout(predicate::str::contains("absolute_actions"));
}

// =============================================================================
// Configuration errors
// =============================================================================

#[test]
fn test_zero_stride_rejected() {
    let temp = TempDir::new().unwrap();
    let config = write_config(&temp, "    subsample-action-stride: 0\n");

    sft(&config)
        .arg("pipeline")
        .assert()
        .failure()
        .stderr(predicate::str::contains("subsample_action_stride"));
}

#[test]
fn test_mask_width_rejected() {
    let temp = TempDir::new().unwrap();
    let config = write_config(&temp, "    delta-action-mask: [6, -1, 6, -1]\n");

    sft(&config)
        .arg("pipeline")
        .assert()
        .failure()
        .stderr(predicate::str::contains("delta_action_mask"));
}

#[test]
fn test_config_prints_json() {
    let temp = TempDir::new().unwrap();
    let config = write_config(&temp, "    action-sequence-keys: [action, action.arm]\n");

    sft(&config)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"repo-id\": \"behavior-1k/demos\""))
        .stdout(predicate::str::contains("action.arm"));
}

// =============================================================================
// Record runs
// =============================================================================

#[test]
fn test_transform_then_postprocess() {
    let temp = TempDir::new().unwrap();
    let config = write_config(&temp, "    subsample-action-stride: 2\n    delta-action-mask: [23]\n");
    let input = temp.path().join("records.jsonl");
    let model_input = temp.path().join("model_input.jsonl");
    let restored = temp.path().join("restored.jsonl");
    fs::write(&input, format!("{}\n", dataset_line())).unwrap();

    sft(&config)
        .arg("transform")
        .arg(&input)
        .arg("--output")
        .arg(&model_input)
        .arg("--fail-fast")
        .assert()
        .success()
        .stderr(predicate::str::contains("1 records processed"));

    let line = fs::read_to_string(&model_input).unwrap();
    let record: serde_json::Value = serde_json::from_str(line.trim()).unwrap();
    assert_eq!(record["actions"]["shape"], serde_json::json!([2, 32]));
    // 3.0 - 1.0 on delta-encoded dims
    assert_eq!(record["actions"]["data"][0], serde_json::json!(2.0));
    assert_eq!(record["image_mask"]["base_0_rgb"], serde_json::json!(true));

    sft(&config)
        .arg("postprocess")
        .arg(&model_input)
        .arg("--output")
        .arg(&restored)
        .assert()
        .success();

    let line = fs::read_to_string(&restored).unwrap();
    let record: serde_json::Value = serde_json::from_str(line.trim()).unwrap();
    assert_eq!(record["actions"]["shape"], serde_json::json!([1, 23]));
    assert_eq!(record["actions"]["data"][0], serde_json::json!(3.0));
}

#[test]
fn test_transform_fail_fast_on_missing_field() {
    let temp = TempDir::new().unwrap();
    let config = write_config(&temp, "    subsample-action-stride: 1\n");
    let input = temp.path().join("records.jsonl");
    fs::write(&input, "{\"prompt\": \"no observations\"}\n").unwrap();

    sft(&config)
        .arg("transform")
        .arg(&input)
        .arg("--fail-fast")
        .assert()
        .failure()
        .stderr(predicate::str::contains("line 1"));
}

#[test]
fn test_transform_survives_empty_state() {
    let temp = TempDir::new().unwrap();
    let config = write_config(&temp, "    delta-action-mask: [23]\n");
    let input = temp.path().join("records.jsonl");
    let output = temp.path().join("out.jsonl");

    let with_state = |state: serde_json::Value| {
        let mut record: serde_json::Value = serde_json::from_str(&dataset_line()).unwrap();
        record["observation.state"] = state;
        record.to_string()
    };
    let lines = [
        // Zero-width state pads to zeros
        with_state(serde_json::json!({ "shape": [0], "data": [] })),
        // A state with no rows cannot anchor deltas and is skipped
        with_state(serde_json::json!({ "shape": [0, 23], "data": [] })),
        dataset_line(),
    ];
    fs::write(&input, format!("{}\n", lines.join("\n"))).unwrap();

    sft(&config)
        .arg("transform")
        .arg(&input)
        .arg("--output")
        .arg(&output)
        .assert()
        .success()
        .stderr(predicate::str::contains("2 records processed"));

    let written = fs::read_to_string(&output).unwrap();
    assert_eq!(written.lines().count(), 2);
    let first: serde_json::Value = serde_json::from_str(written.lines().next().unwrap()).unwrap();
    assert_eq!(first["state"]["shape"], serde_json::json!([32]));
    // 3.0 - 0.0 against the zero-padded state
    assert_eq!(first["actions"]["data"][0], serde_json::json!(3.0));
}
