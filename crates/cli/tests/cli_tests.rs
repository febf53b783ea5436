//! CLI integration tests

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../medcost-lib/tests/fixtures")
        .join(name)
}

/// Run the binary with an isolated config file
fn medcost(dir: &TempDir, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_medcost"))
        .arg("--config")
        .arg(dir.path().join("config.toml"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute command")
}

fn json(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let dir = TempDir::new().unwrap();
    let output = medcost(&dir, &["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("Medical Cost Estimator"), "Should show app name");
    for command in ["train", "evaluate", "predict", "inspect", "status"] {
        assert!(stdout.contains(command), "Should show {command} command");
    }
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let dir = TempDir::new().unwrap();
    let output = medcost(&dir, &["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("medcost"), "Should show binary name");
}

/// Test predict subcommand help
#[test]
fn test_predict_help() {
    let dir = TempDir::new().unwrap();
    let output = medcost(&dir, &["predict", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Predict help should succeed");
    for option in ["--age", "--sex", "--bmi", "--children", "--smoker", "--region"] {
        assert!(stdout.contains(option), "Should show {option} option");
    }
}

/// Test train subcommand help
#[test]
fn test_train_help() {
    let dir = TempDir::new().unwrap();
    let output = medcost(&dir, &["train", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Train help should succeed");
    assert!(stdout.contains("--no-standardize"));
    assert!(stdout.contains("--serve-model"));
}

#[test]
fn test_predict_with_golden_artifact() {
    let dir = TempDir::new().unwrap();
    let artifact = fixture("golden_model.json");
    let output = medcost(
        &dir,
        &[
            "--format", "json", "predict", "--age", "19", "--sex", "female", "--bmi", "27.9",
            "--children", "0", "--smoker", "yes", "--region", "southwest", "--artifact",
            artifact.to_str().unwrap(),
        ],
    );

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let value = json(&output);
    assert_eq!(value["predicted_cost"], 25096.0);
    assert_eq!(value["source"], "model");
    assert_eq!(value["version"], "linear_regression-dc09d95b3fa6");
}

#[test]
fn test_predict_falls_back_without_artifact() {
    let dir = TempDir::new().unwrap();
    let artifact = dir.path().join("absent.json");
    let output = medcost(
        &dir,
        &[
            "--format", "json", "predict", "--age", "19", "--sex", "female", "--bmi", "27.9",
            "--smoker", "yes", "--region", "southwest", "--artifact",
            artifact.to_str().unwrap(),
        ],
    );

    assert!(output.status.success());
    let value = json(&output);
    assert_eq!(value["source"], "fallback");
    let cost = value["predicted_cost"].as_f64().unwrap();
    assert!((cost - 33269.04).abs() < 0.005);
}

#[test]
fn test_predict_rejects_unknown_category() {
    let dir = TempDir::new().unwrap();
    let output = medcost(
        &dir,
        &[
            "predict", "--age", "30", "--sex", "male", "--bmi", "25", "--smoker", "maybe",
            "--region", "northeast",
        ],
    );
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("maybe"));
}

#[test]
fn test_predict_rejects_out_of_range_age() {
    let dir = TempDir::new().unwrap();
    let output = medcost(
        &dir,
        &[
            "predict", "--age", "121", "--sex", "male", "--bmi", "25", "--smoker", "no",
            "--region", "northeast",
        ],
    );
    assert!(!output.status.success());
}

#[test]
fn test_inspect_golden_artifact() {
    let dir = TempDir::new().unwrap();
    let artifact = fixture("golden_model.json");
    let output = medcost(
        &dir,
        &["--format", "json", "inspect", "--artifact", artifact.to_str().unwrap()],
    );

    assert!(output.status.success());
    let value = json(&output);
    assert_eq!(value["model"]["kind"], "linear_regression");
    assert_eq!(value["dataset_rows"], 40);
}

#[test]
fn test_train_then_status() {
    let dir = TempDir::new().unwrap();
    let artifact = dir.path().join("models").join("model.json");
    std::fs::write(
        dir.path().join("config.toml"),
        format!(
            "artifact_path = {:?}\ndataset_path = {:?}\ncv_folds = 3\n",
            artifact.to_str().unwrap(),
            fixture("insurance_sample.csv").to_str().unwrap()
        ),
    )
    .unwrap();

    let output = medcost(&dir, &["--format", "json", "train"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let value = json(&output);
    assert_eq!(value["report"]["selected"], "linear_regression");
    assert_eq!(value["saved"], true);
    assert!(artifact.exists());

    let output = medcost(&dir, &["--format", "json", "status"]);
    assert!(output.status.success());
    let value = json(&output);
    assert_eq!(value["health"]["status"], "healthy");
    assert!(value["stats"]["model_version"].is_string());
}

#[test]
fn test_train_fails_when_artifact_cannot_be_written() {
    let dir = TempDir::new().unwrap();
    let artifact = dir.path().join("model.json");
    std::fs::copy(fixture("golden_model.json"), &artifact).unwrap();
    // occupies the temp path the save writes through
    std::fs::create_dir(dir.path().join("model.tmp")).unwrap();
    std::fs::write(
        dir.path().join("config.toml"),
        format!(
            "artifact_path = {:?}\ndataset_path = {:?}\ncv_folds = 3\n",
            artifact.to_str().unwrap(),
            fixture("insurance_sample.csv").to_str().unwrap()
        ),
    )
    .unwrap();

    for format in ["table", "json"] {
        let output = medcost(&dir, &["--format", format, "train"]);
        assert!(!output.status.success(), "train should fail with {format} output");
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("could not be written"), "{stderr}");
        assert!(!String::from_utf8_lossy(&output.stdout).contains("Saved"));
    }

    let on_disk: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&artifact).unwrap()).unwrap();
    assert_eq!(on_disk["version"], "linear_regression-dc09d95b3fa6");
}

#[test]
fn test_status_fails_on_rejected_artifact() {
    let dir = TempDir::new().unwrap();
    let artifact = dir.path().join("model.json");
    let mut golden: serde_json::Value =
        serde_json::from_slice(&std::fs::read(fixture("golden_model.json")).unwrap()).unwrap();
    golden["model"]["intercept"] = serde_json::json!(-11000.0);
    std::fs::write(&artifact, serde_json::to_vec(&golden).unwrap()).unwrap();
    std::fs::write(
        dir.path().join("config.toml"),
        format!("artifact_path = {:?}\n", artifact.to_str().unwrap()),
    )
    .unwrap();

    let output = medcost(&dir, &["--format", "json", "status"]);
    assert!(!output.status.success());
    let value = json(&output);
    assert_eq!(value["health"]["status"], "unhealthy");
}

#[test]
fn test_status_degraded_without_artifact_succeeds() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("config.toml"),
        format!(
            "artifact_path = {:?}\n",
            dir.path().join("absent.json").to_str().unwrap()
        ),
    )
    .unwrap();

    let output = medcost(&dir, &["--format", "json", "status"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(json(&output)["health"]["status"], "degraded");
}

#[test]
fn test_evaluate_reports_candidates() {
    let dir = TempDir::new().unwrap();
    let dataset = fixture("insurance_sample.csv");
    let output = medcost(
        &dir,
        &["--format", "json", "evaluate", "--dataset", dataset.to_str().unwrap()],
    );

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let value = json(&output);
    assert!(!value["candidates"].as_array().unwrap().is_empty());
    assert_eq!(value["selected"], "linear_regression");
}

#[test]
fn test_metrics_dump() {
    let dir = TempDir::new().unwrap();
    let output = medcost(
        &dir,
        &[
            "--metrics", "predict", "--age", "40", "--sex", "male", "--bmi", "30", "--smoker",
            "no", "--region", "southeast", "--artifact",
            dir.path().join("absent.json").to_str().unwrap(),
        ],
    );
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("medcost_fallback_predictions_total"));
}
