//! Run the `dpg` binary against the demo pipelines.

use std::path::PathBuf;
use std::process::{Command, Output};

fn demos() -> PathBuf {
    let mut dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    dir.pop(); // crates
    dir.pop(); // workspace root
    dir.join("demos")
}

fn dpg(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_dpg"))
        .args(args)
        .env_remove("DPG_CONFIG")
        .output()
        .unwrap()
}

fn demo(name: &str) -> String {
    demos().join(name).display().to_string()
}

#[test]
fn check_holds_and_fails_with_exit_codes() {
    let config = demo("dpg.yaml");
    let pipeline = demo("bounded_sum.yaml");
    let ok = dpg(&["--config", &config, "pipeline", "check", &pipeline, "--d-in", "1", "--d-out", "10.0"]);
    assert_eq!(ok.status.code(), Some(0));
    assert_eq!(String::from_utf8_lossy(&ok.stdout).trim(), "holds");

    let tight = dpg(&["--config", &config, "pipeline", "check", &pipeline, "--d-in", "1", "--d-out", "9.0"]);
    assert_eq!(tight.status.code(), Some(1));
}

#[test]
fn missing_features_are_operational_errors() {
    let pipeline = demo("bounded_sum.yaml");
    let out = dpg(&["pipeline", "check", &pipeline, "--d-in", "1", "--d-out", "10.0"]);
    assert_eq!(out.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&out.stderr).contains("contrib"));
}

#[test]
fn features_flag_overrides_config() {
    let pipeline = demo("bounded_sum.yaml");
    let out = dpg(&[
        "--features",
        "contrib,floating-point",
        "pipeline",
        "map",
        &pipeline,
        "--d-in",
        "2",
    ]);
    assert_eq!(out.status.code(), Some(0));
    assert_eq!(String::from_utf8_lossy(&out.stdout).trim(), "20.0");
}

#[test]
fn composed_pipeline_maps_to_approx_dp_pair() {
    let out = dpg(&[
        "--config",
        &demo("dpg.yaml"),
        "pipeline",
        "map",
        &demo("count_and_sum.yaml"),
        "--d-in",
        "1",
    ]);
    assert_eq!(out.status.code(), Some(0));
    assert_eq!(String::from_utf8_lossy(&out.stdout).trim(), "[2.0,0.0]");
}

#[test]
fn json_pipeline_invokes() {
    let out = dpg(&[
        "--config",
        &demo("dpg.yaml"),
        "pipeline",
        "invoke",
        &demo("gaussian_sum.json"),
        "--data",
        "[0.5, -0.25, 1.0]",
    ]);
    assert_eq!(out.status.code(), Some(0));
    let release: f64 = String::from_utf8_lossy(&out.stdout).trim().parse().unwrap();
    assert!(release.is_finite());
}

#[test]
fn calibrate_prints_scale() {
    let out = dpg(&[
        "--config",
        &demo("dpg.yaml"),
        "pipeline",
        "calibrate",
        &demo("bounded_sum.yaml"),
        "--d-in",
        "1",
        "--d-out",
        "1.0",
    ]);
    assert_eq!(out.status.code(), Some(0));
    let scale: f64 = String::from_utf8_lossy(&out.stdout).trim().parse().unwrap();
    assert!((100.0..100.0 + 1e-9).contains(&scale));
}

#[test]
fn type_subcommands() {
    let parsed = dpg(&["type", "parse", "HashMap<str, Vec<int>>"]);
    assert_eq!(String::from_utf8_lossy(&parsed.stdout).trim(), "HashMap<String, Vec<i32>>");

    let inferred = dpg(&["type", "infer", "[[1, 2], [3]]"]);
    assert_eq!(String::from_utf8_lossy(&inferred.stdout).trim(), "Vec<Vec<i32>>");

    let malformed = dpg(&["type", "parse", "Vec<"]);
    assert_eq!(malformed.status.code(), Some(2));
}
