use assert_cmd::cargo::cargo_bin_cmd;
use serde::Deserialize;
use std::error::Error;
use std::fs;
use tempfile::tempdir;

#[derive(Deserialize)]
struct PreprocessSummary {
    total: usize,
    removed: usize,
    gaps_interpolated: usize,
    samples_added: usize,
    final_samples: usize,
}

#[derive(Deserialize)]
struct ActivitySummary {
    total: usize,
    removed: usize,
    candidates: usize,
    n_anomalies: usize,
    anomaly_pct: f64,
}

#[derive(Deserialize)]
struct HrvTimeBlock {
    n: usize,
    hr_mean: f64,
}

#[derive(Deserialize)]
struct HrvOutput {
    time: HrvTimeBlock,
}

const RR_FIXTURE: &str = "\
time,ibi_s,day
09:00:00.000,0.800,1
09:00:00.800,0.250,1
09:00:01.600,0.810,1
09:00:07.600,1.190,1
";

const ACTIVITY_FIXTURE: &str = "\
time,day,HR,Inclinometer Off,Inclinometer Standing,Inclinometer Sitting,Inclinometer Lying
09:00:00,1,45.0,0.0,0.0,1.0,0.0
09:00:01,1,80.0,0.0,0.0,1.0,0.0
09:00:02,1,120.0,0.0,0.0,1.0,0.0
";

#[test]
fn preprocess_rr_cleans_and_closes_gaps() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let input = dir.path().join("RR.csv");
    let output = dir.path().join("RR-processed.csv");
    fs::write(&input, RR_FIXTURE)?;

    let mut cmd = cargo_bin_cmd!("cardia");
    cmd.args([
        "preprocess-rr",
        "--input",
        input.to_str().expect("utf8 path"),
        "--output",
        output.to_str().expect("utf8 path"),
    ]);
    let stdout = cmd.assert().success().get_output().stdout.clone();
    let summary: PreprocessSummary = serde_json::from_slice(&stdout)?;

    assert_eq!(summary.total, 4);
    assert_eq!(summary.removed, 1);
    assert_eq!(summary.gaps_interpolated, 1);
    assert_eq!(summary.samples_added, 5);
    assert_eq!(summary.final_samples, 8);

    // The written file reloads through the same pipeline.
    let text = fs::read_to_string(&output)?;
    assert!(text.starts_with("time,ibi_s,day"));
    assert_eq!(text.lines().count(), 9);
    Ok(())
}

#[test]
fn hrv_reports_metrics_for_a_processed_file() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let input = dir.path().join("RR.csv");
    let processed = dir.path().join("RR-processed.csv");
    fs::write(&input, RR_FIXTURE)?;

    cargo_bin_cmd!("cardia")
        .args([
            "preprocess-rr",
            "--input",
            input.to_str().expect("utf8 path"),
            "--output",
            processed.to_str().expect("utf8 path"),
        ])
        .assert()
        .success();

    let mut cmd = cargo_bin_cmd!("cardia");
    cmd.args(["hrv", "--input", processed.to_str().expect("utf8 path")]);
    let stdout = cmd.assert().success().get_output().stdout.clone();
    let output: HrvOutput = serde_json::from_slice(&stdout)?;
    assert_eq!(output.time.n, 8);
    assert!(output.time.hr_mean > 40.0 && output.time.hr_mean < 90.0);
    Ok(())
}

#[test]
fn preprocess_activity_flags_resting_spikes() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let input = dir.path().join("Activity.csv");
    let output = dir.path().join("Activity-processed.csv");
    fs::write(&input, ACTIVITY_FIXTURE)?;

    let mut cmd = cargo_bin_cmd!("cardia");
    cmd.args([
        "preprocess-activity",
        "--input",
        input.to_str().expect("utf8 path"),
        "--output",
        output.to_str().expect("utf8 path"),
        "--rest-hr",
        "100",
    ]);
    let stdout = cmd.assert().success().get_output().stdout.clone();
    let summary: ActivitySummary = serde_json::from_slice(&stdout)?;

    assert_eq!(summary.total, 3);
    assert_eq!(summary.removed, 1);
    assert_eq!(summary.candidates, 1);
    assert_eq!(summary.n_anomalies, 1);
    assert!((summary.anomaly_pct - 50.0).abs() < 1e-9);

    let text = fs::read_to_string(&output)?;
    assert!(text.contains("Anomaly"));
    assert!(text.contains("true"));
    Ok(())
}
