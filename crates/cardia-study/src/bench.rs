use crate::{TrainRow, TrainTable};
use anyhow::Result;
use log::{info, warn};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// The regressor catalogue. Each entry only ever sees a feature matrix and a
/// target vector, so new models slot in without touching the fold loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ModelKind {
    /// Ordinary least squares on the selected features.
    Linear,
    /// Least squares with an L2 penalty on the non-intercept weights.
    Ridge { lambda: f64 },
    /// Mean target of the k nearest training subjects.
    Knn { k: usize },
}

impl ModelKind {
    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::Linear => "linear",
            ModelKind::Ridge { .. } => "ridge",
            ModelKind::Knn { .. } => "knn",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchConfig {
    /// Keep features whose training-fold Pearson correlation with the target
    /// exceeds this value.
    pub selection_threshold: f64,
    pub models: Vec<ModelKind>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            selection_threshold: 0.1,
            models: vec![
                ModelKind::Linear,
                ModelKind::Ridge { lambda: 1.0 },
                ModelKind::Knn { k: 5 },
            ],
        }
    }
}

/// Error metrics for one model over all leave-one-subject-out folds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchReport {
    pub model: String,
    pub folds: usize,
    /// Folds where feature selection kept nothing or the solve failed.
    pub skipped_folds: usize,
    pub mean_error: f64,
    pub max_error: f64,
    pub min_error: f64,
    pub std_dev: f64,
    /// Mean error as a percentage of the observed target range.
    pub error_ratio: f64,
    pub mean_features: f64,
    /// Three-class tallies, present when the questionnaire defines cutoffs.
    pub labels: Option<LabelCounts>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LabelCounts {
    pub correct: usize,
    pub off_by_one: usize,
    pub off_by_two: usize,
}

/// Published score ranges; predictions are clamped into these before scoring.
fn score_range(questionnaire: &str) -> Option<(f64, f64)> {
    match questionnaire {
        "BISBAS_bis" | "BISBAS_reward" => Some((7.0, 28.0)),
        "BISBAS_drive" | "BISBAS_fun" => Some((4.0, 16.0)),
        "Daily_stress" => Some((0.0, 406.0)),
        "MEQ" => Some((16.0, 86.0)),
        "Pittsburgh" => Some((0.0, 21.0)),
        "panas_pos_mean" | "panas_neg_mean" => Some((5.0, 50.0)),
        "STAI1" | "STAI2" => Some((20.0, 80.0)),
        _ => None,
    }
}

/// Cutoffs splitting a score into low/medium/high classes.
fn class_thresholds(questionnaire: &str) -> Option<[f64; 2]> {
    match questionnaire {
        "MEQ" => Some([40.0, 60.0]),
        "STAI1" | "STAI2" => Some([30.0, 50.0]),
        _ => None,
    }
}

fn class_of(value: f64, cutoffs: [f64; 2]) -> u8 {
    if value < cutoffs[0] {
        1
    } else if value < cutoffs[1] {
        2
    } else {
        3
    }
}

/// Leave-one-subject-out evaluation of every configured model.
pub fn run_benchmark(table: &TrainTable, cfg: &BenchConfig) -> Result<Vec<BenchReport>> {
    let rows: Vec<&TrainRow> = table
        .rows
        .iter()
        .filter(|r| r.target.is_finite() && r.features.iter().all(|v| v.is_finite()))
        .collect();
    let dropped = table.rows.len() - rows.len();
    if dropped > 0 {
        warn!("dropped {dropped} rows with unavailable features");
    }
    if rows.len() < 3 {
        anyhow::bail!(
            "need at least 3 complete subjects to cross-validate, have {}",
            rows.len()
        );
    }

    let mut reports = Vec::with_capacity(cfg.models.len());
    for model in &cfg.models {
        reports.push(evaluate_model(&rows, &table.target_name, *model, cfg));
    }
    Ok(reports)
}

fn evaluate_model(
    rows: &[&TrainRow],
    target_name: &str,
    model: ModelKind,
    cfg: &BenchConfig,
) -> BenchReport {
    let mut pairs = Vec::new();
    let mut skipped = 0usize;
    let mut feature_counts = Vec::new();

    for held_out in 0..rows.len() {
        let train: Vec<&TrainRow> = rows
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != held_out)
            .map(|(_, r)| *r)
            .collect();
        let selected = select_features(&train, cfg.selection_threshold);
        if selected.is_empty() {
            skipped += 1;
            continue;
        }
        match fit_predict(model, &train, rows[held_out], &selected) {
            Some(prediction) => {
                feature_counts.push(selected.len());
                pairs.push((rows[held_out].target, prediction));
            }
            None => skipped += 1,
        }
    }

    info!(
        "{}: {} folds scored, {} skipped",
        model.name(),
        pairs.len(),
        skipped
    );
    let observed_min = rows.iter().map(|r| r.target).fold(f64::INFINITY, f64::min);
    let observed_max = rows
        .iter()
        .map(|r| r.target)
        .fold(f64::NEG_INFINITY, f64::max);
    let mut report = compute_metrics(&pairs, target_name, observed_min, observed_max);
    report.model = model.name().to_string();
    report.skipped_folds = skipped;
    report.mean_features = if feature_counts.is_empty() {
        0.0
    } else {
        feature_counts.iter().sum::<usize>() as f64 / feature_counts.len() as f64
    };
    report
}

/// Indices of features whose Pearson correlation with the target exceeds the
/// threshold on the training fold.
fn select_features(train: &[&TrainRow], threshold: f64) -> Vec<usize> {
    let n_features = train.first().map(|r| r.features.len()).unwrap_or(0);
    let targets: Vec<f64> = train.iter().map(|r| r.target).collect();
    (0..n_features)
        .filter(|&j| {
            let column: Vec<f64> = train.iter().map(|r| r.features[j]).collect();
            pearson(&column, &targets) > threshold
        })
        .collect()
}

fn pearson(xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return 0.0;
    }
    let mx = xs.iter().sum::<f64>() / n as f64;
    let my = ys.iter().sum::<f64>() / n as f64;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for i in 0..n {
        let dx = xs[i] - mx;
        let dy = ys[i] - my;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx <= 0.0 || syy <= 0.0 {
        return 0.0;
    }
    sxy / (sxx * syy).sqrt()
}

fn fit_predict(
    model: ModelKind,
    train: &[&TrainRow],
    test: &TrainRow,
    selected: &[usize],
) -> Option<f64> {
    match model {
        ModelKind::Linear => solve_linear(train, test, selected, 0.0),
        ModelKind::Ridge { lambda } => solve_linear(train, test, selected, lambda),
        ModelKind::Knn { k } => knn_predict(train, test, selected, k),
    }
}

/// Normal-equation solve with an intercept column; `lambda > 0` adds the
/// ridge penalty to the non-intercept diagonal.
fn solve_linear(
    train: &[&TrainRow],
    test: &TrainRow,
    selected: &[usize],
    lambda: f64,
) -> Option<f64> {
    let m = train.len();
    let p = selected.len() + 1;
    let mut x = DMatrix::zeros(m, p);
    let mut y = DVector::zeros(m);
    for (i, row) in train.iter().enumerate() {
        x[(i, 0)] = 1.0;
        for (j, &feature) in selected.iter().enumerate() {
            x[(i, j + 1)] = row.features[feature];
        }
        y[i] = row.target;
    }
    let mut xtx = x.transpose() * &x;
    for j in 1..p {
        xtx[(j, j)] += lambda;
    }
    let xty = x.transpose() * y;
    let beta = xtx.lu().solve(&xty)?;
    let mut prediction = beta[0];
    for (j, &feature) in selected.iter().enumerate() {
        prediction += beta[j + 1] * test.features[feature];
    }
    prediction.is_finite().then_some(prediction)
}

fn knn_predict(train: &[&TrainRow], test: &TrainRow, selected: &[usize], k: usize) -> Option<f64> {
    if train.is_empty() || k == 0 {
        return None;
    }
    let mut distances: Vec<(f64, f64)> = train
        .iter()
        .map(|row| {
            let d2: f64 = selected
                .iter()
                .map(|&j| (row.features[j] - test.features[j]).powi(2))
                .sum();
            (d2, row.target)
        })
        .collect();
    distances.sort_by(|a, b| a.0.total_cmp(&b.0));
    let k = k.min(distances.len());
    Some(distances[..k].iter().map(|(_, t)| t).sum::<f64>() / k as f64)
}

/// Score (true, predicted) pairs. Predictions are clamped to the
/// questionnaire's published range first; the error ratio is relative to the
/// observed spread of true scores.
pub fn compute_metrics(
    pairs: &[(f64, f64)],
    target_name: &str,
    observed_min: f64,
    observed_max: f64,
) -> BenchReport {
    let cutoffs = class_thresholds(target_name);
    let range = score_range(target_name);
    let mut deviations = Vec::with_capacity(pairs.len());
    let mut labels = cutoffs.map(|_| LabelCounts {
        correct: 0,
        off_by_one: 0,
        off_by_two: 0,
    });

    for &(truth, raw_prediction) in pairs {
        let prediction = match range {
            Some((lo, hi)) => raw_prediction.clamp(lo, hi),
            None => raw_prediction,
        };
        deviations.push((truth - prediction).abs());
        if let (Some(cutoffs), Some(counts)) = (cutoffs, labels.as_mut()) {
            let gap = (class_of(prediction, cutoffs) as i8 - class_of(truth, cutoffs) as i8).abs();
            match gap {
                0 => counts.correct += 1,
                1 => counts.off_by_one += 1,
                _ => counts.off_by_two += 1,
            }
        }
    }

    let n = deviations.len();
    let (mean_error, max_error, min_error, std_dev) = if n == 0 {
        (f64::NAN, f64::NAN, f64::NAN, f64::NAN)
    } else {
        let mean = deviations.iter().sum::<f64>() / n as f64;
        let max = deviations.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = deviations.iter().copied().fold(f64::INFINITY, f64::min);
        let var = deviations.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n as f64;
        (mean, max, min, var.sqrt())
    };
    let spread = observed_max - observed_min;
    let error_ratio = if spread > 0.0 && n > 0 {
        mean_error / spread * 100.0
    } else {
        f64::NAN
    };

    BenchReport {
        model: String::new(),
        folds: n,
        skipped_folds: 0,
        mean_error,
        max_error,
        min_error,
        std_dev,
        error_ratio,
        mean_features: 0.0,
        labels,
    }
}

/// Write the per-model summaries as a CSV table.
pub fn write_reports_csv(path: &std::path::Path, reports: &[BenchReport]) -> Result<()> {
    let file = std::fs::File::create(path)?;
    let mut writer = csv::WriterBuilder::new().from_writer(file);
    writer.write_record([
        "model",
        "folds",
        "skipped_folds",
        "mean_error",
        "max_error",
        "min_error",
        "std_dev",
        "error_ratio",
        "mean_features",
        "correct",
        "off_by_one",
        "off_by_two",
    ])?;
    for report in reports {
        let (c, o1, o2) = report
            .labels
            .map(|l| {
                (
                    l.correct.to_string(),
                    l.off_by_one.to_string(),
                    l.off_by_two.to_string(),
                )
            })
            .unwrap_or_default();
        writer.write_record([
            report.model.clone(),
            report.folds.to_string(),
            report.skipped_folds.to_string(),
            format!("{:.2}", report.mean_error),
            format!("{:.2}", report.max_error),
            format!("{:.2}", report.min_error),
            format!("{:.2}", report.std_dev),
            format!("{:.2}", report.error_ratio),
            format!("{:.1}", report.mean_features),
            c,
            o1,
            o2,
        ])?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(subject: &str, features: Vec<f64>, target: f64) -> TrainRow {
        TrainRow {
            subject: subject.into(),
            features,
            target,
        }
    }

    fn linear_table() -> TrainTable {
        // target = 2 * f0 + 30, second feature pure noise-free constant.
        let rows = (0..8)
            .map(|i| {
                let f0 = i as f64;
                row(&format!("subject_{i}"), vec![f0, 1.0], 2.0 * f0 + 30.0)
            })
            .collect();
        TrainTable {
            feature_names: vec!["f0".into(), "f1".into()],
            target_name: "STAI2".into(),
            rows,
        }
    }

    #[test]
    fn pearson_of_exact_line_is_one() {
        let xs = [1.0, 2.0, 3.0, 4.0];
        let ys = [2.0, 4.0, 6.0, 8.0];
        assert!((pearson(&xs, &ys) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn pearson_of_constant_column_is_zero() {
        let xs = [1.0, 1.0, 1.0];
        let ys = [2.0, 4.0, 6.0];
        assert_eq!(pearson(&xs, &ys), 0.0);
    }

    #[test]
    fn linear_model_recovers_a_linear_target() {
        let table = linear_table();
        let cfg = BenchConfig {
            selection_threshold: 0.1,
            models: vec![ModelKind::Linear],
        };
        let reports = run_benchmark(&table, &cfg).unwrap();
        let report = &reports[0];
        assert_eq!(report.folds, 8);
        assert_eq!(report.skipped_folds, 0);
        assert!(report.mean_error < 1e-6, "mean {}", report.mean_error);
        // The constant second feature never survives selection.
        assert!((report.mean_features - 1.0).abs() < 1e-9);
    }

    #[test]
    fn knn_predicts_from_neighbours() {
        let table = linear_table();
        let cfg = BenchConfig {
            selection_threshold: 0.1,
            models: vec![ModelKind::Knn { k: 2 }],
        };
        let reports = run_benchmark(&table, &cfg).unwrap();
        // Neighbour averaging cannot extrapolate the line exactly, but it
        // stays within a couple of score points inside the range.
        assert!(reports[0].mean_error < 4.0);
    }

    #[test]
    fn rows_with_missing_features_are_dropped() {
        let mut table = linear_table();
        table.rows[0].features[0] = f64::NAN;
        let cfg = BenchConfig {
            selection_threshold: 0.1,
            models: vec![ModelKind::Linear],
        };
        let reports = run_benchmark(&table, &cfg).unwrap();
        assert_eq!(reports[0].folds, 7);
    }

    #[test]
    fn metrics_clamp_and_classify() {
        // STAI2 range is [20, 80] with cutoffs at 30 and 50.
        let pairs = vec![(25.0, 10.0), (45.0, 45.0), (70.0, 35.0)];
        let report = compute_metrics(&pairs, "STAI2", 25.0, 70.0);
        // 10 clamps to 20 -> deviation 5, same class as 25 (both class 1).
        assert!((report.mean_error - (5.0 + 0.0 + 35.0) / 3.0).abs() < 1e-9);
        assert!((report.max_error - 35.0).abs() < 1e-9);
        assert!((report.min_error - 0.0).abs() < 1e-9);
        let labels = report.labels.unwrap();
        assert_eq!(labels.correct, 2);
        assert_eq!(labels.off_by_one, 1);
        assert_eq!(labels.off_by_two, 0);
        assert!((report.error_ratio - (40.0 / 3.0) / 45.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn unknown_questionnaire_has_no_label_counts() {
        let pairs = vec![(1.0, 2.0)];
        let report = compute_metrics(&pairs, "custom_scale", 1.0, 1.0);
        assert!(report.labels.is_none());
        assert!(report.error_ratio.is_nan());
    }

    #[test]
    fn too_few_subjects_is_an_error() {
        let table = TrainTable {
            feature_names: vec!["f0".into()],
            target_name: "STAI2".into(),
            rows: vec![row("a", vec![1.0], 30.0), row("b", vec![2.0], 40.0)],
        };
        assert!(run_benchmark(&table, &BenchConfig::default()).is_err());
    }
}
