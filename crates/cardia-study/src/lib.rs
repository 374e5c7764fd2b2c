pub mod bench;

use anyhow::{Context, Result};
use cardia_lib::clean::{clean_intervals, interpolate_gaps};
use cardia_lib::features::{extract_features, FEATURE_NAMES};
use cardia_lib::io::{activity as activity_io, rr as rr_io};
use cardia_lib::{Error, PipelineConfig};
use csv::{ReaderBuilder, Trim, WriterBuilder};
use log::{info, warn};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Study-level configuration, read from a TOML file. Per-subject data lives
/// in `<data_root>/<subject>/` under the configured file names.
#[derive(Debug, Clone, Deserialize)]
pub struct StudyConfig {
    pub data_root: PathBuf,
    #[serde(default = "default_rr_file")]
    pub rr_file: String,
    #[serde(default = "default_activity_file")]
    pub activity_file: String,
    #[serde(default = "default_questionnaire_file")]
    pub questionnaire_file: String,
    /// Questionnaire column used as the prediction target.
    #[serde(default = "default_target")]
    pub target: String,
    /// Subjects excluded from the assembled table.
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Run interval cleaning and gap interpolation before extraction.
    #[serde(default = "default_preprocess")]
    pub preprocess: bool,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

fn default_rr_file() -> String {
    "RR.csv".into()
}

fn default_activity_file() -> String {
    "Activity.csv".into()
}

fn default_questionnaire_file() -> String {
    "questionnaire.csv".into()
}

fn default_target() -> String {
    "STAI2".into()
}

fn default_preprocess() -> bool {
    true
}

pub fn read_study_config(path: &Path) -> Result<StudyConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read study config {}", path.display()))?;
    let config: StudyConfig = toml::from_str(&contents)
        .with_context(|| format!("parsing study config {}", path.display()))?;
    Ok(config)
}

/// One assembled training row: subject id, feature values in
/// `FEATURE_NAMES` order, and the target score.
#[derive(Debug, Clone)]
pub struct TrainRow {
    pub subject: String,
    pub features: Vec<f64>,
    pub target: f64,
}

#[derive(Debug, Clone)]
pub struct TrainTable {
    pub feature_names: Vec<String>,
    pub target_name: String,
    pub rows: Vec<TrainRow>,
}

/// Which subjects made it into the table, and why the others did not.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct AssemblyReport {
    pub included: Vec<String>,
    pub excluded: Vec<ExcludedSubject>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ExcludedSubject {
    pub subject: String,
    pub reason: String,
}

/// Subject directories under the data root, sorted by name.
pub fn discover_subjects(root: &Path) -> Result<Vec<String>> {
    let mut subjects = Vec::new();
    let entries =
        fs::read_dir(root).with_context(|| format!("listing data root {}", root.display()))?;
    for entry in entries {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            subjects.push(entry.file_name().to_string_lossy().to_string());
        }
    }
    subjects.sort();
    Ok(subjects)
}

/// Build the flat training table: one feature row per subject joined with the
/// questionnaire target. A subject with missing or unreadable inputs is
/// excluded and logged; the batch always continues.
pub fn assemble_dataset(cfg: &StudyConfig) -> Result<(TrainTable, AssemblyReport)> {
    let subjects = discover_subjects(&cfg.data_root)?;
    let mut report = AssemblyReport::default();
    let mut rows = Vec::new();

    for subject in subjects {
        if cfg.exclude.contains(&subject) {
            report.excluded.push(ExcludedSubject {
                subject: subject.clone(),
                reason: "excluded by configuration".into(),
            });
            continue;
        }
        match assemble_subject(cfg, &subject) {
            Ok(row) => {
                report.included.push(subject);
                rows.push(row);
            }
            Err(err) => {
                warn!("{subject}: {err}");
                report.excluded.push(ExcludedSubject {
                    subject,
                    reason: err.to_string(),
                });
            }
        }
    }
    info!(
        "assembled {} subjects, excluded {}",
        report.included.len(),
        report.excluded.len()
    );
    Ok((
        TrainTable {
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            target_name: cfg.target.clone(),
            rows,
        },
        report,
    ))
}

fn assemble_subject(cfg: &StudyConfig, subject: &str) -> Result<TrainRow> {
    let dir = cfg.data_root.join(subject);
    let rr_path = require_file(subject, dir.join(&cfg.rr_file))?;
    let activity_path = require_file(subject, dir.join(&cfg.activity_file))?;
    let questionnaire_path = require_file(subject, dir.join(&cfg.questionnaire_file))?;

    let raw = rr_io::read_rr_csv(&rr_path)?;
    let series = if cfg.preprocess {
        let (cleaned, _) = clean_intervals(&raw, &cfg.pipeline.clean);
        let (repaired, _) = interpolate_gaps(&cleaned, &cfg.pipeline.gap);
        repaired
    } else {
        raw
    };
    let activity = activity_io::read_activity_csv(&activity_path)?;
    let target = read_target(&questionnaire_path, &cfg.target)?;

    let features = extract_features(subject, &series, &activity, &cfg.pipeline);
    Ok(TrainRow {
        subject: subject.to_string(),
        features: features.as_row().to_vec(),
        target,
    })
}

fn require_file(subject: &str, path: PathBuf) -> Result<PathBuf> {
    if path.is_file() {
        Ok(path)
    } else {
        Err(Error::DataMissing {
            subject: subject.to_string(),
            path,
        }
        .into())
    }
}

/// First-row value of the named questionnaire column.
fn read_target(path: &Path, column: &str) -> Result<f64> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("opening questionnaire {}", path.display()))?;
    let headers = reader.headers().context("reading questionnaire header")?.clone();
    let idx = headers
        .iter()
        .position(|name| name.eq_ignore_ascii_case(column))
        .ok_or_else(|| anyhow::anyhow!("questionnaire lacks column {:?}", column))?;
    let record = reader
        .records()
        .next()
        .ok_or_else(|| anyhow::anyhow!("questionnaire {} is empty", path.display()))??;
    let value: f64 = record
        .get(idx)
        .unwrap_or_default()
        .parse()
        .with_context(|| format!("parsing {} score", column))?;
    Ok(value)
}

/// Write the table with two-decimal cells; NaN features become empty cells.
pub fn write_train_table(path: &Path, table: &TrainTable) -> Result<()> {
    let file =
        fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = WriterBuilder::new().from_writer(file);
    let mut header = vec!["subject".to_string()];
    header.extend(table.feature_names.iter().cloned());
    header.push(table.target_name.clone());
    writer.write_record(&header)?;
    for row in &table.rows {
        let mut record = vec![row.subject.clone()];
        record.extend(row.features.iter().map(|v| number_cell(*v)));
        record.push(number_cell(row.target));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

fn number_cell(value: f64) -> String {
    if value.is_nan() {
        String::new()
    } else {
        format!("{:.2}", value)
    }
}

/// Read a table written by [`write_train_table`]. The target column is
/// looked up by name; every other non-subject column is a feature.
pub fn read_train_table(path: &Path, target: &str) -> Result<TrainTable> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("opening train table {}", path.display()))?;
    let headers = reader.headers().context("reading header")?.clone();
    let subject_idx = headers
        .iter()
        .position(|h| h.eq_ignore_ascii_case("subject"))
        .ok_or_else(|| anyhow::anyhow!("train table lacks a subject column"))?;
    let target_idx = headers
        .iter()
        .position(|h| h.eq_ignore_ascii_case(target))
        .ok_or_else(|| anyhow::anyhow!("train table lacks target column {:?}", target))?;
    let feature_idx: Vec<usize> = (0..headers.len())
        .filter(|&i| i != subject_idx && i != target_idx)
        .collect();
    let feature_names: Vec<String> = feature_idx
        .iter()
        .map(|&i| headers.get(i).unwrap_or_default().to_string())
        .collect();

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("reading row {}", line + 1))?;
        let features = feature_idx
            .iter()
            .map(|&i| parse_cell(record.get(i)))
            .collect();
        rows.push(TrainRow {
            subject: record.get(subject_idx).unwrap_or_default().to_string(),
            features,
            target: parse_cell(record.get(target_idx)),
        });
    }
    Ok(TrainTable {
        feature_names,
        target_name: target.to_string(),
        rows,
    })
}

fn parse_cell(cell: Option<&str>) -> f64 {
    match cell {
        Some(text) if !text.is_empty() => text.parse().unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}
