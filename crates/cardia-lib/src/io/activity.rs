use super::{format_clock, locate_column, normalize_day, parse_clock};
use crate::signal::ActivitySample;
use anyhow::{Context, Result};
use csv::{ReaderBuilder, Trim, WriterBuilder};
use std::fs::File;
use std::path::Path;

const COL_TIME: &str = "time";
const COL_DAY: &str = "day";
const COL_HR: &str = "HR";
const COL_OFF: &str = "Inclinometer Off";
const COL_STANDING: &str = "Inclinometer Standing";
const COL_SITTING: &str = "Inclinometer Sitting";
const COL_LYING: &str = "Inclinometer Lying";

/// Load an activity recording: heart rate plus the four inclinometer
/// channels, which arrive as 0/1 columns.
pub fn read_activity_csv(path: &Path) -> Result<Vec<ActivitySample>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .has_headers(true)
        .from_reader(file);
    let headers = reader.headers().context("reading header")?.clone();
    let time_idx = locate_column(&headers, COL_TIME)?;
    let day_idx = locate_column(&headers, COL_DAY)?;
    let hr_idx = locate_column(&headers, COL_HR)?;
    let off_idx = locate_column(&headers, COL_OFF)?;
    let standing_idx = locate_column(&headers, COL_STANDING)?;
    let sitting_idx = locate_column(&headers, COL_SITTING)?;
    let lying_idx = locate_column(&headers, COL_LYING)?;

    let mut samples = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("reading row {}", row + 1))?;
        let time_s = parse_clock(record.get(time_idx).unwrap_or_default())
            .with_context(|| format!("row {}: bad time", row + 1))?;
        let raw_day: i64 = record
            .get(day_idx)
            .unwrap_or_default()
            .parse()
            .with_context(|| format!("row {}: bad day", row + 1))?;
        let day = normalize_day(raw_day).with_context(|| format!("row {}", row + 1))?;
        let hr: f64 = record
            .get(hr_idx)
            .unwrap_or_default()
            .parse()
            .with_context(|| format!("row {}: bad HR", row + 1))?;
        samples.push(ActivitySample {
            time_s,
            day,
            hr,
            off_body: parse_flag(record.get(off_idx)),
            standing: parse_flag(record.get(standing_idx)),
            sitting: parse_flag(record.get(sitting_idx)),
            lying: parse_flag(record.get(lying_idx)),
        });
    }
    Ok(samples)
}

/// Write activity rows back out alongside their anomaly flags.
pub fn write_activity_csv(path: &Path, samples: &[ActivitySample], flags: &[bool]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = WriterBuilder::new().from_writer(file);
    writer.write_record([
        COL_TIME,
        COL_DAY,
        COL_HR,
        COL_OFF,
        COL_STANDING,
        COL_SITTING,
        COL_LYING,
        "Anomaly",
    ])?;
    for (i, sample) in samples.iter().enumerate() {
        let flagged = flags.get(i).copied().unwrap_or(false);
        writer.write_record([
            format_clock(sample.time_s),
            sample.day.to_string(),
            format!("{:.3}", sample.hr),
            flag_cell(sample.off_body),
            flag_cell(sample.standing),
            flag_cell(sample.sitting),
            flag_cell(sample.lying),
            flagged.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn parse_flag(cell: Option<&str>) -> bool {
    cell.and_then(|v| v.parse::<f64>().ok())
        .map(|v| v == 1.0)
        .unwrap_or(false)
}

fn flag_cell(on: bool) -> String {
    if on { "1.0" } else { "0.0" }.to_string()
}
