use super::{format_clock, locate_column, normalize_day, parse_clock};
use crate::signal::{IntervalSample, IntervalSeries};
use anyhow::{Context, Result};
use csv::{ReaderBuilder, Trim, WriterBuilder};
use std::fs::File;
use std::path::Path;

/// Load an inter-beat interval recording. Expects `time`, `ibi_s` and `day`
/// columns; an unnamed leading index column is tolerated and ignored.
pub fn read_rr_csv(path: &Path) -> Result<IntervalSeries> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .has_headers(true)
        .from_reader(file);
    let headers = reader.headers().context("reading header")?.clone();
    let time_idx = locate_column(&headers, "time")?;
    let ibi_idx = locate_column(&headers, "ibi_s")?;
    let day_idx = locate_column(&headers, "day")?;

    let mut samples = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("reading row {}", row + 1))?;
        let time_s = parse_clock(record.get(time_idx).unwrap_or_default())
            .with_context(|| format!("row {}: bad time", row + 1))?;
        let ibi_s: f64 = record
            .get(ibi_idx)
            .unwrap_or_default()
            .parse()
            .with_context(|| format!("row {}: bad ibi_s", row + 1))?;
        let raw_day: i64 = record
            .get(day_idx)
            .unwrap_or_default()
            .parse()
            .with_context(|| format!("row {}: bad day", row + 1))?;
        let day = normalize_day(raw_day).with_context(|| format!("row {}", row + 1))?;
        if !(ibi_s > 0.0) {
            anyhow::bail!("row {}: non-positive interval {}", row + 1, ibi_s);
        }
        samples.push(IntervalSample { time_s, day, ibi_s });
    }
    Ok(IntervalSeries { samples })
}

/// Write a series back out with millisecond clocks and 3-decimal intervals.
pub fn write_rr_csv(path: &Path, series: &IntervalSeries) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = WriterBuilder::new().from_writer(file);
    writer.write_record(["time", "ibi_s", "day"])?;
    for sample in &series.samples {
        writer.write_record([
            format_clock(sample.time_s),
            format!("{:.3}", sample.ibi_s),
            sample.day.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
