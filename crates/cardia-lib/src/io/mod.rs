pub mod activity;
pub mod rr;

use anyhow::Result;

/// Case-insensitive header lookup shared by the loaders.
pub(crate) fn locate_column(headers: &csv::StringRecord, requested: &str) -> Result<usize> {
    headers
        .iter()
        .position(|name| name.trim().eq_ignore_ascii_case(requested))
        .ok_or_else(|| anyhow::anyhow!("missing column {:?}", requested))
}

/// Parse an `HH:MM:SS[.fff]` clock into seconds since midnight.
pub fn parse_clock(text: &str) -> Result<f64> {
    let mut parts = text.trim().split(':');
    let hours: f64 = parts
        .next()
        .ok_or_else(|| anyhow::anyhow!("empty clock value"))?
        .parse()?;
    let minutes: f64 = parts
        .next()
        .ok_or_else(|| anyhow::anyhow!("clock {:?} lacks minutes", text))?
        .parse()?;
    let seconds: f64 = parts
        .next()
        .ok_or_else(|| anyhow::anyhow!("clock {:?} lacks seconds", text))?
        .parse()?;
    if parts.next().is_some() {
        anyhow::bail!("clock {:?} has too many fields", text);
    }
    Ok(hours * 3600.0 + minutes * 60.0 + seconds)
}

/// Format seconds-since-midnight as `HH:MM:SS.mmm`.
pub fn format_clock(time_s: f64) -> String {
    let total_ms = (time_s * 1000.0).round().max(0.0) as u64;
    let ms = total_ms % 1000;
    let secs = total_ms / 1000;
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        secs / 3600,
        (secs / 60) % 60,
        secs % 60,
        ms
    )
}

/// Map the wrist unit's bogus second-day marker onto a real day number.
/// Some exports log `-29` for rows recorded after the midnight rollover.
pub(crate) fn normalize_day(raw: i64) -> Result<u32> {
    let day = if raw == -29 { 2 } else { raw };
    if day < 1 {
        anyhow::bail!("day number {} out of range", raw);
    }
    Ok(day as u32)
}
