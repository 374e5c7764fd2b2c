use crate::metrics::circadian::{trailing_mean, CircadianFit};
use crate::signal::IntervalSeries;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Renderer-agnostic figure for one subject's heart-rate curve, with the
/// fitted rhythm as an optional overlay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HrFigure {
    pub title: String,
    /// Smoothed HR over elapsed time, `[t, bpm]`.
    pub hr_points: Vec<[f64; 2]>,
    /// Cosinor model evaluated on an even grid, `[t, bpm]`.
    pub fit_points: Vec<[f64; 2]>,
}

/// Build the plot data for a series: a decimated smoothed-HR trace and, when
/// a fit is supplied, the model curve across the same window.
pub fn hr_figure(
    title: &str,
    series: &IntervalSeries,
    fit: Option<&CircadianFit>,
    smooth_window: usize,
    max_points: usize,
) -> HrFigure {
    let times = series.elapsed_times();
    let smoothed = trailing_mean(&series.instantaneous_hr(), smooth_window);
    let hr_points = decimate(
        times
            .iter()
            .zip(&smoothed)
            .map(|(&t, &v)| [t, v])
            .collect(),
        max_points,
    );
    let fit_points = match (fit, times.first(), times.last()) {
        (Some(fit), Some(&start), Some(&end)) if end > start => {
            let n = max_points.max(2);
            (0..n)
                .map(|k| {
                    let t = start + (end - start) * k as f64 / (n - 1) as f64;
                    let value = fit.offset
                        + fit.amplitude * (2.0 * PI * fit.frequency_hz * t + fit.phase).cos();
                    [t, value]
                })
                .collect()
        }
        _ => Vec::new(),
    };
    HrFigure {
        title: title.to_string(),
        hr_points,
        fit_points,
    }
}

fn decimate(points: Vec<[f64; 2]>, max_points: usize) -> Vec<[f64; 2]> {
    if max_points == 0 || points.len() <= max_points {
        return points;
    }
    let bucket = points.len() as f64 / max_points as f64;
    (0..max_points)
        .filter_map(|i| points.get((i as f64 * bucket).floor() as usize).copied())
        .collect()
}
