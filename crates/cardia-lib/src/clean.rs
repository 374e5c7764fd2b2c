use crate::config::{CleanConfig, GapConfig};
use crate::signal::{crossed_midnight, IntervalSample, IntervalSeries, SECONDS_PER_DAY};
use log::info;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CleanReport {
    pub removed: usize,
    pub total: usize,
}

/// Drop every sample whose interval falls outside the physiological band.
/// The result is an order-preserving subsequence of the input; nothing is
/// edited in place.
pub fn clean_intervals(
    series: &IntervalSeries,
    cfg: &CleanConfig,
) -> (IntervalSeries, CleanReport) {
    let total = series.samples.len();
    let kept: Vec<IntervalSample> = series
        .samples
        .iter()
        .copied()
        .filter(|s| s.ibi_s > cfg.min_ibi_s && s.ibi_s <= cfg.max_ibi_s)
        .collect();
    let report = CleanReport {
        removed: total - kept.len(),
        total,
    };
    info!(
        "dropped {} of {} interval samples outside ({}, {}] s",
        report.removed, report.total, cfg.min_ibi_s, cfg.max_ibi_s
    );
    (IntervalSeries { samples: kept }, report)
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct GapReport {
    pub pairs_interpolated: usize,
    pub samples_added: usize,
}

/// Close repairable temporal gaps with evenly-paced synthetic beats.
///
/// Whether a pair qualifies is decided on the recorded timestamps; the number
/// of synthetic intervals is then derived from the gap measured against the
/// last emitted sample, whose timestamp may itself be synthetic when runs
/// chain back to back.
pub fn interpolate_gaps(series: &IntervalSeries, cfg: &GapConfig) -> (IntervalSeries, GapReport) {
    let mut out: Vec<IntervalSample> = Vec::with_capacity(series.samples.len());
    let mut report = GapReport::default();

    for (i, curr) in series.samples.iter().enumerate() {
        if i == 0 {
            out.push(*curr);
            continue;
        }
        let recorded_prev = series.samples[i - 1];
        let recorded_gap = curr.elapsed_s() - recorded_prev.elapsed_s();
        if !(recorded_gap > cfg.min_gap_s && recorded_gap <= cfg.max_gap_s) {
            out.push(*curr);
            continue;
        }

        let prev = out.last().copied().unwrap_or(recorded_prev);
        let gap = curr.elapsed_s() - prev.elapsed_s();
        let avg_ibi = (prev.ibi_s + curr.ibi_s) / 2.0;
        if !(avg_ibi > 0.0) || !(gap > 0.0) {
            out.push(*curr);
            continue;
        }
        let num_intervals = (gap / avg_ibi).floor() as usize;
        if num_intervals < 1 {
            // Degenerate: the gap is shorter than one plausible beat.
            out.push(*curr);
            continue;
        }

        let run = synth_run(prev.ibi_s, curr.ibi_s, num_intervals);
        report.pairs_interpolated += 1;
        report.samples_added += run.len().saturating_sub(1);

        // Walk the clock forward without wrapping, so the midnight crossing
        // is judged against the starting clock time.
        let mut clock = prev.time_s;
        for ibi in run {
            clock += ibi;
            let (time_s, day) = if crossed_midnight(prev.time_s, clock) {
                (clock - SECONDS_PER_DAY, prev.day + 1)
            } else {
                (clock, prev.day)
            };
            out.push(IntervalSample {
                time_s,
                day,
                ibi_s: ibi,
            });
        }
    }

    info!(
        "interpolated {} gaps, added {} samples",
        report.pairs_interpolated, report.samples_added
    );
    (IntervalSeries { samples: out }, report)
}

/// `num` values evenly spaced from `start` to `end`, endpoints included.
fn evenly_spaced(start: f64, end: f64, num: usize) -> Vec<f64> {
    match num {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (num - 1) as f64;
            (0..num).map(|k| start + step * k as f64).collect()
        }
    }
}

/// The synthetic interval walk for one gap. The first evenly-spaced value
/// would duplicate the previous beat, so the run is re-spaced from the second
/// value; a single-slot run keeps its one value to avoid an empty result.
fn synth_run(start_ibi: f64, end_ibi: f64, num: usize) -> Vec<f64> {
    let first = evenly_spaced(start_ibi, end_ibi, num);
    if first.len() > 1 {
        evenly_spaced(first[1], end_ibi, num)
    } else {
        first
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(time_s: f64, day: u32, ibi_s: f64) -> IntervalSample {
        IntervalSample { time_s, day, ibi_s }
    }

    fn series(samples: Vec<IntervalSample>) -> IntervalSeries {
        IntervalSeries { samples }
    }

    #[test]
    fn cleaner_drops_out_of_band_intervals() {
        let input = series(vec![
            sample(0.0, 1, 0.8),
            sample(0.8, 1, 0.2),
            sample(1.0, 1, 0.3),
            sample(1.3, 1, 2.5),
            sample(3.8, 1, 1.9),
            sample(5.7, 1, 2.0),
        ]);
        let (cleaned, report) = clean_intervals(&input, &CleanConfig::default());
        let kept: Vec<f64> = cleaned.ibis().collect();
        assert_eq!(kept, vec![0.8, 1.9, 2.0]);
        assert_eq!(report.removed, 3);
        assert_eq!(report.total, 6);
        assert!(cleaned.ibis().all(|v| v > 0.3 && v <= 2.0));
    }

    #[test]
    fn cleaner_preserves_order() {
        let input = series(vec![
            sample(0.0, 1, 1.0),
            sample(1.0, 1, 0.1),
            sample(1.1, 1, 0.9),
            sample(2.0, 1, 0.7),
        ]);
        let (cleaned, _) = clean_intervals(&input, &CleanConfig::default());
        let times: Vec<f64> = cleaned.samples.iter().map(|s| s.time_s).collect();
        assert_eq!(times, vec![0.0, 1.1, 2.0]);
    }

    #[test]
    fn small_gaps_pass_through_untouched() {
        let input = series(vec![sample(0.0, 1, 0.8), sample(1.9, 1, 0.9)]);
        let (out, report) = interpolate_gaps(&input, &GapConfig::default());
        assert_eq!(out.len(), 2);
        assert_eq!(report.pairs_interpolated, 0);
        assert_eq!(report.samples_added, 0);
    }

    #[test]
    fn oversized_gaps_pass_through_untouched() {
        let input = series(vec![sample(0.0, 1, 0.8), sample(15.0, 1, 0.9)]);
        let (out, report) = interpolate_gaps(&input, &GapConfig::default());
        assert_eq!(out.len(), 2);
        assert_eq!(report.pairs_interpolated, 0);
    }

    #[test]
    fn repairable_gap_walks_between_endpoint_intervals() {
        // 6 s gap, endpoint intervals 0.8 and 1.2 -> six synthetic slots.
        let input = series(vec![sample(0.0, 1, 0.8), sample(6.0, 1, 1.2)]);
        let (out, report) = interpolate_gaps(&input, &GapConfig::default());
        assert_eq!(report.pairs_interpolated, 1);

        let synth = &out.samples[1..];
        assert_eq!(synth.len(), 6);
        // Interior values walk strictly between the endpoints; the final
        // sample carries the original closing interval.
        for s in &synth[..synth.len() - 1] {
            assert!(s.ibi_s > 0.8 && s.ibi_s < 1.2, "got {}", s.ibi_s);
        }
        let last = synth[synth.len() - 1];
        assert!((last.ibi_s - 1.2).abs() < 1e-12);
        // Monotone, evenly paced walk.
        for pair in synth.windows(2) {
            assert!(pair[1].ibi_s > pair[0].ibi_s);
        }
        // Timestamps accumulate each synthetic interval.
        let mut clock = 0.0;
        for s in synth {
            clock += s.ibi_s;
            assert!((s.time_s - clock).abs() < 1e-9);
        }
    }

    #[test]
    fn single_slot_run_keeps_the_opening_interval() {
        // Gap of 2.5 s with endpoint intervals averaging ~1.55 gives one slot.
        let input = series(vec![sample(0.0, 1, 1.5), sample(2.5, 1, 1.6)]);
        let (out, report) = interpolate_gaps(&input, &GapConfig::default());
        assert_eq!(report.pairs_interpolated, 1);
        assert_eq!(out.len(), 2);
        // The lone synthetic value repeats the previous interval.
        assert!((out.samples[1].ibi_s - 1.5).abs() < 1e-12);
        assert!((out.samples[1].time_s - 1.5).abs() < 1e-12);
    }

    #[test]
    fn two_slot_run_lands_on_the_closing_interval() {
        // Gap of 2.2 s with avg interval 1.0 gives exactly two slots: the
        // re-spaced walk starts at the far endpoint, so both synthetic
        // intervals equal the closing value.
        let input = series(vec![sample(0.0, 1, 0.9), sample(2.2, 1, 1.1)]);
        let (out, report) = interpolate_gaps(&input, &GapConfig::default());
        assert_eq!(report.pairs_interpolated, 1);
        let synth = &out.samples[1..];
        assert_eq!(synth.len(), 2);
        assert!((synth[0].ibi_s - 1.1).abs() < 1e-12);
        assert!((synth[1].ibi_s - 1.1).abs() < 1e-12);
    }

    #[test]
    fn synthetic_samples_roll_over_midnight() {
        // Last beat of day 1 at 86398 s, next recorded beat 2 s past the
        // following midnight: a 4 s gap straddling the day boundary.
        let input = series(vec![sample(86_398.0, 1, 1.0), sample(2.0, 2, 1.0)]);
        let (out, report) = interpolate_gaps(&input, &GapConfig::default());
        assert_eq!(report.pairs_interpolated, 1);
        let synth = &out.samples[1..];
        assert_eq!(synth.len(), 4);
        assert_eq!(synth[0].day, 1);
        assert!((synth[0].time_s - 86_399.0).abs() < 1e-9);
        for s in &synth[1..] {
            assert_eq!(s.day, 2);
            assert!(s.time_s < 10.0);
        }
    }

    #[test]
    fn chained_gaps_measure_from_the_repaired_predecessor() {
        let input = series(vec![
            sample(0.0, 1, 1.0),
            sample(3.0, 1, 1.0),
            sample(6.0, 1, 1.0),
        ]);
        let (out, report) = interpolate_gaps(&input, &GapConfig::default());
        assert_eq!(report.pairs_interpolated, 2);
        // Every emitted timestamp is non-decreasing.
        let times: Vec<f64> = out.samples.iter().map(|s| s.elapsed_s()).collect();
        for pair in times.windows(2) {
            assert!(pair[1] >= pair[0]);
        }
    }

    #[test]
    fn degenerate_gap_is_skipped_silently() {
        // Gap barely above threshold but endpoint intervals so long that no
        // whole beat fits.
        let cfg = GapConfig {
            min_gap_s: 2.0,
            max_gap_s: 10.0,
        };
        let input = series(vec![sample(0.0, 1, 1.9), sample(2.1, 1, 2.5)]);
        let (out, report) = interpolate_gaps(&input, &cfg);
        assert_eq!(report.pairs_interpolated, 0);
        assert_eq!(out.len(), 2);
    }
}
