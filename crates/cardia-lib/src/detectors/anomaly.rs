use crate::clean::CleanReport;
use crate::config::AnomalyConfig;
use crate::signal::ActivitySample;
use log::info;
use serde::{Deserialize, Serialize};

/// Outcome of the resting-tachycardia scan over one activity recording.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyScan {
    /// One flag per input sample; set once, never reset.
    pub flags: Vec<bool>,
    pub n_anomalies: usize,
    /// Samples that exceeded the threshold while sitting or lying.
    pub candidates: usize,
    /// Samples spent sitting or lying, the denominator of the percentage.
    pub resting_samples: usize,
    /// Share of resting samples flagged, in percent. NaN when the subject
    /// never sits or lies down.
    pub anomaly_pct: f64,
}

/// Drop rows whose heart rate is outside the plausible range.
pub fn clean_activity(
    samples: &[ActivitySample],
    cfg: &AnomalyConfig,
) -> (Vec<ActivitySample>, CleanReport) {
    let total = samples.len();
    let kept: Vec<ActivitySample> = samples
        .iter()
        .copied()
        .filter(|s| s.hr >= cfg.min_hr && s.hr <= cfg.max_hr)
        .collect();
    let report = CleanReport {
        removed: total - kept.len(),
        total,
    };
    info!(
        "dropped {} of {} activity rows with HR outside [{}, {}]",
        report.removed, report.total, cfg.min_hr, cfg.max_hr
    );
    (kept, report)
}

/// Single-pass scan for heart-rate spikes that the wearer's posture cannot
/// explain. A sample is a candidate when HR exceeds the resting threshold
/// while sitting or lying; each candidate is judged against the immediately
/// preceding sample:
///
/// - coming from standing/off-body, a spike counts only when the previous HR
///   sat well below the current one; otherwise the elevation is attributed to
///   the prior exertion and `skip` turns on, suppressing the rest of the
///   episode;
/// - coming from rest, a jump from below the threshold always counts and
///   clears `skip`; a continued elevation counts only while `skip` is off.
///
/// The asymmetric `skip` handling across posture transitions is kept exactly
/// as designed; it is a domain heuristic, not a provably optimal rule.
pub fn scan_anomalies(samples: &[ActivitySample], cfg: &AnomalyConfig) -> AnomalyScan {
    let mut flags = vec![false; samples.len()];
    let mut skip = false;
    let mut n_anomalies = 0;
    let mut candidates = 0;

    for i in 0..samples.len() {
        let current = &samples[i];
        if !(current.hr > cfg.rest_hr_threshold && current.is_resting()) {
            continue;
        }
        candidates += 1;
        if i == 0 {
            continue;
        }
        let previous = &samples[i - 1];
        if previous.is_upright() {
            if previous.hr < current.hr * cfg.transition_ratio {
                flags[i] = true;
                n_anomalies += 1;
                skip = false;
            } else {
                skip = true;
            }
        } else if previous.hr <= cfg.rest_hr_threshold {
            flags[i] = true;
            n_anomalies += 1;
            skip = false;
        } else if !skip {
            flags[i] = true;
            n_anomalies += 1;
        }
    }

    let resting_samples = samples.iter().filter(|s| s.is_resting()).count();
    let anomaly_pct = if resting_samples > 0 {
        n_anomalies as f64 / resting_samples as f64 * 100.0
    } else {
        f64::NAN
    };
    info!(
        "flagged {} anomalies out of {} candidates ({} resting rows)",
        n_anomalies, candidates, resting_samples
    );
    AnomalyScan {
        flags,
        n_anomalies,
        candidates,
        resting_samples,
        anomaly_pct,
    }
}
