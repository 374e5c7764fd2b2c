use crate::config::PipelineConfig;
use crate::detectors::anomaly::{clean_activity, scan_anomalies};
use crate::metrics::circadian::{fit_cosinor, trailing_mean};
use crate::metrics::hrv::{hrv_poincare, hrv_psd, hrv_time};
use crate::signal::{ActivitySample, IntervalSeries};
use log::warn;
use serde::{Deserialize, Serialize};

/// Stable column order of the per-subject feature row.
pub const FEATURE_NAMES: [&str; 14] = [
    "hr_mean",
    "rmssd_ms",
    "sdnn_ms",
    "pnn50_pct",
    "vlf_power",
    "lf_power",
    "hf_power",
    "total_power",
    "sd1_ms",
    "sd2_ms",
    "sd_ratio",
    "anomaly_pct",
    "circ_amplitude",
    "circ_mesor",
];

/// One subject's flat feature row. NaN marks a feature the recording could
/// not support; it is the documented "unavailable" sentinel, never the
/// product of unguarded arithmetic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectFeatures {
    pub subject: String,
    pub hr_mean: f64,
    pub rmssd_ms: f64,
    pub sdnn_ms: f64,
    pub pnn50_pct: f64,
    pub vlf_power: f64,
    pub lf_power: f64,
    pub hf_power: f64,
    pub total_power: f64,
    pub sd1_ms: f64,
    pub sd2_ms: f64,
    pub sd_ratio: f64,
    pub anomaly_pct: f64,
    pub circ_amplitude: f64,
    pub circ_mesor: f64,
}

impl SubjectFeatures {
    pub fn as_row(&self) -> [f64; 14] {
        [
            self.hr_mean,
            self.rmssd_ms,
            self.sdnn_ms,
            self.pnn50_pct,
            self.vlf_power,
            self.lf_power,
            self.hf_power,
            self.total_power,
            self.sd1_ms,
            self.sd2_ms,
            self.sd_ratio,
            self.anomaly_pct,
            self.circ_amplitude,
            self.circ_mesor,
        ]
    }
}

/// Run every extractor over one subject's repaired interval series and
/// activity rows. A failed rhythm fit leaves its features NaN and is logged;
/// everything else still computes.
pub fn extract_features(
    subject: &str,
    series: &IntervalSeries,
    activity: &[ActivitySample],
    cfg: &PipelineConfig,
) -> SubjectFeatures {
    let time = hrv_time(series);
    let psd = hrv_psd(series, &cfg.spectral);
    let poincare = hrv_poincare(series);

    let (kept_activity, _) = clean_activity(activity, &cfg.anomaly);
    let scan = scan_anomalies(&kept_activity, &cfg.anomaly);

    let hr = series.instantaneous_hr();
    let smoothed = trailing_mean(&hr, cfg.circadian.smooth_window);
    let times = series.elapsed_times();
    let (circ_amplitude, circ_mesor) = match fit_cosinor(&times, &smoothed, &cfg.circadian) {
        Ok(fit) => (fit.amplitude, fit.mesor),
        Err(err) => {
            warn!("{subject}: circadian fit unavailable: {err}");
            (f64::NAN, f64::NAN)
        }
    };

    SubjectFeatures {
        subject: subject.to_string(),
        hr_mean: time.hr_mean,
        rmssd_ms: time.rmssd_ms,
        sdnn_ms: time.sdnn_ms,
        pnn50_pct: time.pnn50_pct,
        vlf_power: psd.vlf_power,
        lf_power: psd.lf_power,
        hf_power: psd.hf_power,
        total_power: psd.total_power,
        sd1_ms: poincare.sd1_ms,
        sd2_ms: poincare.sd2_ms,
        sd_ratio: poincare.sd_ratio,
        anomaly_pct: scan.anomaly_pct,
        circ_amplitude,
        circ_mesor,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::IntervalSample;
    use std::f64::consts::PI;

    fn rhythmic_series() -> IntervalSeries {
        // Two days of beats whose rate swings around 75 bpm once per day.
        let mut samples = Vec::new();
        let mut elapsed = 0.0;
        while elapsed < 2.0 * 86_400.0 {
            let hr = 75.0 + 8.0 * (2.0 * PI * elapsed / 86_400.0).cos();
            let ibi = 60.0 / hr;
            elapsed += ibi;
            samples.push(IntervalSample {
                time_s: elapsed % 86_400.0,
                day: 1 + (elapsed / 86_400.0) as u32,
                ibi_s: ibi,
            });
            // Keep the fixture small: one beat a minute is plenty for the
            // rhythm fit and makes the spectral grid cheap.
            elapsed += 59.2;
        }
        IntervalSeries { samples }
    }

    fn resting_rows() -> Vec<ActivitySample> {
        vec![
            ActivitySample {
                time_s: 0.0,
                day: 1,
                hr: 80.0,
                sitting: true,
                lying: false,
                standing: false,
                off_body: false,
            },
            ActivitySample {
                time_s: 1.0,
                day: 1,
                hr: 120.0,
                sitting: true,
                lying: false,
                standing: false,
                off_body: false,
            },
        ]
    }

    #[test]
    fn feature_row_is_complete_and_ordered() {
        let series = rhythmic_series();
        let features = extract_features("subject_1", &series, &resting_rows(), &Default::default());
        let row = features.as_row();
        assert_eq!(row.len(), FEATURE_NAMES.len());
        assert!(features.hr_mean > 60.0 && features.hr_mean < 90.0);
        assert!(features.rmssd_ms.is_finite());
        assert!((features.anomaly_pct - 50.0).abs() < 1e-9);
        assert!(features.circ_amplitude.is_finite());
    }

    #[test]
    fn empty_recording_reports_sentinels_not_panics() {
        let features = extract_features(
            "subject_2",
            &IntervalSeries::default(),
            &[],
            &Default::default(),
        );
        assert!(features.rmssd_ms.is_nan());
        assert!(features.circ_amplitude.is_nan());
        assert!(features.anomaly_pct.is_nan());
    }
}
