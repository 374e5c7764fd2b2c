use serde::{Deserialize, Serialize};

/// Bounds for dropping physiologically impossible inter-beat intervals.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanConfig {
    /// Intervals at or below this length (s) are dropped as ectopic beats.
    pub min_ibi_s: f64,
    /// Intervals above this length (s) are dropped as sensor artifacts.
    pub max_ibi_s: f64,
}

impl Default for CleanConfig {
    fn default() -> Self {
        Self {
            min_ibi_s: 0.3,
            max_ibi_s: 2.0,
        }
    }
}

/// Bounds on the repairable gap range between consecutive beats.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct GapConfig {
    /// Gaps at or below this length (s) need no repair.
    pub min_gap_s: f64,
    /// Gaps above this length (s) are left alone as not reliably interpolable.
    pub max_gap_s: f64,
}

impl Default for GapConfig {
    fn default() -> Self {
        Self {
            min_gap_s: 2.0,
            max_gap_s: 10.0,
        }
    }
}

/// Spectral-estimation knobs for the frequency-domain statistics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectralConfig {
    /// Even-grid resampling frequency (Hz) for the beat series.
    pub fs_hz: f64,
    /// Welch segment length cap, in resampled samples.
    pub max_segment: usize,
    pub vlf_band: (f64, f64),
    pub lf_band: (f64, f64),
    pub hf_band: (f64, f64),
}

impl Default for SpectralConfig {
    fn default() -> Self {
        Self {
            fs_hz: 7.0,
            max_segment: 256,
            vlf_band: (0.003, 0.04),
            lf_band: (0.04, 0.15),
            hf_band: (0.15, 0.40),
        }
    }
}

/// Knobs for the cosinor (single-sinusoid rhythm) fit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct CircadianConfig {
    /// Trailing moving-average window (samples) applied to the HR curve.
    pub smooth_window: usize,
    /// Period (s) used to seed the frequency when no spectral peak stands out.
    pub fallback_period_s: f64,
    /// Cap on candidate frequencies scanned around the seed.
    pub max_grid: usize,
    /// Golden-section refinement iterations.
    pub max_iterations: usize,
}

impl Default for CircadianConfig {
    fn default() -> Self {
        Self {
            smooth_window: 60,
            fallback_period_s: 86_400.0,
            max_grid: 512,
            max_iterations: 64,
        }
    }
}

/// Thresholds for the resting-tachycardia scan over activity rows.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    /// Heart rate (bpm) above which a resting sample becomes a candidate.
    pub rest_hr_threshold: f64,
    /// A posture transition is only flagged when the previous HR was below
    /// this fraction of the current one.
    pub transition_ratio: f64,
    /// Rows with HR below this are dropped as impossible readings.
    pub min_hr: f64,
    /// Rows with HR above this are dropped as impossible readings.
    pub max_hr: f64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            rest_hr_threshold: 100.0,
            transition_ratio: 0.8,
            min_hr: 50.0,
            max_hr: 200.0,
        }
    }
}

/// Every tunable of the per-subject pipeline in one place.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub clean: CleanConfig,
    pub gap: GapConfig,
    pub spectral: SpectralConfig,
    pub circadian: CircadianConfig,
    pub anomaly: AnomalyConfig,
}
