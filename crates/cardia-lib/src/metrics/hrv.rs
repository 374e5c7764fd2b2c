use crate::config::SpectralConfig;
use crate::signal::IntervalSeries;
use realfft::RealFftPlanner;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

const MS_PER_S: f64 = 1000.0;

/// Time-domain statistics. Millisecond-scale entries report NaN when the
/// series is too short, so a missing value never masquerades as zero.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HrvTime {
    pub n: usize,
    pub hr_mean: f64,
    pub sdnn_ms: f64,
    pub rmssd_ms: f64,
    pub pnn50_pct: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HrvPsd {
    pub vlf_power: f64,
    pub lf_power: f64,
    pub hf_power: f64,
    pub total_power: f64,
    pub points: Vec<[f64; 2]>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HrvPoincare {
    pub sd1_ms: f64,
    pub sd2_ms: f64,
    /// SD1/SD2 scaled by 10, the convention used in the charting literature.
    pub sd_ratio: f64,
}

pub fn hrv_time(series: &IntervalSeries) -> HrvTime {
    let ibis: Vec<f64> = series.ibis().collect();
    let n = ibis.len();
    let hr_mean = if n > 0 {
        ibis.iter().map(|v| 60.0 / v).sum::<f64>() / n as f64
    } else {
        f64::NAN
    };
    let sdnn_ms = sample_std(&ibis) * MS_PER_S;
    let diffs: Vec<f64> = ibis.windows(2).map(|w| w[1] - w[0]).collect();
    let rmssd_ms = if diffs.is_empty() {
        f64::NAN
    } else {
        (diffs.iter().map(|d| d * d).sum::<f64>() / diffs.len() as f64).sqrt() * MS_PER_S
    };
    let pnn50_pct = if diffs.is_empty() {
        f64::NAN
    } else {
        let over = diffs.iter().filter(|d| d.abs() > 0.050).count();
        over as f64 / diffs.len() as f64 * 100.0
    };
    HrvTime {
        n,
        hr_mean,
        sdnn_ms,
        rmssd_ms,
        pnn50_pct,
    }
}

pub fn hrv_psd(series: &IntervalSeries, cfg: &SpectralConfig) -> HrvPsd {
    let signal = hr_sample_grid(series, cfg.fs_hz);
    let (freqs, powers) = welch_psd(&signal, cfg.fs_hz, cfg.max_segment);
    HrvPsd {
        vlf_power: integrate_band(&freqs, &powers, cfg.vlf_band),
        lf_power: integrate_band(&freqs, &powers, cfg.lf_band),
        hf_power: integrate_band(&freqs, &powers, cfg.hf_band),
        total_power: integrate_band(&freqs, &powers, (0.0, f64::INFINITY)),
        points: freqs
            .into_iter()
            .zip(powers)
            .map(|(f, p)| [f, p])
            .collect(),
    }
}

pub fn hrv_poincare(series: &IntervalSeries) -> HrvPoincare {
    let nn_ms: Vec<f64> = series.ibis().map(|v| v * MS_PER_S).collect();
    if nn_ms.len() < 3 {
        return HrvPoincare {
            sd1_ms: f64::NAN,
            sd2_ms: f64::NAN,
            sd_ratio: f64::NAN,
        };
    }
    let diffs: Vec<f64> = nn_ms.windows(2).map(|w| w[1] - w[0]).collect();
    let sd_diff = sample_std(&diffs);
    let sd_nn = sample_std(&nn_ms);
    let sd1 = (0.5 * sd_diff * sd_diff).sqrt();
    let sd2 = (2.0 * sd_nn * sd_nn - 0.5 * sd_diff * sd_diff).max(0.0).sqrt();
    let sd_ratio = if sd2 > 0.0 { sd1 / sd2 * 10.0 } else { f64::NAN };
    HrvPoincare {
        sd1_ms: sd1,
        sd2_ms: sd2,
        sd_ratio,
    }
}

/// Sample (ddof 1) standard deviation; NaN below two values.
fn sample_std(data: &[f64]) -> f64 {
    let n = data.len();
    if n < 2 {
        return f64::NAN;
    }
    let mean = data.iter().sum::<f64>() / n as f64;
    (data.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n as f64 - 1.0)).sqrt()
}

/// Instantaneous heart rate linearly interpolated onto an even grid.
fn hr_sample_grid(series: &IntervalSeries, fs: f64) -> Vec<f64> {
    let mut beat_t = Vec::with_capacity(series.len());
    let mut hr = Vec::with_capacity(series.len());
    let mut acc = 0.0;
    for s in &series.samples {
        if !(s.ibi_s > 0.0) {
            continue;
        }
        acc += s.ibi_s;
        beat_t.push(acc);
        hr.push(60.0 / s.ibi_s);
    }
    if beat_t.is_empty() || !(fs > 0.0) {
        return Vec::new();
    }
    let duration = beat_t[beat_t.len() - 1];
    let n = (duration * fs).floor() as usize + 1;
    let mut out = Vec::with_capacity(n);
    let mut idx = 0;
    for k in 0..n {
        let t = k as f64 / fs;
        while idx + 1 < beat_t.len() && beat_t[idx + 1] < t {
            idx += 1;
        }
        let value = if t <= beat_t[0] {
            hr[0]
        } else if idx + 1 >= beat_t.len() {
            hr[hr.len() - 1]
        } else {
            let (t0, t1) = (beat_t[idx], beat_t[idx + 1]);
            let w = if t1 > t0 { (t - t0) / (t1 - t0) } else { 0.0 };
            hr[idx] + w * (hr[idx + 1] - hr[idx])
        };
        out.push(value);
    }
    out
}

/// Welch periodogram: Hann-windowed segments, 50% overlap, one-sided scaling.
fn welch_psd(signal: &[f64], fs: f64, max_segment: usize) -> (Vec<f64>, Vec<f64>) {
    let n = signal.len();
    if n < 2 || !(fs > 0.0) {
        return (Vec::new(), Vec::new());
    }
    let window = max_segment.clamp(2, n);
    let step = (window / 2).max(1);
    let hann = hann(window);
    let win_sumsq: f64 = hann.iter().map(|w| w * w).sum();
    let scale = 1.0 / (fs * win_sumsq);

    let mut planner = RealFftPlanner::<f64>::new();
    let r2c = planner.plan_fft_forward(window);
    let mut freqs = Vec::new();
    let mut powers = Vec::new();
    let mut segments = 0usize;
    let mut pos = 0usize;
    while pos + window <= n {
        let slice = &signal[pos..pos + window];
        let mean = slice.iter().sum::<f64>() / window as f64;
        let mut frame: Vec<f64> = slice
            .iter()
            .zip(hann.iter())
            .map(|(x, w)| (x - mean) * w)
            .collect();
        let mut spectrum = r2c.make_output_vec();
        r2c.process(&mut frame, &mut spectrum).unwrap();
        for (k, val) in spectrum.iter().enumerate() {
            if segments == 0 {
                freqs.push(k as f64 * fs / window as f64);
                powers.push(0.0);
            }
            let one_sided = if k == 0 || (window % 2 == 0 && k == window / 2) {
                1.0
            } else {
                2.0
            };
            powers[k] += one_sided * val.norm_sqr() * scale;
        }
        segments += 1;
        pos += step;
    }
    if segments > 0 {
        for p in powers.iter_mut() {
            *p /= segments as f64;
        }
    }
    (freqs, powers)
}

/// Trapezoidal integral of the PSD over `[lo, hi)`.
fn integrate_band(freqs: &[f64], powers: &[f64], band: (f64, f64)) -> f64 {
    let pts: Vec<(f64, f64)> = freqs
        .iter()
        .zip(powers)
        .filter(|(f, _)| **f >= band.0 && **f < band.1)
        .map(|(f, p)| (*f, *p))
        .collect();
    pts.windows(2)
        .map(|w| 0.5 * (w[0].1 + w[1].1) * (w[1].0 - w[0].0))
        .sum()
}

fn hann(size: usize) -> Vec<f64> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f64 / size as f64).cos()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::IntervalSample;

    fn series_from_ibis(ibis: &[f64]) -> IntervalSeries {
        let mut samples = Vec::with_capacity(ibis.len());
        let mut clock = 0.0;
        for &ibi in ibis {
            clock += ibi;
            samples.push(IntervalSample {
                time_s: clock,
                day: 1,
                ibi_s: ibi,
            });
        }
        IntervalSeries { samples }
    }

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        let diff = (actual - expected).abs();
        assert!(
            diff <= tol,
            "expected {expected}, got {actual} (diff {diff} > tol {tol})"
        );
    }

    #[test]
    fn constant_series_has_no_variability() {
        let series = series_from_ibis(&[1.0, 1.0, 1.0, 1.0]);
        let m = hrv_time(&series);
        assert_eq!(m.n, 4);
        assert_close(m.hr_mean, 60.0, 1e-12);
        assert_close(m.rmssd_ms, 0.0, 1e-12);
        assert_close(m.sdnn_ms, 0.0, 1e-12);
        assert_close(m.pnn50_pct, 0.0, 1e-12);
    }

    #[test]
    fn short_series_reports_nan_sentinels() {
        let series = series_from_ibis(&[0.8]);
        let m = hrv_time(&series);
        assert_close(m.hr_mean, 75.0, 1e-12);
        assert!(m.rmssd_ms.is_nan());
        assert!(m.sdnn_ms.is_nan());
        assert!(m.pnn50_pct.is_nan());
    }

    #[test]
    fn time_domain_matches_hand_computation() {
        let series = series_from_ibis(&[0.8, 0.9, 0.8, 1.0]);
        let m = hrv_time(&series);
        // diffs: +0.1, -0.1, +0.2 -> all above 50 ms.
        assert_close(m.pnn50_pct, 100.0, 1e-9);
        let rmssd = ((0.01 + 0.01 + 0.04) / 3.0_f64).sqrt() * 1000.0;
        assert_close(m.rmssd_ms, rmssd, 1e-9);
    }

    #[test]
    fn poincare_of_constant_series_is_zero() {
        let series = series_from_ibis(&[1.0; 6]);
        let p = hrv_poincare(&series);
        assert_close(p.sd1_ms, 0.0, 1e-12);
        assert_close(p.sd2_ms, 0.0, 1e-12);
        assert!(p.sd_ratio.is_nan());
    }

    #[test]
    fn poincare_identities_hold() {
        let ibis = [0.82, 0.78, 0.80, 0.79, 0.83, 0.77, 0.84, 0.88, 0.86, 0.81];
        let series = series_from_ibis(&ibis);
        let p = hrv_poincare(&series);
        let nn_ms: Vec<f64> = ibis.iter().map(|v| v * 1000.0).collect();
        let diffs: Vec<f64> = nn_ms.windows(2).map(|w| w[1] - w[0]).collect();
        let sd_d = sample_std(&diffs);
        let sd_nn = sample_std(&nn_ms);
        assert_close(p.sd1_ms, (0.5 * sd_d * sd_d).sqrt(), 1e-9);
        assert_close(
            p.sd2_ms,
            (2.0 * sd_nn * sd_nn - 0.5 * sd_d * sd_d).sqrt(),
            1e-9,
        );
        assert_close(p.sd_ratio, p.sd1_ms / p.sd2_ms * 10.0, 1e-9);
    }

    #[test]
    fn lf_band_sinusoid_concentrates_in_lf_power() {
        // Modulate the interval stream at 0.1 Hz, squarely inside the LF
        // band, and keep the recording long enough for several segments.
        let mut ibis = Vec::new();
        let mut t = 0.0;
        while t < 600.0 {
            let ibi = 1.0 + 0.1 * (2.0 * PI * 0.1 * t).sin();
            ibis.push(ibi);
            t += ibi;
        }
        let series = series_from_ibis(&ibis);
        let psd = hrv_psd(&series, &SpectralConfig::default());
        assert!(psd.lf_power > 0.0);
        assert!(
            psd.lf_power > 10.0 * (psd.vlf_power + psd.hf_power),
            "lf {} vlf {} hf {}",
            psd.lf_power,
            psd.vlf_power,
            psd.hf_power
        );
        assert!(psd.total_power >= psd.lf_power);
    }

    #[test]
    fn empty_series_yields_empty_spectrum() {
        let series = IntervalSeries::default();
        let psd = hrv_psd(&series, &SpectralConfig::default());
        assert!(psd.points.is_empty());
        assert_eq!(psd.total_power, 0.0);
    }
}
