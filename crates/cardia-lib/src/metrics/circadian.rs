use crate::config::CircadianConfig;
use crate::error::Error;
use nalgebra::{Matrix3, Vector3};
use realfft::RealFftPlanner;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Parameters of `HR(t) = offset + amplitude * cos(2*pi*f*t + phase)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CircadianFit {
    pub amplitude: f64,
    pub phase: f64,
    pub offset: f64,
    /// Rhythm-adjusted mean: `offset + amplitude * cos(phase)`.
    pub mesor: f64,
    pub frequency_hz: f64,
    pub sse: f64,
}

/// Trailing moving average with a minimum period of one sample.
pub fn trailing_mean(data: &[f64], window: usize) -> Vec<f64> {
    let window = window.max(1);
    let mut out = Vec::with_capacity(data.len());
    let mut acc = 0.0;
    for (i, &value) in data.iter().enumerate() {
        acc += value;
        if i >= window {
            acc -= data[i - window];
        }
        let n = (i + 1).min(window);
        out.push(acc / n as f64);
    }
    out
}

/// Least-squares single-sinusoid fit over a continuous timeline.
///
/// The frequency is seeded from the dominant spectral bin (falling back to a
/// one-day period), scanned on a grid fine enough to land inside the main
/// spectral lobe, then polished by golden-section search. At every candidate
/// frequency the remaining parameters come from an exact linear solve, so the
/// only nonlinear dimension is the frequency itself.
pub fn fit_cosinor(
    times: &[f64],
    values: &[f64],
    cfg: &CircadianConfig,
) -> Result<CircadianFit, Error> {
    let n = times.len().min(values.len());
    if n < 4 {
        return Err(Error::InsufficientSamples {
            statistic: "cosinor",
            needed: 4,
            found: n,
        });
    }
    let times = &times[..n];
    let values = &values[..n];
    let span = times[n - 1] - times[0];
    if !(span > 0.0) {
        return Err(Error::FitNonConvergence { iterations: 0 });
    }

    let mean_dt = span / (n as f64 - 1.0);
    let seed = dominant_frequency(values, mean_dt).unwrap_or(1.0 / cfg.fallback_period_s);

    // Quarter of the spectral resolution keeps the grid dense enough that the
    // best candidate falls inside the main lobe around the true frequency.
    let mut step = 1.0 / (4.0 * span);
    let lo = (seed * 0.5).max(step * 0.25);
    let hi = seed * 2.0;
    if cfg.max_grid > 0 {
        step = step.max((hi - lo) / cfg.max_grid as f64);
    }

    let mut best_f = seed;
    let mut best_sse = sse_at(times, values, seed);
    let mut f = lo;
    while f <= hi {
        let sse = sse_at(times, values, f);
        if sse < best_sse {
            best_sse = sse;
            best_f = f;
        }
        f += step;
    }
    if !best_sse.is_finite() {
        return Err(Error::FitNonConvergence { iterations: 0 });
    }

    // Golden-section polish within one grid step of the best candidate.
    let gr = (5.0_f64.sqrt() - 1.0) / 2.0;
    let mut a = (best_f - step).max(lo * 0.5);
    let mut b = best_f + step;
    let mut c = b - gr * (b - a);
    let mut d = a + gr * (b - a);
    let mut fc = sse_at(times, values, c);
    let mut fd = sse_at(times, values, d);
    let mut iterations = 0;
    while iterations < cfg.max_iterations {
        if fc < fd {
            b = d;
            d = c;
            fd = fc;
            c = b - gr * (b - a);
            fc = sse_at(times, values, c);
        } else {
            a = c;
            c = d;
            fc = fd;
            d = a + gr * (b - a);
            fd = sse_at(times, values, d);
        }
        iterations += 1;
    }
    let refined = 0.5 * (a + b);

    let (a_cos, b_sin, offset, sse) = match cosinor_solve(times, values, refined) {
        Some(solution) => solution,
        None => return Err(Error::FitNonConvergence { iterations }),
    };
    let amplitude = a_cos.hypot(b_sin);
    let phase = (-b_sin).atan2(a_cos);
    let mesor = offset + amplitude * phase.cos();
    let fit = CircadianFit {
        amplitude,
        phase,
        offset,
        mesor,
        frequency_hz: refined,
        sse,
    };
    if !(fit.amplitude.is_finite()
        && fit.phase.is_finite()
        && fit.offset.is_finite()
        && fit.mesor.is_finite())
    {
        return Err(Error::FitNonConvergence { iterations });
    }
    Ok(fit)
}

fn sse_at(times: &[f64], values: &[f64], freq: f64) -> f64 {
    match cosinor_solve(times, values, freq) {
        Some((_, _, _, sse)) => sse,
        None => f64::INFINITY,
    }
}

/// Exact least squares for `y = a*cos(wt) + b*sin(wt) + c` at a fixed
/// frequency, via the 3x3 normal equations.
fn cosinor_solve(times: &[f64], values: &[f64], freq: f64) -> Option<(f64, f64, f64, f64)> {
    if !(freq > 0.0) || !freq.is_finite() {
        return None;
    }
    let w = 2.0 * PI * freq;
    let n = times.len() as f64;
    let (mut scc, mut scs, mut sc, mut sss, mut ss) = (0.0, 0.0, 0.0, 0.0, 0.0);
    let (mut syc, mut sys, mut sy) = (0.0, 0.0, 0.0);
    for (&t, &y) in times.iter().zip(values) {
        let (sin_wt, cos_wt) = (w * t).sin_cos();
        scc += cos_wt * cos_wt;
        scs += cos_wt * sin_wt;
        sc += cos_wt;
        sss += sin_wt * sin_wt;
        ss += sin_wt;
        syc += y * cos_wt;
        sys += y * sin_wt;
        sy += y;
    }
    let m = Matrix3::new(scc, scs, sc, scs, sss, ss, sc, ss, n);
    let rhs = Vector3::new(syc, sys, sy);
    let beta = m.lu().solve(&rhs)?;
    let (a, b, c) = (beta[0], beta[1], beta[2]);
    let mut sse = 0.0;
    for (&t, &y) in times.iter().zip(values) {
        let (sin_wt, cos_wt) = (w * t).sin_cos();
        let r = y - (a * cos_wt + b * sin_wt + c);
        sse += r * r;
    }
    Some((a, b, c, sse))
}

/// Dominant non-DC spectral bin of the (assumed evenly spaced) signal.
fn dominant_frequency(values: &[f64], dt: f64) -> Option<f64> {
    let n = values.len();
    if n < 4 || !(dt > 0.0) {
        return None;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let mut buffer: Vec<f64> = values.iter().map(|v| v - mean).collect();
    let mut planner = RealFftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(n);
    let mut spectrum = fft.make_output_vec();
    fft.process(&mut buffer, &mut spectrum).unwrap();
    let mut best_k = 0;
    let mut best_power = 0.0;
    for (k, value) in spectrum.iter().enumerate().skip(1) {
        let power = value.norm_sqr();
        if power > best_power {
            best_power = power;
            best_k = k;
        }
    }
    if best_k == 0 || best_power <= 0.0 {
        return None;
    }
    Some(best_k as f64 / (n as f64 * dt))
}
