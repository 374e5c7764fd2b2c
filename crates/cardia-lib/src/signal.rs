use serde::{Deserialize, Serialize};

pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// One inter-beat interval with its wall-clock position.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IntervalSample {
    /// Seconds since midnight of `day`.
    pub time_s: f64,
    /// Recording day, starting at 1.
    pub day: u32,
    /// Inter-beat interval in seconds.
    pub ibi_s: f64,
}

impl IntervalSample {
    /// Position on the continuous timeline spanning the whole recording
    /// (day 2 is offset by +86400 s, and so on).
    pub fn elapsed_s(&self) -> f64 {
        self.time_s + (self.day.saturating_sub(1)) as f64 * SECONDS_PER_DAY
    }
}

/// Ordered inter-beat intervals for one subject.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntervalSeries {
    pub samples: Vec<IntervalSample>,
}

impl IntervalSeries {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn ibis(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().map(|s| s.ibi_s)
    }

    /// Instantaneous heart rate (bpm) at each beat.
    pub fn instantaneous_hr(&self) -> Vec<f64> {
        self.samples.iter().map(|s| 60.0 / s.ibi_s).collect()
    }

    /// Elapsed-seconds timestamp of each beat.
    pub fn elapsed_times(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.elapsed_s()).collect()
    }
}

/// One accelerometer/heart-rate row from the activity recording. Posture
/// arrives as four 0/1 inclinometer channels; more than one can be set on a
/// noisy row, so they are kept as independent flags.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ActivitySample {
    pub time_s: f64,
    pub day: u32,
    pub hr: f64,
    pub sitting: bool,
    pub lying: bool,
    pub standing: bool,
    pub off_body: bool,
}

impl ActivitySample {
    pub fn is_resting(&self) -> bool {
        self.sitting || self.lying
    }

    pub fn is_upright(&self) -> bool {
        self.standing || self.off_body
    }
}

/// True when a forward walk of the clock from `start_time_s` to `end_time_s`
/// lands past the midnight wrap. `end_time_s` may exceed 86400 when the
/// caller accumulates without wrapping.
pub fn crossed_midnight(start_time_s: f64, end_time_s: f64) -> bool {
    end_time_s >= SECONDS_PER_DAY || end_time_s < start_time_s
}
