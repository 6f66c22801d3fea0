//! GSR calibration: a fixed-duration raw-mean accumulation that yields the
//! tonic baseline.

use crate::clock::{elapsed_ms, Millis};

#[derive(Debug, Clone)]
pub struct GsrCalibrator {
    start_ms: Millis,
    duration_ms: Millis,
    sum: f64,
    count: u32,
}

impl GsrCalibrator {
    pub fn begin(now: Millis, duration_ms: Millis) -> Self {
        log::info!("GSR calibration started ({} ms)", duration_ms);
        Self {
            start_ms: now,
            duration_ms,
            sum: 0.0,
            count: 0,
        }
    }

    pub fn accumulate(&mut self, raw: f32) {
        self.sum += raw as f64;
        self.count += 1;
    }

    /// Completed once the duration elapsed and at least one sample arrived.
    pub fn is_complete(&self, now: Millis) -> bool {
        self.count > 0 && elapsed_ms(now, self.start_ms) >= self.duration_ms
    }

    /// Fraction of the duration elapsed, in [0, 1].
    pub fn progress(&self, now: Millis) -> f32 {
        let elapsed = elapsed_ms(now, self.start_ms).min(self.duration_ms);
        elapsed as f32 / self.duration_ms.max(1) as f32
    }

    /// Mean of the accumulated raw samples, `None` if nothing was collected.
    pub fn mean(&self) -> Option<f32> {
        (self.count > 0).then(|| (self.sum / self.count as f64) as f32)
    }

    pub fn sample_count(&self) -> u32 {
        self.count
    }
}
