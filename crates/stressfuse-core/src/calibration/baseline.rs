//! Per-user resting baseline.
//!
//! Accumulates pulse average, skin temperature and piezo envelope over a
//! fixed number of qualifying evaluation ticks, then freezes. Completion is
//! one-shot for the session.

use serde::{Deserialize, Serialize};

use crate::channels::gsr::GsrChannel;
use crate::channels::piezo::PiezoChannel;
use crate::clock::Millis;
use crate::config::BaselineConfig;

/// Inputs offered on each evaluation tick.
#[derive(Debug, Clone, Copy)]
pub struct BaselineSample {
    pub contact: bool,
    pub bpm_avg: f32,
    pub temp_c: Option<f32>,
    pub piezo_envelope: f32,
}

impl BaselineSample {
    /// The user is instrumented: finger on the sensor, a pulse average
    /// exists and the thermometer has produced a value.
    pub fn qualifies(&self) -> bool {
        self.contact && self.bpm_avg > 0.0 && self.temp_c.is_some()
    }
}

/// Frozen reference values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub bpm: f32,
    pub temp_c: f32,
    pub piezo_envelope: f32,
    pub spike_threshold: f32,
}

impl Baseline {
    /// One-time handoff to the channels: install the piezo calibration,
    /// restart its window and kick off GSR calibration.
    pub fn hand_off(&self, now: Millis, piezo: &mut PiezoChannel, gsr: &mut GsrChannel) {
        piezo.set_calibration(self.piezo_envelope, self.spike_threshold);
        piezo.reset_window(now);
        gsr.start_calibration(now);
    }
}

#[derive(Debug, Clone, Default)]
pub struct BaselineCalibrator {
    config: BaselineConfig,
    bpm_sum: f32,
    temp_sum: f32,
    envelope_sum: f32,
    count: u32,
    baseline: Option<Baseline>,
}

impl BaselineCalibrator {
    pub fn new(config: BaselineConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Offer one tick. Returns the baseline exactly on the completing tick.
    pub fn accumulate(&mut self, sample: &BaselineSample) -> Option<Baseline> {
        if self.baseline.is_some() || !sample.qualifies() {
            return None;
        }
        let temp_c = sample.temp_c?;

        self.bpm_sum += sample.bpm_avg;
        self.temp_sum += temp_c;
        self.envelope_sum += sample.piezo_envelope;
        self.count += 1;
        log::debug!("Baseline sample {}/{}", self.count, self.config.samples);

        if self.count < self.config.samples {
            return None;
        }

        let n = self.count as f32;
        let piezo_envelope = (self.envelope_sum / n).max(self.config.min_piezo_envelope);
        let baseline = Baseline {
            bpm: self.bpm_sum / n,
            temp_c: self.temp_sum / n,
            piezo_envelope,
            spike_threshold: self
                .config
                .spike_threshold_floor
                .max(self.config.spike_threshold_gain * piezo_envelope),
        };
        log::info!(
            "Baseline done: bpm={:.1} temp={:.2}C piezo_env={:.2} spike_th={:.1}",
            baseline.bpm,
            baseline.temp_c,
            baseline.piezo_envelope,
            baseline.spike_threshold
        );
        self.baseline = Some(baseline);
        Some(baseline)
    }

    pub fn collected(&self) -> u32 {
        self.count
    }

    pub fn required(&self) -> u32 {
        self.config.samples
    }

    pub fn is_done(&self) -> bool {
        self.baseline.is_some()
    }

    pub fn baseline(&self) -> Option<&Baseline> {
        self.baseline.as_ref()
    }
}
