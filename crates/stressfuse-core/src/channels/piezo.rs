//! Piezo vibration channel.
//!
//! Per sample (100 Hz by default):
//! 1. `diff = |raw - slow_baseline|`
//! 2. slow baseline drifts toward raw with a very small weight
//! 3. envelope follows `diff`, fast attack and slow release
//! 4. an envelope jump larger than the spike threshold counts as a spike
//! 5. window max and "active" samples (envelope > 2x resting envelope) accumulate
//!
//! Every window (5 s) the accumulators are classified into a [`PiezoLevel`]
//! which is held until the next window closes.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::clock::{elapsed_ms, Millis, Periodic};
use crate::config::PiezoConfig;
use crate::sensors::AnalogInput;

/// Tremor classification of one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PiezoLevel {
    #[default]
    Normal,
    Medium,
    High,
    /// Gross motion; the window is contaminated and must not be scored.
    Movement,
}

impl fmt::Display for PiezoLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PiezoLevel::Normal => "NORMAL",
            PiezoLevel::Medium => "MEDIUM",
            PiezoLevel::High => "HIGH",
            PiezoLevel::Movement => "MOVEMENT",
        };
        f.write_str(s)
    }
}

/// Accumulated statistics of a closed window.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WindowSummary {
    pub window_max: f32,
    /// `100 * window_max / baseline_envelope`
    pub ratio_max: f32,
    pub active_ms: Millis,
    pub spike_count: u32,
}

/// Classify a window, highest priority first: movement, high, medium, normal.
pub fn classify(summary: &WindowSummary, config: &PiezoConfig) -> PiezoLevel {
    if summary.spike_count >= config.movement_spikes {
        return PiezoLevel::Movement;
    }

    let high = (summary.window_max >= config.high_peak && summary.ratio_max >= config.high_ratio_pct)
        || (summary.active_ms >= config.high_active_ms
            && summary.ratio_max >= config.high_active_ratio_pct);
    if high {
        return PiezoLevel::High;
    }

    let medium = (summary.window_max >= config.medium_peak
        && summary.ratio_max >= config.medium_ratio_pct)
        || summary.active_ms >= config.medium_active_ms;
    if medium {
        return PiezoLevel::Medium;
    }

    PiezoLevel::Normal
}

#[derive(Debug, Clone)]
pub struct PiezoState {
    pub slow_baseline: f32,
    pub envelope: f32,
    prev_envelope: f32,
    pub window_start: Option<Millis>,
    pub window_max: f32,
    pub active_samples: u32,
    pub spike_count: u32,
    pub level: PiezoLevel,
    pub last_window: WindowSummary,
    pub last_raw: u16,
    /// Resting envelope from baseline calibration
    pub baseline_envelope: f32,
    pub spike_threshold: f32,
}

impl Default for PiezoState {
    fn default() -> Self {
        Self {
            slow_baseline: 0.0,
            envelope: 0.0,
            prev_envelope: 0.0,
            window_start: None,
            window_max: 0.0,
            active_samples: 0,
            spike_count: 0,
            level: PiezoLevel::Normal,
            last_window: WindowSummary::default(),
            last_raw: 0,
            baseline_envelope: 1.0,
            spike_threshold: 20.0,
        }
    }
}

pub struct PiezoChannel {
    config: PiezoConfig,
    gate: Periodic,
    state: PiezoState,
}

impl PiezoChannel {
    pub fn new(config: PiezoConfig) -> Self {
        Self {
            gate: Periodic::new(config.sample_period_ms),
            config,
            state: PiezoState::default(),
        }
    }

    /// One-time synchronous acquisition of the resting level.
    ///
    /// Bounded by `startup_samples` reads; runs before the main loop.
    pub fn seed_baseline(&mut self, input: &mut dyn AnalogInput) -> f32 {
        let n = self.config.startup_samples.max(1);
        let sum: f64 = (0..n).map(|_| input.read() as f64).sum();
        let mean = (sum / n as f64) as f32;
        self.state.slow_baseline = mean;
        log::info!("Piezo resting level seeded at {:.1} from {} reads", mean, n);
        mean
    }

    /// Sample if the period elapsed. Returns true when a sample was taken.
    pub fn tick(&mut self, now: Millis, input: &mut dyn AnalogInput) -> bool {
        if !self.gate.due(now) {
            return false;
        }
        let raw = input.read();
        self.update(now, raw);
        true
    }

    /// Feed one sample through the filters and close the window if due.
    pub fn update(&mut self, now: Millis, raw: u16) {
        let cfg = &self.config;
        let s = &mut self.state;
        s.last_raw = raw;

        let x = raw as f32;
        let diff = (x - s.slow_baseline).abs();
        s.slow_baseline += cfg.baseline_weight * (x - s.slow_baseline);

        s.prev_envelope = s.envelope;
        let weight = if diff > s.envelope {
            cfg.attack_weight
        } else {
            cfg.release_weight
        };
        s.envelope += weight * (diff - s.envelope);

        if s.envelope - s.prev_envelope > s.spike_threshold {
            s.spike_count += 1;
        }

        s.window_max = s.window_max.max(s.envelope);
        if s.envelope > cfg.active_ratio * s.baseline_envelope {
            s.active_samples += 1;
        }

        log::trace!(
            "piezo raw={} base={:.2} diff={:.2} env={:.2}",
            raw,
            s.slow_baseline,
            diff,
            s.envelope
        );

        let start = *s.window_start.get_or_insert(now);
        if elapsed_ms(now, start) >= cfg.window_ms {
            self.finalize_window(now);
        }
    }

    fn finalize_window(&mut self, now: Millis) {
        let s = &mut self.state;
        let summary = WindowSummary {
            window_max: s.window_max,
            ratio_max: 100.0 * s.window_max / s.baseline_envelope,
            active_ms: s.active_samples.saturating_mul(self.config.sample_period_ms),
            spike_count: s.spike_count,
        };
        s.level = classify(&summary, &self.config);
        s.last_window = summary;

        log::debug!(
            "Piezo window: {} (max={:.1}, ratio={:.0}%, active={}ms, spikes={})",
            s.level,
            summary.window_max,
            summary.ratio_max,
            summary.active_ms,
            summary.spike_count
        );

        self.reset_window(now);
    }

    /// Clear window accumulators and start a new window at `now`.
    pub fn reset_window(&mut self, now: Millis) {
        let s = &mut self.state;
        s.window_start = Some(now);
        s.window_max = 0.0;
        s.active_samples = 0;
        s.spike_count = 0;
    }

    /// Install the per-user resting envelope and spike threshold.
    pub fn set_calibration(&mut self, baseline_envelope: f32, spike_threshold: f32) {
        self.state.baseline_envelope = baseline_envelope;
        self.state.spike_threshold = spike_threshold;
    }

    pub fn level(&self) -> PiezoLevel {
        self.state.level
    }

    pub fn envelope(&self) -> f32 {
        self.state.envelope
    }

    pub fn last_window(&self) -> &WindowSummary {
        &self.state.last_window
    }

    pub fn state(&self) -> &PiezoState {
        &self.state
    }
}
