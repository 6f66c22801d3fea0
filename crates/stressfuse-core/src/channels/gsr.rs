//! Galvanic skin response channel.
//!
//! Two EMAs split the signal: a slow tonic baseline and a fast phasic
//! tracker. Their difference is the phasic component, mapped onto a 0-100
//! target and smoothed into a score.

use serde::{Deserialize, Serialize};

use crate::calibration::gsr::GsrCalibrator;
use crate::clock::{Millis, Periodic};
use crate::config::GsrConfig;
use crate::sensors::AnalogInput;

/// Post-calibration filter state.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GsrFilter {
    pub tone_baseline: f32,
    pub phasic_tracker: f32,
    pub phasic: f32,
    pub smoothed_score: f32,
}

impl GsrFilter {
    /// Both trackers start at the calibration mean so the first phasic
    /// reading is zero.
    pub fn aligned(mean: f32) -> Self {
        Self {
            tone_baseline: mean,
            phasic_tracker: mean,
            phasic: 0.0,
            smoothed_score: 0.0,
        }
    }

    pub fn update(&mut self, raw: f32, cfg: &GsrConfig) {
        self.tone_baseline =
            (1.0 - cfg.tonic_weight) * self.tone_baseline + cfg.tonic_weight * raw;
        self.phasic_tracker =
            (1.0 - cfg.phasic_weight) * self.phasic_tracker + cfg.phasic_weight * raw;

        self.phasic = (self.phasic_tracker - self.tone_baseline).clamp(0.0, cfg.phasic_full_scale);
        let target = self.phasic / cfg.phasic_full_scale * 100.0;

        self.smoothed_score = ((1.0 - cfg.score_smoothing) * self.smoothed_score
            + cfg.score_smoothing * target)
            .clamp(0.0, 100.0);
    }
}

#[derive(Debug, Clone)]
pub enum GsrMode {
    /// Samples are read but ignored.
    Idle,
    Calibrating(GsrCalibrator),
    Tracking(GsrFilter),
}

pub struct GsrChannel {
    config: GsrConfig,
    gate: Periodic,
    mode: GsrMode,
    last_raw: f32,
}

impl GsrChannel {
    pub fn new(config: GsrConfig) -> Self {
        Self {
            gate: Periodic::new(config.sample_period_ms),
            config,
            mode: GsrMode::Idle,
            last_raw: 0.0,
        }
    }

    /// Begin the calibration phase. Only honoured once, from `Idle`.
    pub fn start_calibration(&mut self, now: Millis) {
        match self.mode {
            GsrMode::Idle => {
                self.mode = GsrMode::Calibrating(GsrCalibrator::begin(
                    now,
                    self.config.calibration_ms,
                ));
            }
            _ => log::warn!("GSR calibration already started, ignoring request"),
        }
    }

    /// Take one micro-averaged sample if the period elapsed.
    pub fn tick(&mut self, now: Millis, input: &mut dyn AnalogInput) -> bool {
        if !self.gate.due(now) {
            return false;
        }
        let n = self.config.reads_per_sample.max(1);
        let sum: u32 = (0..n).map(|_| input.read() as u32).sum();
        self.update(now, sum as f32 / n as f32);
        true
    }

    /// Feed one (already averaged) sample.
    pub fn update(&mut self, now: Millis, raw: f32) {
        self.last_raw = raw;
        match &mut self.mode {
            GsrMode::Idle => {}
            GsrMode::Calibrating(cal) => {
                cal.accumulate(raw);
                if cal.is_complete(now) {
                    if let Some(mean) = cal.mean() {
                        log::info!(
                            "GSR calibration done: tonic baseline {:.1} from {} samples",
                            mean,
                            cal.sample_count()
                        );
                        self.mode = GsrMode::Tracking(GsrFilter::aligned(mean));
                    }
                }
            }
            GsrMode::Tracking(filter) => {
                filter.update(raw, &self.config);
                log::trace!(
                    "gsr raw={:.1} tone={:.2} fast={:.2} phasic={:.2} score={:.1}",
                    raw,
                    filter.tone_baseline,
                    filter.phasic_tracker,
                    filter.phasic,
                    filter.smoothed_score
                );
            }
        }
    }

    /// Score term, `smoothed * cap / 100` bounded to [0, cap]. Zero until calibrated.
    pub fn contribution(&self, cap: f32) -> f32 {
        match &self.mode {
            GsrMode::Tracking(filter) => (filter.smoothed_score * cap / 100.0).clamp(0.0, cap),
            _ => 0.0,
        }
    }

    pub fn is_calibrating(&self) -> bool {
        matches!(self.mode, GsrMode::Calibrating(_))
    }

    pub fn is_calibrated(&self) -> bool {
        matches!(self.mode, GsrMode::Tracking(_))
    }

    /// Calibration progress in percent, `None` outside calibration.
    pub fn calibration_percent(&self, now: Millis) -> Option<u8> {
        match &self.mode {
            GsrMode::Calibrating(cal) => Some((cal.progress(now) * 100.0).round() as u8),
            _ => None,
        }
    }

    pub fn filter(&self) -> Option<&GsrFilter> {
        match &self.mode {
            GsrMode::Tracking(filter) => Some(filter),
            _ => None,
        }
    }

    pub fn mode(&self) -> &GsrMode {
        &self.mode
    }

    pub fn last_raw(&self) -> f32 {
        self.last_raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    fn calibrated_at(mean: f32) -> GsrChannel {
        let mut ch = GsrChannel::new(GsrConfig::default());
        ch.start_calibration(0);
        let mut now = 0;
        while !ch.is_calibrated() {
            ch.update(now, mean);
            now += 120;
        }
        ch
    }

    #[test]
    fn test_samples_ignored_before_calibration() {
        let mut ch = GsrChannel::new(GsrConfig::default());
        for i in 0..100 {
            ch.update(i * 120, 900.0);
        }
        assert!(matches!(ch.mode(), GsrMode::Idle));
        assert_eq!(ch.contribution(30.0), 0.0);
        assert_eq!(ch.last_raw(), 900.0);
    }

    #[test]
    fn test_calibration_aligns_trackers() {
        let ch = calibrated_at(420.0);
        let f = ch.filter().unwrap();
        assert_eq!(f.tone_baseline, f.phasic_tracker);
        assert_eq!(f.tone_baseline, 420.0);
        assert_eq!(f.phasic, 0.0);
        assert_eq!(f.smoothed_score, 0.0);
    }

    #[test]
    fn test_unchanged_input_keeps_phasic_at_zero() {
        let mut ch = calibrated_at(420.0);
        for i in 0..500 {
            ch.update(60_000 + i * 120, 420.0);
        }
        let f = ch.filter().unwrap();
        assert_abs_diff_eq!(f.phasic, 0.0, epsilon = 1e-3);
        assert_abs_diff_eq!(ch.contribution(30.0), 0.0, epsilon = 1e-3);
    }

    #[test]
    fn test_arousal_step_raises_then_settles() {
        let mut ch = calibrated_at(400.0);
        let mut now = 60_000;
        for _ in 0..200 {
            ch.update(now, 430.0);
            now += 120;
        }
        let peak = ch.filter().unwrap().smoothed_score;
        assert!(peak > 40.0, "score after step was {}", peak);
        assert!(ch.contribution(30.0) > 0.0);
        assert!(ch.contribution(30.0) <= 30.0);

        for _ in 0..10_000 {
            ch.update(now, 430.0);
            now += 120;
        }
        let f = ch.filter().unwrap();
        assert_abs_diff_eq!(f.phasic, 0.0, epsilon = 0.01);
        assert!(f.smoothed_score < peak);
    }

    #[test]
    fn test_phasic_clamped_to_full_scale() {
        let cfg = GsrConfig::default();
        let mut f = GsrFilter::aligned(100.0);
        for _ in 0..50 {
            f.update(1_000.0, &cfg);
        }
        assert_relative_eq!(f.phasic, cfg.phasic_full_scale);
        assert!(f.smoothed_score <= 100.0);

        let mut g = GsrFilter::aligned(1_000.0);
        g.update(0.0, &cfg);
        assert_eq!(g.phasic, 0.0);
    }

    #[test]
    fn test_calibration_percent_and_one_shot() {
        let mut ch = GsrChannel::new(GsrConfig::default());
        assert_eq!(ch.calibration_percent(0), None);
        ch.start_calibration(0);
        assert_eq!(ch.calibration_percent(30_000), Some(50));
        ch.start_calibration(10_000);
        assert_eq!(ch.calibration_percent(30_000), Some(50));
    }

    #[test]
    fn test_tick_micro_averages_reads() {
        struct Alternating(bool);
        impl AnalogInput for Alternating {
            fn read(&mut self) -> u16 {
                self.0 = !self.0;
                if self.0 {
                    100
                } else {
                    200
                }
            }
        }
        let cfg = GsrConfig {
            reads_per_sample: 4,
            ..GsrConfig::default()
        };
        let mut ch = GsrChannel::new(cfg);
        assert!(ch.tick(0, &mut Alternating(false)));
        assert_relative_eq!(ch.last_raw(), 150.0);
        assert!(!ch.tick(119, &mut Alternating(false)));
        assert!(ch.tick(120, &mut Alternating(false)));
    }
}
