//! Stress score aggregation.
//!
//! `score = bpm term + temperature term + piezo term + gsr term`, clamped to
//! `[0, max_score]`. The aggregator only reads channel outputs.

use serde::{Deserialize, Serialize};

use crate::calibration::baseline::Baseline;
use crate::channels::piezo::PiezoLevel;
use crate::config::ScoreConfig;

/// Channel outputs read on one evaluation tick.
#[derive(Debug, Clone, Copy)]
pub struct ScoreInputs {
    /// Pulse average, `None` while contact is lost
    pub bpm_avg: Option<f32>,
    pub temp_c: Option<f32>,
    pub piezo_level: PiezoLevel,
    /// Max envelope of the last classified window
    pub piezo_window_max: f32,
    /// Already-bounded GSR term
    pub gsr_contribution: f32,
}

/// Per-term breakdown of one score.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub bpm_term: f32,
    pub temp_term: f32,
    pub piezo_term: f32,
    pub gsr_term: f32,
    pub total: f32,
}

/// Piezo term: nothing for NORMAL or MOVEMENT, otherwise a level base plus
/// an intensity bonus, capped.
pub fn piezo_contribution(level: PiezoLevel, window_max: f32, cfg: &ScoreConfig) -> f32 {
    let base = match level {
        PiezoLevel::Normal | PiezoLevel::Movement => return 0.0,
        PiezoLevel::Medium => cfg.piezo_medium_base,
        PiezoLevel::High => cfg.piezo_high_base,
    };
    let bonus = window_max.clamp(0.0, cfg.piezo_peak_cap) / cfg.piezo_peak_divisor;
    (base + bonus).min(cfg.piezo_cap)
}

#[derive(Debug, Clone)]
pub struct ScoreAggregator {
    config: ScoreConfig,
    last: ScoreBreakdown,
}

impl ScoreAggregator {
    pub fn new(config: ScoreConfig) -> Self {
        Self {
            config,
            last: ScoreBreakdown::default(),
        }
    }

    /// Recompute the score against the frozen baseline.
    pub fn compute(&mut self, baseline: &Baseline, inputs: &ScoreInputs) -> ScoreBreakdown {
        let cfg = &self.config;

        let bpm_term = inputs
            .bpm_avg
            .map(|bpm| cfg.bpm_weight * (bpm - baseline.bpm).max(0.0))
            .unwrap_or(0.0);
        let temp_term = inputs
            .temp_c
            .map(|t| cfg.temp_weight * (baseline.temp_c - t).max(0.0))
            .unwrap_or(0.0);
        let piezo_term = piezo_contribution(inputs.piezo_level, inputs.piezo_window_max, cfg);
        let gsr_term = inputs.gsr_contribution.clamp(0.0, cfg.gsr_cap);

        let sum = bpm_term + temp_term + piezo_term + gsr_term;
        // NaN from a broken input degrades to 0 instead of escaping the bounds
        let total = if sum.is_nan() {
            0.0
        } else {
            sum.clamp(0.0, cfg.max_score)
        };

        self.last = ScoreBreakdown {
            bpm_term,
            temp_term,
            piezo_term,
            gsr_term,
            total,
        };
        self.last
    }

    pub fn config(&self) -> &ScoreConfig {
        &self.config
    }

    pub fn last(&self) -> &ScoreBreakdown {
        &self.last
    }

    pub fn value(&self) -> f32 {
        self.last.total
    }
}
