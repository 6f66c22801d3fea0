//! The cooperative control loop body.
//!
//! [`StressMonitor::tick`] is called as often as possible with the current
//! time. Every channel decides on its own period whether to act, so no
//! component stalls another. The only synchronous acquisition longer than a
//! handful of reads is the piezo resting-level seed in [`StressMonitor::start`].

use thiserror::Error;

use crate::calibration::baseline::{Baseline, BaselineCalibrator, BaselineSample};
use crate::channels::gsr::GsrChannel;
use crate::channels::piezo::PiezoChannel;
use crate::channels::pulse::PulseChannel;
use crate::channels::temperature::TemperatureChannel;
use crate::clock::{Millis, Periodic};
use crate::config::{ConfigError, StressConfig};
use crate::phase::{MonitorPhase, PhaseSignals};
use crate::score::{ScoreAggregator, ScoreBreakdown, ScoreInputs};
use crate::sensors::{SensorError, SensorRig};
use crate::status::{Diagnostics, StatusLine};

#[derive(Error, Debug)]
pub enum MonitorError {
    /// Fatal: a primary sensor did not come up. There is no recovery path.
    #[error("sensor start-up failed: {0}")]
    Sensor(#[from] SensorError),
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// What happened during one tick.
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub now: Millis,
    pub phase: MonitorPhase,
    /// Set on display ticks
    pub status: Option<StatusLine>,
    /// Set on diagnostics ticks once scoring is active
    pub diagnostics: Option<Diagnostics>,
    /// Set on evaluation ticks once the baseline is frozen
    pub score: Option<ScoreBreakdown>,
}

pub struct StressMonitor {
    rig: SensorRig,
    pulse: PulseChannel,
    temperature: TemperatureChannel,
    piezo: PiezoChannel,
    gsr: GsrChannel,
    baseline: BaselineCalibrator,
    score: ScoreAggregator,
    phase: MonitorPhase,
    evaluation: Periodic,
    display: Periodic,
    diagnostics: Periodic,
}

impl StressMonitor {
    /// Validate config, probe the sensors and seed the piezo resting level.
    pub fn start(config: StressConfig, mut rig: SensorRig, now: Millis) -> Result<Self, MonitorError> {
        config.validate()?;
        if let Err(e) = rig.probe_all() {
            log::error!("Start-up halted: {}", e);
            return Err(e.into());
        }

        let mut piezo = PiezoChannel::new(config.piezo.clone());
        piezo.seed_baseline(rig.piezo.as_mut());

        let mut temperature = TemperatureChannel::new(config.temperature.clone());
        temperature.tick(now, rig.thermometer.as_mut());

        log::info!("Monitor started, awaiting contact");
        Ok(Self {
            pulse: PulseChannel::new(config.pulse.clone()),
            temperature,
            piezo,
            gsr: GsrChannel::new(config.gsr.clone()),
            baseline: BaselineCalibrator::new(config.baseline.clone()),
            score: ScoreAggregator::new(config.score.clone()),
            phase: MonitorPhase::AwaitingContact,
            evaluation: Periodic::new(config.schedule.evaluation_ms),
            display: Periodic::new(config.schedule.display_ms),
            diagnostics: Periodic::new(config.schedule.diagnostics_ms),
            rig,
        })
    }

    pub fn tick(&mut self, now: Millis) -> TickReport {
        let raw = self.rig.pulse.read_raw();
        let beat = self.rig.pulse.beat_detected();
        self.pulse.tick(now, raw, beat);
        self.temperature.tick(now, self.rig.thermometer.as_mut());
        self.piezo.tick(now, self.rig.piezo.as_mut());
        self.gsr.tick(now, self.rig.gsr.as_mut());

        let score = if self.evaluation.due(now) {
            self.evaluate(now)
        } else {
            None
        };

        self.advance_phase();

        let status = self.display.due(now).then(|| self.status_line(now));

        let diagnostics = if self.phase.is_scoring() && self.diagnostics.due(now) {
            let d = self.diagnostics(now);
            log::info!(target: "stressfuse::diag", "{}", d);
            Some(d)
        } else {
            None
        };

        TickReport {
            now,
            phase: self.phase,
            status,
            diagnostics,
            score,
        }
    }

    /// Baseline accumulation before the baseline is frozen, scoring after.
    fn evaluate(&mut self, now: Millis) -> Option<ScoreBreakdown> {
        if !self.baseline.is_done() {
            let sample = BaselineSample {
                contact: self.pulse.has_contact(),
                bpm_avg: self.pulse.average_bpm(),
                temp_c: self.temperature.celsius(),
                piezo_envelope: self.piezo.envelope(),
            };
            if let Some(baseline) = self.baseline.accumulate(&sample) {
                baseline.hand_off(now, &mut self.piezo, &mut self.gsr);
            }
        }

        let inputs = self.score_inputs();
        let baseline = self.baseline.baseline()?;
        Some(self.score.compute(baseline, &inputs))
    }

    fn score_inputs(&self) -> ScoreInputs {
        ScoreInputs {
            bpm_avg: self
                .pulse
                .has_contact()
                .then(|| self.pulse.average_bpm()),
            temp_c: self.temperature.celsius(),
            piezo_level: self.piezo.level(),
            piezo_window_max: self.piezo.last_window().window_max,
            gsr_contribution: self.gsr.contribution(self.score.config().gsr_cap),
        }
    }

    fn advance_phase(&mut self) {
        let next = self.phase.advance(PhaseSignals {
            contact: self.pulse.has_contact(),
            baseline_done: self.baseline.is_done(),
            gsr_calibrated: self.gsr.is_calibrated(),
        });
        if next != self.phase {
            log::info!("Phase {} -> {}", self.phase, next);
            self.phase = next;
        }
    }

    pub fn status_line(&self, now: Millis) -> StatusLine {
        match self.phase {
            MonitorPhase::AwaitingContact => StatusLine::AwaitingContact,
            MonitorPhase::BaselineCalibrating => StatusLine::BaselineCalibrating {
                collected: self.baseline.collected(),
                total: self.baseline.required(),
            },
            MonitorPhase::GsrCalibrating => StatusLine::GsrCalibrating {
                percent: self.gsr.calibration_percent(now).unwrap_or(100),
            },
            MonitorPhase::Active => StatusLine::Active {
                bpm: self.pulse.average_bpm(),
                piezo: self.piezo.level(),
                score: self.score.value(),
            },
        }
    }

    pub fn diagnostics(&self, now: Millis) -> Diagnostics {
        let pulse = self.pulse.state();
        let piezo = self.piezo.state();
        let gsr = self.gsr.filter();
        let baseline = self.baseline.baseline();
        Diagnostics {
            t_ms: now,
            phase: self.phase,
            contact: pulse.contact,
            pulse_raw: pulse.last_raw,
            bpm: pulse.current_bpm,
            bpm_avg: self.pulse.average_bpm(),
            bpm_baseline: baseline.map_or(0.0, |b| b.bpm),
            temp_c: self.temperature.celsius(),
            temp_baseline: baseline.map_or(0.0, |b| b.temp_c),
            piezo_raw: piezo.last_raw,
            piezo_slow_baseline: piezo.slow_baseline,
            piezo_envelope: piezo.envelope,
            piezo_window_max: piezo.window_max,
            piezo_spikes: piezo.spike_count,
            piezo_level: piezo.level,
            piezo_baseline_envelope: piezo.baseline_envelope,
            piezo_spike_threshold: piezo.spike_threshold,
            gsr_raw: self.gsr.last_raw(),
            gsr_tone_baseline: gsr.map(|f| f.tone_baseline),
            gsr_phasic_tracker: gsr.map(|f| f.phasic_tracker),
            gsr_phasic: gsr.map(|f| f.phasic),
            gsr_smoothed: gsr.map(|f| f.smoothed_score),
            score: *self.score.last(),
        }
    }

    pub fn phase(&self) -> MonitorPhase {
        self.phase
    }

    /// Latest score, `None` before the baseline is frozen.
    pub fn score(&self) -> Option<f32> {
        self.baseline.is_done().then(|| self.score.value())
    }

    pub fn baseline(&self) -> Option<&Baseline> {
        self.baseline.baseline()
    }

    pub fn pulse(&self) -> &PulseChannel {
        &self.pulse
    }

    pub fn temperature(&self) -> &TemperatureChannel {
        &self.temperature
    }

    pub fn piezo(&self) -> &PiezoChannel {
        &self.piezo
    }

    pub fn gsr(&self) -> &GsrChannel {
        &self.gsr
    }
}
