//! Human-readable status lines and the field-tuning diagnostics record.

use serde::Serialize;
use std::fmt;

use crate::channels::piezo::PiezoLevel;
use crate::clock::Millis;
use crate::phase::MonitorPhase;
use crate::score::ScoreBreakdown;

/// What the status display shows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StatusLine {
    AwaitingContact,
    BaselineCalibrating { collected: u32, total: u32 },
    GsrCalibrating { percent: u8 },
    Active { bpm: f32, piezo: PiezoLevel, score: f32 },
    /// Start-up failure; terminal.
    SensorFault,
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusLine::AwaitingContact => write!(f, "Place finger on sensor"),
            StatusLine::BaselineCalibrating { collected, total } => {
                write!(f, "Baseline calibrating {}/{}", collected, total)
            }
            StatusLine::GsrCalibrating { percent } => write!(f, "GSR calibrating {}%", percent),
            StatusLine::Active { bpm, piezo, score } => {
                write!(f, "BPM {:.0} | piezo {} | stress {:.0}", bpm, piezo, score)
            }
            StatusLine::SensorFault => write!(f, "SENSOR ERROR"),
        }
    }
}

/// Every intermediate variable of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Diagnostics {
    pub t_ms: Millis,
    pub phase: MonitorPhase,
    pub contact: bool,

    pub pulse_raw: u16,
    pub bpm: f32,
    pub bpm_avg: f32,
    pub bpm_baseline: f32,

    pub temp_c: Option<f32>,
    pub temp_baseline: f32,

    pub piezo_raw: u16,
    pub piezo_slow_baseline: f32,
    pub piezo_envelope: f32,
    pub piezo_window_max: f32,
    pub piezo_spikes: u32,
    pub piezo_level: PiezoLevel,
    pub piezo_baseline_envelope: f32,
    pub piezo_spike_threshold: f32,

    pub gsr_raw: f32,
    pub gsr_tone_baseline: Option<f32>,
    pub gsr_phasic_tracker: Option<f32>,
    pub gsr_phasic: Option<f32>,
    pub gsr_smoothed: Option<f32>,

    pub score: ScoreBreakdown,
}

impl Diagnostics {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

fn opt(v: Option<f32>) -> String {
    v.map(|x| format!("{:.2}", x)).unwrap_or_else(|| "-".to_string())
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "t={} phase={} contact={} pulse_raw={} bpm={:.1} bpm_avg={:.1} bpm_base={:.1} \
             temp={} temp_base={:.2} piezo_raw={} piezo_base={:.1} env={:.2} win_max={:.2} \
             spikes={} piezo={} env_base={:.2} spike_th={:.1} gsr_raw={:.1} tone={} fast={} \
             phasic={} gsr_smooth={} s_bpm={:.1} s_temp={:.1} s_piezo={:.1} s_gsr={:.1} score={:.1}",
            self.t_ms,
            self.phase,
            self.contact,
            self.pulse_raw,
            self.bpm,
            self.bpm_avg,
            self.bpm_baseline,
            opt(self.temp_c),
            self.temp_baseline,
            self.piezo_raw,
            self.piezo_slow_baseline,
            self.piezo_envelope,
            self.piezo_window_max,
            self.piezo_spikes,
            self.piezo_level,
            self.piezo_baseline_envelope,
            self.piezo_spike_threshold,
            self.gsr_raw,
            opt(self.gsr_tone_baseline),
            opt(self.gsr_phasic_tracker),
            opt(self.gsr_phasic),
            opt(self.gsr_smoothed),
            self.score.bpm_term,
            self.score.temp_term,
            self.score.piezo_term,
            self.score.gsr_term,
            self.score.total,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_rendering() {
        assert_eq!(StatusLine::AwaitingContact.to_string(), "Place finger on sensor");
        assert_eq!(
            StatusLine::BaselineCalibrating {
                collected: 12,
                total: 30
            }
            .to_string(),
            "Baseline calibrating 12/30"
        );
        assert_eq!(
            StatusLine::GsrCalibrating { percent: 45 }.to_string(),
            "GSR calibrating 45%"
        );
        assert_eq!(
            StatusLine::Active {
                bpm: 72.4,
                piezo: PiezoLevel::Medium,
                score: 38.6
            }
            .to_string(),
            "BPM 72 | piezo MEDIUM | stress 39"
        );
    }

    #[test]
    fn test_status_json_is_tagged() {
        let json = serde_json::to_string(&StatusLine::GsrCalibrating { percent: 10 }).unwrap();
        assert_eq!(json, r#"{"status":"gsr_calibrating","percent":10}"#);
    }
}
