use serde::{Deserialize, Serialize};
use std::fmt;

/// Monitor lifecycle. The only place phase changes is [`MonitorPhase::advance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorPhase {
    #[default]
    AwaitingContact,
    BaselineCalibrating,
    GsrCalibrating,
    Active,
}

/// Facts the transition function reads on each tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct PhaseSignals {
    pub contact: bool,
    pub baseline_done: bool,
    pub gsr_calibrated: bool,
}

impl MonitorPhase {
    pub fn advance(self, signals: PhaseSignals) -> MonitorPhase {
        use MonitorPhase::*;
        match self {
            AwaitingContact if signals.baseline_done => GsrCalibrating,
            AwaitingContact if signals.contact => BaselineCalibrating,
            AwaitingContact => AwaitingContact,
            BaselineCalibrating if signals.baseline_done => GsrCalibrating,
            BaselineCalibrating if !signals.contact => AwaitingContact,
            BaselineCalibrating => BaselineCalibrating,
            GsrCalibrating if signals.gsr_calibrated => Active,
            GsrCalibrating => GsrCalibrating,
            Active => Active,
        }
    }

    /// Score is computed once the baseline is frozen.
    pub fn is_scoring(self) -> bool {
        matches!(self, MonitorPhase::GsrCalibrating | MonitorPhase::Active)
    }
}

impl fmt::Display for MonitorPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MonitorPhase::AwaitingContact => "awaiting_contact",
            MonitorPhase::BaselineCalibrating => "baseline_calibrating",
            MonitorPhase::GsrCalibrating => "gsr_calibrating",
            MonitorPhase::Active => "active",
        };
        f.write_str(s)
    }
}
