//! # stressfuse-core
//!
//! Fuses pulse, skin temperature, piezo vibration and galvanic skin response
//! into a 0-100 stress score relative to a per-user baseline.
//!
//! - **channels**: per-sensor filters (rolling BPM, stale-tolerant
//!   temperature, piezo envelope classifier, dual-rate GSR)
//! - **calibration**: 30-tick resting baseline and 60 s GSR tonic baseline
//! - **score**: bounded aggregation of the channel terms
//! - **monitor**: the non-blocking tick that schedules everything
//!
//! ## Example
//!
//! ```ignore
//! use std::rc::Rc;
//! use stressfuse_core::{ManualClock, SimScenario, SimulatedRig, StressConfig, StressMonitor};
//!
//! let clock = Rc::new(ManualClock::new(0));
//! let rig = SimulatedRig::new(SimScenario::Calm.profile(1), Rc::clone(&clock)).into_sensor_rig();
//! let mut monitor = StressMonitor::start(StressConfig::default(), rig, 0)?;
//! loop {
//!     let report = monitor.tick(clock.advance(1));
//!     if let Some(status) = report.status {
//!         println!("{}", status);
//!     }
//! }
//! ```

pub mod calibration;
pub mod channels;
pub mod clock;
pub mod config;
pub mod monitor;
pub mod phase;
pub mod score;
pub mod sensors;
pub mod sim;
pub mod status;

#[cfg(test)]
mod tests_proptest;

pub use calibration::{Baseline, BaselineCalibrator, BaselineSample, GsrCalibrator};
pub use channels::{
    GsrChannel, GsrFilter, PiezoChannel, PiezoLevel, PulseChannel, TemperatureChannel,
    WindowSummary,
};
pub use clock::{elapsed_ms, Clock, ManualClock, Millis, Periodic, SystemClock};
pub use config::{ConfigError, StressConfig};
pub use monitor::{MonitorError, StressMonitor, TickReport};
pub use phase::{MonitorPhase, PhaseSignals};
pub use score::{piezo_contribution, ScoreAggregator, ScoreBreakdown, ScoreInputs};
pub use sensors::{AnalogInput, PulseSensor, SensorError, SensorRig, Thermometer};
pub use sim::{SimProfile, SimScenario, SimulatedRig};
pub use status::{Diagnostics, StatusLine};
