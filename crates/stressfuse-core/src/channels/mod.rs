//! Per-sensor signal conditioning. Each channel owns its state and decides
//! on its own period whether to act.

pub mod gsr;
pub mod piezo;
pub mod pulse;
pub mod temperature;

pub use gsr::{GsrChannel, GsrFilter, GsrMode};
pub use piezo::{classify, PiezoChannel, PiezoLevel, PiezoState, WindowSummary};
pub use pulse::{PulseChannel, PulseState, BPM_HISTORY};
pub use temperature::TemperatureChannel;
