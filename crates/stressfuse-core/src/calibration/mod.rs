pub mod baseline;
pub mod gsr;

pub use baseline::{Baseline, BaselineCalibrator, BaselineSample};
pub use gsr::GsrCalibrator;
