//! Narrow interfaces to the transducer drivers.
//!
//! The drivers themselves (pulse IC registers and beat-edge primitive,
//! thermometer conversion control, ADC sampling) live outside this crate.
//! Each trait exposes only the scalar reads or commands the channels need.

use thiserror::Error;

/// Start-up failure of a collaborator. Never produced on the tick path.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SensorError {
    #[error("{sensor} sensor not responding")]
    Unavailable { sensor: &'static str },
    #[error("{sensor} sensor fault: {reason}")]
    Fault {
        sensor: &'static str,
        reason: String,
    },
}

/// Optical pulse sensor with an external beat-edge detector.
pub trait PulseSensor {
    fn probe(&mut self) -> Result<(), SensorError>;

    /// Latest raw intensity reading.
    fn read_raw(&mut self) -> u16;

    /// True exactly when the detector reports a new beat edge.
    fn beat_detected(&mut self) -> bool;
}

/// Digital thermometer in non-blocking conversion mode.
pub trait Thermometer {
    fn probe(&mut self) -> Result<(), SensorError>;

    /// Start a conversion and return immediately.
    fn request_conversion(&mut self);

    /// Last completed conversion, `None` if the bus read failed.
    /// May be stale or in flight; callers tolerate that.
    fn last_celsius(&mut self) -> Option<f32>;
}

/// Single-shot analog read (piezo, GSR).
pub trait AnalogInput {
    fn probe(&mut self) -> Result<(), SensorError> {
        Ok(())
    }

    fn read(&mut self) -> u16;
}

/// The four collaborators the monitor drives.
pub struct SensorRig {
    pub pulse: Box<dyn PulseSensor>,
    pub thermometer: Box<dyn Thermometer>,
    pub piezo: Box<dyn AnalogInput>,
    pub gsr: Box<dyn AnalogInput>,
}

impl SensorRig {
    pub fn new(
        pulse: Box<dyn PulseSensor>,
        thermometer: Box<dyn Thermometer>,
        piezo: Box<dyn AnalogInput>,
        gsr: Box<dyn AnalogInput>,
    ) -> Self {
        Self {
            pulse,
            thermometer,
            piezo,
            gsr,
        }
    }

    /// Probe every collaborator, stopping at the first failure.
    pub fn probe_all(&mut self) -> Result<(), SensorError> {
        self.pulse.probe()?;
        self.thermometer.probe()?;
        self.piezo.probe()?;
        self.gsr.probe()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(u16);

    impl AnalogInput for Fixed {
        fn read(&mut self) -> u16 {
            self.0
        }
    }

    struct DeadPulse;

    impl PulseSensor for DeadPulse {
        fn probe(&mut self) -> Result<(), SensorError> {
            Err(SensorError::Unavailable { sensor: "pulse" })
        }
        fn read_raw(&mut self) -> u16 {
            0
        }
        fn beat_detected(&mut self) -> bool {
            false
        }
    }

    struct NoThermo;

    impl Thermometer for NoThermo {
        fn probe(&mut self) -> Result<(), SensorError> {
            Ok(())
        }
        fn request_conversion(&mut self) {}
        fn last_celsius(&mut self) -> Option<f32> {
            None
        }
    }

    #[test]
    fn test_probe_all_reports_first_failure() {
        let mut rig = SensorRig::new(
            Box::new(DeadPulse),
            Box::new(NoThermo),
            Box::new(Fixed(512)),
            Box::new(Fixed(300)),
        );
        let err = rig.probe_all().unwrap_err();
        assert_eq!(err, SensorError::Unavailable { sensor: "pulse" });
        assert_eq!(err.to_string(), "pulse sensor not responding");
    }
}
