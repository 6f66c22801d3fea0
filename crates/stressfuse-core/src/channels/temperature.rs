//! Skin temperature channel.
//!
//! Conversions are requested on a fixed period and never awaited; the last
//! completed value is read back every tick. A read may therefore be stale or
//! belong to a conversion still in flight, which is acceptable for a signal
//! this slow.

use crate::clock::{Millis, Periodic};
use crate::config::TemperatureConfig;
use crate::sensors::Thermometer;

/// Value some thermometers report when the probe is disconnected.
const DISCONNECTED_C: f32 = -127.0;

pub struct TemperatureChannel {
    config: TemperatureConfig,
    gate: Periodic,
    celsius: Option<f32>,
    stale_reads: u32,
}

impl TemperatureChannel {
    pub fn new(config: TemperatureConfig) -> Self {
        Self {
            gate: Periodic::new(config.conversion_period_ms),
            config,
            celsius: None,
            stale_reads: 0,
        }
    }

    /// Returns true when a new conversion was requested this tick.
    pub fn tick(&mut self, now: Millis, sensor: &mut dyn Thermometer) -> bool {
        let requested = self.gate.due(now);
        if requested {
            sensor.request_conversion();
        }

        match sensor.last_celsius() {
            Some(c) if self.is_plausible(c) => {
                self.celsius = Some(c);
                self.stale_reads = 0;
            }
            other => {
                self.stale_reads = self.stale_reads.saturating_add(1);
                if requested {
                    log::warn!(
                        "Invalid temperature read {:?}, keeping {:?}",
                        other,
                        self.celsius
                    );
                }
            }
        }
        requested
    }

    fn is_plausible(&self, c: f32) -> bool {
        c.is_finite()
            && c != DISCONNECTED_C
            && c >= self.config.min_valid_c
            && c <= self.config.max_valid_c
    }

    /// Last valid reading, `None` until the first one arrives.
    pub fn celsius(&self) -> Option<f32> {
        self.celsius
    }

    /// Consecutive ticks that reused a stale value.
    pub fn stale_reads(&self) -> u32 {
        self.stale_reads
    }
}
