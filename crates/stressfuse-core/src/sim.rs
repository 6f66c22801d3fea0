//! Synthetic sensor rig.
//!
//! Produces deterministic (seeded) pulse, temperature, piezo and GSR streams
//! driven by a shared [`ManualClock`], so the full monitor can run without
//! hardware. A [`SimProfile`] shapes the physiology; [`SimScenario`] offers
//! ready-made profiles.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cell::RefCell;
use std::f32::consts::PI;
use std::rc::Rc;
use std::str::FromStr;

use crate::clock::{Clock, ManualClock, Millis};
use crate::sensors::{AnalogInput, PulseSensor, SensorError, SensorRig, Thermometer};

/// Time a simulated thermometer conversion takes.
const CONVERSION_MS: Millis = 750;
/// Stress ramps from 0 to 1 over this long after onset.
const STRESS_RAMP_MS: f32 = 20_000.0;
const MOVEMENT_FROM_MS: Millis = 45_000;
const ADC_MAX: u16 = 1023;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimScenario {
    /// Resting user, nothing happens
    Calm,
    /// Heart rate, cooling, tremor and GSR rise after onset
    Aroused,
    /// Calm physiology with periodic gross movement
    Restless,
}

impl FromStr for SimScenario {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "calm" => Ok(SimScenario::Calm),
            "aroused" => Ok(SimScenario::Aroused),
            "restless" => Ok(SimScenario::Restless),
            other => Err(format!("unknown scenario '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimProfile {
    pub seed: u64,
    pub contact_after_ms: Millis,
    /// `Millis::MAX` disables the stress response
    pub stress_onset_ms: Millis,
    pub resting_bpm: f32,
    pub stressed_bpm: f32,
    pub skin_temp_c: f32,
    pub stressed_temp_drop_c: f32,
    pub piezo_rest: u16,
    pub piezo_noise: f32,
    pub tremor_amplitude: f32,
    pub movement_bursts: bool,
    pub gsr_rest: f32,
    pub gsr_noise: f32,
    pub gsr_arousal: f32,
    pub pulse_fails_probe: bool,
    pub thermometer_fails_probe: bool,
    /// Electrodes detached: GSR reads sit at the top rail
    pub gsr_open_circuit: bool,
}

impl Default for SimProfile {
    fn default() -> Self {
        SimScenario::Calm.profile(7)
    }
}

impl SimScenario {
    pub fn profile(self, seed: u64) -> SimProfile {
        let calm = SimProfile {
            seed,
            contact_after_ms: 3_000,
            stress_onset_ms: Millis::MAX,
            resting_bpm: 68.0,
            stressed_bpm: 68.0,
            skin_temp_c: 33.5,
            stressed_temp_drop_c: 0.0,
            piezo_rest: 512,
            piezo_noise: 1.5,
            tremor_amplitude: 0.0,
            movement_bursts: false,
            gsr_rest: 380.0,
            gsr_noise: 4.0,
            gsr_arousal: 0.0,
            pulse_fails_probe: false,
            thermometer_fails_probe: false,
            gsr_open_circuit: false,
        };
        match self {
            SimScenario::Calm => calm,
            SimScenario::Aroused => SimProfile {
                stress_onset_ms: 110_000,
                stressed_bpm: 90.0,
                stressed_temp_drop_c: 0.8,
                tremor_amplitude: 30.0,
                gsr_arousal: 45.0,
                ..calm
            },
            SimScenario::Restless => SimProfile {
                movement_bursts: true,
                ..calm
            },
        }
    }
}

struct World {
    clock: Rc<ManualClock>,
    profile: SimProfile,
    rng: RefCell<StdRng>,
}

impl World {
    fn now(&self) -> Millis {
        self.clock.now_ms()
    }

    fn contact(&self) -> bool {
        self.now() >= self.profile.contact_after_ms
    }

    /// 0 before onset, ramping to 1.
    fn stress(&self) -> f32 {
        let now = self.now();
        if now < self.profile.stress_onset_ms {
            return 0.0;
        }
        ((now - self.profile.stress_onset_ms) as f32 / STRESS_RAMP_MS).min(1.0)
    }

    fn noise(&self, amplitude: f32) -> f32 {
        if amplitude <= 0.0 {
            return 0.0;
        }
        self.rng.borrow_mut().gen_range(-amplitude..amplitude)
    }

    fn bpm(&self) -> f32 {
        let p = &self.profile;
        p.resting_bpm + (p.stressed_bpm - p.resting_bpm) * self.stress()
    }

    /// Inside a 3 s movement burst every 12 s, once the resting baseline
    /// had time to settle.
    fn in_movement_burst(&self) -> bool {
        self.profile.movement_bursts
            && self.now() >= MOVEMENT_FROM_MS
            && (self.now() % 12_000) >= 6_000
            && (self.now() % 12_000) < 9_000
    }
}

fn to_adc(value: f32) -> u16 {
    value.round().clamp(0.0, ADC_MAX as f32) as u16
}

struct SimPulse {
    world: Rc<World>,
    next_beat: Option<Millis>,
}

impl PulseSensor for SimPulse {
    fn probe(&mut self) -> Result<(), SensorError> {
        if self.world.profile.pulse_fails_probe {
            return Err(SensorError::Unavailable { sensor: "pulse" });
        }
        Ok(())
    }

    fn read_raw(&mut self) -> u16 {
        if self.world.contact() {
            to_adc(700.0 + self.world.noise(20.0))
        } else {
            to_adc(120.0 + self.world.noise(20.0))
        }
    }

    fn beat_detected(&mut self) -> bool {
        let now = self.world.now();
        if !self.world.contact() {
            self.next_beat = None;
            return false;
        }
        let interval = 60_000.0 / self.world.bpm();
        match self.next_beat {
            None => {
                self.next_beat = Some(now + interval as Millis);
                false
            }
            Some(due) if now >= due => {
                let jitter = self.world.noise(15.0);
                self.next_beat = Some(now + (interval + jitter) as Millis);
                true
            }
            Some(_) => false,
        }
    }
}

struct SimThermometer {
    world: Rc<World>,
    requested_at: Option<Millis>,
    completed: Option<f32>,
}

impl SimThermometer {
    fn current_c(&self) -> f32 {
        let p = &self.world.profile;
        p.skin_temp_c - p.stressed_temp_drop_c * self.world.stress() + self.world.noise(0.03)
    }
}

impl Thermometer for SimThermometer {
    fn probe(&mut self) -> Result<(), SensorError> {
        if self.world.profile.thermometer_fails_probe {
            return Err(SensorError::Unavailable {
                sensor: "thermometer",
            });
        }
        Ok(())
    }

    fn request_conversion(&mut self) {
        self.requested_at = Some(self.world.now());
    }

    fn last_celsius(&mut self) -> Option<f32> {
        if let Some(at) = self.requested_at {
            if self.world.now().wrapping_sub(at) >= CONVERSION_MS {
                self.completed = Some(self.current_c());
                self.requested_at = None;
            }
        }
        self.completed
    }
}

struct SimPiezo {
    world: Rc<World>,
}

impl AnalogInput for SimPiezo {
    fn read(&mut self) -> u16 {
        let w = &self.world;
        let p = &w.profile;
        let t = w.now() as f32 / 1_000.0;
        let mut v = p.piezo_rest as f32 + w.noise(p.piezo_noise);
        if w.contact() {
            v += p.tremor_amplitude * w.stress() * (2.0 * PI * 8.0 * t).sin();
        }
        if w.in_movement_burst() && w.now() % 100 < 10 {
            v += if (w.now() / 100) % 2 == 0 { 300.0 } else { -300.0 };
        }
        to_adc(v)
    }
}

struct SimGsr {
    world: Rc<World>,
}

impl AnalogInput for SimGsr {
    /// A reading pinned at either rail means no skin contact at the electrodes.
    fn probe(&mut self) -> Result<(), SensorError> {
        let raw = self.read();
        if raw == 0 || raw >= ADC_MAX {
            return Err(SensorError::Fault {
                sensor: "gsr",
                reason: format!("reading pinned at {}", raw),
            });
        }
        Ok(())
    }

    fn read(&mut self) -> u16 {
        let w = &self.world;
        let p = &w.profile;
        if p.gsr_open_circuit {
            return ADC_MAX;
        }
        let drift = 3.0 * (w.now() as f32 / 90_000.0).sin();
        to_adc(p.gsr_rest + drift + p.gsr_arousal * w.stress() + w.noise(p.gsr_noise))
    }
}

/// Builder for a simulated [`SensorRig`] bound to a manual clock.
pub struct SimulatedRig {
    world: Rc<World>,
}

impl SimulatedRig {
    pub fn new(profile: SimProfile, clock: Rc<ManualClock>) -> Self {
        let rng = StdRng::seed_from_u64(profile.seed);
        Self {
            world: Rc::new(World {
                clock,
                profile,
                rng: RefCell::new(rng),
            }),
        }
    }

    pub fn profile(&self) -> &SimProfile {
        &self.world.profile
    }

    pub fn into_sensor_rig(self) -> SensorRig {
        SensorRig::new(
            Box::new(SimPulse {
                world: Rc::clone(&self.world),
                next_beat: None,
            }),
            Box::new(SimThermometer {
                world: Rc::clone(&self.world),
                requested_at: None,
                completed: None,
            }),
            Box::new(SimPiezo {
                world: Rc::clone(&self.world),
            }),
            Box::new(SimGsr {
                world: Rc::clone(&self.world),
            }),
        )
    }
}
