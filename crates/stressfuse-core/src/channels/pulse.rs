//! Pulse channel: beat edges to a rolling BPM average.

use crate::clock::{elapsed_ms, Millis};
use crate::config::PulseConfig;

/// Number of accepted BPM values averaged.
pub const BPM_HISTORY: usize = 5;

#[derive(Debug, Clone, Default)]
pub struct PulseState {
    pub last_beat_ms: Option<Millis>,
    /// Last accepted instantaneous BPM
    pub current_bpm: f32,
    pub history: [f32; BPM_HISTORY],
    pub filled: usize,
    next: usize,
    pub last_raw: u16,
    pub contact: bool,
}

pub struct PulseChannel {
    config: PulseConfig,
    state: PulseState,
}

impl PulseChannel {
    pub fn new(config: PulseConfig) -> Self {
        Self {
            config,
            state: PulseState::default(),
        }
    }

    /// Feed one raw reading and the detector's edge flag.
    ///
    /// Runs every loop iteration. Returns true when a BPM value was accepted.
    /// Without contact the beat flag is ignored entirely.
    pub fn tick(&mut self, now: Millis, raw: u16, beat: bool) -> bool {
        self.state.last_raw = raw;
        self.state.contact = raw > self.config.contact_threshold;
        if !self.state.contact || !beat {
            return false;
        }

        let previous = self.state.last_beat_ms.replace(now);
        let Some(last) = previous else {
            // First edge only arms the interval timer.
            return false;
        };

        let delta = elapsed_ms(now, last);
        if delta == 0 {
            return false;
        }

        let bpm = 60_000.0 / delta as f32;
        if bpm < self.config.min_bpm || bpm > self.config.max_bpm {
            log::debug!("Discarding implausible BPM {:.1} (delta={}ms)", bpm, delta);
            return false;
        }

        self.accept(bpm);
        true
    }

    fn accept(&mut self, bpm: f32) {
        let s = &mut self.state;
        s.current_bpm = bpm;
        s.history[s.next] = bpm;
        s.next = (s.next + 1) % BPM_HISTORY;
        s.filled = (s.filled + 1).min(BPM_HISTORY);
        log::trace!("Accepted BPM {:.1}, avg {:.1}", bpm, self.average_bpm());
    }

    /// Mean of the filled slots, or the last accepted BPM (0 before any).
    pub fn average_bpm(&self) -> f32 {
        let s = &self.state;
        if s.filled == 0 {
            return s.current_bpm;
        }
        s.history[..s.filled].iter().sum::<f32>() / s.filled as f32
    }

    pub fn has_contact(&self) -> bool {
        self.state.contact
    }

    pub fn state(&self) -> &PulseState {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn channel() -> PulseChannel {
        PulseChannel::new(PulseConfig::default())
    }

    const TOUCH: u16 = 800;

    #[test]
    fn test_rolling_average_of_full_buffer() {
        let mut ch = channel();
        for bpm in [60.0, 62.0, 58.0, 64.0, 61.0] {
            ch.accept(bpm);
        }
        assert_relative_eq!(ch.average_bpm(), 61.0);
    }

    #[test]
    fn test_ring_overwrites_oldest() {
        let mut ch = channel();
        for bpm in [100.0, 60.0, 60.0, 60.0, 60.0, 60.0] {
            ch.accept(bpm);
        }
        assert_eq!(ch.state().filled, BPM_HISTORY);
        assert_relative_eq!(ch.average_bpm(), 60.0);
    }

    #[test]
    fn test_average_before_any_beat_is_zero() {
        assert_eq!(channel().average_bpm(), 0.0);
    }

    #[test]
    fn test_beats_convert_interval_to_bpm() {
        let mut ch = channel();
        assert!(!ch.tick(1_000, TOUCH, true));
        assert!(ch.tick(2_000, TOUCH, true));
        assert_relative_eq!(ch.state().current_bpm, 60.0);
        assert!(ch.tick(2_750, TOUCH, true));
        assert_relative_eq!(ch.average_bpm(), 70.0);
    }

    #[test]
    fn test_implausible_intervals_leave_buffer_unchanged() {
        let mut ch = channel();
        ch.tick(0, TOUCH, true);
        ch.tick(1_000, TOUCH, true);
        let before = ch.state().history;
        let filled = ch.state().filled;

        // 300 BPM
        assert!(!ch.tick(1_200, TOUCH, true));
        // 20 BPM
        assert!(!ch.tick(4_200, TOUCH, true));
        // zero interval
        assert!(!ch.tick(4_200, TOUCH, true));

        assert_eq!(ch.state().history, before);
        assert_eq!(ch.state().filled, filled);
    }

    #[test]
    fn test_no_contact_ignores_beats() {
        let mut ch = channel();
        ch.tick(0, 100, true);
        ch.tick(1_000, 100, true);
        assert!(!ch.has_contact());
        assert_eq!(ch.state().last_beat_ms, None);
        assert_eq!(ch.state().filled, 0);
    }

    #[test]
    fn test_interval_across_clock_wrap() {
        let mut ch = channel();
        let start = u32::MAX - 199;
        ch.tick(start, TOUCH, true);
        assert!(ch.tick(start.wrapping_add(1_000), TOUCH, true));
        assert_relative_eq!(ch.state().current_bpm, 60.0);
    }
}
