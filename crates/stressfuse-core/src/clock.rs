//! Millisecond sample clock and cooperative scheduling gates.
//!
//! Time is a free-running `u32` millisecond counter that wraps after ~49.7
//! days, the same shape as a microcontroller tick counter. Every elapsed-time
//! computation goes through [`elapsed_ms`], which uses wrapping subtraction so
//! a rollover never produces a huge or negative delta.

use std::cell::Cell;
use std::time::Instant;

/// Milliseconds since an arbitrary epoch. Wraps on overflow.
pub type Millis = u32;

/// Wraparound-safe elapsed time between two clock readings.
///
/// Correct as long as the true interval is shorter than one wrap period.
#[inline]
pub fn elapsed_ms(now: Millis, since: Millis) -> Millis {
    now.wrapping_sub(since)
}

/// Monotonic millisecond time source.
pub trait Clock {
    fn now_ms(&self) -> Millis;
}

/// Wall clock backed by [`Instant`], truncated to a wrapping `u32`.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> Millis {
        // Truncation is the wrap.
        self.origin.elapsed().as_millis() as Millis
    }
}

/// Explicitly advanced clock for simulation and tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<Millis>,
}

impl ManualClock {
    pub fn new(start: Millis) -> Self {
        Self {
            now: Cell::new(start),
        }
    }

    /// Advance by `dt` milliseconds, wrapping like the hardware counter.
    pub fn advance(&self, dt: Millis) -> Millis {
        let next = self.now.get().wrapping_add(dt);
        self.now.set(next);
        next
    }

    pub fn set(&self, now: Millis) {
        self.now.set(now);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> Millis {
        self.now.get()
    }
}

/// "Has my period elapsed?" gate owned by a single component.
///
/// The first call to [`Periodic::due`] always fires. After that it fires once
/// `period_ms` has elapsed since the last firing and re-arms at `now`.
#[derive(Debug, Clone, Copy)]
pub struct Periodic {
    period_ms: Millis,
    last_ms: Option<Millis>,
}

impl Periodic {
    pub fn new(period_ms: Millis) -> Self {
        Self {
            period_ms,
            last_ms: None,
        }
    }

    pub fn period_ms(&self) -> Millis {
        self.period_ms
    }

    pub fn due(&mut self, now: Millis) -> bool {
        match self.last_ms {
            Some(last) if elapsed_ms(now, last) < self.period_ms => false,
            _ => {
                self.last_ms = Some(now);
                true
            }
        }
    }

    /// Re-arm so the next firing is one full period after `now`.
    pub fn restart(&mut self, now: Millis) {
        self.last_ms = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elapsed_across_wrap() {
        let before = u32::MAX - 4;
        let after = before.wrapping_add(10);
        assert_eq!(after, 5);
        assert_eq!(elapsed_ms(after, before), 10);
    }

    #[test]
    fn test_periodic_first_call_fires() {
        let mut gate = Periodic::new(100);
        assert!(gate.due(0));
        assert!(!gate.due(50));
        assert!(!gate.due(99));
        assert!(gate.due(100));
        assert!(!gate.due(150));
        assert!(gate.due(230));
    }

    #[test]
    fn test_periodic_survives_wrap() {
        let mut gate = Periodic::new(10);
        assert!(gate.due(u32::MAX - 3));
        assert!(!gate.due(2));
        assert!(gate.due(6));
    }

    #[test]
    fn test_restart_defers_next_firing() {
        let mut gate = Periodic::new(1_000);
        gate.restart(500);
        assert!(!gate.due(1_000));
        assert!(gate.due(1_500));
    }

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::new(u32::MAX);
        assert_eq!(clock.advance(2), 1);
        assert_eq!(clock.now_ms(), 1);
        clock.set(42);
        assert_eq!(clock.now_ms(), 42);
    }
}
