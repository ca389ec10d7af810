// Author: Lukas Bower
// Purpose: RFC 6206 Trickle timer driven by event-loop ticks.

//! Adaptive Trickle timer. The interval starts at `imin`, doubles on
//! every quiet expiry up to `imax`, and snaps back to `imin` on an
//! inconsistency. The redundancy constant is infinite: the timer fires
//! once per interval, at a random point in the second half.

use crate::platform::Entropy;

/// Tick-driven Trickle timer. All times are milliseconds on the
/// caller's monotonic clock.
#[derive(Debug, Default)]
pub struct TrickleTimer {
    imin_ms: u32,
    imax_ms: u32,
    interval_ms: u32,
    fire_at: u64,
    interval_end: u64,
    fired: bool,
    running: bool,
}

impl TrickleTimer {
    /// Create a stopped timer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the timer is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Start with the given interval bounds. The first interval is
    /// `imin` for a fast initial transmission.
    pub fn start(&mut self, now: u64, imin_ms: u32, imax_ms: u32, entropy: &mut dyn Entropy) {
        self.imin_ms = imin_ms.max(1);
        self.imax_ms = imax_ms.max(self.imin_ms);
        self.interval_ms = self.imin_ms;
        self.running = true;
        self.begin_interval(now, entropy);
    }

    /// Stop the timer.
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Report an inconsistency: reset the interval to `imin` and start
    /// a fresh interval. No effect while already at `imin`.
    pub fn indicate_inconsistent(&mut self, now: u64, entropy: &mut dyn Entropy) {
        if !self.running || self.interval_ms == self.imin_ms {
            return;
        }

        self.interval_ms = self.imin_ms;
        self.begin_interval(now, entropy);
    }

    /// The next instant the caller should tick the timer, if running.
    #[must_use]
    pub fn next_event(&self) -> Option<u64> {
        if !self.running {
            return None;
        }
        Some(if self.fired { self.interval_end } else { self.fire_at })
    }

    /// Advance to `now`. Returns true when the transmission point of
    /// the current interval has been reached; expired intervals double
    /// up to `imax`.
    pub fn handle_tick(&mut self, now: u64, entropy: &mut dyn Entropy) -> bool {
        if !self.running {
            return false;
        }

        while now >= self.interval_end {
            self.interval_ms = self.interval_ms.saturating_mul(2).min(self.imax_ms);
            let interval_end = self.interval_end;
            self.begin_interval(interval_end, entropy);
        }

        if !self.fired && now >= self.fire_at {
            self.fired = true;
            return true;
        }

        false
    }

    fn begin_interval(&mut self, now: u64, entropy: &mut dyn Entropy) {
        let interval = u64::from(self.interval_ms);
        let half = interval / 2;
        let jitter = if interval > half {
            u64::from(entropy.rand_u32()) % (interval - half)
        } else {
            0
        };

        self.fire_at = now + half + jitter;
        self.interval_end = now + interval;
        self.fired = false;
    }
}
