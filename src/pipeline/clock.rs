//! Stream clocks.
//!
//! [`PresentationClock`] holds the PTS of the latest decoded unit of one
//! stream. It has a single writer (the stream's decode loop) and any number
//! of readers, so two atomics are enough: the timestamp is stored before the
//! valid flag is raised.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Instant;

use crate::core::time::{Time, TimeBase};

#[derive(Debug)]
pub struct PresentationClock {
    pts: AtomicI64,
    valid: AtomicBool,
    time_base: TimeBase,
}

impl PresentationClock {
    pub fn new(time_base: TimeBase) -> Self {
        Self {
            pts: AtomicI64::new(0),
            valid: AtomicBool::new(false),
            time_base,
        }
    }

    pub fn set(&self, pts: i64) {
        self.pts.store(pts, Ordering::Relaxed);
        self.valid.store(true, Ordering::Release);
    }

    /// Latest PTS in stream ticks, `None` until the first frame (or after reset)
    pub fn current(&self) -> Option<i64> {
        if self.valid.load(Ordering::Acquire) {
            Some(self.pts.load(Ordering::Relaxed))
        } else {
            None
        }
    }

    pub fn reset(&self) {
        self.valid.store(false, Ordering::Release);
        self.pts.store(0, Ordering::Relaxed);
    }

    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    pub fn time_base(&self) -> TimeBase {
        self.time_base
    }

    pub fn seconds(&self) -> Option<f64> {
        self.current().map(|pts| self.time_base.ticks_to_seconds(pts))
    }

    pub fn nanos(&self) -> Option<Time> {
        self.current().map(|pts| self.time_base.ticks_to_nanos(pts))
    }
}

/// Wall-clock stopwatch: each call to [`elapse`](Self::elapse) returns the
/// time since the previous call.
#[derive(Debug)]
pub struct WallClock {
    last: Instant,
}

impl WallClock {
    pub fn new() -> Self {
        Self {
            last: Instant::now(),
        }
    }

    /// Seconds since the previous call (or construction), restarting the lap
    pub fn elapse(&mut self) -> f64 {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last).as_secs_f64();
        self.last = now;
        elapsed
    }

    pub fn restart(&mut self) {
        self.last = Instant::now();
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}
