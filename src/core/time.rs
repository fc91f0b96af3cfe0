//! Time representation for the playback pipeline.
//!
//! Container-level positions (durations, seek targets) are nanoseconds (i64).
//! Per-stream timestamps stay in stream-local ticks and are converted through
//! the stream's [`TimeBase`].

use std::fmt;

/// Time in nanoseconds since the start of the source
pub type Time = i64;

/// Time constants for conversions
pub mod constants {
    use super::Time;

    pub const NANOS_PER_SECOND: Time = 1_000_000_000;
    pub const NANOS_PER_MILLI: Time = 1_000_000;
    pub const NANOS_PER_MICRO: Time = 1_000;
}

/// Convert nanoseconds (i64) to seconds (f64)
#[inline]
pub fn to_seconds(nanos: Time) -> f64 {
    nanos as f64 / constants::NANOS_PER_SECOND as f64
}

/// Convert milliseconds to nanoseconds
#[inline]
pub fn from_millis(millis: i64) -> Time {
    millis.saturating_mul(constants::NANOS_PER_MILLI)
}

/// Convert nanoseconds to milliseconds
#[inline]
pub fn to_millis(nanos: Time) -> i64 {
    nanos / constants::NANOS_PER_MILLI
}

/// Convert microseconds to nanoseconds
#[inline]
pub fn from_micros(micros: i64) -> Time {
    micros.saturating_mul(constants::NANOS_PER_MICRO)
}

/// Convert nanoseconds to microseconds
#[inline]
pub fn to_micros(nanos: Time) -> i64 {
    nanos / constants::NANOS_PER_MICRO
}

/// Rational time base of a stream: one tick lasts `num / den` seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBase {
    pub num: i32,
    pub den: i32,
}

impl TimeBase {
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /// Millisecond ticks
    pub const MILLIS: TimeBase = TimeBase::new(1, 1000);

    /// Convert stream ticks to nanoseconds.
    /// Uses i128 so 90 kHz timestamps of multi-hour files do not overflow.
    pub fn ticks_to_nanos(&self, ticks: i64) -> Time {
        if self.den == 0 {
            return 0;
        }
        let result = (ticks as i128 * self.num as i128 * constants::NANOS_PER_SECOND as i128)
            / self.den as i128;
        result as Time
    }

    /// Convert stream ticks to seconds
    pub fn ticks_to_seconds(&self, ticks: i64) -> f64 {
        if self.den == 0 {
            return 0.0;
        }
        ticks as f64 * self.num as f64 / self.den as f64
    }

    /// Reciprocal as f64 (e.g. a frame rate expressed as a rational)
    pub fn as_f64(&self) -> f64 {
        if self.den == 0 {
            return 0.0;
        }
        self.num as f64 / self.den as f64
    }
}

impl fmt::Display for TimeBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// Format time as HH:MM:SS.mmm
pub fn format_time(nanos: Time) -> String {
    let total_seconds = to_seconds(nanos);
    let hours = (total_seconds / 3600.0).floor() as i64;
    let minutes = ((total_seconds % 3600.0) / 60.0).floor() as i64;
    let seconds = (total_seconds % 60.0).floor() as i64;
    let millis = to_millis(nanos) % 1000;

    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, seconds, millis)
}
