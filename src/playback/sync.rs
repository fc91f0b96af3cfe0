//! Audio/video synchronization.
//!
//! Audio is the master clock when an audio stream is active: the delay before
//! each video frame is stretched or shrunk by how far the video clock has
//! drifted from the audio clock. Without audio, video free-runs at the source
//! frame rate against the wall clock. All values are seconds.

/// Lower bound of the in-sync window
pub const SYNC_THRESHOLD_MIN: f64 = 0.04;
/// Upper bound of the in-sync window
pub const SYNC_THRESHOLD_MAX: f64 = 0.1;
/// Drift beyond this is treated as a discontinuity and ignored
pub const NOSYNC_THRESHOLD: f64 = 10.0;
/// Frames longer than this absorb drift directly instead of doubling
pub const FRAME_DUP_THRESHOLD: f64 = 0.1;

/// What the next frame is timed against
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SyncReference {
    /// Video only: seconds of wall time since the previous frame was shown
    WallClock { elapsed: f64 },
    /// Audio master: both clocks in seconds
    Audio { video_clock: f64, audio_clock: f64 },
}

/// Computes the hold time before presenting the next video frame
#[derive(Debug, Clone, Copy)]
pub struct SyncEngine {
    frame_rate: f64,
    speed: f64,
}

impl SyncEngine {
    pub fn new(frame_rate: f64, speed: f64) -> Self {
        Self { frame_rate, speed }
    }

    pub fn set_speed(&mut self, speed: f64) {
        self.speed = speed;
    }

    pub fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    /// Nominal time one frame stays on screen at the current speed
    pub fn base_delay(&self) -> f64 {
        let rate = self.frame_rate * self.speed;
        if rate > 0.0 {
            1.0 / rate
        } else {
            0.0
        }
    }

    pub fn delay(&self, reference: SyncReference) -> f64 {
        compute_delay(self.base_delay(), reference)
    }
}

/// Width of the in-sync window for a given frame duration
pub fn sync_threshold(base_delay: f64) -> f64 {
    base_delay.clamp(SYNC_THRESHOLD_MIN, SYNC_THRESHOLD_MAX)
}

/// Delay policy, separated from [`SyncEngine`] so the thresholds can be
/// checked against exact base delays.
pub fn compute_delay(base_delay: f64, reference: SyncReference) -> f64 {
    match reference {
        SyncReference::WallClock { elapsed } => (base_delay - elapsed).max(0.0),
        SyncReference::Audio {
            video_clock,
            audio_clock,
        } => {
            let diff = video_clock - audio_clock;
            if diff.abs() > NOSYNC_THRESHOLD {
                return base_delay;
            }

            let threshold = sync_threshold(base_delay);
            if diff <= -threshold {
                // Video behind: shorten the hold to catch up
                (base_delay + diff).max(0.0)
            } else if diff >= threshold {
                // Video ahead: hold longer
                if base_delay > FRAME_DUP_THRESHOLD {
                    base_delay + diff
                } else {
                    2.0 * base_delay
                }
            } else {
                base_delay
            }
        }
    }
}
