//! Render step, run on its own thread while a source is playing.
//!
//! Pops decoded video frames, holds each one for the delay the
//! [`SyncEngine`] computes, then hands it to the video sink. It also notices
//! end of playback: once the source is finished and every enabled stream is
//! drained, the player moves from `Playing` to `Ended`.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam::atomic::AtomicCell;
use tracing::{debug, info, trace};

use crate::audio::feeder::AudioControls;
use crate::media::backend::VideoSink;
use crate::media::types::DecodedFrame;
use crate::pipeline::clock::WallClock;
use crate::pipeline::shared::{PipelineShared, StreamSlot};
use crate::playback::state::PlayerState;
use crate::playback::sync::{SyncEngine, SyncReference};

pub struct Presenter {
    video: Option<Arc<StreamSlot>>,
    audio: Option<Arc<StreamSlot>>,
    audio_controls: Arc<AudioControls>,
    sink: Option<Box<dyn VideoSink>>,
    shared: Arc<PipelineShared>,
    sync: SyncEngine,
    speed: Arc<AtomicCell<f32>>,
    wall: WallClock,
    poll: Duration,
    presented: u64,
}

impl Presenter {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        video: Option<Arc<StreamSlot>>,
        audio: Option<Arc<StreamSlot>>,
        audio_controls: Arc<AudioControls>,
        sink: Option<Box<dyn VideoSink>>,
        shared: Arc<PipelineShared>,
        frame_rate: f64,
        speed: Arc<AtomicCell<f32>>,
        poll: Duration,
    ) -> Self {
        let sync = SyncEngine::new(frame_rate, speed.load() as f64);
        Self {
            video,
            audio,
            audio_controls,
            sink,
            shared,
            sync,
            speed,
            wall: WallClock::new(),
            poll,
            presented: 0,
        }
    }

    /// Run until shutdown or end of playback; hands the sink back.
    pub fn run(mut self) -> Option<Box<dyn VideoSink>> {
        debug!(frame_rate = self.sync.frame_rate(), "render loop started");
        self.wall.restart();

        while !self.shared.is_over() {
            if self.shared.is_paused() {
                thread::sleep(self.poll);
                self.wall.restart();
                continue;
            }

            if self.is_drained() {
                if self
                    .shared
                    .status
                    .transition(PlayerState::Playing, PlayerState::Ended)
                {
                    info!(frames = self.presented, "playback ended");
                }
                break;
            }

            let Some(video) = self.video.clone() else {
                // Audio only: the device pulls on its own, just watch for the end
                thread::sleep(self.poll);
                continue;
            };
            let Some(frame) = video.frames.pop_timeout(self.poll) else {
                continue;
            };

            let delay = self.delay_for(&frame, &video);
            if delay > 0.0 {
                self.hold(Duration::from_secs_f64(delay));
            }
            if self.shared.is_over() {
                break;
            }
            if let Some(sink) = self.sink.as_mut() {
                sink.present(&frame);
            }
            self.wall.restart();
            self.presented += 1;
            trace!(pts = ?frame.pts, delay, "presented frame");
        }

        debug!(frames = self.presented, "render loop exited");
        self.sink
    }

    fn delay_for(&mut self, frame: &DecodedFrame, video: &StreamSlot) -> f64 {
        self.sync.set_speed(self.speed.load() as f64);

        let reference = match &self.audio {
            Some(audio) => {
                let video_clock = frame
                    .pts
                    .map(|pts| video.info.time_base.ticks_to_seconds(pts))
                    .or_else(|| video.clock.seconds());
                match (video_clock, audio.clock.seconds()) {
                    (Some(video_clock), Some(audio_clock)) => SyncReference::Audio {
                        video_clock,
                        audio_clock,
                    },
                    // No usable clock yet (start or just after a seek)
                    _ => return self.sync.base_delay(),
                }
            }
            None => SyncReference::WallClock {
                elapsed: self.wall.elapse(),
            },
        };
        self.sync.delay(reference)
    }

    /// Sleep in short slices so close() is not held up by a long frame
    fn hold(&self, delay: Duration) {
        let deadline = Instant::now() + delay;
        loop {
            let now = Instant::now();
            if now >= deadline || self.shared.is_over() {
                return;
            }
            thread::sleep((deadline - now).min(self.poll));
        }
    }

    fn is_drained(&self) -> bool {
        if !self.shared.is_finished() {
            return false;
        }
        let video_drained = self.video.as_ref().map_or(true, |slot| slot.is_drained());
        let audio_drained = self.audio.as_ref().map_or(true, |slot| {
            slot.is_drained() && self.audio_controls.staged_bytes() == 0
        });
        video_drained && audio_drained
    }
}
