//! Per-stream decoding thread.
//!
//! One generic loop serves both audio and video; the stream role only shows
//! up in the [`StreamSlot`] it is handed. The loop owns its decoder
//! exclusively.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::error::DecodeError;
use crate::media::backend::Decoder;
use crate::media::types::DecodedFrame;
use crate::pipeline::shared::{PipelineShared, StreamSlot};

/// Tunables for a decode loop
#[derive(Debug, Clone, Copy)]
pub struct DecodePolicy {
    /// Consecutive failed units before the player is marked broken;
    /// `None` never escalates
    pub max_consecutive_errors: Option<u32>,
    /// Backoff when the packet queue is empty
    pub poll: Duration,
}

impl Default for DecodePolicy {
    fn default() -> Self {
        Self {
            max_consecutive_errors: None,
            poll: Duration::from_millis(10),
        }
    }
}

pub struct DecodeLoop {
    slot: Arc<StreamSlot>,
    decoder: Box<dyn Decoder>,
    shared: Arc<PipelineShared>,
    policy: DecodePolicy,
    epoch: u64,
    consecutive_errors: u32,
}

impl DecodeLoop {
    pub fn new(
        slot: Arc<StreamSlot>,
        decoder: Box<dyn Decoder>,
        shared: Arc<PipelineShared>,
        policy: DecodePolicy,
    ) -> Self {
        let epoch = slot.packets.epoch();
        Self {
            slot,
            decoder,
            shared,
            policy,
            epoch,
            consecutive_errors: 0,
        }
    }

    pub fn run(mut self) {
        let kind = self.slot.kind().as_str();
        debug!(stream = kind, "decode loop started");

        while !self.shared.is_over() {
            let (unit, epoch) = match self.slot.packets.pop_with_epoch() {
                Some(popped) => popped,
                None => {
                    self.enter_epoch(self.slot.packets.epoch());
                    if self.shared.is_finished() && self.slot.packets.is_empty() {
                        self.drain();
                        break;
                    }
                    // Let a reader waiting on a full queue re-check before we back off
                    self.shared.notify_read();
                    match self.slot.packets.pop_timeout_with_epoch(self.policy.poll) {
                        Some(popped) => popped,
                        None => continue,
                    }
                }
            };
            self.shared.notify_read();

            if epoch < self.epoch {
                trace!(stream = kind, "discarding pre-seek unit");
                continue;
            }
            self.enter_epoch(epoch);

            match self.decoder.decode(&unit) {
                Ok(frames) => {
                    self.consecutive_errors = 0;
                    if !self.deliver(frames) {
                        break;
                    }
                }
                Err(e) => {
                    if self.on_error(e) {
                        break;
                    }
                }
            }
        }

        self.slot.mark_decoding_done();
        debug!(stream = kind, "decode loop exited");
    }

    /// Flush the decoder and restart the clock before the first unit of a
    /// newer epoch is decoded
    fn enter_epoch(&mut self, epoch: u64) {
        if epoch != self.epoch {
            debug!(stream = self.slot.kind().as_str(), epoch, "new epoch, flushing decoder");
            self.decoder.flush();
            self.slot.clock.reset();
            self.epoch = epoch;
        }
    }

    /// Push each frame and move the clock to the ones actually queued.
    ///
    /// Stops at the first frame the queue refuses: the rest belong to the
    /// same unit, which is stale once a seek has flushed the queue or moved
    /// the packet epoch on. Returns false once the frame queue is torn down.
    fn deliver(&self, frames: Vec<DecodedFrame>) -> bool {
        let epoch = self.epoch;
        for frame in frames {
            let pts = frame.pts;
            let current = || self.slot.packets.epoch() == epoch;
            if !self.slot.frames.push_while(frame, current) {
                if self.shared.is_over() || !self.slot.frames.is_open() {
                    return false;
                }
                trace!(queue = self.slot.frames.name(), "pre-seek frames dropped");
                return true;
            }
            if let Some(pts) = pts {
                self.slot.clock.set(pts);
            }
        }
        true
    }

    /// Returns true when the loop must stop
    fn on_error(&mut self, error: DecodeError) -> bool {
        self.consecutive_errors += 1;
        warn!(
            stream = self.slot.kind().as_str(),
            consecutive = self.consecutive_errors,
            "{}, skipping unit",
            error
        );
        self.shared.status.record_error(&error);

        match self.policy.max_consecutive_errors {
            Some(max) if self.consecutive_errors >= max => {
                self.shared.status.mark_broken(format!(
                    "{} decoder failed {} units in a row: {}",
                    self.slot.kind().as_str(),
                    self.consecutive_errors,
                    error
                ));
                true
            }
            _ => false,
        }
    }

    fn drain(&mut self) {
        match self.decoder.drain() {
            Ok(frames) => {
                trace!(stream = self.slot.kind().as_str(), count = frames.len(), "drained decoder");
                self.deliver(frames);
            }
            Err(e) => warn!("{} while draining decoder", e),
        }
    }
}
