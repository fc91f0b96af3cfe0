//! Demultiplexing thread.
//!
//! One iteration reads one compressed unit and routes it to the packet queue
//! of its stream. This is the pipeline's only backpressure point: before each
//! read it waits, in bounded slices, until no enabled packet queue is full
//! and playback is not paused. Pending seeks are serviced at the top of each
//! iteration.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, trace, warn};

use crate::core::time;
use crate::media::backend::MediaSource;
use crate::media::types::CompressedUnit;
use crate::pipeline::shared::{PipelineShared, StreamSlot};

pub struct ReadLoop {
    source: Box<dyn MediaSource>,
    slots: Vec<Arc<StreamSlot>>,
    shared: Arc<PipelineShared>,
    wait: Duration,
}

impl ReadLoop {
    pub fn new(
        source: Box<dyn MediaSource>,
        slots: Vec<Arc<StreamSlot>>,
        shared: Arc<PipelineShared>,
        wait: Duration,
    ) -> Self {
        Self {
            source,
            slots,
            shared,
            wait,
        }
    }

    /// Run until the source is exhausted or the controller shuts down.
    /// The source is dropped when this returns.
    pub fn run(mut self) {
        debug!(streams = self.slots.len(), "read loop started");

        while !self.shared.is_over() {
            if let Some(target) = self.shared.pending_seek() {
                self.service_seek(target);
            }

            if !self.wait_for_room() {
                continue;
            }

            match self.source.read_unit() {
                Ok(Some(unit)) => self.route(unit),
                Ok(None) => {
                    info!("source exhausted");
                    self.shared.set_finished();
                    break;
                }
                Err(e) => {
                    warn!("{}, skipping", e);
                    self.shared.wait_read(self.wait);
                }
            }
        }

        debug!("read loop exited");
    }

    fn service_seek(&mut self, target: time::Time) {
        match self.source.seek(target) {
            Ok(()) => {
                // Packets first: decode loops stop pushing frames of a unit
                // whose packet epoch is gone
                for slot in &self.slots {
                    slot.packets.flush_into_new_epoch();
                    slot.frames.flush_into_new_epoch();
                }
                info!(target = %time::format_time(target), "seek serviced");
            }
            Err(e) => {
                warn!("{}, keeping current position", e);
                self.shared.status.record_error(&e);
            }
        }
        self.shared.complete_seek();
    }

    fn is_blocked(&self) -> bool {
        self.shared.is_paused() || self.slots.iter().any(|slot| slot.packets.is_full())
    }

    /// One bounded wait; false means "re-check shutdown and seek first"
    fn wait_for_room(&self) -> bool {
        if !self.is_blocked() {
            return true;
        }
        self.shared.wait_read(self.wait);
        !self.shared.is_over() && self.shared.pending_seek().is_none() && !self.is_blocked()
    }

    fn route(&self, unit: CompressedUnit) {
        let Some(slot) = self.slots.iter().find(|s| s.index() == unit.stream_index) else {
            trace!(stream = unit.stream_index, "discarding unit of unselected stream");
            return;
        };

        trace!(
            stream = unit.stream_index,
            size = unit.size(),
            pts = ?unit.pts,
            "routing unit"
        );
        if !slot.packets.push(unit) {
            debug!(queue = slot.packets.name(), "packet queue closed, unit dropped");
        }
    }
}
