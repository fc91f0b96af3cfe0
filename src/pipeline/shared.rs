//! State shared between the controller and the pipeline threads.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::core::time::Time;
use crate::media::types::{CompressedUnit, DecodedFrame, MediaKind, StreamInfo};
use crate::pipeline::clock::PresentationClock;
use crate::pipeline::queue::BoundedQueue;
use crate::playback::state::SharedStatus;

/// Lifecycle flags, the pending seek slot and the read loop's wake-up
/// condition.
///
/// `finished` means the source hit end of stream (consumers still drain);
/// `over` means the controller is tearing everything down.
pub struct PipelineShared {
    finished: AtomicBool,
    over: AtomicBool,
    paused: AtomicBool,
    seek_pending: AtomicBool,
    seek_target: AtomicI64,
    gate: Mutex<()>,
    wake: Condvar,
    pub status: Arc<SharedStatus>,
}

impl PipelineShared {
    pub fn new(status: Arc<SharedStatus>) -> Self {
        Self {
            finished: AtomicBool::new(false),
            over: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            seek_pending: AtomicBool::new(false),
            seek_target: AtomicI64::new(0),
            gate: Mutex::new(()),
            wake: Condvar::new(),
            status,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    pub fn set_finished(&self) {
        self.finished.store(true, Ordering::Release);
    }

    pub fn is_over(&self) -> bool {
        self.over.load(Ordering::Acquire)
    }

    /// Mark finished and over, then wake the read loop
    pub fn shut_down(&self) {
        self.finished.store(true, Ordering::Release);
        self.over.store(true, Ordering::Release);
        self.notify_read();
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Release);
        self.notify_read();
    }

    /// Record a seek for the read loop. Returns false (and changes nothing)
    /// if one is already pending: the first pending request wins.
    pub fn request_seek(&self, target: Time) -> bool {
        if self.seek_pending.load(Ordering::Acquire) {
            return false;
        }
        self.seek_target.store(target, Ordering::Relaxed);
        self.seek_pending.store(true, Ordering::Release);
        self.notify_read();
        true
    }

    pub fn pending_seek(&self) -> Option<Time> {
        if self.seek_pending.load(Ordering::Acquire) {
            Some(self.seek_target.load(Ordering::Relaxed))
        } else {
            None
        }
    }

    pub fn complete_seek(&self) {
        self.seek_pending.store(false, Ordering::Release);
    }

    pub fn notify_read(&self) {
        let _gate = self.gate.lock();
        self.wake.notify_all();
    }

    /// Bounded wait for a wake-up of the read loop
    pub fn wait_read(&self, timeout: Duration) {
        let mut gate = self.gate.lock();
        self.wake.wait_for(&mut gate, timeout);
    }
}

/// Everything one selected stream needs across threads: its packet and frame
/// queues and its clock.
pub struct StreamSlot {
    pub info: StreamInfo,
    pub packets: BoundedQueue<CompressedUnit>,
    pub frames: BoundedQueue<DecodedFrame>,
    pub clock: PresentationClock,
    decoding_done: AtomicBool,
}

impl StreamSlot {
    pub fn new(info: StreamInfo, packet_capacity: usize, frame_capacity: usize) -> Self {
        let (packet_name, frame_name) = match info.kind {
            MediaKind::Audio => ("audio-packets", "audio-frames"),
            MediaKind::Video => ("video-packets", "video-frames"),
        };
        let clock = PresentationClock::new(info.time_base);
        Self {
            info,
            packets: BoundedQueue::new(packet_name, packet_capacity),
            frames: BoundedQueue::new(frame_name, frame_capacity),
            clock,
            decoding_done: AtomicBool::new(false),
        }
    }

    pub fn kind(&self) -> MediaKind {
        self.info.kind
    }

    pub fn index(&self) -> usize {
        self.info.index
    }

    pub fn open(&self) {
        self.packets.flush();
        self.frames.flush();
        self.packets.open();
        self.frames.open();
    }

    /// Close then flush both queues; never join a loop before this
    pub fn close(&self) {
        self.packets.close();
        self.frames.close();
        self.packets.flush();
        self.frames.flush();
    }

    pub fn mark_decoding_done(&self) {
        self.decoding_done.store(true, Ordering::Release);
    }

    pub fn is_decoding_done(&self) -> bool {
        self.decoding_done.load(Ordering::Acquire)
    }

    /// Decode loop exited and every decoded frame was consumed
    pub fn is_drained(&self) -> bool {
        self.is_decoding_done() && self.frames.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time::TimeBase;

    fn shared() -> PipelineShared {
        PipelineShared::new(Arc::new(SharedStatus::new()))
    }

    #[test]
    fn test_first_pending_seek_wins() {
        let shared = shared();
        assert!(shared.request_seek(5_000));
        assert!(!shared.request_seek(9_000));
        assert_eq!(shared.pending_seek(), Some(5_000));

        shared.complete_seek();
        assert_eq!(shared.pending_seek(), None);
        assert!(shared.request_seek(9_000));
        assert_eq!(shared.pending_seek(), Some(9_000));
    }

    #[test]
    fn test_shut_down_sets_both_flags() {
        let shared = shared();
        assert!(!shared.is_finished());
        shared.shut_down();
        assert!(shared.is_finished());
        assert!(shared.is_over());
    }

    #[test]
    fn test_wait_read_is_bounded() {
        let shared = shared();
        let start = std::time::Instant::now();
        shared.wait_read(Duration::from_millis(10));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_slot_drained() {
        let info = StreamInfo {
            index: 1,
            kind: MediaKind::Video,
            time_base: TimeBase::MILLIS,
            frame_rate: None,
            duration: None,
            codec_name: "test".to_string(),
        };
        let slot = StreamSlot::new(info, 4, 4);
        slot.open();
        assert!(!slot.is_drained());
        slot.mark_decoding_done();
        assert!(slot.is_drained());
        assert_eq!(slot.packets.name(), "video-packets");
    }
}
