//! Pull-side of the audio path.
//!
//! The device thread calls [`AudioFeeder::fill`] whenever it wants bytes.
//! That call never blocks: it only uses the non-blocking queue pop, and an
//! empty queue turns the rest of the request into silence.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam::atomic::AtomicCell;

use crate::audio::buffer::AudioStagingBuffer;
use crate::media::types::SampleFormat;
use crate::pipeline::shared::StreamSlot;

/// Live audio controls and counters shared with the controller
#[derive(Debug)]
pub struct AudioControls {
    muted: AtomicBool,
    volume: AtomicCell<f32>,
    staged: AtomicUsize,
    underruns: AtomicU64,
}

impl AudioControls {
    pub fn new(volume: f32, muted: bool) -> Self {
        Self {
            muted: AtomicBool::new(muted),
            volume: AtomicCell::new(volume),
            staged: AtomicUsize::new(0),
            underruns: AtomicU64::new(0),
        }
    }

    pub fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::Relaxed);
    }

    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Relaxed)
    }

    pub fn set_volume(&self, volume: f32) {
        self.volume.store(volume);
    }

    pub fn volume(&self) -> f32 {
        self.volume.load()
    }

    /// Bytes left in the staging buffer after the last fill
    pub fn staged_bytes(&self) -> usize {
        self.staged.load(Ordering::Relaxed)
    }

    pub fn underruns(&self) -> u64 {
        self.underruns.load(Ordering::Relaxed)
    }
}

/// Feeds the audio device from the audio frame queue
pub struct AudioFeeder {
    slot: Arc<StreamSlot>,
    staging: AudioStagingBuffer,
    controls: Arc<AudioControls>,
    format: SampleFormat,
    epoch: u64,
}

impl AudioFeeder {
    pub fn new(
        slot: Arc<StreamSlot>,
        controls: Arc<AudioControls>,
        format: SampleFormat,
        staging_capacity: usize,
    ) -> Self {
        let epoch = slot.frames.epoch();
        // Counters are per session; nothing is staged yet
        controls.staged.store(0, Ordering::Relaxed);
        Self {
            slot,
            staging: AudioStagingBuffer::with_capacity(staging_capacity),
            controls,
            format,
            epoch,
        }
    }

    pub fn controls(&self) -> &Arc<AudioControls> {
        &self.controls
    }

    /// Fill `out` completely: staged PCM first, then further frames popped
    /// from the queue, then silence if the queue runs dry.
    pub fn fill(&mut self, out: &mut [u8]) {
        let epoch = self.slot.frames.epoch();
        if epoch != self.epoch {
            // A seek happened; the staged tail is from the old position
            self.staging.clear();
            self.epoch = epoch;
        }

        let mut written = 0;
        while written < out.len() {
            if self.staging.remaining() == 0 {
                match self.slot.frames.pop() {
                    Some(frame) => {
                        if let Some(bytes) = frame.sample_bytes() {
                            self.staging.refill(bytes);
                        }
                        continue;
                    }
                    None => {
                        self.controls.underruns.fetch_add(1, Ordering::Relaxed);
                        tracing::trace!(missing = out.len() - written, "audio underrun");
                        out[written..].fill(self.format.silence_byte());
                        break;
                    }
                }
            }
            written += self.staging.read_into(&mut out[written..]);
        }

        let copied = &mut out[..written];
        if self.controls.is_muted() {
            copied.fill(self.format.silence_byte());
        } else {
            let volume = self.controls.volume();
            if volume != 1.0 {
                apply_volume(copied, self.format, volume);
            }
        }

        self.controls
            .staged
            .store(self.staging.remaining(), Ordering::Relaxed);
    }
}

/// Linear gain, clamped to the range the sample format can represent
fn apply_volume(buf: &mut [u8], format: SampleFormat, volume: f32) {
    match format {
        SampleFormat::U8 => {
            for byte in buf.iter_mut() {
                let scaled = (*byte as f32 - 128.0) * volume;
                *byte = (scaled.round().clamp(-128.0, 127.0) + 128.0) as u8;
            }
        }
        SampleFormat::I16 => {
            for chunk in buf.chunks_exact_mut(2) {
                let sample = i16::from_ne_bytes([chunk[0], chunk[1]]) as f32 * volume;
                let clamped = sample.round().clamp(i16::MIN as f32, i16::MAX as f32) as i16;
                chunk.copy_from_slice(&clamped.to_ne_bytes());
            }
        }
        SampleFormat::I32 => {
            for chunk in buf.chunks_exact_mut(4) {
                let raw = i32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                let sample = raw as f64 * volume as f64;
                let clamped = sample.round().clamp(i32::MIN as f64, i32::MAX as f64) as i32;
                chunk.copy_from_slice(&clamped.to_ne_bytes());
            }
        }
        SampleFormat::F32 => {
            for chunk in buf.chunks_exact_mut(4) {
                let sample = f32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) * volume;
                chunk.copy_from_slice(&sample.clamp(-1.0, 1.0).to_ne_bytes());
            }
        }
    }
}
