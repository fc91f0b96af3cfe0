//! Collaborator seams around the pipeline.
//!
//! Demuxing and decoding sit behind [`MediaBackend`] / [`MediaSource`] /
//! [`Decoder`]; presentation sits behind [`VideoSink`] and [`AudioOutput`].
//! The pipeline only ever talks to these traits.

use crate::audio::AudioFeeder;
use crate::core::time::Time;
use crate::error::{DecodeError, OpenError, ReadError, SeekError};
use crate::media::types::{AudioFormat, CompressedUnit, DecodedFrame, OutputTarget, StreamInfo};

/// Opens sources by URL
pub trait MediaBackend: Send {
    fn open(&self, url: &str) -> Result<Box<dyn MediaSource>, OpenError>;
}

/// An opened container.
///
/// Owned by the controller while streams are inspected and decoders opened,
/// then moved into the read loop, which is its only user afterwards.
pub trait MediaSource: Send {
    fn streams(&self) -> Vec<StreamInfo>;

    /// Total duration in nanoseconds, if known
    fn duration(&self) -> Option<Time>;

    /// Next demultiplexed unit, `Ok(None)` at end of stream
    fn read_unit(&mut self) -> Result<Option<CompressedUnit>, ReadError>;

    /// Reposition at or before `target` (nanoseconds)
    fn seek(&mut self, target: Time) -> Result<(), SeekError>;

    /// Create a decoder for one of this source's streams
    fn open_decoder(
        &self,
        stream: &StreamInfo,
        target: OutputTarget,
    ) -> Result<Box<dyn Decoder>, OpenError>;
}

/// Per-stream decoder, owned by exactly one decode loop.
///
/// The unit-to-frame relation is many-to-many: a unit may yield zero, one or
/// many frames depending on the decoder's internal buffering.
pub trait Decoder: Send {
    fn decode(&mut self, unit: &CompressedUnit) -> Result<Vec<DecodedFrame>, DecodeError>;

    /// Drop internal buffering (after a seek)
    fn flush(&mut self);

    /// Signal end of input and return whatever is still buffered
    fn drain(&mut self) -> Result<Vec<DecodedFrame>, DecodeError>;
}

/// Render surface. Called from the render thread only.
pub trait VideoSink: Send {
    fn present(&mut self, frame: &DecodedFrame);
}

/// Pull-based audio device.
///
/// The device thread invokes [`AudioFeeder::fill`] on its own schedule; that
/// thread is never joined or blocked by the player.
pub trait AudioOutput {
    fn open(&mut self, format: AudioFormat, feeder: AudioFeeder) -> Result<(), OpenError>;

    fn set_paused(&mut self, paused: bool) -> Result<(), OpenError>;

    fn close(&mut self);
}
