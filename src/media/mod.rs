//! Media data model and collaborator interfaces.
//! The FFmpeg-backed implementation lives in [`ffmpeg`] behind the `ffmpeg` feature.

pub mod backend;
pub mod types;

#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;

pub use backend::{AudioOutput, Decoder, MediaBackend, MediaSource, VideoSink};
pub use types::{
    AudioFormat, AudioSamples, CompressedUnit, DecodedFrame, FramePayload, MediaKind,
    OutputTarget, PixelFormat, Plane, SampleFormat, StreamInfo, VideoImage,
};
