//! FFmpeg media backend.
//! All FFmpeg contexts are wrapped here; the rest of the crate only sees the
//! [`MediaBackend`] traits.

pub mod convert;
pub mod decoder;
pub mod source;

use ffmpeg_next as ffmpeg;

use crate::error::OpenError;
use crate::media::backend::{MediaBackend, MediaSource};

pub use convert::{AudioConverter, VideoConverter};
pub use decoder::{FfmpegAudioDecoder, FfmpegVideoDecoder};
pub use source::FfmpegSource;

/// Opens files and network URLs through libavformat
pub struct FfmpegBackend;

impl FfmpegBackend {
    pub fn new() -> Result<Self, OpenError> {
        ffmpeg::init().map_err(|e| OpenError::Source {
            url: String::new(),
            reason: format!("FFmpeg init failed: {e}"),
        })?;
        Ok(Self)
    }
}

impl MediaBackend for FfmpegBackend {
    fn open(&self, url: &str) -> Result<Box<dyn MediaSource>, OpenError> {
        let input = ffmpeg::format::input(&url).map_err(|e| OpenError::Source {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        let source = FfmpegSource::new(input);
        tracing::debug!(url, streams = source.streams().len(), "demuxer opened");
        Ok(Box::new(source))
    }
}
