//! Data model flowing through the pipeline: compressed units in, decoded
//! frames out, plus the stream and format descriptions around them.

use serde::{Deserialize, Serialize};

use crate::core::time::{Time, TimeBase};

/// Kind of elementary stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }
}

/// Description of one stream found when the source was opened
#[derive(Debug, Clone)]
pub struct StreamInfo {
    pub index: usize,
    pub kind: MediaKind,
    pub time_base: TimeBase,
    /// Declared frame rate (video only)
    pub frame_rate: Option<TimeBase>,
    pub duration: Option<Time>, // nanoseconds
    pub codec_name: String,
}

/// One demultiplexed, still-encoded chunk of one stream.
///
/// Moved into exactly one packet queue and consumed once by its decode loop.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressedUnit {
    pub stream_index: usize,
    pub data: Vec<u8>,
    pub pts: Option<i64>, // stream ticks
    pub dts: Option<i64>, // stream ticks
    pub duration: i64,    // stream ticks
    pub is_key: bool,
}

impl CompressedUnit {
    pub fn new(stream_index: usize, data: Vec<u8>, pts: Option<i64>) -> Self {
        Self {
            stream_index,
            data,
            pts,
            dts: pts,
            duration: 0,
            is_key: false,
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Packed PCM sample layout delivered to the audio output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    U8,
    I16,
    I32,
    F32,
}

impl SampleFormat {
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            SampleFormat::U8 => 1,
            SampleFormat::I16 => 2,
            SampleFormat::I32 | SampleFormat::F32 => 4,
        }
    }

    /// Byte value of digital silence (unsigned 8-bit is offset binary)
    pub fn silence_byte(&self) -> u8 {
        match self {
            SampleFormat::U8 => 0x80,
            _ => 0,
        }
    }
}

/// Pixel layout delivered to the video sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    Yuv420p,
    Yuv422p,
    Yuv444p,
    Rgb24,
    Bgr24,
    Rgba,
    Bgra,
}

/// Output audio format negotiated between decoder target and device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub sample_format: SampleFormat,
}

impl AudioFormat {
    /// Bytes of one interleaved sample frame (all channels)
    pub fn bytes_per_frame(&self) -> usize {
        self.sample_format.bytes_per_sample() * self.channels as usize
    }
}

/// What a decoder should convert its output into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputTarget {
    Audio(AudioFormat),
    Video {
        width: u32,
        height: u32,
        /// `None` keeps the decoder's own format
        pixel_format: Option<PixelFormat>,
    },
}

/// Interleaved PCM for one decoded audio frame
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSamples {
    pub data: Vec<u8>,
    pub format: AudioFormat,
    pub samples: usize, // per channel
}

/// One plane of a decoded picture
#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    pub data: Vec<u8>,
    pub stride: usize,
}

/// Decoded picture
#[derive(Debug, Clone, PartialEq)]
pub struct VideoImage {
    pub width: u32,
    pub height: u32,
    pub format: Option<PixelFormat>, // None when the decoder format has no mapping
    pub planes: Vec<Plane>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FramePayload {
    Audio(AudioSamples),
    Video(VideoImage),
}

/// One timestamped unit of decoded media
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFrame {
    pub stream_index: usize,
    /// Presentation timestamp in stream ticks, `None` when unknown
    pub pts: Option<i64>,
    pub payload: FramePayload,
}

impl DecodedFrame {
    pub fn audio(stream_index: usize, pts: Option<i64>, samples: AudioSamples) -> Self {
        Self {
            stream_index,
            pts,
            payload: FramePayload::Audio(samples),
        }
    }

    pub fn video(stream_index: usize, pts: Option<i64>, image: VideoImage) -> Self {
        Self {
            stream_index,
            pts,
            payload: FramePayload::Video(image),
        }
    }

    pub fn kind(&self) -> MediaKind {
        match self.payload {
            FramePayload::Audio(_) => MediaKind::Audio,
            FramePayload::Video(_) => MediaKind::Video,
        }
    }

    /// PCM bytes for audio frames, `None` for video
    pub fn sample_bytes(&self) -> Option<&[u8]> {
        match &self.payload {
            FramePayload::Audio(samples) => Some(&samples.data),
            FramePayload::Video(_) => None,
        }
    }
}
