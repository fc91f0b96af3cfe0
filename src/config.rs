//! Player configuration, loaded from TOML.
//!
//! Every section falls back to defaults for missing keys, so a file only
//! needs to name what it changes.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::media::types::{AudioFormat, OutputTarget, PixelFormat, SampleFormat};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub width: u32,
    pub height: u32,
    /// `None` keeps the decoder's pixel format
    pub pixel_format: Option<PixelFormat>,
    /// Used when the stream does not declare a frame rate
    pub frame_rate: u32,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            pixel_format: None,
            frame_rate: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub channels: u16,
    pub sample_rate: u32,
    /// `None` delivers packed f32
    pub sample_format: Option<SampleFormat>,
    pub volume: f32,
    pub muted: bool,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            channels: 2,
            sample_rate: 44_100,
            sample_format: None,
            volume: 1.0,
            muted: false,
        }
    }
}

/// Queue capacities and the read loop's backpressure slice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub audio_packets: usize,
    pub audio_frames: usize,
    pub video_packets: usize,
    pub video_frames: usize,
    pub read_wait_ms: u64,
    pub staging_bytes: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            audio_packets: 600,
            audio_frames: 600,
            video_packets: 300,
            video_frames: 300,
            read_wait_ms: 10,
            staging_bytes: 500_000,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeConfig {
    pub max_consecutive_errors: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub video: VideoConfig,
    pub audio: AudioConfig,
    pub speed: f32,
    pub enable_audio: bool,
    pub enable_video: bool,
    pub play_after_ready: bool,
    pub queues: QueueConfig,
    pub decode: DecodeConfig,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            video: VideoConfig::default(),
            audio: AudioConfig::default(),
            speed: 1.0,
            enable_audio: true,
            enable_video: true,
            play_after_ready: true,
            queues: QueueConfig::default(),
            decode: DecodeConfig::default(),
        }
    }
}

impl PlayerConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Read and parse a TOML file. Does not validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.enable_audio && !self.enable_video {
            return Err(ConfigError::NothingEnabled);
        }
        if self.enable_video {
            if self.video.frame_rate == 0 {
                return Err(ConfigError::FrameRate(self.video.frame_rate));
            }
            if self.video.width == 0 {
                return Err(ConfigError::Width);
            }
            if self.video.height == 0 {
                return Err(ConfigError::Height);
            }
        }
        if self.enable_audio {
            if self.audio.sample_rate == 0 {
                return Err(ConfigError::SampleRate);
            }
            if self.audio.channels == 0 {
                return Err(ConfigError::Channels);
            }
            // NaN fails this too
            if !(self.audio.volume > 0.0) {
                return Err(ConfigError::Volume(self.audio.volume));
            }
        }
        if !(self.speed > 0.0) {
            return Err(ConfigError::Speed(self.speed));
        }

        let queues = &self.queues;
        for (name, capacity) in [
            ("audio packets", queues.audio_packets),
            ("audio frames", queues.audio_frames),
            ("video packets", queues.video_packets),
            ("video frames", queues.video_frames),
            ("audio staging", queues.staging_bytes),
        ] {
            if capacity == 0 {
                return Err(ConfigError::QueueCapacity(name));
            }
        }
        Ok(())
    }

    pub fn audio_format(&self) -> AudioFormat {
        AudioFormat {
            sample_rate: self.audio.sample_rate,
            channels: self.audio.channels,
            sample_format: self.audio.sample_format.unwrap_or(SampleFormat::F32),
        }
    }

    pub fn audio_target(&self) -> OutputTarget {
        OutputTarget::Audio(self.audio_format())
    }

    pub fn video_target(&self) -> OutputTarget {
        OutputTarget::Video {
            width: self.video.width,
            height: self.video.height,
            pixel_format: self.video.pixel_format,
        }
    }

    pub fn read_wait(&self) -> Duration {
        Duration::from_millis(self.queues.read_wait_ms.max(1))
    }
}
