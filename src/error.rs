//! Error taxonomy for the player.
//!
//! Setup failures (`ConfigError`, `OpenError`) are fatal and move the
//! controller to `Broken`. Loop-local failures (`ReadError`, `DecodeError`)
//! are logged and skipped inside their thread. `SeekError` drops the request.

use thiserror::Error;

/// Invalid configuration, rejected before any thread starts
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("Frame rate must be greater than 0 on video (got {0})")]
    FrameRate(u32),
    #[error("Width must be greater than 0 on video")]
    Width,
    #[error("Height must be greater than 0 on video")]
    Height,
    #[error("Sample rate must be greater than 0 on audio")]
    SampleRate,
    #[error("Channel count must be greater than 0 on audio")]
    Channels,
    #[error("Volume must be greater than 0 on audio (got {0})")]
    Volume(f32),
    #[error("Playback speed must be greater than 0 (got {0})")]
    Speed(f32),
    #[error("Queue capacity for {0} must be greater than 0")]
    QueueCapacity(&'static str),
    #[error("Neither audio nor video is enabled")]
    NothingEnabled,
    #[error("Failed to read config file: {0}")]
    Io(String),
    #[error("Failed to parse config: {0}")]
    Parse(String),
}

/// Source, decoder or device failed to open
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OpenError {
    #[error("Failed to open source {url}: {reason}")]
    Source { url: String, reason: String },
    #[error("No audio or video stream found in {0}")]
    NoStream(String),
    #[error("Failed to open {kind} decoder: {reason}")]
    Decoder { kind: &'static str, reason: String },
    #[error("Failed to open audio device: {0}")]
    AudioDevice(String),
    #[error("Failed to create video surface: {0}")]
    VideoSurface(String),
    #[error("Failed to start {0} thread: {1}")]
    Thread(&'static str, String),
}

/// Transient demux read failure
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Failed to read unit: {0}")]
pub struct ReadError(pub String);

/// A single unit failed to decode
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("Corrupt unit on stream {stream}: {reason}")]
    Corrupt { stream: usize, reason: String },
    #[error("Decoder backend error: {0}")]
    Backend(String),
}

/// Frame format conversion failed
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Conversion failed: {0}")]
pub struct ConversionError(pub String);

/// Seek request rejected or failed in the backend
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SeekError {
    #[error("Seek target {target_ms}ms outside [0, {duration_ms})")]
    OutOfRange { target_ms: i64, duration_ms: i64 },
    #[error("No source is open")]
    NotOpen,
    #[error("Source already exhausted")]
    Exhausted,
    #[error("Seek failed: {0}")]
    Backend(String),
}

/// Top-level error surfaced by the playback controller
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlayerError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Open error: {0}")]
    Open(#[from] OpenError),
    #[error("Seek error: {0}")]
    Seek(#[from] SeekError),
    #[error("Cannot {action} while {state}")]
    InvalidState {
        action: &'static str,
        state: &'static str,
    },
}
