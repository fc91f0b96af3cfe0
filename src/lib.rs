//! avsync: a concurrent audio/video decode and synchronization pipeline.
//!
//! A read loop demultiplexes a source into per-stream packet queues, one
//! decode loop per stream turns packets into frames, the audio device pulls
//! PCM through a staging buffer and the render step times video frames
//! against the audio clock. [`PlaybackController`] drives the whole thing.

pub mod audio;
pub mod config;
pub mod core;
pub mod error;
pub mod media;
pub mod pipeline;
pub mod playback;

pub use config::PlayerConfig;
pub use error::PlayerError;
pub use playback::{PlaybackController, PlayerState};
