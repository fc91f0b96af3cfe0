//! cpal audio output.
//!
//! Builds a raw output stream in the negotiated format; the device's data
//! callback pulls bytes straight out of the [`AudioFeeder`]. Device errors are
//! logged from the callback, never propagated.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleRate, Stream, StreamConfig};

use crate::audio::feeder::AudioFeeder;
use crate::error::OpenError;
use crate::media::backend::AudioOutput;
use crate::media::types::{AudioFormat, SampleFormat};

/// Default host output device
pub struct CpalOutput {
    stream: Option<Stream>,
}

impl CpalOutput {
    pub fn new() -> Self {
        Self { stream: None }
    }

    fn cpal_format(format: SampleFormat) -> cpal::SampleFormat {
        match format {
            SampleFormat::U8 => cpal::SampleFormat::U8,
            SampleFormat::I16 => cpal::SampleFormat::I16,
            SampleFormat::I32 => cpal::SampleFormat::I32,
            SampleFormat::F32 => cpal::SampleFormat::F32,
        }
    }
}

impl Default for CpalOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioOutput for CpalOutput {
    fn open(&mut self, format: AudioFormat, mut feeder: AudioFeeder) -> Result<(), OpenError> {
        self.close();

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| OpenError::AudioDevice("no output device available".to_string()))?;

        let config = StreamConfig {
            channels: format.channels,
            sample_rate: SampleRate(format.sample_rate),
            buffer_size: BufferSize::Default,
        };

        let stream = device
            .build_output_stream_raw(
                &config,
                Self::cpal_format(format.sample_format),
                move |data: &mut cpal::Data, _: &cpal::OutputCallbackInfo| {
                    feeder.fill(data.bytes_mut());
                },
                |err| tracing::error!("cpal audio error: {err}"),
                None,
            )
            .map_err(|e| OpenError::AudioDevice(e.to_string()))?;

        // Opened paused; play() starts pulling
        stream
            .pause()
            .map_err(|e| OpenError::AudioDevice(e.to_string()))?;

        tracing::info!(
            device = device.name().unwrap_or_else(|_| "unknown".to_string()),
            sample_rate = format.sample_rate,
            channels = format.channels,
            format = ?format.sample_format,
            "audio device opened"
        );
        self.stream = Some(stream);
        Ok(())
    }

    fn set_paused(&mut self, paused: bool) -> Result<(), OpenError> {
        if let Some(stream) = &self.stream {
            if paused {
                stream
                    .pause()
                    .map_err(|e| OpenError::AudioDevice(e.to_string()))?;
            } else {
                stream
                    .play()
                    .map_err(|e| OpenError::AudioDevice(e.to_string()))?;
            }
        }
        Ok(())
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.pause();
            drop(stream);
            tracing::debug!("audio device closed");
        }
    }
}
