//! Frame format conversion.
//!
//! One converter lives inside each decoder. The underlying scaler or
//! resampler is rebuilt only when the incoming frame's format changes.

use ffmpeg_next as ffmpeg;
use ffmpeg::format::{sample, Pixel, Sample};
use ffmpeg::software::{resampling, scaling};
use ffmpeg::ChannelLayout;

use crate::error::ConversionError;
use crate::media::types::{AudioFormat, AudioSamples, PixelFormat, Plane, SampleFormat, VideoImage};

pub(crate) fn pixel_to_ffmpeg(format: PixelFormat) -> Pixel {
    match format {
        PixelFormat::Yuv420p => Pixel::YUV420P,
        PixelFormat::Yuv422p => Pixel::YUV422P,
        PixelFormat::Yuv444p => Pixel::YUV444P,
        PixelFormat::Rgb24 => Pixel::RGB24,
        PixelFormat::Bgr24 => Pixel::BGR24,
        PixelFormat::Rgba => Pixel::RGBA,
        PixelFormat::Bgra => Pixel::BGRA,
    }
}

pub(crate) fn pixel_from_ffmpeg(format: Pixel) -> Option<PixelFormat> {
    match format {
        Pixel::YUV420P => Some(PixelFormat::Yuv420p),
        Pixel::YUV422P => Some(PixelFormat::Yuv422p),
        Pixel::YUV444P => Some(PixelFormat::Yuv444p),
        Pixel::RGB24 => Some(PixelFormat::Rgb24),
        Pixel::BGR24 => Some(PixelFormat::Bgr24),
        Pixel::RGBA => Some(PixelFormat::Rgba),
        Pixel::BGRA => Some(PixelFormat::Bgra),
        _ => None,
    }
}

fn sample_to_ffmpeg(format: SampleFormat) -> Sample {
    match format {
        SampleFormat::U8 => Sample::U8(sample::Type::Packed),
        SampleFormat::I16 => Sample::I16(sample::Type::Packed),
        SampleFormat::I32 => Sample::I32(sample::Type::Packed),
        SampleFormat::F32 => Sample::F32(sample::Type::Packed),
    }
}

/// Copy every plane of a decoded picture as-is
pub(crate) fn copy_planes(frame: &ffmpeg::frame::Video) -> VideoImage {
    let planes = (0..frame.planes())
        .map(|i| Plane {
            data: frame.data(i).to_vec(),
            stride: frame.stride(i),
        })
        .collect();
    VideoImage {
        width: frame.width(),
        height: frame.height(),
        format: pixel_from_ffmpeg(frame.format()),
        planes,
    }
}

/// Scales decoded pictures to the configured size and pixel format
pub struct VideoConverter {
    width: u32,
    height: u32,
    format: Option<PixelFormat>,
    scaler: Option<scaling::Context>,
}

impl VideoConverter {
    /// A zero width or height keeps the source size.
    pub fn new(width: u32, height: u32, format: Option<PixelFormat>) -> Self {
        Self {
            width,
            height,
            format,
            scaler: None,
        }
    }

    pub fn convert(&mut self, frame: &ffmpeg::frame::Video) -> Result<VideoImage, ConversionError> {
        let src_format = frame.format();
        let (src_width, src_height) = (frame.width(), frame.height());
        let dst_format = self.format.map_or(src_format, pixel_to_ffmpeg);
        let dst_width = if self.width > 0 { self.width } else { src_width };
        let dst_height = if self.height > 0 { self.height } else { src_height };

        if dst_format == src_format && dst_width == src_width && dst_height == src_height {
            return Ok(copy_planes(frame));
        }

        let stale = self.scaler.as_ref().map_or(true, |s| {
            let input = s.input();
            input.format != src_format || input.width != src_width || input.height != src_height
        });
        if stale {
            let scaler = scaling::Context::get(
                src_format,
                src_width,
                src_height,
                dst_format,
                dst_width,
                dst_height,
                scaling::Flags::BILINEAR,
            )
            .map_err(|e| ConversionError(format!("failed to create scaler: {e}")))?;
            tracing::debug!(
                from = ?src_format,
                to = ?dst_format,
                src_width,
                src_height,
                dst_width,
                dst_height,
                "video scaler rebuilt"
            );
            self.scaler = Some(scaler);
        }

        let Some(scaler) = self.scaler.as_mut() else {
            return Err(ConversionError("scaler not initialized".to_string()));
        };
        let mut output = ffmpeg::frame::Video::empty();
        scaler
            .run(frame, &mut output)
            .map_err(|e| ConversionError(format!("scaling failed: {e}")))?;
        Ok(copy_planes(&output))
    }
}

/// Resamples decoded audio into the device's packed format
pub struct AudioConverter {
    target: AudioFormat,
    resampler: Option<resampling::Context>,
}

impl AudioConverter {
    pub fn new(target: AudioFormat) -> Self {
        Self {
            target,
            resampler: None,
        }
    }

    /// Forget filter history (after a seek)
    pub fn reset(&mut self) {
        self.resampler = None;
    }

    pub fn convert(&mut self, frame: &ffmpeg::frame::Audio) -> Result<AudioSamples, ConversionError> {
        let src_format = frame.format();
        let src_rate = frame.rate();
        let src_layout = match frame.channel_layout() {
            layout if layout.is_empty() => ChannelLayout::default(frame.channels() as i32),
            layout => layout,
        };

        let stale = self.resampler.as_ref().map_or(true, |r| {
            let input = r.input();
            input.format != src_format || input.rate != src_rate || input.channel_layout != src_layout
        });
        if stale {
            let resampler = resampling::Context::get(
                src_format,
                src_layout,
                src_rate,
                sample_to_ffmpeg(self.target.sample_format),
                ChannelLayout::default(self.target.channels as i32),
                self.target.sample_rate,
            )
            .map_err(|e| ConversionError(format!("failed to create resampler: {e}")))?;
            tracing::debug!(
                from = ?src_format,
                src_rate,
                to_rate = self.target.sample_rate,
                channels = self.target.channels,
                "audio resampler rebuilt"
            );
            self.resampler = Some(resampler);
        }

        let Some(resampler) = self.resampler.as_mut() else {
            return Err(ConversionError("resampler not initialized".to_string()));
        };
        let mut output = ffmpeg::frame::Audio::empty();
        resampler
            .run(frame, &mut output)
            .map_err(|e| ConversionError(format!("resampling failed: {e}")))?;

        let samples = output.samples();
        let data = if samples == 0 {
            Vec::new()
        } else {
            let raw = output.data(0);
            let len = (samples * self.target.bytes_per_frame()).min(raw.len());
            raw[..len].to_vec()
        };
        Ok(AudioSamples {
            data,
            format: self.target,
            samples,
        })
    }
}
