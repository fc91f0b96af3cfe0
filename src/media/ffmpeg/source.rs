//! Demuxer over an FFmpeg input context.

use ffmpeg_next as ffmpeg;
use ffmpeg::media::Type;

use crate::core::time::{self, Time, TimeBase};
use crate::error::{OpenError, ReadError, SeekError};
use crate::media::backend::{Decoder, MediaSource};
use crate::media::ffmpeg::convert::{AudioConverter, VideoConverter};
use crate::media::ffmpeg::decoder::{FfmpegAudioDecoder, FfmpegVideoDecoder};
use crate::media::types::{CompressedUnit, MediaKind, OutputTarget, StreamInfo};

fn time_base(rational: ffmpeg::Rational) -> TimeBase {
    TimeBase::new(rational.numerator(), rational.denominator())
}

pub struct FfmpegSource {
    input: ffmpeg::format::context::Input,
    streams: Vec<StreamInfo>,
    duration: Option<Time>,
}

// The input context moves to the read thread once and is used only there
unsafe impl Send for FfmpegSource {}

impl FfmpegSource {
    pub fn new(input: ffmpeg::format::context::Input) -> Self {
        let streams = input
            .streams()
            .filter_map(|stream| {
                let parameters = stream.parameters();
                let kind = match parameters.medium() {
                    Type::Audio => MediaKind::Audio,
                    Type::Video => MediaKind::Video,
                    _ => return None,
                };
                let tb = time_base(stream.time_base());
                let frame_rate = match kind {
                    MediaKind::Video => Some(time_base(stream.avg_frame_rate()))
                        .filter(|rate| rate.num > 0 && rate.den > 0),
                    MediaKind::Audio => None,
                };
                let duration = Some(stream.duration())
                    .filter(|ticks| *ticks > 0)
                    .map(|ticks| tb.ticks_to_nanos(ticks));
                Some(StreamInfo {
                    index: stream.index(),
                    kind,
                    time_base: tb,
                    frame_rate,
                    duration,
                    codec_name: parameters.id().name().to_string(),
                })
            })
            .collect();

        // Container duration is in AV_TIME_BASE (microsecond) units
        let duration = Some(input.duration())
            .filter(|micros| *micros > 0)
            .map(time::from_micros);

        Self {
            input,
            streams,
            duration,
        }
    }
}

impl MediaSource for FfmpegSource {
    fn streams(&self) -> Vec<StreamInfo> {
        self.streams.clone()
    }

    fn duration(&self) -> Option<Time> {
        self.duration
    }

    fn read_unit(&mut self) -> Result<Option<CompressedUnit>, ReadError> {
        let mut packet = ffmpeg::Packet::empty();
        match packet.read(&mut self.input) {
            Ok(()) => Ok(Some(CompressedUnit {
                stream_index: packet.stream(),
                data: packet.data().map(<[u8]>::to_vec).unwrap_or_default(),
                pts: packet.pts(),
                dts: packet.dts(),
                duration: packet.duration(),
                is_key: packet.is_key(),
            })),
            Err(ffmpeg::Error::Eof) => Ok(None),
            Err(e) => Err(ReadError(e.to_string())),
        }
    }

    fn seek(&mut self, target: Time) -> Result<(), SeekError> {
        let timestamp = time::to_micros(target);
        self.input
            .seek(timestamp, ..timestamp)
            .map_err(|e| SeekError::Backend(e.to_string()))
    }

    fn open_decoder(
        &self,
        stream: &StreamInfo,
        target: OutputTarget,
    ) -> Result<Box<dyn Decoder>, OpenError> {
        let kind = stream.kind.as_str();
        let fail = |reason: String| OpenError::Decoder { kind, reason };

        let parameters = self
            .input
            .stream(stream.index)
            .ok_or_else(|| fail(format!("stream {} not found", stream.index)))?
            .parameters();
        let context = ffmpeg::codec::context::Context::from_parameters(parameters)
            .map_err(|e| fail(e.to_string()))?;

        match target {
            OutputTarget::Audio(format) => {
                let decoder = context.decoder().audio().map_err(|e| fail(e.to_string()))?;
                Ok(Box::new(FfmpegAudioDecoder::new(
                    stream.index,
                    decoder,
                    AudioConverter::new(format),
                )))
            }
            OutputTarget::Video {
                width,
                height,
                pixel_format,
            } => {
                let decoder = context.decoder().video().map_err(|e| fail(e.to_string()))?;
                Ok(Box::new(FfmpegVideoDecoder::new(
                    stream.index,
                    decoder,
                    VideoConverter::new(width, height, pixel_format),
                )))
            }
        }
    }
}
