//! FFmpeg-backed per-stream decoders.

use ffmpeg_next as ffmpeg;
use tracing::warn;

use crate::error::DecodeError;
use crate::media::backend::Decoder;
use crate::media::ffmpeg::convert::{copy_planes, AudioConverter, VideoConverter};
use crate::media::types::{CompressedUnit, DecodedFrame};

fn to_packet(unit: &CompressedUnit) -> ffmpeg::Packet {
    let mut packet = ffmpeg::Packet::copy(&unit.data);
    packet.set_stream(unit.stream_index);
    packet.set_pts(unit.pts);
    packet.set_dts(unit.dts);
    packet.set_duration(unit.duration);
    if unit.is_key {
        packet.set_flags(ffmpeg::packet::Flags::KEY);
    }
    packet
}

fn is_again(error: &ffmpeg::Error) -> bool {
    matches!(error, ffmpeg::Error::Other { errno } if *errno == ffmpeg::error::EAGAIN)
}

pub struct FfmpegVideoDecoder {
    stream_index: usize,
    decoder: ffmpeg::decoder::Video,
    converter: VideoConverter,
}

// Codec and scaler contexts are only ever touched by the owning decode thread
unsafe impl Send for FfmpegVideoDecoder {}

impl FfmpegVideoDecoder {
    pub fn new(stream_index: usize, decoder: ffmpeg::decoder::Video, converter: VideoConverter) -> Self {
        Self {
            stream_index,
            decoder,
            converter,
        }
    }

    fn receive(&mut self) -> Result<Vec<DecodedFrame>, DecodeError> {
        let mut frames = Vec::new();
        let mut frame = ffmpeg::frame::Video::empty();
        loop {
            match self.decoder.receive_frame(&mut frame) {
                Ok(()) => {
                    let image = match self.converter.convert(&frame) {
                        Ok(image) => image,
                        Err(e) => {
                            warn!(stream = self.stream_index, "{e}, passing frame through");
                            copy_planes(&frame)
                        }
                    };
                    let pts = frame.timestamp().or_else(|| frame.pts());
                    frames.push(DecodedFrame::video(self.stream_index, pts, image));
                }
                Err(ffmpeg::Error::Eof) => break,
                Err(e) if is_again(&e) => break,
                Err(e) => return Err(DecodeError::Backend(e.to_string())),
            }
        }
        Ok(frames)
    }
}

impl Decoder for FfmpegVideoDecoder {
    fn decode(&mut self, unit: &CompressedUnit) -> Result<Vec<DecodedFrame>, DecodeError> {
        self.decoder
            .send_packet(&to_packet(unit))
            .map_err(|e| DecodeError::Corrupt {
                stream: self.stream_index,
                reason: e.to_string(),
            })?;
        self.receive()
    }

    fn flush(&mut self) {
        self.decoder.flush();
    }

    fn drain(&mut self) -> Result<Vec<DecodedFrame>, DecodeError> {
        self.decoder
            .send_eof()
            .map_err(|e| DecodeError::Backend(e.to_string()))?;
        self.receive()
    }
}

pub struct FfmpegAudioDecoder {
    stream_index: usize,
    decoder: ffmpeg::decoder::Audio,
    converter: AudioConverter,
}

// Codec and resampler contexts are only ever touched by the owning decode thread
unsafe impl Send for FfmpegAudioDecoder {}

impl FfmpegAudioDecoder {
    pub fn new(stream_index: usize, decoder: ffmpeg::decoder::Audio, converter: AudioConverter) -> Self {
        Self {
            stream_index,
            decoder,
            converter,
        }
    }

    fn receive(&mut self) -> Result<Vec<DecodedFrame>, DecodeError> {
        let mut frames = Vec::new();
        let mut frame = ffmpeg::frame::Audio::empty();
        loop {
            match self.decoder.receive_frame(&mut frame) {
                Ok(()) => match self.converter.convert(&frame) {
                    Ok(samples) if samples.samples > 0 => {
                        let pts = frame.timestamp().or_else(|| frame.pts());
                        frames.push(DecodedFrame::audio(self.stream_index, pts, samples));
                    }
                    // Resampler still buffering
                    Ok(_) => {}
                    Err(e) => warn!(stream = self.stream_index, "{e}, dropping audio frame"),
                },
                Err(ffmpeg::Error::Eof) => break,
                Err(e) if is_again(&e) => break,
                Err(e) => return Err(DecodeError::Backend(e.to_string())),
            }
        }
        Ok(frames)
    }
}

impl Decoder for FfmpegAudioDecoder {
    fn decode(&mut self, unit: &CompressedUnit) -> Result<Vec<DecodedFrame>, DecodeError> {
        self.decoder
            .send_packet(&to_packet(unit))
            .map_err(|e| DecodeError::Corrupt {
                stream: self.stream_index,
                reason: e.to_string(),
            })?;
        self.receive()
    }

    fn flush(&mut self) {
        self.decoder.flush();
        self.converter.reset();
    }

    fn drain(&mut self) -> Result<Vec<DecodedFrame>, DecodeError> {
        self.decoder
            .send_eof()
            .map_err(|e| DecodeError::Backend(e.to_string()))?;
        self.receive()
    }
}
