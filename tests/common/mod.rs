//! Scripted in-memory collaborators for driving the player in tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use avsync::audio::AudioFeeder;
use avsync::core::time::{Time, TimeBase};
use avsync::error::{DecodeError, OpenError, ReadError, SeekError};
use avsync::media::{
    AudioFormat, AudioOutput, AudioSamples, CompressedUnit, DecodedFrame, Decoder, MediaBackend,
    MediaKind, MediaSource, OutputTarget, PixelFormat, Plane, StreamInfo, VideoImage, VideoSink,
};

pub const AUDIO: usize = 0;
pub const VIDEO: usize = 1;

/// Payload that makes the fake decoders fail the unit
pub const CORRUPT: &[u8] = b"corrupt";

pub fn audio_stream() -> StreamInfo {
    StreamInfo {
        index: AUDIO,
        kind: MediaKind::Audio,
        time_base: TimeBase::MILLIS,
        frame_rate: None,
        duration: None,
        codec_name: "pcm".to_string(),
    }
}

/// Video stream counting pts in frames at `fps`
pub fn video_stream(fps: i32) -> StreamInfo {
    StreamInfo {
        index: VIDEO,
        kind: MediaKind::Video,
        time_base: TimeBase::new(1, fps),
        frame_rate: Some(TimeBase::new(fps, 1)),
        duration: None,
        codec_name: "raw".to_string(),
    }
}

/// `count` video units with pts 0..count
pub fn video_units(count: i64) -> Vec<CompressedUnit> {
    (0..count)
        .map(|pts| CompressedUnit::new(VIDEO, vec![pts as u8; 4], Some(pts)))
        .collect()
}

/// Interleave `count` 10ms audio units between the given video units
pub fn with_audio(video: Vec<CompressedUnit>, count: i64, bytes: usize) -> Vec<CompressedUnit> {
    let mut units = Vec::new();
    let mut video = video.into_iter();
    for i in 0..count {
        units.push(CompressedUnit::new(AUDIO, vec![1; bytes], Some(i * 10)));
        if let Some(unit) = video.next() {
            units.push(unit);
        }
    }
    units.extend(video);
    units
}

/// What the scripted source saw
#[derive(Default)]
pub struct SourceLog {
    pub seeks: Mutex<Vec<Time>>,
    pub reads: AtomicUsize,
    pub decoders_opened: Mutex<Vec<(usize, OutputTarget)>>,
}

#[derive(Clone)]
pub struct ScriptedBackend {
    pub streams: Vec<StreamInfo>,
    pub units: Vec<CompressedUnit>,
    pub duration: Option<Time>,
    /// Stream index whose decoder refuses to open
    pub failing_decoder: Option<usize>,
    /// Video decoder holds one frame back until drained
    pub buffered_video: bool,
    /// Frames each video unit decodes into; unit pts `p` yields
    /// `p * n .. p * n + n`
    pub video_frames_per_unit: usize,
    /// Reads that fail before the script is served
    pub failing_reads: usize,
    /// Held by a test to stall the read loop inside `seek` (after logging it)
    pub seek_gate: Arc<Mutex<()>>,
    pub log: Arc<SourceLog>,
}

impl ScriptedBackend {
    pub fn new(streams: Vec<StreamInfo>, units: Vec<CompressedUnit>) -> Self {
        Self {
            streams,
            units,
            duration: None,
            failing_decoder: None,
            buffered_video: false,
            video_frames_per_unit: 1,
            failing_reads: 0,
            seek_gate: Arc::new(Mutex::new(())),
            log: Arc::new(SourceLog::default()),
        }
    }
}

impl MediaBackend for ScriptedBackend {
    fn open(&self, url: &str) -> Result<Box<dyn MediaSource>, OpenError> {
        if url.starts_with("missing:") {
            return Err(OpenError::Source {
                url: url.to_string(),
                reason: "not found".to_string(),
            });
        }
        Ok(Box::new(ScriptedSource {
            script: self.clone(),
            position: 0,
        }))
    }
}

pub struct ScriptedSource {
    script: ScriptedBackend,
    position: usize,
}

impl MediaSource for ScriptedSource {
    fn streams(&self) -> Vec<StreamInfo> {
        self.script.streams.clone()
    }

    fn duration(&self) -> Option<Time> {
        self.script.duration
    }

    fn read_unit(&mut self) -> Result<Option<CompressedUnit>, ReadError> {
        let read = self.script.log.reads.fetch_add(1, Ordering::Relaxed);
        if read < self.script.failing_reads {
            return Err(ReadError("connection reset".to_string()));
        }
        let unit = self.script.units.get(self.position).cloned();
        self.position += 1;
        Ok(unit)
    }

    fn seek(&mut self, target: Time) -> Result<(), SeekError> {
        self.script.log.seeks.lock().push(target);
        let _gate = self.script.seek_gate.lock();

        let streams = &self.script.streams;
        self.position = self
            .script
            .units
            .iter()
            .position(|unit| {
                let tb = streams
                    .iter()
                    .find(|s| s.index == unit.stream_index)
                    .map_or(TimeBase::MILLIS, |s| s.time_base);
                unit.pts.is_some_and(|pts| tb.ticks_to_nanos(pts) >= target)
            })
            .unwrap_or(self.script.units.len());
        Ok(())
    }

    fn open_decoder(
        &self,
        stream: &StreamInfo,
        target: OutputTarget,
    ) -> Result<Box<dyn Decoder>, OpenError> {
        if self.script.failing_decoder == Some(stream.index) {
            return Err(OpenError::Decoder {
                kind: stream.kind.as_str(),
                reason: "unsupported codec".to_string(),
            });
        }
        self.script
            .log
            .decoders_opened
            .lock()
            .push((stream.index, target));
        let video = stream.kind == MediaKind::Video;
        Ok(Box::new(FakeDecoder {
            target,
            hold_back: video && self.script.buffered_video,
            burst: if video { self.script.video_frames_per_unit.max(1) } else { 1 },
            held: None,
        }))
    }
}

/// Turns each unit into one frame; audio units carry raw PCM bytes
pub struct FakeDecoder {
    target: OutputTarget,
    hold_back: bool,
    burst: usize,
    held: Option<DecodedFrame>,
}

impl FakeDecoder {
    fn frame(&self, unit: &CompressedUnit) -> DecodedFrame {
        match self.target {
            OutputTarget::Audio(format) => DecodedFrame::audio(
                unit.stream_index,
                unit.pts,
                AudioSamples {
                    data: unit.data.clone(),
                    format,
                    samples: unit.data.len() / format.bytes_per_frame().max(1),
                },
            ),
            OutputTarget::Video {
                width,
                height,
                pixel_format,
            } => DecodedFrame::video(
                unit.stream_index,
                unit.pts,
                VideoImage {
                    width,
                    height,
                    format: pixel_format.or(Some(PixelFormat::Rgba)),
                    planes: vec![Plane {
                        data: unit.data.clone(),
                        stride: unit.data.len(),
                    }],
                },
            ),
        }
    }
}

impl Decoder for FakeDecoder {
    fn decode(&mut self, unit: &CompressedUnit) -> Result<Vec<DecodedFrame>, DecodeError> {
        if unit.data == CORRUPT {
            return Err(DecodeError::Corrupt {
                stream: unit.stream_index,
                reason: "bad bitstream".to_string(),
            });
        }
        if self.burst > 1 {
            let n = self.burst as i64;
            return Ok((0..n)
                .map(|k| {
                    let mut frame = self.frame(unit);
                    frame.pts = unit.pts.map(|pts| pts * n + k);
                    frame
                })
                .collect());
        }
        let frame = self.frame(unit);
        if self.hold_back {
            Ok(self.held.replace(frame).into_iter().collect())
        } else {
            Ok(vec![frame])
        }
    }

    fn flush(&mut self) {
        self.held = None;
    }

    fn drain(&mut self) -> Result<Vec<DecodedFrame>, DecodeError> {
        Ok(self.held.take().into_iter().collect())
    }
}

/// Records the pts of every presented frame
#[derive(Clone, Default)]
pub struct RecordingSink {
    pub presented: Arc<Mutex<Vec<Option<i64>>>>,
}

impl RecordingSink {
    pub fn count(&self) -> usize {
        self.presented.lock().len()
    }
}

impl VideoSink for RecordingSink {
    fn present(&mut self, frame: &DecodedFrame) {
        self.presented.lock().push(frame.pts);
    }
}

#[derive(Default)]
pub struct AudioLog {
    pub opened: Mutex<Option<AudioFormat>>,
    pub pauses: Mutex<Vec<bool>>,
    pub closes: AtomicUsize,
    pub bytes_pulled: AtomicUsize,
}

/// Audio device stand-in: a thread pulls from the feeder while unpaused
pub struct RecordingAudioOutput {
    pub log: Arc<AudioLog>,
    paused: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    puller: Option<JoinHandle<()>>,
}

impl RecordingAudioOutput {
    pub fn new() -> (Self, Arc<AudioLog>) {
        let log = Arc::new(AudioLog::default());
        let output = Self {
            log: log.clone(),
            paused: Arc::new(AtomicBool::new(true)),
            running: Arc::new(AtomicBool::new(false)),
            puller: None,
        };
        (output, log)
    }
}

impl AudioOutput for RecordingAudioOutput {
    fn open(&mut self, format: AudioFormat, mut feeder: AudioFeeder) -> Result<(), OpenError> {
        *self.log.opened.lock() = Some(format);
        self.paused.store(true, Ordering::SeqCst);
        self.running.store(true, Ordering::SeqCst);

        let paused = self.paused.clone();
        let running = self.running.clone();
        let log = self.log.clone();
        self.puller = Some(thread::spawn(move || {
            let mut buffer = vec![0u8; 1024];
            while running.load(Ordering::SeqCst) {
                if !paused.load(Ordering::SeqCst) {
                    feeder.fill(&mut buffer);
                    log.bytes_pulled.fetch_add(buffer.len(), Ordering::Relaxed);
                }
                thread::sleep(Duration::from_millis(2));
            }
        }));
        Ok(())
    }

    fn set_paused(&mut self, paused: bool) -> Result<(), OpenError> {
        self.paused.store(paused, Ordering::SeqCst);
        self.log.pauses.lock().push(paused);
        Ok(())
    }

    fn close(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.puller.take() {
            let _ = handle.join();
        }
        self.log.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Poll `condition` until it holds or `timeout` passes
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}
