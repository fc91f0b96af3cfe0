//! Playback controller.
//!
//! Owns the player lifecycle: validates configuration, opens a source and
//! its decoders, starts the read/decode/render threads and tears them down
//! again. Every public operation runs on the caller's thread; the worker
//! threads only see [`PipelineShared`] flags and their queues.

use std::fmt::Write as _;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::atomic::AtomicCell;
use tracing::{debug, error, info, warn};

use crate::audio::feeder::{AudioControls, AudioFeeder};
use crate::config::PlayerConfig;
use crate::core::time::{self, Time};
use crate::error::{ConfigError, OpenError, PlayerError, SeekError};
use crate::media::backend::{AudioOutput, Decoder, MediaBackend, MediaSource, VideoSink};
use crate::media::types::{MediaKind, StreamInfo};
use crate::pipeline::decode_loop::{DecodeLoop, DecodePolicy};
use crate::pipeline::read_loop::ReadLoop;
use crate::pipeline::shared::{PipelineShared, StreamSlot};
use crate::playback::render::Presenter;
use crate::playback::state::{PlayerState, SharedStatus};

/// Poll interval of the render thread and of `wait_for_end`
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// One opened source and the threads serving it
struct Session {
    url: String,
    shared: Arc<PipelineShared>,
    audio: Option<Arc<StreamSlot>>,
    video: Option<Arc<StreamSlot>>,
    duration: Option<Time>, // nanoseconds
    /// Position frozen by `pause()`
    paused_at: Option<Time>,
    audio_open: bool,
    reader: Option<JoinHandle<()>>,
    decoders: Vec<JoinHandle<()>>,
    render: Option<JoinHandle<Option<Box<dyn VideoSink>>>>,
}

impl Session {
    fn slots(&self) -> impl Iterator<Item = &Arc<StreamSlot>> {
        self.audio.iter().chain(self.video.iter())
    }

    /// Position of the preferred clock: audio when present, else video
    fn clock_position(&self) -> Option<Time> {
        self.audio
            .as_ref()
            .and_then(|slot| slot.clock.nanos())
            .or_else(|| self.video.as_ref().and_then(|slot| slot.clock.nanos()))
    }
}

/// Drives one media source through the player state machine
pub struct PlaybackController {
    backend: Box<dyn MediaBackend>,
    audio_output: Option<Box<dyn AudioOutput>>,
    /// Parked here while no render thread owns it
    video_sink: Option<Box<dyn VideoSink>>,
    config: Option<PlayerConfig>,
    status: Arc<SharedStatus>,
    controls: Arc<AudioControls>,
    speed: Arc<AtomicCell<f32>>,
    session: Option<Session>,
}

impl PlaybackController {
    pub fn new(backend: Box<dyn MediaBackend>) -> Self {
        Self {
            backend,
            audio_output: None,
            video_sink: None,
            config: None,
            status: Arc::new(SharedStatus::new()),
            controls: Arc::new(AudioControls::new(1.0, false)),
            speed: Arc::new(AtomicCell::new(1.0)),
            session: None,
        }
    }

    pub fn with_audio_output(mut self, output: Box<dyn AudioOutput>) -> Self {
        self.audio_output = Some(output);
        self
    }

    pub fn with_video_sink(mut self, sink: Box<dyn VideoSink>) -> Self {
        self.video_sink = Some(sink);
        self
    }

    // ---- lifecycle ----

    /// Accept a configuration. Allowed whenever no source is open.
    pub fn init(&mut self, config: PlayerConfig) -> Result<(), PlayerError> {
        let state = self.state();
        if state.has_source() || state == PlayerState::Opening {
            return Err(self.invalid("init", state));
        }

        if let Err(e) = config.validate() {
            self.status.mark_broken(&e);
            return Err(e.into());
        }

        self.controls.set_volume(config.audio.volume);
        self.controls.set_muted(config.audio.muted);
        self.speed.store(config.speed);
        self.config = Some(config);
        self.status.clear_error();
        self.status.set(PlayerState::Initialized);
        info!("player initialized");
        Ok(())
    }

    /// Open `url`, select at most one audio and one video stream and start
    /// the pipeline threads. Any source already open is closed first.
    pub fn open(&mut self, url: &str) -> Result<(), PlayerError> {
        if self.session.is_some() {
            self.close();
        }
        let state = self.state();
        let config = match (&self.config, state) {
            (Some(config), PlayerState::Initialized | PlayerState::Ended | PlayerState::Broken) => {
                config.clone()
            }
            _ => return Err(self.invalid("open", state)),
        };

        self.status.clear_error();
        self.status.set(PlayerState::Opening);
        info!(url, "opening source");

        match self.start_session(url, &config) {
            Ok(session) => {
                info!(
                    url,
                    audio = session.audio.is_some(),
                    video = session.video.is_some(),
                    duration_ms = session.duration.map(time::to_millis),
                    "source ready"
                );
                self.session = Some(session);
                self.status.set(PlayerState::Ready);
            }
            Err(e) => {
                self.status.mark_broken(&e);
                return Err(e.into());
            }
        }

        if config.play_after_ready {
            self.play()?;
        }
        Ok(())
    }

    fn start_session(&mut self, url: &str, config: &PlayerConfig) -> Result<Session, OpenError> {
        let source = self.backend.open(url)?;
        let streams = source.streams();

        let audio_info = config
            .enable_audio
            .then(|| select_stream(&streams, MediaKind::Audio))
            .flatten();
        let video_info = config
            .enable_video
            .then(|| select_stream(&streams, MediaKind::Video))
            .flatten();
        if audio_info.is_none() && video_info.is_none() {
            return Err(OpenError::NoStream(url.to_string()));
        }
        if video_info.is_some() && self.video_sink.is_none() {
            return Err(OpenError::VideoSurface("no video sink attached".to_string()));
        }
        if audio_info.is_some() && self.audio_output.is_none() {
            return Err(OpenError::AudioDevice("no audio output attached".to_string()));
        }

        // Decoders first: nothing is running yet if one fails
        let queues = &config.queues;
        let audio = match audio_info {
            Some(info) => {
                let decoder = source.open_decoder(&info, config.audio_target())?;
                debug!(stream = info.index, codec = %info.codec_name, "audio decoder opened");
                let slot = StreamSlot::new(info, queues.audio_packets, queues.audio_frames);
                Some((Arc::new(slot), decoder))
            }
            None => None,
        };
        let video = match video_info {
            Some(info) => {
                let decoder = source.open_decoder(&info, config.video_target())?;
                debug!(stream = info.index, codec = %info.codec_name, "video decoder opened");
                let slot = StreamSlot::new(info, queues.video_packets, queues.video_frames);
                Some((Arc::new(slot), decoder))
            }
            None => None,
        };

        let shared = Arc::new(PipelineShared::new(self.status.clone()));
        let duration = source.duration();
        let mut session = Session {
            url: url.to_string(),
            shared: shared.clone(),
            audio: audio.as_ref().map(|(slot, _)| slot.clone()),
            video: video.as_ref().map(|(slot, _)| slot.clone()),
            duration,
            paused_at: None,
            audio_open: false,
            reader: None,
            decoders: Vec::new(),
            render: None,
        };
        for slot in session.slots() {
            slot.open();
        }

        if let Err(e) = self.spawn_pipeline(&mut session, source, audio, video, config) {
            self.teardown(session);
            return Err(e);
        }
        Ok(session)
    }

    fn spawn_pipeline(
        &mut self,
        session: &mut Session,
        source: Box<dyn MediaSource>,
        audio: Option<(Arc<StreamSlot>, Box<dyn Decoder>)>,
        video: Option<(Arc<StreamSlot>, Box<dyn Decoder>)>,
        config: &PlayerConfig,
    ) -> Result<(), OpenError> {
        if let Some(slot) = &session.audio {
            let format = config.audio_format();
            let feeder = AudioFeeder::new(
                slot.clone(),
                self.controls.clone(),
                format.sample_format,
                config.queues.staging_bytes,
            );
            if let Some(output) = self.audio_output.as_mut() {
                output.open(format, feeder)?;
                session.audio_open = true;
            }
        }

        let policy = DecodePolicy {
            max_consecutive_errors: config.decode.max_consecutive_errors,
            poll: POLL_INTERVAL,
        };
        for (slot, decoder) in audio.into_iter().chain(video) {
            let name = match slot.kind() {
                MediaKind::Audio => "audio-decode",
                MediaKind::Video => "video-decode",
            };
            let decode_loop = DecodeLoop::new(slot, decoder, session.shared.clone(), policy);
            let handle = thread::Builder::new()
                .name(name.to_string())
                .spawn(move || decode_loop.run())
                .map_err(|e| OpenError::Thread(name, e.to_string()))?;
            session.decoders.push(handle);
        }

        let slots = session.slots().cloned().collect();
        let read_loop = ReadLoop::new(source, slots, session.shared.clone(), config.read_wait());
        let handle = thread::Builder::new()
            .name("read".to_string())
            .spawn(move || read_loop.run())
            .map_err(|e| OpenError::Thread("read", e.to_string()))?;
        session.reader = Some(handle);
        Ok(())
    }

    /// Start or resume presentation
    pub fn play(&mut self) -> Result<(), PlayerError> {
        let state = self.state();
        match state {
            PlayerState::Playing => return Ok(()),
            PlayerState::Paused => return self.replay(),
            PlayerState::Ready => {}
            _ => return Err(self.invalid("play", state)),
        }

        let frame_rate = self.frame_rate();
        let Some(session) = self.session.as_mut() else {
            return Err(self.invalid("play", state));
        };
        session.shared.set_paused(false);
        if session.audio_open {
            if let Some(output) = self.audio_output.as_mut() {
                if let Err(e) = output.set_paused(false) {
                    self.status.record_error(&e);
                    return Err(e.into());
                }
            }
        }

        self.status.set(PlayerState::Playing);
        if session.render.is_none() {
            let presenter = Presenter::new(
                session.video.clone(),
                session.audio.clone(),
                self.controls.clone(),
                session.video.as_ref().and_then(|_| self.video_sink.take()),
                session.shared.clone(),
                frame_rate,
                self.speed.clone(),
                POLL_INTERVAL,
            );
            let handle = thread::Builder::new()
                .name("render".to_string())
                .spawn(move || presenter.run())
                .map_err(|e| OpenError::Thread("render", e.to_string()))?;
            session.render = Some(handle);
        }
        info!(url = %session.url, "playing");
        Ok(())
    }

    /// Freeze presentation and read-ahead at the current position
    pub fn pause(&mut self) -> Result<(), PlayerError> {
        let state = self.state();
        if state == PlayerState::Paused {
            return Ok(());
        }
        if state != PlayerState::Playing {
            return Err(self.invalid("pause", state));
        }
        let Some(session) = self.session.as_mut() else {
            return Err(self.invalid("pause", state));
        };

        let position = session.clock_position();
        session.paused_at = position;
        session.shared.set_paused(true);
        if session.audio_open {
            if let Some(output) = self.audio_output.as_mut() {
                if let Err(e) = output.set_paused(true) {
                    warn!("failed to pause audio device: {e}");
                    self.status.record_error(&e);
                }
            }
        }
        if !self.status.transition(PlayerState::Playing, PlayerState::Paused) {
            // Reached the end while pausing
            return Err(self.invalid("pause", self.state()));
        }
        info!(position_ms = position.map(time::to_millis), "paused");
        Ok(())
    }

    /// Resume from `Paused` only
    pub fn replay(&mut self) -> Result<(), PlayerError> {
        let state = self.state();
        if state != PlayerState::Paused {
            return Err(self.invalid("replay", state));
        }
        let Some(session) = self.session.as_mut() else {
            return Err(self.invalid("replay", state));
        };

        if session.audio_open {
            if let Some(output) = self.audio_output.as_mut() {
                if let Err(e) = output.set_paused(false) {
                    self.status.record_error(&e);
                    return Err(e.into());
                }
            }
        }
        session.paused_at = None;
        session.shared.set_paused(false);
        self.status.transition(PlayerState::Paused, PlayerState::Playing);
        info!("resumed");
        Ok(())
    }

    /// Request a seek to `position_ms`.
    ///
    /// Returns `Ok(true)` when the request was recorded for the read loop and
    /// `Ok(false)` when an earlier request is still pending, in which case
    /// this one is dropped.
    pub fn seek(&mut self, position_ms: i64) -> Result<bool, PlayerError> {
        let result = self.request_seek(position_ms);
        if let Err(e) = &result {
            warn!("seek to {position_ms}ms dropped: {e}");
            self.status.record_error(e);
        }
        Ok(result?)
    }

    fn request_seek(&mut self, position_ms: i64) -> Result<bool, SeekError> {
        if !self.state().has_source() {
            return Err(SeekError::NotOpen);
        }
        let session = self.session.as_mut().ok_or(SeekError::NotOpen)?;

        let duration_ms = session.duration.map(time::to_millis);
        let in_range = match duration_ms {
            Some(duration_ms) => (0..duration_ms).contains(&position_ms),
            None => position_ms >= 0,
        };
        if !in_range {
            return Err(SeekError::OutOfRange {
                target_ms: position_ms,
                duration_ms: duration_ms.unwrap_or(0),
            });
        }
        if session.shared.is_finished() {
            return Err(SeekError::Exhausted);
        }

        let target = time::from_millis(position_ms);
        if !session.shared.request_seek(target) {
            debug!(target_ms = position_ms, "seek already pending, request ignored");
            return Ok(false);
        }
        if session.paused_at.is_some() {
            session.paused_at = Some(target);
        }
        session.shared.notify_read();
        info!(target_ms = position_ms, "seek requested");
        Ok(true)
    }

    /// Stop every thread, release the source and move to `Ended`
    pub fn close(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        let url = session.url.clone();
        self.teardown(session);
        self.status.set(PlayerState::Ended);
        info!(url = %url, "source closed");
    }

    /// Close any open source and go back to `Initialized`
    pub fn destroy(&mut self) {
        self.close();
        if self.config.is_some() {
            self.status.set(PlayerState::Initialized);
        }
    }

    fn teardown(&mut self, mut session: Session) {
        session.shared.shut_down();
        // Close and flush before joining, or a loop can stay blocked on a queue
        for slot in session.slots() {
            slot.close();
        }
        if session.audio_open {
            if let Some(output) = self.audio_output.as_mut() {
                output.close();
            }
        }

        if let Some(handle) = session.reader.take() {
            if handle.join().is_err() {
                error!("read thread panicked");
            }
        }
        for handle in session.decoders.drain(..) {
            if handle.join().is_err() {
                error!("decode thread panicked");
            }
        }
        if let Some(handle) = session.render.take() {
            match handle.join() {
                Ok(Some(sink)) => self.video_sink = Some(sink),
                Ok(None) => {}
                Err(_) => error!("render thread panicked"),
            }
        }

        for slot in session.slots() {
            slot.clock.reset();
        }
        debug!(url = %session.url, "pipeline torn down");
    }

    /// Block until playback reaches `Ended` or `Broken`, or `timeout` passes.
    /// Returns the state observed last.
    pub fn wait_for_end(&self, timeout: Duration) -> PlayerState {
        let deadline = Instant::now() + timeout;
        loop {
            let state = self.state();
            let done = matches!(state, PlayerState::Ended | PlayerState::Broken);
            if done || Instant::now() >= deadline {
                return state;
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    // ---- queries ----

    pub fn state(&self) -> PlayerState {
        self.status.state()
    }

    pub fn last_error(&self) -> Option<String> {
        self.status.last_error()
    }

    pub fn is_playing(&self) -> bool {
        self.state().is_playing()
    }

    pub fn is_paused(&self) -> bool {
        self.state().is_paused()
    }

    /// Current position in milliseconds, `None` before the first frame
    pub fn current_position_ms(&self) -> Option<i64> {
        let session = self.session.as_ref()?;
        session
            .paused_at
            .or_else(|| session.clock_position())
            .map(time::to_millis)
    }

    pub fn total_duration_ms(&self) -> Option<i64> {
        self.session.as_ref()?.duration.map(time::to_millis)
    }

    pub fn is_av_both(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.audio.is_some() && s.video.is_some())
    }

    pub fn is_video_only(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.audio.is_none() && s.video.is_some())
    }

    pub fn is_audio_only(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.audio.is_some() && s.video.is_none())
    }

    // ---- live controls ----

    pub fn mute(&self) {
        self.controls.set_muted(true);
    }

    pub fn unmute(&self) {
        self.controls.set_muted(false);
    }

    pub fn is_muted(&self) -> bool {
        self.controls.is_muted()
    }

    pub fn set_volume(&mut self, volume: f32) -> Result<(), PlayerError> {
        if !(volume > 0.0) {
            return Err(ConfigError::Volume(volume).into());
        }
        self.controls.set_volume(volume);
        if let Some(config) = self.config.as_mut() {
            config.audio.volume = volume;
        }
        Ok(())
    }

    pub fn volume(&self) -> f32 {
        self.controls.volume()
    }

    pub fn set_speed(&mut self, speed: f32) -> Result<(), PlayerError> {
        if !(speed > 0.0) {
            return Err(ConfigError::Speed(speed).into());
        }
        self.speed.store(speed);
        if let Some(config) = self.config.as_mut() {
            config.speed = speed;
        }
        Ok(())
    }

    pub fn speed(&self) -> f32 {
        self.speed.load()
    }

    /// Underruns counted by the audio pull path since construction
    pub fn audio_underruns(&self) -> u64 {
        self.controls.underruns()
    }

    /// One-line diagnostic summary
    pub fn dump(&self) -> String {
        let mut out = format!("state={}", self.state());
        if let Some(session) = &self.session {
            let _ = write!(out, " url={}", session.url);
            for slot in session.slots() {
                let _ = write!(
                    out,
                    " {}[#{} {} pkts={}/{} frames={}/{} clock={} epoch={}]",
                    slot.kind().as_str(),
                    slot.index(),
                    slot.info.codec_name,
                    slot.packets.size(),
                    slot.packets.capacity(),
                    slot.frames.size(),
                    slot.frames.capacity(),
                    slot.clock
                        .nanos()
                        .map_or_else(|| "-".to_string(), time::format_time),
                    slot.packets.epoch(),
                );
            }
            let _ = write!(
                out,
                " finished={} position_ms={}",
                session.shared.is_finished(),
                self.current_position_ms()
                    .map_or_else(|| "-".to_string(), |ms| ms.to_string()),
            );
        }
        let _ = write!(
            out,
            " volume={} muted={} speed={} underruns={}",
            self.volume(),
            self.is_muted(),
            self.speed(),
            self.audio_underruns()
        );
        if let Some(error) = self.last_error() {
            let _ = write!(out, " last_error=\"{error}\"");
        }
        out
    }

    fn frame_rate(&self) -> f64 {
        let declared = self
            .session
            .as_ref()
            .and_then(|s| s.video.as_ref())
            .and_then(|slot| slot.info.frame_rate)
            .map(|rate| rate.as_f64())
            .filter(|rate| *rate > 0.0);
        let fallback = self.config.as_ref().map_or(30, |c| c.video.frame_rate) as f64;
        declared.unwrap_or(fallback)
    }

    fn invalid(&self, action: &'static str, state: PlayerState) -> PlayerError {
        PlayerError::InvalidState {
            action,
            state: state.as_str(),
        }
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        self.close();
    }
}

/// First stream of the requested kind
fn select_stream(streams: &[StreamInfo], kind: MediaKind) -> Option<StreamInfo> {
    streams.iter().find(|s| s.kind == kind).cloned()
}
