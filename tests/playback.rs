//! End-to-end controller tests over the scripted backend.

mod common;

use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use avsync::core::time;
use avsync::error::{ConfigError, OpenError, SeekError};
use avsync::media::{AudioFormat, SampleFormat};
use avsync::{PlaybackController, PlayerConfig, PlayerError, PlayerState};

use common::*;

const END: Duration = Duration::from_secs(10);

fn controller(backend: &ScriptedBackend) -> (PlaybackController, RecordingSink, std::sync::Arc<AudioLog>) {
    let sink = RecordingSink::default();
    let (output, audio_log) = RecordingAudioOutput::new();
    let controller = PlaybackController::new(Box::new(backend.clone()))
        .with_audio_output(Box::new(output))
        .with_video_sink(Box::new(sink.clone()));
    (controller, sink, audio_log)
}

fn video_only_config() -> PlayerConfig {
    PlayerConfig {
        enable_audio: false,
        ..PlayerConfig::default()
    }
}

#[test]
fn test_video_only_never_opens_audio() {
    let backend = ScriptedBackend::new(
        vec![audio_stream(), video_stream(100)],
        with_audio(video_units(20), 20, 800),
    );
    let (mut controller, sink, audio_log) = controller(&backend);
    controller.init(video_only_config()).unwrap();

    let started = Instant::now();
    controller.open("clip.mp4").unwrap();
    assert!(controller.is_video_only());
    assert!(!controller.is_audio_only());
    assert!(!controller.is_av_both());

    assert_eq!(controller.wait_for_end(END), PlayerState::Ended);
    // Free-running at 100 fps against the wall clock
    assert!(started.elapsed() >= Duration::from_millis(100));

    let presented = sink.presented.lock().clone();
    assert_eq!(presented, (0..20).map(Some).collect::<Vec<_>>());
    assert!(audio_log.opened.lock().is_none());
    let opened = backend.log.decoders_opened.lock();
    assert_eq!(opened.len(), 1);
    assert_eq!(opened[0].0, VIDEO);
}

#[test]
fn test_audio_and_video_play_to_end() {
    let backend = ScriptedBackend::new(
        vec![audio_stream(), video_stream(100)],
        with_audio(video_units(20), 20, 800),
    );
    let (mut controller, sink, audio_log) = controller(&backend);
    controller.init(PlayerConfig::default()).unwrap();
    controller.open("clip.mp4").unwrap();
    assert!(controller.is_av_both());
    assert_eq!(
        *audio_log.opened.lock(),
        Some(AudioFormat {
            sample_rate: 44_100,
            channels: 2,
            sample_format: SampleFormat::F32,
        })
    );

    assert_eq!(controller.wait_for_end(END), PlayerState::Ended);
    assert_eq!(sink.count(), 20);
    assert!(audio_log.bytes_pulled.load(Ordering::Relaxed) >= 20 * 800);
    // Position comes from the audio clock: last audio pts is 190ms
    assert_eq!(controller.current_position_ms(), Some(190));

    controller.close();
    assert_eq!(audio_log.closes.load(Ordering::SeqCst), 1);
    assert_eq!(controller.state(), PlayerState::Ended);
    assert!(controller.current_position_ms().is_none());
}

#[test]
fn test_audio_only_ends_after_staged_audio_is_consumed() {
    let units = with_audio(Vec::new(), 30, 2048);
    let backend = ScriptedBackend::new(vec![audio_stream()], units);
    let (mut controller, sink, audio_log) = controller(&backend);
    controller.init(PlayerConfig::default()).unwrap();
    controller.open("song.mp3").unwrap();
    assert!(controller.is_audio_only());

    assert_eq!(controller.wait_for_end(END), PlayerState::Ended);
    assert_eq!(sink.count(), 0);
    assert!(audio_log.bytes_pulled.load(Ordering::Relaxed) >= 30 * 2048);
}

#[test]
fn test_state_transitions() {
    let backend = ScriptedBackend::new(vec![video_stream(10)], video_units(100));
    let (mut controller, sink, _) = controller(&backend);
    assert_eq!(controller.state(), PlayerState::Uninitialized);

    let config = PlayerConfig {
        play_after_ready: false,
        ..video_only_config()
    };
    controller.init(config).unwrap();
    assert_eq!(controller.state(), PlayerState::Initialized);

    controller.open("clip.mp4").unwrap();
    assert_eq!(controller.state(), PlayerState::Ready);
    assert_eq!(
        controller.pause(),
        Err(PlayerError::InvalidState {
            action: "pause",
            state: "ready"
        })
    );
    assert!(controller.replay().is_err());
    assert!(controller.init(PlayerConfig::default()).is_err());

    controller.play().unwrap();
    assert!(controller.is_playing());
    assert!(wait_until(END, || sink.count() >= 1));

    controller.pause().unwrap();
    assert!(controller.is_paused());
    let position = controller.current_position_ms();
    assert!(position.is_some());
    let presented = sink.count();
    std::thread::sleep(Duration::from_millis(300));
    assert_eq!(controller.current_position_ms(), position);
    // At most the frame already being held when pause landed
    assert!(sink.count() <= presented + 1);

    controller.replay().unwrap();
    assert!(controller.is_playing());
    assert!(controller.replay().is_err());
    controller.play().unwrap();

    controller.close();
    assert_eq!(controller.state(), PlayerState::Ended);
    controller.destroy();
    assert_eq!(controller.state(), PlayerState::Initialized);

    // Reopen after destroy
    controller.open("clip.mp4").unwrap();
    assert_eq!(controller.state(), PlayerState::Ready);
}

#[test]
fn test_pause_pauses_audio_device() {
    let backend = ScriptedBackend::new(
        vec![audio_stream(), video_stream(10)],
        with_audio(video_units(50), 5000, 800),
    );
    let (mut controller, _, audio_log) = controller(&backend);
    controller.init(PlayerConfig::default()).unwrap();
    controller.open("clip.mp4").unwrap();
    assert!(controller.is_playing());

    controller.pause().unwrap();
    controller.replay().unwrap();
    assert_eq!(*audio_log.pauses.lock(), vec![false, true, false]);

    controller.close();
    assert_eq!(audio_log.closes.load(Ordering::SeqCst), 1);
}

#[test]
fn test_seek_first_pending_wins() {
    let mut backend = ScriptedBackend::new(vec![video_stream(10)], video_units(100));
    backend.duration = Some(time::from_millis(10_000));
    let (mut controller, sink, _) = controller(&backend);
    let mut config = video_only_config();
    config.queues.video_packets = 4;
    config.queues.video_frames = 4;
    controller.init(config).unwrap();
    controller.open("clip.mp4").unwrap();
    assert_eq!(controller.total_duration_ms(), Some(10_000));
    assert!(wait_until(END, || sink.count() >= 1));

    let gate = backend.seek_gate.lock();
    assert_eq!(controller.seek(5000), Ok(true));
    assert_eq!(controller.seek(7000), Ok(false));
    // Read loop is now inside the source seek, request still pending
    assert!(wait_until(END, || backend.log.seeks.lock().len() == 1));
    assert_eq!(controller.seek(6000), Ok(false));
    drop(gate);

    assert!(wait_until(END, || controller.dump().contains("epoch=1]")));
    assert_eq!(*backend.log.seeks.lock(), vec![time::from_millis(5000)]);
    assert!(wait_until(END, || sink
        .presented
        .lock()
        .last()
        .is_some_and(|pts| pts.is_some_and(|pts| pts >= 53))));
    assert!(!controller.dump().contains("epoch=2]"));
    // Once the target is on screen nothing from before the seek follows it
    let presented = sink.presented.lock().clone();
    let first = presented
        .iter()
        .position(|pts| pts.is_some_and(|pts| pts >= 50))
        .unwrap();
    assert_eq!(presented[first], Some(50));
    assert!(presented[first..].iter().all(|pts| pts.is_some_and(|pts| pts >= 50)));

    // Out of range requests are dropped and reported
    assert_eq!(
        controller.seek(10_000),
        Err(PlayerError::Seek(SeekError::OutOfRange {
            target_ms: 10_000,
            duration_ms: 10_000
        }))
    );
    assert!(controller.seek(-1).is_err());
    assert!(controller.last_error().unwrap().contains("outside"));
    assert!(controller.is_playing());

    controller.close();
    assert_eq!(
        controller.seek(1000),
        Err(PlayerError::Seek(SeekError::NotOpen))
    );
}

#[test]
fn test_missing_stream_breaks() {
    let backend = ScriptedBackend::new(vec![audio_stream()], with_audio(Vec::new(), 10, 800));
    let (mut controller, _, audio_log) = controller(&backend);
    controller.init(video_only_config()).unwrap();

    assert_eq!(
        controller.open("song.mp3"),
        Err(PlayerError::Open(OpenError::NoStream("song.mp3".to_string())))
    );
    assert_eq!(controller.state(), PlayerState::Broken);
    assert!(controller
        .last_error()
        .unwrap()
        .contains("No audio or video stream"));
    assert!(audio_log.opened.lock().is_none());
}

#[test]
fn test_open_failures_break_and_recover() {
    let mut backend = ScriptedBackend::new(
        vec![audio_stream(), video_stream(100)],
        with_audio(video_units(5), 5, 800),
    );
    backend.failing_decoder = Some(VIDEO);
    let (mut controller, _, audio_log) = controller(&backend);
    controller.init(PlayerConfig::default()).unwrap();

    assert!(matches!(
        controller.open("clip.mp4"),
        Err(PlayerError::Open(OpenError::Decoder { kind: "video", .. }))
    ));
    assert_eq!(controller.state(), PlayerState::Broken);
    // Decoders are opened before the device
    assert!(audio_log.opened.lock().is_none());

    assert!(matches!(
        controller.open("missing:clip.mp4"),
        Err(PlayerError::Open(OpenError::Source { .. }))
    ));
    assert_eq!(controller.state(), PlayerState::Broken);

    // Same backend, video disabled: the audio path still opens
    let config = PlayerConfig {
        enable_video: false,
        ..PlayerConfig::default()
    };
    controller.init(config).unwrap();
    controller.open("clip.mp4").unwrap();
    assert!(controller.is_audio_only());
    assert!(controller.last_error().is_none());
}

#[test]
fn test_video_without_sink_breaks() {
    let backend = ScriptedBackend::new(vec![video_stream(25)], video_units(5));
    let mut controller = PlaybackController::new(Box::new(backend));
    controller.init(video_only_config()).unwrap();
    assert!(matches!(
        controller.open("clip.mp4"),
        Err(PlayerError::Open(OpenError::VideoSurface(_)))
    ));
    assert_eq!(controller.state(), PlayerState::Broken);
}

#[test]
fn test_corrupt_units_are_skipped() {
    let mut units = video_units(10);
    units[3].data = CORRUPT.to_vec();
    units[4].data = CORRUPT.to_vec();
    let backend = ScriptedBackend::new(vec![video_stream(100)], units);
    let (mut controller, sink, _) = controller(&backend);
    controller.init(video_only_config()).unwrap();
    controller.open("clip.mp4").unwrap();

    assert_eq!(controller.wait_for_end(END), PlayerState::Ended);
    let presented = sink.presented.lock().clone();
    assert_eq!(
        presented,
        vec![0, 1, 2, 5, 6, 7, 8, 9].into_iter().map(Some).collect::<Vec<_>>()
    );
    assert!(controller.last_error().unwrap().contains("Corrupt unit"));
}

#[test]
fn test_repeated_decode_errors_escalate_when_configured() {
    let mut units = video_units(10);
    units[3].data = CORRUPT.to_vec();
    units[4].data = CORRUPT.to_vec();
    let backend = ScriptedBackend::new(vec![video_stream(100)], units);
    let (mut controller, _, _) = controller(&backend);
    let mut config = video_only_config();
    config.decode.max_consecutive_errors = Some(2);
    controller.init(config).unwrap();
    controller.open("clip.mp4").unwrap();

    assert_eq!(controller.wait_for_end(END), PlayerState::Broken);
    assert!(controller.last_error().unwrap().contains("2 units in a row"));
}

#[test]
fn test_buffered_frames_drained_at_end() {
    let mut backend = ScriptedBackend::new(vec![video_stream(100)], video_units(10));
    backend.buffered_video = true;
    let (mut controller, sink, _) = controller(&backend);
    controller.init(video_only_config()).unwrap();
    controller.open("clip.mp4").unwrap();

    assert_eq!(controller.wait_for_end(END), PlayerState::Ended);
    let presented = sink.presented.lock().clone();
    assert_eq!(presented, (0..10).map(Some).collect::<Vec<_>>());
}

#[test]
fn test_config_file_drives_controller() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("player.toml");
    std::fs::write(
        &path,
        r#"
        enable_audio = false
        play_after_ready = false
        speed = 2.0

        [video]
        width = 320
        height = 240
        pixel_format = "yuv420p"
        "#,
    )
    .unwrap();

    let config = PlayerConfig::load(&path).unwrap();
    let backend = ScriptedBackend::new(vec![video_stream(25)], video_units(5));
    let (mut controller, _, _) = controller(&backend);
    controller.init(config).unwrap();
    assert_eq!(controller.speed(), 2.0);
    controller.open("clip.mp4").unwrap();
    assert_eq!(controller.state(), PlayerState::Ready);

    let opened = backend.log.decoders_opened.lock().clone();
    assert_eq!(opened.len(), 1);
    assert_eq!(
        opened[0].1,
        avsync::media::OutputTarget::Video {
            width: 320,
            height: 240,
            pixel_format: Some(avsync::media::PixelFormat::Yuv420p),
        }
    );

    let bad = dir.path().join("bad.toml");
    std::fs::write(&bad, "[video]\nwidth = 0\n").unwrap();
    controller.close();
    let config = PlayerConfig::load(&bad).unwrap();
    assert_eq!(
        controller.init(config),
        Err(PlayerError::Config(ConfigError::Width))
    );
    assert_eq!(controller.state(), PlayerState::Broken);

    assert!(matches!(
        PlayerConfig::load(dir.path().join("absent.toml")),
        Err(ConfigError::Io(_))
    ));
}
