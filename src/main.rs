//! avsync command-line player.
//!
//! Plays one source through the FFmpeg backend and the default cpal output
//! device. Video frames go to a sink that only logs presentation timing; a
//! real surface plugs in through [`VideoSink`].

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use avsync::audio::CpalOutput;
use avsync::media::ffmpeg::FfmpegBackend;
use avsync::media::{DecodedFrame, FramePayload, VideoSink};
use avsync::{PlaybackController, PlayerConfig, PlayerState};

#[derive(Parser, Debug)]
#[command(name = "avsync")]
#[command(about = "Play an audio/video source with audio-clock sync")]
#[command(version)]
struct Args {
    /// File path or URL to play
    url: String,

    /// TOML player configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Ignore audio streams
    #[arg(long)]
    no_audio: bool,

    /// Ignore video streams
    #[arg(long)]
    no_video: bool,

    /// Seek here (milliseconds) right after opening
    #[arg(long)]
    seek_ms: Option<i64>,
}

/// Logs each presented frame instead of drawing it
struct LogSink {
    started: Instant,
    frames: u64,
}

impl VideoSink for LogSink {
    fn present(&mut self, frame: &DecodedFrame) {
        self.frames += 1;
        if let FramePayload::Video(image) = &frame.payload {
            debug!(
                pts = ?frame.pts,
                width = image.width,
                height = image.height,
                at_ms = self.started.elapsed().as_millis() as u64,
                "present"
            );
        }
        if self.frames % 100 == 0 {
            info!(frames = self.frames, "presented");
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "avsync=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => PlayerConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PlayerConfig::default(),
    };
    if args.no_audio {
        config.enable_audio = false;
    }
    if args.no_video {
        config.enable_video = false;
    }

    let backend = FfmpegBackend::new().context("Failed to initialize FFmpeg")?;
    let mut controller = PlaybackController::new(Box::new(backend))
        .with_audio_output(Box::new(CpalOutput::new()))
        .with_video_sink(Box::new(LogSink {
            started: Instant::now(),
            frames: 0,
        }));

    controller.init(config).context("Invalid configuration")?;
    controller
        .open(&args.url)
        .with_context(|| format!("Failed to open {}", args.url))?;
    if controller.state() == PlayerState::Ready {
        controller.play()?;
    }
    if let Some(ms) = args.seek_ms {
        controller.seek(ms).context("Seek rejected")?;
    }

    info!(
        url = %args.url,
        duration_ms = controller.total_duration_ms(),
        "playing"
    );
    loop {
        let state = controller.wait_for_end(Duration::from_secs(5));
        debug!("{}", controller.dump());
        match state {
            PlayerState::Ended => break,
            PlayerState::Broken => {
                let reason = controller.last_error().unwrap_or_default();
                controller.close();
                bail!("playback failed: {reason}");
            }
            _ => {}
        }
    }

    controller.close();
    info!(underruns = controller.audio_underruns(), "done");
    Ok(())
}
