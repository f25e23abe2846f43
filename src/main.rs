//! Recorder Playback - Main Entry Point
//!
//! Replays recorder files toward a publish sink. The binary ships with an
//! in-memory reader and a logging sink; real decoders and protocol servers
//! plug in through the `ChannelReader` and `PublishSink` traits.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime, TimeDelta};
use clap::{Parser, Subcommand};
use recplay::{
    config::{default_config_path, PlaybackConfig},
    playback::{self, PlaybackEvent},
    reader::{MemoryChannel, MemoryReader, MemoryRecording, SamplePattern},
    sink::TracingSink,
    types::{ChannelId, ChannelInfo, ChannelKind, TextEvent},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Real-time multi-rate playback of recorder files.
#[derive(Parser)]
#[command(name = "recplay", version, about)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Logging filter (overrides RUST_LOG).
    #[arg(long)]
    log_level: Option<String>,

    /// Also write a daily rolling log file into this directory.
    #[arg(long)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Play synthesized recordings through the logging sink.
    Demo {
        /// Directory the demo recordings are created in.
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Stop playback after this many seconds.
        #[arg(long, default_value_t = 10)]
        run_secs: u64,
    },
    /// Write the effective configuration as TOML.
    InitConfig {
        /// Target file (defaults to the platform config path).
        path: Option<PathBuf>,
    },
}

fn init_logging(cli: &Cli) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = || -> Result<EnvFilter> {
        Ok(match &cli.log_level {
            Some(level) => {
                EnvFilter::try_new(level).with_context(|| format!("invalid log level: {}", level))?
            }
            None => EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,recplay=debug")),
        })
    };

    let stdout = tracing_subscriber::fmt::layer().with_filter(filter()?);

    match &cli.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "recplay.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(filter()?);
            tracing_subscriber::registry().with(stdout).with(file).init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry().with(stdout).init();
            Ok(None)
        }
    }
}

fn load_config(cli: &Cli) -> Result<PlaybackConfig> {
    match &cli.config {
        Some(path) => PlaybackConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => Ok(default_config_path()
            .filter(|p| p.is_file())
            .map(PlaybackConfig::load_or_default)
            .unwrap_or_default()),
    }
}

/// Write a recorder file stub with a start time header and register its data
fn demo_recording(dir: &Path, index: u32, start: NaiveDateTime) -> Result<MemoryRecording> {
    let path = dir.join(format!("demo_{:03}.dat", index));
    let header = format!("PDA demo recording\nstarttime:{}\n", start.format("%d.%m.%Y %H:%M:%S%.3f"));
    std::fs::write(&path, header).with_context(|| format!("writing {}", path.display()))?;

    // 1 ms reference clock, 20 s per file
    let frames = 20_000;
    let info = |number, name: &str, kind| ChannelInfo::new(ChannelId::new(1, number), name, kind);

    Ok(MemoryRecording::new(&path, 0.001, frames)
        .with_start_time(start)
        .with_module(1, "Caster")
        .with_module(2, "Furnace")
        .with_channel(MemoryChannel::pattern(
            info(0, "CastingSpeed", ChannelKind::Analog),
            0.01,
            SamplePattern::Sine {
                frequency: 0.2,
                amplitude: 1.5,
                offset: 2.0,
            },
        ))
        .with_channel(MemoryChannel::pattern(
            info(1, "MouldLevel", ChannelKind::Analog),
            0.01,
            SamplePattern::Triangle {
                period: 2.0,
                amplitude: 10.0,
            },
        ))
        .with_channel(MemoryChannel::pattern(
            info(2, "OscillatorOn", ChannelKind::Digital),
            0.1,
            SamplePattern::Square {
                period: 4.0,
                amplitude: 1.0,
            },
        ))
        .with_channel(MemoryChannel::pattern(
            ChannelInfo::new(ChannelId::new(2, 0), "SteelTemp", ChannelKind::Analog),
            1.0,
            SamplePattern::Sawtooth {
                period: 20.0,
                amplitude: 30.0,
            },
        ))
        .with_channel(MemoryChannel::text(
            ChannelInfo::new(ChannelId::new(2, 1), "Grade", ChannelKind::Text),
            vec![
                TextEvent::new(0.0, format!("S235-{}", index)),
                TextEvent::new(12.5, format!("S355-{}", index)),
            ],
        )))
}

fn run_demo(mut config: PlaybackConfig, dir: Option<PathBuf>, run_secs: u64) -> Result<()> {
    let dir = dir.unwrap_or_else(|| std::env::temp_dir().join("recplay-demo"));
    std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
    config.source.directory = dir.clone();
    config.source.extension = "dat".to_string();
    config.source.file_name = Some("demo_*".to_string());

    let start = Local::now().naive_local() - TimeDelta::minutes(1);
    let mut reader = MemoryReader::new();
    for i in 0..3 {
        reader.insert(demo_recording(&dir, i, start + TimeDelta::seconds(20 * i64::from(i)))?);
    }

    let sink = Arc::new(TracingSink::new(config.sink.server_name.clone()));
    tracing::info!(
        "Serving {} at {} from {}",
        config.sink.server_name,
        config.sink.endpoint,
        dir.display()
    );

    let mut playback = playback::run(&mut reader, sink.clone(), &config).context("starting playback")?;

    let until = Instant::now() + Duration::from_secs(run_secs);
    while Instant::now() < until {
        match playback.events().recv_deadline(until) {
            Ok(PlaybackEvent::Started { rate, channels, rows }) => {
                tracing::info!("Group {} live: {} channels, {} rows", rate, channels, rows)
            }
            Ok(PlaybackEvent::Overrun { .. }) | Ok(PlaybackEvent::SinkError { .. }) => {}
            Ok(PlaybackEvent::Stopped { rate, ticks }) => {
                tracing::info!("Group {} ended after {} ticks", rate, ticks)
            }
            Err(_) => break,
        }
    }

    for (rate, stats) in playback.shutdown() {
        let summary = serde_json::to_string(&stats).context("serializing tick stats")?;
        tracing::info!("Group {} stats: {}", rate, summary);
    }
    tracing::info!("Published {} values", sink.write_count());
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging(&cli)?;

    tracing::info!("Starting recplay {}", env!("CARGO_PKG_VERSION"));
    let config = load_config(&cli)?;

    match cli.command {
        Command::Demo { dir, run_secs } => run_demo(config, dir, run_secs),
        Command::InitConfig { path } => {
            let path = path
                .or_else(default_config_path)
                .context("no config path given and no platform config directory")?;
            config
                .save(&path)
                .with_context(|| format!("writing {}", path.display()))?;
            tracing::info!("Wrote configuration to {}", path.display());
            Ok(())
        }
    }
}
