use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use automix::{
    audio::{
        loudness::{loudness_envelope_with, trim_silence},
        AudioBuffer, AudioLoader, AudioWriter, TempoAnalysis, TempoAnalyzer,
    },
    config::Config,
    error::MixError,
    mixing::{MixEngine, MixRequest, Strategy},
};

#[derive(Parser)]
#[command(
    name = "automix",
    version,
    about = "Blend two music tracks with crossfade, beatmatch, or automix transitions",
    long_about = "Automix estimates the tempo of two tracks, optionally matches the second to the first by changing its playback rate, and joins them into a single clip of at most one minute."
)]
struct Cli {
    /// Configuration file (optional)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Mix two tracks into one clip
    Mix {
        /// First track (WAV, MP3, FLAC, OGG, AAC)
        #[arg(short = 'a', long)]
        track_a: PathBuf,

        /// Second track, brought in during the transition
        #[arg(short = 'b', long)]
        track_b: PathBuf,

        /// Output WAV file path
        #[arg(short, long)]
        output: PathBuf,

        /// Transition strategy
        #[arg(short, long, value_enum, default_value_t = Strategy::Automix)]
        strategy: Strategy,

        /// Transition start in track A (seconds), defaults to the config value
        #[arg(long)]
        start_time: Option<f64>,

        /// Transition length (seconds), defaults to the config value
        #[arg(long)]
        fade_duration: Option<f64>,

        /// Trim leading and trailing silence from both tracks first
        #[arg(long)]
        trim: bool,
    },

    /// Report tempo and loudness of a single track
    Analyze {
        /// Audio file to analyze
        file: PathBuf,

        /// Print one BPM reading per beat interval
        #[arg(long)]
        tempo_curve: bool,

        /// Print the loudness envelope
        #[arg(long)]
        envelope: bool,
    },

    /// Write the default configuration to a TOML file
    InitConfig {
        /// Destination path
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG overrides the verbosity flag
    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .init();

    info!("Starting automix v{}", env!("CARGO_PKG_VERSION"));

    let config = match &cli.config {
        Some(config_path) => {
            info!("Loading configuration from {:?}", config_path);
            Config::from_file(config_path)?
        }
        None => Config::default(),
    };

    match cli.command {
        Command::Mix {
            track_a,
            track_b,
            output,
            strategy,
            start_time,
            fade_duration,
            trim,
        } => {
            let start_time = start_time.unwrap_or(config.mix.start_time);
            let fade_duration = fade_duration.unwrap_or(config.mix.fade_duration);
            run_mix(&config, &track_a, &track_b, &output, strategy, start_time, fade_duration, trim).await
        }
        Command::Analyze { file, tempo_curve, envelope } => {
            run_analyze(&config, &file, tempo_curve, envelope).await
        }
        Command::InitConfig { path } => {
            Config::default().save_to_file(&path)?;
            info!("Default configuration written to {:?}", path);
            Ok(())
        }
    }
}

async fn load_track(path: &Path, label: &str, config: &Config, trim: bool) -> Result<AudioBuffer> {
    let buffer = AudioLoader::load(path)
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))
        .with_context(|| format!("loading track {}", label))?;

    info!(
        "Track {}: {:.1}s, {} Hz, {} channels",
        label,
        buffer.duration(),
        buffer.sample_rate(),
        buffer.channels()
    );

    if !trim {
        return Ok(buffer);
    }

    let trimmed = trim_silence(&buffer, &config.trim);
    if trimmed.is_empty() {
        return Err(MixError::EmptyInput { track: label.to_string() }.into());
    }
    info!("Track {} trimmed to {:.1}s", label, trimmed.duration());
    Ok(trimmed)
}

#[allow(clippy::too_many_arguments)]
async fn run_mix(
    config: &Config,
    track_a: &Path,
    track_b: &Path,
    output: &Path,
    strategy: Strategy,
    start_time: f64,
    fade_duration: f64,
    trim: bool,
) -> Result<()> {
    let (a, b) = tokio::try_join!(
        load_track(track_a, "A", config, trim),
        load_track(track_b, "B", config, trim),
    )?;

    // The transition has to fit inside track A
    if a.duration() < start_time + fade_duration {
        bail!(
            "Track A is {:.1}s long but the transition needs {:.1}s (start {:.1}s + fade {:.1}s)",
            a.duration(),
            start_time + fade_duration,
            start_time,
            fade_duration
        );
    }
    if b.duration() < start_time && strategy != Strategy::Beatmatch {
        warn!(
            "Track B ({:.1}s) ends before the transition starts; it will not be audible",
            b.duration()
        );
    }

    let request = MixRequest::new(strategy, a, b, start_time, fade_duration);
    let engine = MixEngine::new(config);

    let result = tokio::task::spawn_blocking(move || engine.mix(&request))
        .await
        .context("mix task panicked")??;

    AudioWriter::write_wav(&result.buffer, output)?;

    println!("Strategy:     {}", result.strategy_applied);
    println!("Tempo A:      {}", result.bpm_a);
    println!("Tempo B:      {}", result.bpm_b);
    println!("Tempo (mix):  {}", result.bpm_out);
    println!("Duration:     {:.2}s", result.buffer.duration());
    println!("Output:       {}", output.display());
    Ok(())
}

/// Tempo analysis on the blocking pool, bounded by the configured timeout
async fn analyze_with_timeout(config: &Config, buffer: AudioBuffer) -> Result<TempoAnalysis> {
    let analysis_config = config.analysis.clone();
    let timeout_secs = analysis_config.timeout_secs;
    let task = tokio::task::spawn_blocking(move || {
        TempoAnalyzer::with_config(analysis_config).analyze(&buffer)
    });

    if timeout_secs == 0 {
        return task.await.context("analysis task panicked");
    }

    match tokio::time::timeout(Duration::from_secs(timeout_secs), task).await {
        Ok(joined) => joined.context("analysis task panicked"),
        Err(_) => {
            warn!("Tempo analysis exceeded {}s, reporting unknown tempo", timeout_secs);
            Ok(TempoAnalysis::unknown())
        }
    }
}

async fn run_analyze(config: &Config, file: &Path, tempo_curve: bool, envelope: bool) -> Result<()> {
    let buffer = load_track(file, "input", config, false).await?;
    let loudness = envelope.then(|| loudness_envelope_with(&buffer, &config.loudness));
    let duration = buffer.duration();

    let analysis = analyze_with_timeout(config, buffer).await?;

    println!("File:        {}", file.display());
    println!("Duration:    {:.2}s", duration);
    println!("Tempo:       {}", analysis.bpm);
    println!("Confidence:  {:.2}", analysis.confidence);
    println!("Beats:       {}", analysis.beats.len());

    if tempo_curve {
        println!();
        println!("{:>9}  {:>7}", "time (s)", "bpm");
        for point in analysis.tempo_curve() {
            println!("{:>9.3}  {:>7.2}", point.time, point.bpm);
        }
    }

    if let Some(points) = loudness {
        println!();
        println!("{:>9}  {:>8}", "time (s)", "dBFS");
        for point in points {
            println!("{:>9.2}  {:>8.1}", point.time, point.loudness_db);
        }
    }

    Ok(())
}
