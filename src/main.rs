// MoodMuse - interactive simulator
// Type the emotion a detector would have seen, one per line, and listen to the
// music follow along. `exit` quits.

use anyhow::Result;
use clap::Parser;
use moodmuse::{
    Config, CrossfadeEngine, Mood, MoodPipeline, MoodSmoother, MoodWorker, PlaybackBackend,
};
use std::io::BufRead;
use std::path::PathBuf;
use tokio::io::AsyncBufReadExt;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "moodmuse")]
#[command(about = "Plays background music that follows detected emotions")]
struct Args {
    /// Enable developer logging (stderr + debug output)
    #[arg(long)]
    dev: bool,

    /// Config file (defaults to the user config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Music root laid out as <dir>/<mood>/<files>
    #[arg(long)]
    music_dir: Option<PathBuf>,

    /// Run crossfades on a background worker instead of blocking input
    #[arg(long = "async")]
    run_async: bool,

    /// Apply every label directly instead of smoothing
    #[arg(long)]
    raw: bool,
}

fn init_logging(dev: bool) -> Result<WorkerGuard> {
    // Create logs directory in project root
    let log_dir = PathBuf::from("logs");
    std::fs::create_dir_all(&log_dir)?;

    // Daily rotating file appender
    let file_appender = tracing_appender::rolling::daily(&log_dir, "moodmuse.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let base_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,moodmuse=debug"));

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_target(true)
        .with_level(true)
        .with_ansi(false);

    // Dev mode mirrors everything to stderr as well
    let stderr_layer = dev.then(|| fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(base_filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()?;

    Ok(guard)
}

fn main() -> Result<()> {
    let args = Args::parse();
    let _guard = init_logging(args.dev)?;

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(dir) = args.music_dir.clone() {
        config.catalog.music_dir = dir;
    }

    println!("MoodMuse - mood driven music");
    println!("============================");
    let names: Vec<&str> = Mood::ALL.iter().map(|m| m.as_str()).collect();
    println!("Available emotions: {}", names.join(", "));
    println!("Type 'exit' to quit");

    info!(run_async = args.run_async, raw = args.raw, "MoodMuse starting up");

    if args.run_async {
        run_async(config, args.raw)
    } else {
        run_sync(config, args.raw)
    }
}

/// Everything on one thread: each mood change blocks input for the crossfade.
fn run_sync(config: Config, raw: bool) -> Result<()> {
    let catalog = config.catalog.build();
    let engine = CrossfadeEngine::with_default_output(catalog, config.crossfade.clone())?;
    check_music_files(&engine);

    let mut pipeline = MoodPipeline::new(MoodSmoother::new(config.smoother.window()?), engine);

    for line in std::io::stdin().lock().lines() {
        let line = line?;
        let input = line.trim();
        if input.eq_ignore_ascii_case("exit") {
            break;
        }
        if input.is_empty() {
            continue;
        }

        let result = if raw {
            pipeline
                .sink_mut()
                .set_mood_label(input)
                .map(|changed| changed.then(|| input.to_lowercase()))
                .map_err(anyhow::Error::from)
        } else {
            pipeline.push_label(input).map(|m| m.map(|m| m.to_string())).map_err(anyhow::Error::from)
        };
        report(input, result);
    }

    println!("Exiting MoodMuse. Goodbye!");
    pipeline.into_sink().shutdown()?;
    Ok(())
}

#[tokio::main]
async fn run_async(config: Config, raw: bool) -> Result<()> {
    let catalog = config.catalog.build();
    let crossfade = config.crossfade.clone();

    let worker = MoodWorker::spawn(
        move || {
            let engine = CrossfadeEngine::with_default_output(catalog, crossfade)?;
            check_music_files(&engine);
            Ok(engine)
        },
        config.worker.clone(),
    )
    .await?;

    let mut pipeline = MoodPipeline::new(MoodSmoother::new(config.smoother.window()?), worker);
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        if input.eq_ignore_ascii_case("exit") {
            break;
        }
        if input.is_empty() {
            continue;
        }

        let result = if raw {
            match input.parse::<Mood>() {
                Ok(mood) => pipeline
                    .sink()
                    .set_mood(mood)
                    .map(|()| Some(mood.to_string()))
                    .map_err(anyhow::Error::from),
                Err(e) => Err(e.into()),
            }
        } else {
            pipeline.push_label(input).map(|m| m.map(|m| m.to_string())).map_err(anyhow::Error::from)
        };
        report(input, result);
    }

    println!("Exiting MoodMuse. Goodbye!");
    pipeline.into_sink().shutdown().await?;
    Ok(())
}

fn report(input: &str, result: Result<Option<String>>) {
    match result {
        Ok(Some(mood)) => println!("Mood -> {}", mood),
        Ok(None) => println!("Mood unchanged"),
        Err(e) => {
            warn!(input, "rejected input: {}", e);
            println!("Error: {}", e);
        }
    }
}

fn check_music_files<B: PlaybackBackend>(engine: &CrossfadeEngine<B>) {
    let report = engine.catalog().audit(engine.backend());
    if !report.any_available() {
        error!("No music files found, nothing will play");
        eprintln!("WARNING: No music files found. Add audio files under the music directory.");
    }
}
