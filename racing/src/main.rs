use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use color_eyre::Result;
use color_eyre::eyre::WrapErr;
use kart_ai::{Difficulty, TrackFile};
use racing::config::default_grid;
use racing::{Race, RaceConfig, RaceSummary};
use tracing::info;

#[derive(Debug, Parser)]
#[command(author, version, about = "Run a headless kart race between AI drivers")]
struct Cli {
    /// Track file (TOML). Defaults to the track named in the config, then the builtin oval.
    #[arg(long)]
    track: Option<PathBuf>,

    /// Race config file (TOML).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Replace the configured grid with this many bots.
    #[arg(long)]
    karts: Option<usize>,

    #[arg(long)]
    laps: Option<u32>,

    /// Preset for every bot without an explicit profile: easy, medium or hard.
    #[arg(long)]
    difficulty: Option<Difficulty>,

    #[arg(long)]
    seed: Option<u64>,

    /// Simulation step in seconds.
    #[arg(long)]
    dt: Option<f32>,

    #[arg(long)]
    max_ticks: Option<u64>,

    /// Print the summary as JSON.
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "racing=info,kart_ai=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = build_config(&cli)?;

    let track = match cli.track.as_ref().or(config.track.as_ref()) {
        Some(path) => TrackFile::load(path).wrap_err("failed to load track")?,
        None => TrackFile::load_builtin()?,
    };
    let graph = Arc::new(track.to_graph().wrap_err_with(|| format!("track {:?}", track.metadata.name))?);
    info!(
        track = %track.metadata.name,
        nodes = graph.len(),
        length = graph.length(),
        "loaded track"
    );

    let mut race = Race::new(graph, &config)?;
    let summary = race.run(config.max_ticks);

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

fn build_config(cli: &Cli) -> Result<RaceConfig> {
    let mut config = match &cli.config {
        Some(path) => RaceConfig::load(path)?,
        None => RaceConfig::default(),
    };

    if let Some(count) = cli.karts {
        config.karts = default_grid(count, cli.difficulty.unwrap_or(Difficulty::Medium));
    } else if let Some(difficulty) = cli.difficulty {
        for entry in config.karts.iter_mut().filter(|entry| entry.profile.is_none()) {
            entry.difficulty = Some(difficulty);
        }
    }
    if let Some(laps) = cli.laps {
        config.laps = laps;
    }
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    if let Some(dt) = cli.dt {
        config.dt = dt;
    }
    if let Some(max_ticks) = cli.max_ticks {
        config.max_ticks = max_ticks;
    }

    config.validate()?;
    Ok(config)
}

fn print_summary(summary: &RaceSummary) {
    println!(
        "{} laps of {:.0} m, {:.1} s ({} ticks)",
        summary.laps, summary.track_length, summary.time, summary.ticks
    );
    for racer in &summary.racers {
        let result = match racer.finished_at {
            Some(time) => format!("{time:.2} s"),
            None => format!("lap {} +{:.0} m", racer.laps, racer.progress),
        };
        println!(
            "{:>2}. {:<16} {:>14}  rescues {:>2}  items {:>2}  hits {:>2}",
            racer.rank, racer.name, result, racer.rescues, racer.items_fired, racer.hits_taken
        );
    }
}
