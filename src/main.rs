//! Command-line entry point for Parity Ratings
//!
//! Reads a season CSV, runs the rating engine (optionally bridging two
//! divisions onto one scale) and prints the resulting ratings or
//! conference averages.

use anyhow::Result;
use clap::{Parser, Subcommand};
use parity_ratings::config::AppConfig;
use parity_ratings::feed::{self, read_records_from_path, GameRecord};
use parity_ratings::rating::{
    bridge_divisions, run_cached, InitialState, JsonFileRatingsCache, NoOpRatingsCache,
    ProbabilityStrategy, RatingEngine, RatingsCache, RunOutcome,
};
use parity_ratings::report::{conference_averages, ConferenceTable};
use parity_ratings::utils::{run_tag, sorted_by_mean};
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Parity Ratings - Bayesian pairwise ratings for college football
#[derive(Parser)]
#[command(
    name = "parity-ratings",
    version,
    about = "Bayesian pairwise ratings for college football",
    long_about = "Parity Ratings estimates a normal strength belief for every team from win/loss \
                 results, alternating posterior rating updates with calibration of a season-wide \
                 parity until both converge."
)]
struct Args {
    /// Configuration file path
    #[arg(
        short,
        long,
        global = true,
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Log level override
    #[arg(
        short,
        long,
        global = true,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    /// Convergence tolerance override
    #[arg(long, global = true, value_name = "EPS", help = "Override convergence tolerance")]
    convergence: Option<f64>,

    /// Win-probability strategy override
    #[arg(
        long,
        global = true,
        value_name = "STRATEGY",
        help = "Win-probability evaluation (closed_form, quadrature)"
    )]
    strategy: Option<ProbabilityStrategy>,

    /// Cache file override
    #[arg(long, global = true, value_name = "FILE", help = "Override ratings cache file")]
    cache: Option<PathBuf>,

    /// Disable the ratings cache
    #[arg(long, global = true, help = "Neither read nor write the ratings cache")]
    no_cache: bool,

    /// Disable parallel evaluation
    #[arg(long, global = true, help = "Evaluate integrals on a single thread")]
    sequential: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rate one division with outside opponents collapsed into one node
    Rate {
        #[arg(short, long, value_name = "FILE", help = "Season CSV file")]
        games: PathBuf,

        #[arg(short, long, default_value = "fbs", help = "Division to rate")]
        division: String,

        #[arg(short, long, help = "Last week to include (default: whole season)")]
        week: Option<u32>,

        #[arg(short, long, help = "Cache tag (results are only cached when set)")]
        tag: Option<String>,
    },

    /// Rate FBS with FCS bridged onto the same scale
    Bridge {
        #[arg(short, long, value_name = "FILE", help = "Season CSV file")]
        games: PathBuf,

        #[arg(short, long, help = "Season year, used for cache tags")]
        year: i32,

        #[arg(short, long, help = "Last week to include")]
        week: u32,
    },

    /// Average bridged ratings over conference membership
    Conferences {
        #[arg(short, long, value_name = "FILE", help = "Season CSV file")]
        games: PathBuf,

        #[arg(short, long, help = "Season year")]
        year: i32,

        #[arg(short, long, help = "Last week to include")]
        week: u32,

        #[arg(short, long, value_name = "FILE", help = "Conference membership table (TOML)")]
        table: PathBuf,
    },
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Load and merge configuration from file, environment and CLI arguments
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path)?
    } else {
        AppConfig::from_env()?
    };

    // Apply CLI overrides
    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }
    if let Some(convergence) = args.convergence {
        config.engine.convergence = convergence;
    }
    if let Some(strategy) = args.strategy {
        config.engine.strategy = strategy;
    }
    if let Some(cache) = &args.cache {
        config.service.cache_path = cache.display().to_string();
    }
    if args.no_cache {
        config.service.cache_enabled = false;
    }
    if args.sequential {
        config.engine.parallel = false;
    }

    parity_ratings::config::validate_config(&config)?;
    Ok(config)
}

fn open_cache(config: &AppConfig) -> Box<dyn RatingsCache> {
    if config.service.cache_enabled {
        Box::new(JsonFileRatingsCache::new(&config.service.cache_path))
    } else {
        Box::new(NoOpRatingsCache)
    }
}

fn print_outcome(outcome: &RunOutcome) {
    for (competitor, belief) in sorted_by_mean(outcome.ratings()) {
        println!("{}: {}", competitor, belief);
    }
    println!();
    println!("parity: {:.6}", outcome.parity());
    println!(
        "achieved tolerance: {:e} after {} iterations{}",
        outcome.achieved_tolerance(),
        outcome.iterations(),
        if outcome.converged() { "" } else { " (not converged)" }
    );
}

fn load_records(path: &Path) -> Result<Vec<GameRecord>> {
    let records = read_records_from_path(path)?;
    info!("Loaded {} records from {}", records.len(), path.display());
    Ok(records)
}

fn run(args: &Args, config: &AppConfig) -> Result<()> {
    let engine = RatingEngine::new(config.engine_config())?;

    match &args.command {
        Command::Rate {
            games,
            division,
            week,
            tag,
        } => {
            let records = load_records(games)?;
            let season = feed::division_season(&records, division, week.unwrap_or(u32::MAX), true);
            let outcome = match tag {
                Some(tag) => {
                    let cache = open_cache(config);
                    run_cached(&engine, cache.as_ref(), tag, &season, InitialState::new())?.outcome
                }
                None => engine.run(&season, InitialState::new())?,
            };
            print_outcome(&outcome);
        }
        Command::Bridge { games, year, week } => {
            let records = load_records(games)?;
            let plan = feed::bridge_plan(&records, "fbs", "fcs", *week);
            let cache = open_cache(config);
            let bridged = bridge_divisions(&engine, cache.as_ref(), &run_tag(*year, *week, ""), &plan)?;
            print_outcome(&bridged.combined.outcome);
        }
        Command::Conferences {
            games,
            year,
            week,
            table,
        } => {
            let table = ConferenceTable::from_file(table)?;
            let records = load_records(games)?;
            let plan = feed::bridge_plan(&records, "fbs", "fcs", *week);
            let cache = open_cache(config);
            let bridged = bridge_divisions(&engine, cache.as_ref(), &run_tag(*year, *week, ""), &plan)?;

            let averages = conference_averages(bridged.ratings(), &table, *year);
            for average in &averages {
                println!(
                    "{}{}: {:.4}",
                    average.conference,
                    if average.unofficial { "*" } else { "" },
                    average.average
                );
            }
            if averages.iter().any(|average| average.unofficial) {
                println!("\n*Conference did not meet FBS 8-team minimum");
            }
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration (CLI args can override environment/config file)
    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    });

    // Initialize logging early (before any other operations)
    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(&args, &config) {
        error!("Rating run failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
