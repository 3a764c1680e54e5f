//! Myoscore CLI - Command-line interface for batch session scoring
//!
//! Commands:
//! - score: Score a session from parameter and analytics JSON files
//! - thresholds: Print the unified thresholds resolved for a session
//! - validate-weights: Validate a scoring weights JSON file

use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use myoscore::pipeline::SessionScorer;
use myoscore::thresholds::ThresholdResolver;
use myoscore::types::{ChannelAnalyticsData, GameSessionParameters};
use myoscore::weights::ScoringWeights;
use myoscore::MYOSCORE_VERSION;

/// Myoscore - scoring engine for EMG rehabilitation therapy sessions
#[derive(Parser)]
#[command(name = "myoscore")]
#[command(version = MYOSCORE_VERSION)]
#[command(about = "Score EMG rehabilitation therapy sessions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a session from parameter and analytics JSON files
    Score {
        /// Session parameters JSON (use - for stdin)
        #[arg(short, long)]
        session: PathBuf,

        /// Per-channel analytics JSON
        #[arg(short, long)]
        analytics: PathBuf,

        /// Scoring weights JSON (defaults to the clinical weights)
        #[arg(short, long)]
        weights: Option<PathBuf>,

        /// Externally supplied global fallback MVC threshold
        #[arg(long)]
        global_mvc_threshold: Option<f64>,

        /// Normalized game telemetry score (0-100)
        #[arg(long)]
        game_score: Option<f64>,
    },

    /// Print the unified thresholds resolved for a session
    Thresholds {
        /// Session parameters JSON (use - for stdin)
        #[arg(short, long)]
        session: PathBuf,

        /// Per-channel analytics JSON
        #[arg(short, long)]
        analytics: Option<PathBuf>,

        /// Externally supplied global fallback MVC threshold
        #[arg(long)]
        global_mvc_threshold: Option<f64>,
    },

    /// Validate a scoring weights JSON file
    ValidateWeights {
        /// Weights JSON (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,
    },
}

fn read_input(path: &Path) -> io::Result<String> {
    if path.as_os_str() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        fs::read_to_string(path)
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Score {
            session,
            analytics,
            weights,
            global_mvc_threshold,
            game_score,
        } => {
            let session: GameSessionParameters = serde_json::from_str(&read_input(&session)?)?;
            let analytics: HashMap<String, ChannelAnalyticsData> =
                serde_json::from_str(&read_input(&analytics)?)?;

            let weights = match weights {
                Some(path) => {
                    let weights: ScoringWeights = serde_json::from_str(&read_input(&path)?)?;
                    weights.validate()?;
                    weights
                }
                None => ScoringWeights::default(),
            };

            let scorer = SessionScorer::new(weights);
            let result = scorer.score(&session, &analytics, global_mvc_threshold, game_score);
            println!("{}", serde_json::to_string_pretty(&result)?);
        }

        Commands::Thresholds {
            session,
            analytics,
            global_mvc_threshold,
        } => {
            let session: GameSessionParameters = serde_json::from_str(&read_input(&session)?)?;
            let analytics: Option<HashMap<String, ChannelAnalyticsData>> = analytics
                .map(|path| -> Result<_, Box<dyn std::error::Error>> {
                    Ok(serde_json::from_str(&read_input(&path)?)?)
                })
                .transpose()?;

            let mut signal_keys: Vec<String> = analytics
                .as_ref()
                .map(|map| map.keys().cloned().collect())
                .unwrap_or_else(|| session.channel_muscle_mapping.keys().cloned().collect());
            signal_keys.sort();

            let resolver = ThresholdResolver::resolve(
                &session,
                analytics.as_ref(),
                &signal_keys,
                global_mvc_threshold,
            );
            println!("{}", serde_json::to_string_pretty(resolver.thresholds())?);
        }

        Commands::ValidateWeights { input } => {
            let weights: ScoringWeights = serde_json::from_str(&read_input(&input)?)?;
            weights.validate()?;
            println!(
                "valid: components sum {:.3}, compliance sub-weights sum {:.3}",
                weights.component_sum(),
                weights.compliance_sum()
            );
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
