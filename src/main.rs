mod models;
mod pipeline;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use propensity_eval::Evaluator;
use propensity_rf::RandomForestConfig;
use tracing::info;

use crate::pipeline::{RunConfig, ScoreConfig};

#[derive(Parser)]
#[command(name = "propensity")]
#[command(about = "Term-deposit response modeling: logistic regression vs random forest")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// RNG seed for reproducibility
    #[arg(long, default_value_t = 42, global = true)]
    seed: u64,

    /// Enable verbose (debug-level) logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Number of threads for parallel computation (defaults to all cores)
    #[arg(long, global = true)]
    threads: Option<usize>,
}

/// Where the contact records live and where exported artifacts go.
#[derive(Args, Debug, Clone)]
struct SourceArgs {
    /// Data source connection string: csv://<dir> or a directory of <table>.csv files
    #[arg(long)]
    source: String,

    /// Table holding the contact records
    #[arg(long, default_value = "bank")]
    table: String,

    /// Directory for exported models, predictions and the sample extract
    #[arg(long, default_value = "api")]
    api_dir: PathBuf,

    /// Probability cutoff for classifying a contact as a responder
    #[arg(long, default_value_t = Evaluator::DEFAULT_CUTOFF)]
    cutoff: f64,
}

#[derive(Subcommand)]
enum Command {
    /// Fit both models, compare them, and write reports and API artifacts
    Run {
        #[command(flatten)]
        source: SourceArgs,

        /// Directory for charts and the text report
        #[arg(long, default_value = "reports")]
        report_dir: PathBuf,

        /// Highest percentile included in the training partition
        #[arg(long, default_value_t = 15.0)]
        train_upper: f64,

        /// Percentile above which rows form the testing partition
        #[arg(long, default_value_t = 75.0)]
        test_lower: f64,

        /// Number of trees in the random forest
        #[arg(long, default_value_t = RandomForestConfig::DEFAULT_TREES)]
        n_trees: usize,
    },

    /// Score every row of a table with the models exported by `run`
    Score {
        #[command(flatten)]
        source: SourceArgs,

        /// Output JSON file for the scored rows
        #[arg(long)]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match (cli.verbose, cli.quiet) {
        (true, _) => "debug",
        (_, true) => "error",
        _ => "info",
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure thread pool")?;
        info!(threads, "thread pool configured");
    }

    match cli.command {
        Command::Run {
            source,
            report_dir,
            train_upper,
            test_lower,
            n_trees,
        } => {
            let config = RunConfig {
                source: source.source,
                table: source.table,
                api_dir: source.api_dir,
                report_dir,
                train_upper,
                test_lower,
                n_trees,
                cutoff: source.cutoff,
                seed: cli.seed,
            };
            let summary = pipeline::run(&config)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }

        Command::Score { source, output } => {
            let config = ScoreConfig {
                source: source.source,
                table: source.table,
                api_dir: source.api_dir,
                cutoff: source.cutoff,
                output,
            };
            let summary = pipeline::score(&config)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    Ok(())
}
