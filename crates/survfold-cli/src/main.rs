//! survfold - cross-validated survival model training helpers
//!
//! ## Commands
//!
//! - `check`: validate a run config and show the model it resolves to
//! - `splits`: resolve a fold's split file against a cohort
//! - `summarize`: rebuild the cross-validation summary from fold logs

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, Level};

use survfold_core::{
    summarize_results, Cohort, CsvSplitProvider, CvOptions, Device, FoldDatasets, ModelKind,
    ModelSpec, RunConfig, SplitSet,
};

#[derive(Parser)]
#[command(name = "survfold")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Cross-validation tooling for multimodal survival models", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a run config and print the resolved model arguments
    Check {
        /// Run config (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Cohort file supplying train-split omic sizes (JSON)
        #[arg(long)]
        cohort: Option<PathBuf>,

        /// Compute device: cpu, cuda or cuda:N
        #[arg(long, default_value = "cpu")]
        device: Device,
    },

    /// Resolve splits_<fold>.csv against a cohort and print split counts
    Splits {
        /// Cohort file (JSON)
        #[arg(long)]
        cohort: PathBuf,

        /// Directory holding splits_<fold>.csv files
        #[arg(long)]
        split_dir: PathBuf,

        #[arg(long)]
        fold: usize,
    },

    /// Rebuild summary.csv / summary.json from fold logs
    Summarize {
        /// Results directory containing one sub-directory per fold
        #[arg(long)]
        results_dir: PathBuf,

        /// Total number of folds
        #[arg(short, long, default_value = "5")]
        k: usize,

        /// First fold of the window
        #[arg(long)]
        k_start: Option<usize>,

        /// One past the last fold of the window
        #[arg(long)]
        k_end: Option<usize>,

        /// Model tag recorded in the summary
        #[arg(long, default_value = "unknown")]
        model_type: String,
    },
}

#[derive(Debug, Serialize)]
struct CheckReport {
    model_type: String,
    config_digest: String,
    device: String,
    epochs: usize,
    required_fields: Vec<&'static str>,
    spec: ModelSpec,
}

#[derive(Debug, Serialize)]
struct SplitCounts {
    fold: usize,
    train: usize,
    train_censored: usize,
    val: usize,
    val_censored: usize,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    survfold_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Check {
            config,
            cohort,
            device,
        } => cmd_check(&config, cohort.as_deref(), device),
        Commands::Splits {
            cohort,
            split_dir,
            fold,
        } => cmd_splits(&cohort, &split_dir, fold),
        Commands::Summarize {
            results_dir,
            k,
            k_start,
            k_end,
            model_type,
        } => cmd_summarize(&results_dir, k, k_start, k_end, &model_type),
    }
}

fn check_report(config: &RunConfig, cohort: Option<&Cohort>, device: Device) -> Result<CheckReport> {
    config.validate().context("Invalid run config")?;

    // Only graphmixer reads the fold's data; the cohort's layout stands in for it.
    let omic_sizes = cohort.map(|c| c.omic_sizes.clone()).unwrap_or_default();
    let datasets = FoldDatasets::new(
        SplitSet::new("train", omic_sizes.clone(), vec![]),
        SplitSet::new("val", omic_sizes, vec![]),
    );

    let kind = ModelKind::resolve(&config.model_type)?;
    let spec = kind
        .spec(config, &datasets)
        .with_context(|| format!("Cannot build {} from config", kind))?;

    Ok(CheckReport {
        model_type: kind.to_string(),
        config_digest: config.digest()?,
        device: device.to_string(),
        epochs: config.epochs().len(),
        required_fields: kind.required_fields().iter().map(|f| f.name()).collect(),
        spec,
    })
}

fn cmd_check(config_path: &Path, cohort_path: Option<&Path>, device: Device) -> Result<()> {
    let config = RunConfig::from_json_file(config_path)
        .with_context(|| format!("Failed to load run config {:?}", config_path))?;
    let cohort = cohort_path
        .map(|p| Cohort::from_json_file(p).with_context(|| format!("Failed to load cohort {:?}", p)))
        .transpose()?;

    let report = check_report(&config, cohort.as_ref(), device)?;
    info!(model_type = %report.model_type, device = %report.device, "config ok");
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn split_counts(provider: &CsvSplitProvider, fold: usize) -> Result<SplitCounts> {
    let datasets = provider
        .resolve(fold)
        .with_context(|| format!("Failed to resolve {:?}", provider.split_path(fold)))?;
    Ok(SplitCounts {
        fold,
        train: datasets.train.len(),
        train_censored: datasets.train.censored(),
        val: datasets.val.len(),
        val_censored: datasets.val.censored(),
    })
}

fn cmd_splits(cohort_path: &Path, split_dir: &Path, fold: usize) -> Result<()> {
    let cohort = Cohort::from_json_file(cohort_path)
        .with_context(|| format!("Failed to load cohort {:?}", cohort_path))?;
    let provider = CsvSplitProvider::new(split_dir, cohort);
    let counts = split_counts(&provider, fold)?;
    println!("{}", serde_json::to_string_pretty(&counts)?);
    Ok(())
}

fn cmd_summarize(
    results_dir: &Path,
    k: usize,
    k_start: Option<usize>,
    k_end: Option<usize>,
    model_type: &str,
) -> Result<()> {
    let options = CvOptions {
        k,
        k_start,
        k_end,
        overwrite: false,
    };
    // No config to hash when summarising after the fact.
    let summary = summarize_results(results_dir, model_type, "", &options)
        .with_context(|| format!("Failed to summarize {:?}", results_dir))?;

    println!(
        "{} folds: mean c-index {:.4} (std {:.4})",
        summary.folds.len(),
        summary.mean_cindex,
        summary.std_cindex
    );
    println!("  csv:  {:?}", summary.csv_path(results_dir));
    println!("  json: {:?}", summary.json_path(results_dir));
    Ok(())
}
