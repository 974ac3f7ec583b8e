//! Churn GBDT Trainer CLI
//!
//! Offline trainer producing the serving artifact for the churn service.

use anyhow::{bail, Context, Result};
use churn_trainer::{
    hash_path, train_from_files, GbdtConfig, TrainingJob, DEFAULT_CV_FOLDS, VERSION,
};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "churn-train")]
#[command(version = churn_trainer::VERSION)]
#[command(about = "Train the churn classifier and write its artifact", long_about = None)]
struct Args {
    /// Labelled training export (CSV with a TARGET column)
    #[arg(long, default_value = "train.csv")]
    train: PathBuf,

    /// Labelled test export
    #[arg(long, default_value = "test.csv")]
    test: PathBuf,

    /// Artifact output path
    #[arg(short, long, default_value = "models/churn_model.json")]
    output: PathBuf,

    /// Optional JSON metrics output
    #[arg(long)]
    metrics_output: Option<PathBuf>,

    /// Field delimiter of the input files
    #[arg(long, default_value = ",")]
    delimiter: char,

    /// Number of boosting trees
    #[arg(long, default_value = "200")]
    n_estimators: usize,

    /// Shrinkage applied to every tree
    #[arg(long, default_value = "0.05")]
    learning_rate: f64,

    /// Maximum tree depth
    #[arg(long, default_value = "3")]
    max_depth: usize,

    /// Fraction of rows drawn for each tree
    #[arg(long, default_value = "0.8")]
    subsample: f64,

    /// Minimum rows required to split a node
    #[arg(long, default_value = "20")]
    min_samples_split: usize,

    /// Minimum rows per leaf
    #[arg(long, default_value = "10")]
    min_samples_leaf: usize,

    /// Cross-validation folds (0 or 1 skips cross-validation)
    #[arg(long, default_value_t = DEFAULT_CV_FOLDS)]
    cv_folds: usize,

    /// Random seed for subsampling and fold assignment
    #[arg(long, default_value = "42")]
    seed: i64,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    if !args.delimiter.is_ascii() {
        bail!("Delimiter must be a single ASCII character");
    }

    info!("Churn GBDT Trainer v{}", VERSION);
    info!("═══════════════════════════════════════════");

    let params = GbdtConfig {
        n_estimators: args.n_estimators,
        learning_rate: args.learning_rate,
        max_depth: args.max_depth,
        subsample: args.subsample,
        min_samples_split: args.min_samples_split,
        min_samples_leaf: args.min_samples_leaf,
        seed: args.seed,
    };

    info!("Training configuration:");
    info!("  Trees: {}", params.n_estimators);
    info!("  Learning rate: {}", params.learning_rate);
    info!("  Max depth: {}", params.max_depth);
    info!("  Subsample: {}", params.subsample);
    info!("  Min samples split/leaf: {}/{}", params.min_samples_split, params.min_samples_leaf);
    info!("  Seed: {}", params.seed);

    let job = TrainingJob {
        train_path: args.train,
        test_path: args.test,
        delimiter: args.delimiter as u8,
        params,
        cv_folds: args.cv_folds,
    };

    info!("═══════════════════════════════════════════");
    let outcome = train_from_files(&job).context("Training failed")?;

    let test = &outcome.report.test;
    info!("Test metrics:");
    info!("  Accuracy:  {:.4}", test.accuracy);
    match test.auc {
        Some(auc) => info!("  AUC:       {:.4}", auc),
        None => info!("  AUC:       undefined"),
    }
    info!("  Precision: {:.4}", test.precision);
    info!("  Recall:    {:.4}", test.recall);
    info!("  F1:        {:.4}", test.f1);
    info!(
        "  Confusion: TP={} FP={} FN={} TN={}",
        test.true_positives, test.false_positives, test.false_negatives, test.true_negatives
    );

    let hash = outcome
        .save(&args.output)
        .with_context(|| format!("Failed to write model to {}", args.output.display()))?;

    if let Some(metrics_path) = &args.metrics_output {
        let json = serde_json::to_string_pretty(&outcome.report)
            .context("Failed to serialize metrics")?;
        std::fs::write(metrics_path, json)
            .with_context(|| format!("Failed to write metrics to {}", metrics_path.display()))?;
        info!("  Metrics: {}", metrics_path.display());
    }

    info!("═══════════════════════════════════════════");
    info!("✓ Training completed successfully");
    info!("  Model: {}", args.output.display());
    info!("  Hash: {} ({})", hash_path(&args.output).display(), hash);

    Ok(())
}
