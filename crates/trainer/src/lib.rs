//! Churn Trainer - Deterministic offline GBDT trainer
//!
//! Fits the churn classifier from labelled train/test exports, reports
//! cross-validated and held-out metrics, and packages the model with its
//! canonical feature order as a serving artifact.

pub mod cart;
pub mod dataset;
pub mod deterministic;
pub mod errors;
pub mod metrics;
pub mod trainer;
pub mod validation;

use churn_core::gbdt::GbdtClassifier;
use churn_core::Artifact;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

pub use dataset::{prepare_datasets, Dataset, RawTable, EXCLUDED_COLUMNS, TARGET_COLUMN};
pub use deterministic::LcgRng;
pub use errors::{Result, TrainerError};
pub use metrics::{roc_auc, EvaluationReport};
pub use trainer::{GbdtConfig, GbdtTrainer};
pub use validation::{cross_validate, stratified_k_fold, CvReport};

/// Default number of cross-validation folds
pub const DEFAULT_CV_FOLDS: usize = 10;

/// Inputs of one training run
#[derive(Clone, Debug)]
pub struct TrainingJob {
    pub train_path: PathBuf,
    pub test_path: PathBuf,
    pub delimiter: u8,
    pub params: GbdtConfig,
    /// Fewer than 2 skips cross-validation
    pub cv_folds: usize,
}

/// Metrics written next to the artifact
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrainingReport {
    pub features: Vec<String>,
    pub train_samples: usize,
    pub test_samples: usize,
    pub params: GbdtConfig,
    pub cross_validation: Option<CvReport>,
    pub test: EvaluationReport,
}

/// Trained model with its feature order and report
#[derive(Clone, Debug)]
pub struct TrainingOutcome {
    pub model: GbdtClassifier,
    pub features: Vec<String>,
    pub report: TrainingReport,
}

impl TrainingOutcome {
    pub fn artifact(&self) -> Artifact {
        Artifact::wrap(self.model.clone(), self.features.clone())
    }

    /// Write the artifact and a sibling `.hash` file; returns the hash
    pub fn save(&self, model_path: &Path) -> Result<String> {
        if let Some(parent) = model_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let hash = self.artifact().save_json(model_path)?;
        std::fs::write(hash_path(model_path), &hash)?;
        Ok(hash)
    }
}

/// `<model>.hash` next to the artifact
pub fn hash_path(model_path: &Path) -> PathBuf {
    model_path.with_extension("hash")
}

/// Load both exports, cross-validate, refit on the full training set and
/// evaluate on the test set. Both inputs must exist before any work starts.
pub fn train_from_files(job: &TrainingJob) -> Result<TrainingOutcome> {
    for path in [&job.train_path, &job.test_path] {
        if !path.exists() {
            return Err(TrainerError::MissingInput(path.clone()));
        }
    }
    job.params.validate()?;

    info!("Loading training data from {}", job.train_path.display());
    let train_table = RawTable::from_csv(&job.train_path, job.delimiter)?;
    info!("Loading test data from {}", job.test_path.display());
    let test_table = RawTable::from_csv(&job.test_path, job.delimiter)?;

    let (train, test) = prepare_datasets(&train_table, &test_table)?;
    info!(
        "Features: {} | train rows: {} ({} churned) | test rows: {} ({} churned)",
        train.feature_count(),
        train.len(),
        train.positive_count(),
        test.len(),
        test.positive_count()
    );

    train_datasets(&train, &test, &job.params, job.cv_folds)
}

/// Training and evaluation on already aligned datasets
pub fn train_datasets(
    train: &Dataset,
    test: &Dataset,
    params: &GbdtConfig,
    cv_folds: usize,
) -> Result<TrainingOutcome> {
    let cross_validation = if cv_folds >= 2 {
        info!("Running {}-fold stratified cross-validation", cv_folds);
        let report = cross_validate(train, params, cv_folds)?;
        match (report.mean, report.std) {
            (Some(mean), Some(std)) => info!("CV AUC mean {:.4}, std {:.4}", mean, std),
            _ => info!("CV AUC undefined for at least one fold"),
        }
        Some(report)
    } else {
        None
    };

    info!("Fitting final model on {} rows", train.len());
    let model = GbdtTrainer::new(params.clone()).train(train)?;
    let evaluation = EvaluationReport::evaluate(&model, test);

    Ok(TrainingOutcome {
        features: train.feature_names.clone(),
        report: TrainingReport {
            features: train.feature_names.clone(),
            train_samples: train.len(),
            test_samples: test.len(),
            params: params.clone(),
            cross_validation,
            test: evaluation,
        },
        model,
    })
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
