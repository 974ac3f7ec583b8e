//! Gradient Boosted Decision Tree (GBDT) trainer
//!
//! Binary logistic-loss boosting. Each round fits a CART regression tree to
//! the residuals `y - p` on a row subsample drawn without replacement, then
//! adds `learning_rate * tree(x)` to every row's raw score. The initial raw
//! score is the log-odds of the positive class.

use churn_core::gbdt::{sigmoid, GbdtClassifier};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cart::{CartBuilder, TreeConfig};
use crate::dataset::Dataset;
use crate::deterministic::LcgRng;
use crate::errors::{Result, TrainerError};

/// GBDT training configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GbdtConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub subsample: f64,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub seed: i64,
}

impl Default for GbdtConfig {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            learning_rate: 0.05,
            max_depth: 3,
            subsample: 0.8,
            min_samples_split: 20,
            min_samples_leaf: 10,
            seed: 42,
        }
    }
}

impl GbdtConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(TrainerError::Validation("n_estimators must be positive".into()));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(TrainerError::Validation("learning_rate must be positive".into()));
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return Err(TrainerError::Validation("subsample must be in (0, 1]".into()));
        }
        if self.max_depth == 0 {
            return Err(TrainerError::Validation("max_depth must be at least 1".into()));
        }
        if self.min_samples_split < 2 {
            return Err(TrainerError::Validation("min_samples_split must be at least 2".into()));
        }
        if self.min_samples_leaf == 0 {
            return Err(TrainerError::Validation("min_samples_leaf must be at least 1".into()));
        }
        Ok(())
    }

    fn tree_config(&self) -> TreeConfig {
        TreeConfig {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
        }
    }

    /// Rows drawn per round
    fn sample_size(&self, n: usize) -> usize {
        ((self.subsample * n as f64) as usize).max(1)
    }
}

/// GBDT trainer
pub struct GbdtTrainer {
    config: GbdtConfig,
}

impl GbdtTrainer {
    pub fn new(config: GbdtConfig) -> Self {
        Self { config }
    }

    /// Train a classifier on the given dataset
    pub fn train(&self, dataset: &Dataset) -> Result<GbdtClassifier> {
        self.config.validate()?;

        let n_samples = dataset.len();
        if n_samples == 0 {
            return Err(TrainerError::Dataset("training set is empty".into()));
        }

        let positives = dataset.positive_count();
        if positives == 0 || positives == n_samples {
            return Err(TrainerError::Training(
                "training set contains a single class".into(),
            ));
        }

        let init_score = log_odds(positives, n_samples);
        let targets: Vec<f64> = dataset.targets.iter().map(|&t| f64::from(t)).collect();
        let mut raw = vec![init_score; n_samples];

        let mut rng = LcgRng::new(self.config.seed);
        let sample_size = self.config.sample_size(n_samples);
        let all_rows: Vec<usize> = (0..n_samples).collect();

        let mut trees = Vec::with_capacity(self.config.n_estimators);

        for tree_idx in 0..self.config.n_estimators {
            let (residuals, hessians) = residuals_hessians(&targets, &raw);

            let rows = if sample_size < n_samples {
                rng.sample_indices(n_samples, sample_size)
            } else {
                all_rows.clone()
            };

            let builder = CartBuilder::new(
                &dataset.features,
                &residuals,
                &hessians,
                self.config.tree_config(),
            );
            let tree = builder.build(&rows);

            for (score, row) in raw.iter_mut().zip(&dataset.features) {
                *score += self.config.learning_rate * tree.evaluate(row);
            }

            debug!(
                "Tree {}/{}: {} leaves",
                tree_idx + 1,
                self.config.n_estimators,
                tree.leaf_count()
            );
            if (tree_idx + 1) % 50 == 0 || tree_idx + 1 == self.config.n_estimators {
                info!(
                    "Trained {}/{} trees, train log-loss {:.5}",
                    tree_idx + 1,
                    self.config.n_estimators,
                    log_loss(&targets, &raw)
                );
            }

            trees.push(tree);
        }

        Ok(GbdtClassifier::new(
            trees,
            init_score,
            self.config.learning_rate,
            dataset.feature_names.clone(),
        ))
    }
}

/// `ln(p / (1 - p))` of the positive rate
fn log_odds(positives: usize, total: usize) -> f64 {
    let p = positives as f64 / total as f64;
    (p / (1.0 - p)).ln()
}

/// Negative gradient and hessian of the logistic loss at the current raw scores
fn residuals_hessians(targets: &[f64], raw: &[f64]) -> (Vec<f64>, Vec<f64>) {
    targets
        .iter()
        .zip(raw)
        .map(|(&y, &score)| {
            let p = sigmoid(score);
            (y - p, p * (1.0 - p))
        })
        .unzip()
}

/// Mean binary cross-entropy of raw scores
fn log_loss(targets: &[f64], raw: &[f64]) -> f64 {
    let eps = 1e-15;
    let total: f64 = targets
        .iter()
        .zip(raw)
        .map(|(&y, &score)| {
            let p = sigmoid(score).clamp(eps, 1.0 - eps);
            -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
        })
        .sum();
    total / targets.len() as f64
}
