//! Binary gradient-boosted classifier
//!
//! Raw score is `init_score + learning_rate * Σ tree(x)` in log-odds space;
//! the churn probability is the logistic of that score.

use super::tree::Tree;
use crate::errors::{ChurnError, Result};
use serde::{Deserialize, Serialize};

/// Current artifact format version
pub const MODEL_VERSION: i32 = 1;

/// Label of the positive (churn) class
pub const CHURN_CLASS: i64 = 1;

fn default_classes() -> Vec<i64> {
    vec![0, CHURN_CLASS]
}

/// Fitted gradient-boosted binary classifier
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GbdtClassifier {
    /// Model format version
    pub version: i32,

    /// Class labels in probability-column order
    #[serde(default = "default_classes")]
    pub classes: Vec<i64>,

    /// Prior log-odds of the positive class
    pub init_score: f64,

    /// Shrinkage applied to every tree contribution
    pub learning_rate: f64,

    /// Boosting stages
    pub trees: Vec<Tree>,

    /// Columns the model was fit on, in input order
    #[serde(default)]
    pub feature_names_in: Vec<String>,
}

impl GbdtClassifier {
    pub fn new(
        trees: Vec<Tree>,
        init_score: f64,
        learning_rate: f64,
        feature_names_in: Vec<String>,
    ) -> Self {
        Self {
            version: MODEL_VERSION,
            classes: default_classes(),
            init_score,
            learning_rate,
            trees,
            feature_names_in,
        }
    }

    /// Validate model structure against the feature count it will be fed
    pub fn validate(&self, feature_count: usize) -> Result<()> {
        if self.version != MODEL_VERSION {
            return Err(ChurnError::InvalidModel(format!(
                "Unsupported model version: {}",
                self.version
            )));
        }

        if self.classes.len() != 2 {
            return Err(ChurnError::InvalidModel(format!(
                "Expected 2 classes, found {}",
                self.classes.len()
            )));
        }

        if !self.init_score.is_finite() || !self.learning_rate.is_finite() {
            return Err(ChurnError::InvalidModel(
                "init_score and learning_rate must be finite".to_string(),
            ));
        }

        if self.learning_rate <= 0.0 {
            return Err(ChurnError::InvalidModel(format!(
                "Invalid learning_rate: {}",
                self.learning_rate
            )));
        }

        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(feature_count).map_err(|e| {
                ChurnError::InvalidModel(format!("Tree {} validation failed: {}", i, e))
            })?;
        }

        Ok(())
    }

    /// Raw log-odds score of the positive class
    pub fn decision_function(&self, features: &[f64]) -> f64 {
        let boosted: f64 = self.trees.iter().map(|tree| tree.evaluate(features)).sum();
        self.init_score + self.learning_rate * boosted
    }

    /// Class probabilities in `classes` order
    pub fn predict_proba(&self, features: &[f64]) -> [f64; 2] {
        let positive = sigmoid(self.decision_function(features));
        [1.0 - positive, positive]
    }

    /// Column of `predict_proba` holding the churn class.
    ///
    /// Falls back to column 1 when the labels are not literally `{0, 1}`.
    pub fn churn_class_index(&self) -> usize {
        self.classes
            .iter()
            .position(|&c| c == CHURN_CLASS)
            .filter(|&idx| idx < 2)
            .unwrap_or(1)
    }

    /// Probability mass assigned to the churn class
    pub fn churn_probability(&self, features: &[f64]) -> f64 {
        self.predict_proba(features)[self.churn_class_index()]
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }
}

/// Numerically stable logistic function
pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}
