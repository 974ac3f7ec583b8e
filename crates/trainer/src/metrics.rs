//! Evaluation metrics for binary classifiers

use churn_core::gbdt::GbdtClassifier;
use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;

/// Probability at or above which a row is predicted to churn
pub const DECISION_THRESHOLD: f64 = 0.5;

/// Area under the ROC curve from the rank statistic, ties sharing the mean
/// rank. `None` when either class is absent.
pub fn roc_auc(labels: &[u8], scores: &[f64]) -> Option<f64> {
    let positives = labels.iter().filter(|&&l| l == 1).count();
    let negatives = labels.len() - positives;
    if positives == 0 || negatives == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut positive_rank_sum = 0.0;
    let mut start = 0;
    while start < order.len() {
        let mut end = start;
        while end + 1 < order.len() && scores[order[end + 1]] == scores[order[start]] {
            end += 1;
        }
        // ranks are 1-based
        let mean_rank = (start + end) as f64 / 2.0 + 1.0;
        for &idx in &order[start..=end] {
            if labels[idx] == 1 {
                positive_rank_sum += mean_rank;
            }
        }
        start = end + 1;
    }

    let p = positives as f64;
    let n = negatives as f64;
    Some((positive_rank_sum - p * (p + 1.0) / 2.0) / (p * n))
}

/// Churn probability for every row of `dataset`
pub fn predict_probabilities(model: &GbdtClassifier, dataset: &Dataset) -> Vec<f64> {
    dataset
        .features
        .iter()
        .map(|row| model.churn_probability(row))
        .collect()
}

/// Held-out metrics at [`DECISION_THRESHOLD`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    #[serde(rename = "Accuracy")]
    pub accuracy: f64,
    #[serde(rename = "AUC")]
    pub auc: Option<f64>,
    #[serde(rename = "Precision")]
    pub precision: f64,
    #[serde(rename = "Recall")]
    pub recall: f64,
    #[serde(rename = "F1")]
    pub f1: f64,
    #[serde(rename = "True_Positive")]
    pub true_positives: usize,
    #[serde(rename = "False_Positive")]
    pub false_positives: usize,
    #[serde(rename = "False_Negative")]
    pub false_negatives: usize,
    #[serde(rename = "True_Negative")]
    pub true_negatives: usize,
}

impl EvaluationReport {
    pub fn from_probabilities(labels: &[u8], probabilities: &[f64]) -> Self {
        let (mut tp, mut fp, mut fn_, mut tn) = (0, 0, 0, 0);
        for (&label, &p) in labels.iter().zip(probabilities) {
            match (label == 1, p >= DECISION_THRESHOLD) {
                (true, true) => tp += 1,
                (false, true) => fp += 1,
                (true, false) => fn_ += 1,
                (false, false) => tn += 1,
            }
        }

        let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1 = if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        };

        Self {
            accuracy: ratio(tp + tn, labels.len()),
            auc: roc_auc(labels, probabilities),
            precision,
            recall,
            f1,
            true_positives: tp,
            false_positives: fp,
            false_negatives: fn_,
            true_negatives: tn,
        }
    }

    pub fn evaluate(model: &GbdtClassifier, dataset: &Dataset) -> Self {
        Self::from_probabilities(&dataset.targets, &predict_probabilities(model, dataset))
    }
}
