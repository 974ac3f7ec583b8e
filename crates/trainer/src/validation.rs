//! Stratified k-fold cross-validation
//!
//! Fold scores are a training signal only; nothing downstream gates on them.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::dataset::Dataset;
use crate::deterministic::LcgRng;
use crate::errors::{Result, TrainerError};
use crate::metrics::{predict_probabilities, roc_auc};
use crate::trainer::{GbdtConfig, GbdtTrainer};

/// Per-fold AUC with summary statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvReport {
    /// `None` where the fold could not be scored
    pub fold_auc: Vec<Option<f64>>,
    pub mean: Option<f64>,
    pub std: Option<f64>,
}

impl CvReport {
    /// Summary over the fold scores; undefined if any fold is undefined
    pub fn from_scores(fold_auc: Vec<Option<f64>>) -> Self {
        let scores: Option<Vec<f64>> = fold_auc.iter().copied().collect();
        let (mean, std) = match scores {
            Some(scores) if !scores.is_empty() => {
                let n = scores.len() as f64;
                let mean = scores.iter().sum::<f64>() / n;
                let variance = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
                (Some(mean), Some(variance.sqrt()))
            }
            _ => (None, None),
        };
        Self {
            fold_auc,
            mean,
            std,
        }
    }
}

/// Test-fold row indices for `k` folds that keep the class ratio.
///
/// Rows of each class are shuffled with `seed` and dealt round-robin; the
/// negative deal continues where the positive deal stopped so fold sizes
/// differ by at most one.
pub fn stratified_k_fold(targets: &[u8], k: usize, seed: i64) -> Result<Vec<Vec<usize>>> {
    if k < 2 {
        return Err(TrainerError::Validation(format!(
            "cross-validation needs at least 2 folds, got {k}"
        )));
    }
    if k > targets.len() {
        return Err(TrainerError::Validation(format!(
            "cannot split {} rows into {k} folds",
            targets.len()
        )));
    }

    let mut rng = LcgRng::new(seed);
    let mut positives: Vec<usize> = (0..targets.len()).filter(|&i| targets[i] == 1).collect();
    let mut negatives: Vec<usize> = (0..targets.len()).filter(|&i| targets[i] != 1).collect();
    rng.shuffle(&mut positives);
    rng.shuffle(&mut negatives);

    let mut folds = vec![Vec::new(); k];
    for (slot, idx) in positives.into_iter().chain(negatives).enumerate() {
        folds[slot % k].push(idx);
    }
    for fold in &mut folds {
        fold.sort_unstable();
    }
    Ok(folds)
}

/// Train on k-1 folds and score AUC on the held-out fold, for every fold.
/// A fold whose training part or test part holds a single class scores `None`.
pub fn cross_validate(dataset: &Dataset, config: &GbdtConfig, k: usize) -> Result<CvReport> {
    let folds = stratified_k_fold(&dataset.targets, k, config.seed)?;
    let trainer = GbdtTrainer::new(config.clone());

    let mut scores = Vec::with_capacity(k);
    for (fold_idx, test_rows) in folds.iter().enumerate() {
        let train_rows: Vec<usize> = folds
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != fold_idx)
            .flat_map(|(_, rows)| rows.iter().copied())
            .collect();

        let test = dataset.subset(test_rows);
        let score = match trainer.train(&dataset.subset(&train_rows)) {
            Ok(model) => roc_auc(&test.targets, &predict_probabilities(&model, &test)),
            Err(TrainerError::Training(reason)) => {
                warn!("Fold {}: {}", fold_idx + 1, reason);
                None
            }
            Err(err) => return Err(err),
        };

        match score {
            Some(auc) => info!("Fold {}/{}: AUC {:.4}", fold_idx + 1, k, auc),
            None => warn!("Fold {}/{}: AUC undefined", fold_idx + 1, k),
        }
        scores.push(score);
    }

    Ok(CvReport::from_scores(scores))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folds_partition_rows_and_keep_ratio() {
        let targets: Vec<u8> = (0..50).map(|i| u8::from(i % 5 == 0)).collect();
        let folds = stratified_k_fold(&targets, 5, 42).unwrap();

        let mut all: Vec<usize> = folds.iter().flatten().copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..50).collect::<Vec<_>>());

        for fold in &folds {
            assert_eq!(fold.len(), 10);
            assert_eq!(fold.iter().filter(|&&i| targets[i] == 1).count(), 2);
        }
    }

    #[test]
    fn test_folds_are_seeded() {
        let targets: Vec<u8> = (0..30).map(|i| u8::from(i % 2 == 0)).collect();
        assert_eq!(
            stratified_k_fold(&targets, 3, 42).unwrap(),
            stratified_k_fold(&targets, 3, 42).unwrap()
        );
        assert_ne!(
            stratified_k_fold(&targets, 3, 42).unwrap(),
            stratified_k_fold(&targets, 3, 7).unwrap()
        );
    }

    #[test]
    fn test_invalid_fold_counts() {
        assert!(stratified_k_fold(&[0, 1], 1, 42).is_err());
        assert!(stratified_k_fold(&[0, 1], 3, 42).is_err());
    }

    #[test]
    fn test_report_summary() {
        let report = CvReport::from_scores(vec![Some(0.8), Some(0.9), Some(1.0)]);
        assert!((report.mean.unwrap() - 0.9).abs() < 1e-12);
        assert!((report.std.unwrap() - (0.02_f64 / 3.0).sqrt()).abs() < 1e-12);

        let undefined = CvReport::from_scores(vec![Some(0.8), None]);
        assert_eq!(undefined.mean, None);
        assert_eq!(undefined.std, None);
    }
}
