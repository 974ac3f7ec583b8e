//! CART (Classification and Regression Tree) builder
//!
//! Fits one regression tree to the logistic-loss residuals of a boosting
//! round. Splits are chosen by exact greedy search on squared-error
//! reduction of the residuals; leaves take a single Newton step
//! `sum(residual) / sum(hessian)`.

use churn_core::gbdt::{Node, Tree};

/// Gain below which a split is not worth making
const MIN_GAIN: f64 = 1e-12;

/// Denominator below which a leaf outputs zero
const MIN_HESSIAN: f64 = 1e-150;

/// Training parameters for a single tree
#[derive(Clone, Debug)]
pub struct TreeConfig {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 3,
            min_samples_split: 20,
            min_samples_leaf: 10,
        }
    }
}

/// Best split found for a node
#[derive(Debug, Clone)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    gain: f64,
}

/// Build a regression tree using exact-greedy CART algorithm
pub struct CartBuilder<'a> {
    config: TreeConfig,
    features: &'a [Vec<f64>],
    residuals: &'a [f64],
    hessians: &'a [f64],
    feature_count: usize,
}

impl<'a> CartBuilder<'a> {
    pub fn new(
        features: &'a [Vec<f64>],
        residuals: &'a [f64],
        hessians: &'a [f64],
        config: TreeConfig,
    ) -> Self {
        debug_assert_eq!(features.len(), residuals.len());
        debug_assert_eq!(features.len(), hessians.len());

        let feature_count = features.first().map(Vec::len).unwrap_or(0);

        Self {
            config,
            features,
            residuals,
            hessians,
            feature_count,
        }
    }

    /// Build a tree over the rows in `indices`
    pub fn build(&self, indices: &[usize]) -> Tree {
        let mut nodes = Vec::new();
        self.build_node(indices, 0, &mut nodes);
        Tree::new(nodes)
    }

    /// Recursively build tree nodes, returning the index of the created node
    fn build_node(&self, indices: &[usize], depth: usize, nodes: &mut Vec<Node>) -> i32 {
        let current_idx = nodes.len() as i32;

        let splittable = depth < self.config.max_depth
            && indices.len() >= self.config.min_samples_split
            && indices.len() >= 2 * self.config.min_samples_leaf;

        let split = if splittable {
            self.find_best_split(indices)
        } else {
            None
        };

        let Some(split) = split else {
            nodes.push(Node::leaf(current_idx, self.leaf_value(indices)));
            return current_idx;
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| self.features[i][split.feature_idx] <= split.threshold);

        // Reserve space for current node
        nodes.push(Node::internal(
            current_idx,
            split.feature_idx as i32,
            split.threshold,
            0,
            0,
        ));

        let left_idx = self.build_node(&left_indices, depth + 1, nodes);
        let right_idx = self.build_node(&right_indices, depth + 1, nodes);

        let node = &mut nodes[current_idx as usize];
        node.left = left_idx;
        node.right = right_idx;

        current_idx
    }

    /// Exact greedy search over every feature and every boundary between
    /// distinct sorted values. Ties keep the earlier feature and threshold.
    fn find_best_split(&self, indices: &[usize]) -> Option<SplitCandidate> {
        let n = indices.len();
        let min_leaf = self.config.min_samples_leaf.max(1);
        let total: f64 = indices.iter().map(|&i| self.residuals[i]).sum();
        let parent_score = total * total / n as f64;

        let mut best: Option<SplitCandidate> = None;
        let mut order = indices.to_vec();

        for feature_idx in 0..self.feature_count {
            order.sort_by(|&a, &b| {
                self.features[a][feature_idx].total_cmp(&self.features[b][feature_idx])
            });

            let mut left_sum = 0.0;
            for pos in 1..n {
                left_sum += self.residuals[order[pos - 1]];

                let lo = self.features[order[pos - 1]][feature_idx];
                let hi = self.features[order[pos]][feature_idx];
                if lo >= hi || pos < min_leaf || n - pos < min_leaf {
                    continue;
                }

                let right_sum = total - left_sum;
                let gain = left_sum * left_sum / pos as f64
                    + right_sum * right_sum / (n - pos) as f64
                    - parent_score;

                if gain <= MIN_GAIN {
                    continue;
                }
                if best.as_ref().map_or(true, |b| gain > b.gain) {
                    best = Some(SplitCandidate {
                        feature_idx,
                        threshold: midpoint(lo, hi),
                        gain,
                    });
                }
            }
        }

        best
    }

    /// Newton step for the logistic loss
    fn leaf_value(&self, indices: &[usize]) -> f64 {
        let numerator: f64 = indices.iter().map(|&i| self.residuals[i]).sum();
        let denominator: f64 = indices.iter().map(|&i| self.hessians[i]).sum();

        if denominator.abs() < MIN_HESSIAN {
            0.0
        } else {
            numerator / denominator
        }
    }
}

/// Threshold between two adjacent distinct values; stays strictly below `hi`
fn midpoint(lo: f64, hi: f64) -> f64 {
    let mid = lo + (hi - lo) / 2.0;
    if mid >= hi {
        lo
    } else {
        mid
    }
}
