//! Decision tree structures for the boosted classifier
//!
//! Trees are stored as flat node arrays (node 0 is the root) so they
//! serialize compactly inside the model artifact.

use serde::{Deserialize, Serialize};

/// A decision tree node (internal or leaf)
///
/// For internal nodes:
/// - `feature_idx >= 0`: index into the canonical feature vector
/// - `left` and `right` point to child node indices
/// - `leaf` is `None`
///
/// For leaf nodes:
/// - `feature_idx == -1`
/// - `leaf` contains the raw (log-odds) contribution
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    /// Node ID (for reference, not used in traversal)
    pub id: i32,

    /// Left child index (-1 for leaf nodes)
    pub left: i32,

    /// Right child index (-1 for leaf nodes)
    pub right: i32,

    /// Feature index to split on (-1 for leaf nodes)
    #[serde(rename = "feature_idx", alias = "feature")]
    pub feature_idx: i32,

    /// Split threshold; samples with `value <= threshold` go left
    pub threshold: f64,

    /// Leaf value (Some for leaf nodes, None for internal nodes)
    pub leaf: Option<f64>,
}

impl Node {
    /// Create a new internal (split) node
    pub fn internal(id: i32, feature_idx: i32, threshold: f64, left: i32, right: i32) -> Self {
        Self {
            id,
            left,
            right,
            feature_idx,
            threshold,
            leaf: None,
        }
    }

    /// Create a new leaf node
    pub fn leaf(id: i32, value: f64) -> Self {
        Self {
            id,
            left: -1,
            right: -1,
            feature_idx: -1,
            threshold: 0.0,
            leaf: Some(value),
        }
    }

    /// Check if this node is a leaf
    pub fn is_leaf(&self) -> bool {
        self.feature_idx == -1 || self.leaf.is_some()
    }

    /// Get the leaf value if this is a leaf node
    pub fn leaf_value(&self) -> Option<f64> {
        self.leaf
    }
}

/// A single regression tree of the ensemble
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tree {
    /// Tree nodes (node 0 is the root)
    pub nodes: Vec<Node>,
}

impl Tree {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    /// Evaluate this tree on a feature vector.
    ///
    /// Malformed structure (dangling child, out-of-range feature) yields 0.0
    /// rather than panicking; `validate` rejects such trees at load time.
    pub fn evaluate(&self, features: &[f64]) -> f64 {
        if self.nodes.is_empty() {
            return 0.0;
        }

        let mut idx = 0usize;

        // A valid tree reaches a leaf in at most `nodes.len()` steps.
        for _ in 0..=self.nodes.len() {
            let node = &self.nodes[idx];

            if node.is_leaf() {
                return node.leaf_value().unwrap_or(0.0);
            }

            let feature_idx = node.feature_idx as usize;
            let Some(&value) = features.get(feature_idx) else {
                return 0.0;
            };

            let next = if value <= node.threshold {
                node.left
            } else {
                node.right
            };

            if next < 0 || next as usize >= self.nodes.len() {
                return 0.0;
            }
            idx = next as usize;
        }

        0.0
    }

    /// Get the root node
    pub fn root(&self) -> Option<&Node> {
        self.nodes.first()
    }

    /// Number of leaves in the tree
    pub fn leaf_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Validate tree structure against the expected feature count
    pub fn validate(&self, feature_count: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("Tree has no nodes".to_string());
        }

        for (i, node) in self.nodes.iter().enumerate() {
            if node.is_leaf() {
                match node.leaf {
                    Some(value) if value.is_finite() => {}
                    Some(value) => {
                        return Err(format!("Leaf {} has non-finite value {}", i, value))
                    }
                    None => return Err(format!("Leaf {} has no value", i)),
                }
                continue;
            }

            // Children must point forward; this also rules out cycles.
            if node.left <= i as i32 || node.left as usize >= self.nodes.len() {
                return Err(format!("Node {} has invalid left child: {}", i, node.left));
            }
            if node.right <= i as i32 || node.right as usize >= self.nodes.len() {
                return Err(format!("Node {} has invalid right child: {}", i, node.right));
            }
            if node.feature_idx < 0 || node.feature_idx as usize >= feature_count {
                return Err(format!(
                    "Node {} splits on feature {} but model has {} features",
                    i, node.feature_idx, feature_count
                ));
            }
            if !node.threshold.is_finite() {
                return Err(format!("Node {} has non-finite threshold", i));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stump() -> Tree {
        Tree::new(vec![
            Node::internal(0, 0, 0.5, 1, 2),
            Node::leaf(1, -1.0),
            Node::leaf(2, 1.0),
        ])
    }

    #[test]
    fn test_threshold_goes_left_inclusive() {
        let tree = stump();
        assert_eq!(tree.evaluate(&[0.5]), -1.0);
        assert_eq!(tree.evaluate(&[0.2]), -1.0);
        assert_eq!(tree.evaluate(&[0.9]), 1.0);
    }

    #[test]
    fn test_missing_feature_yields_zero() {
        let tree = stump();
        assert_eq!(tree.evaluate(&[]), 0.0);
    }

    #[test]
    fn test_validate_rejects_backward_child() {
        let tree = Tree::new(vec![
            Node::internal(0, 0, 0.5, 0, 1),
            Node::leaf(1, 0.0),
        ]);
        assert!(tree.validate(1).is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_feature() {
        assert!(stump().validate(1).is_ok());
        assert!(stump().validate(0).is_err());
    }

    #[test]
    fn test_leaf_count() {
        assert_eq!(stump().leaf_count(), 2);
        assert_eq!(stump().root().map(|n| n.feature_idx), Some(0));
    }
}
