//! Gradient Boosted Decision Tree classifier
//!
//! The classifier is a list of regression trees evaluated on the canonical
//! feature vector. Tree outputs are summed in log-odds space, shrunk by the
//! learning rate and offset by the prior, then mapped through the logistic
//! function to give `predict_proba`.
//!
//! # Usage
//!
//! ```rust
//! use churn_core::gbdt::{GbdtClassifier, Node, Tree};
//!
//! let tree = Tree::new(vec![
//!     Node::internal(0, 0, 30.0, 1, 2),
//!     Node::leaf(1, -1.5),
//!     Node::leaf(2, 1.5),
//! ]);
//! let model = GbdtClassifier::new(vec![tree], 0.0, 0.1, vec!["DAYS_SINCE_LAST".into()]);
//!
//! let [_, churn] = model.predict_proba(&[45.0]);
//! assert!(churn > 0.5);
//! ```

pub mod classifier;
pub mod tree;

pub use classifier::{sigmoid, GbdtClassifier, CHURN_CLASS, MODEL_VERSION};
pub use tree::{Node, Tree};
