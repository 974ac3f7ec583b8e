//! Churn Core
//!
//! Inference and business rules shared by the churn service, the trainer and
//! the customer check tool.
//!
//! Modules:
//! - `gbdt`: Gradient-boosted tree classifier (`predict_proba`)
//! - `artifact`: Model artifact format and the process-wide `ModelContext`
//! - `features`: Lenient numeric coercion and reindexing onto the feature order
//! - `rules`: Bypass rules, risk bands and the scoring decision procedure
//! - `identifier`: Customer id normalization and id column detection
//! - `temporal`: Projection of recency fields to the current date
//! - `errors`: Error types

pub mod artifact;
pub mod errors;
pub mod features;
pub mod gbdt;
pub mod identifier;
pub mod rules;
pub mod temporal;

pub use artifact::{artifact_hash_hex, Artifact, ModelContext};
pub use errors::{ChurnError, Result};
pub use features::{parse_decimal, reindex, to_float, FeatureMap};
pub use gbdt::{GbdtClassifier, Node, Tree};
pub use identifier::{detect_id_column, normalize_id, ID_COLUMN};
pub use rules::{assess, bypass_reason, BypassReason, ChurnAssessment, RiskLevel};
pub use temporal::{Clock, FixedClock, SystemClock, TemporalProjection};
