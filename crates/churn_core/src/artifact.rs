//! Model artifact packaging and process-lifetime model context
//!
//! An artifact is either a bare classifier or a `{model, features}` wrapper.
//! The serving process loads it once into a [`ModelContext`] and shares that
//! context read-only with every request handler.

use crate::errors::{ChurnError, Result};
use crate::gbdt::GbdtClassifier;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Serialized model bundle
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Artifact {
    /// Classifier plus its ordered feature list
    Wrapped {
        model: GbdtClassifier,
        features: Vec<String>,
    },
    /// Classifier alone; features come from `feature_names_in`
    Bare(GbdtClassifier),
}

impl Artifact {
    pub fn wrap(model: GbdtClassifier, features: Vec<String>) -> Self {
        Artifact::Wrapped { model, features }
    }

    /// Split into the classifier and its canonical feature order
    pub fn into_parts(self) -> (GbdtClassifier, Vec<String>) {
        match self {
            Artifact::Wrapped { model, features } => (model, features),
            Artifact::Bare(model) => {
                let features = model.feature_names_in.clone();
                (model, features)
            }
        }
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Compact JSON encoding used on disk
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Write the artifact and return the blake3 hex digest of the written bytes
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<String> {
        let json = self.to_json()?;
        fs::write(path, &json)?;
        Ok(artifact_hash_hex(json.as_bytes()))
    }
}

/// Blake3 digest of raw artifact bytes, hex encoded
pub fn artifact_hash_hex(bytes: &[u8]) -> String {
    hex::encode(blake3::hash(bytes).as_bytes())
}

/// Immutable model state built once at startup
#[derive(Debug, Clone)]
pub struct ModelContext {
    model: Option<GbdtClassifier>,
    features: Vec<String>,
    model_hash: Option<String>,
    source: PathBuf,
}

impl ModelContext {
    /// Degraded context: no model, no features
    pub fn unloaded<P: Into<PathBuf>>(source: P) -> Self {
        Self {
            model: None,
            features: Vec::new(),
            model_hash: None,
            source: source.into(),
        }
    }

    /// Build a context from an in-memory classifier
    pub fn from_parts(model: GbdtClassifier, features: Vec<String>) -> Result<Self> {
        model.validate(features.len())?;
        Ok(Self {
            model: Some(model),
            features,
            model_hash: None,
            source: PathBuf::new(),
        })
    }

    /// Load the artifact at `path`.
    ///
    /// A missing file is not an error: the context comes back unloaded so the
    /// service can still start. An unreadable or malformed artifact is.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!("Model artifact not found at {}", path.display());
            return Ok(Self::unloaded(path));
        }

        let bytes = fs::read(path)?;
        let (model, features) = Artifact::from_slice(&bytes)?.into_parts();
        if features.is_empty() {
            return Err(ChurnError::InvalidModel(
                "artifact carries no feature names".to_string(),
            ));
        }
        model.validate(features.len())?;

        let model_hash = artifact_hash_hex(&bytes);
        info!(
            trees = model.num_trees(),
            features = features.len(),
            hash = %model_hash,
            "Loaded model artifact from {}",
            path.display()
        );

        Ok(Self {
            model: Some(model),
            features,
            model_hash: Some(model_hash),
            source: path.to_path_buf(),
        })
    }

    pub fn is_loaded(&self) -> bool {
        self.model.is_some()
    }

    /// The classifier, or `ModelUnavailable` in degraded mode
    pub fn model(&self) -> Result<&GbdtClassifier> {
        self.model.as_ref().ok_or(ChurnError::ModelUnavailable)
    }

    /// Canonical feature order (empty in degraded mode)
    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn model_hash(&self) -> Option<&str> {
        self.model_hash.as_deref()
    }

    pub fn source(&self) -> &Path {
        &self.source
    }
}
