//! Gesture classifiers
//!
//! The strategy set is closed: one-vs-rest linear scoring, a ReLU
//! feed-forward network, or ordered threshold rules. All produce a
//! `(class, score)` pair where the score is the raw decision value of the
//! winner; none of them are probabilities.

pub mod linear;
pub mod network;
pub mod rules;

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, DimensionMismatch};
use crate::types::ClassId;

pub use linear::LinearModel;
pub use network::{DenseLayer, NetworkModel, MAX_LAYER_WIDTH};
pub use rules::{Predicate, Rule, RuleSet};

/// Name of a classification strategy, as used in configuration files.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierKind {
    /// One-vs-rest linear
    Linear,
    /// Feed-forward network
    Network,
    /// Threshold rules
    Rules,
}

impl ClassifierKind {
    /// Configuration string for this kind.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::Network => "network",
            Self::Rules => "rules",
        }
    }

    /// Parse a configuration string.
    ///
    /// # Errors
    ///
    /// `ConfigurationError::UnknownClassifier` for anything else.
    pub fn parse(kind: &str) -> Result<Self, ConfigurationError> {
        match kind {
            "linear" => Ok(Self::Linear),
            "network" | "mlp" => Ok(Self::Network),
            "rules" | "rule_based" => Ok(Self::Rules),
            other => Err(ConfigurationError::UnknownClassifier { kind: other.into() }),
        }
    }
}

impl fmt::Display for ClassifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A fitted classifier.
#[derive(Clone, Debug, PartialEq)]
pub enum Classifier {
    /// One-vs-rest linear
    Linear(LinearModel),
    /// Feed-forward network
    Network(NetworkModel),
    /// Threshold rules
    RuleBased(RuleSet),
}

impl Classifier {
    /// Strategy of this classifier.
    #[must_use]
    pub const fn kind(&self) -> ClassifierKind {
        match self {
            Self::Linear(_) => ClassifierKind::Linear,
            Self::Network(_) => ClassifierKind::Network,
            Self::RuleBased(_) => ClassifierKind::Rules,
        }
    }

    /// Feature vector length this classifier consumes.
    #[must_use]
    pub fn feature_count(&self) -> usize {
        match self {
            Self::Linear(m) => m.feature_count(),
            Self::Network(m) => m.feature_count(),
            Self::RuleBased(r) => r.feature_count(),
        }
    }

    /// Number of classes it can emit.
    #[must_use]
    pub fn class_count(&self) -> usize {
        match self {
            Self::Linear(m) => m.class_count(),
            Self::Network(m) => m.class_count(),
            Self::RuleBased(r) => r.class_count(),
        }
    }

    /// Classify a feature vector.
    ///
    /// # Errors
    ///
    /// `DimensionMismatch` if `x` has the wrong length.
    #[inline]
    pub fn classify(&self, x: &[f64]) -> Result<(ClassId, f64), DimensionMismatch> {
        match self {
            Self::Linear(m) => m.classify(x),
            Self::Network(m) => m.classify(x),
            Self::RuleBased(r) => r.classify(x),
        }
    }
}
