//! Ordered threshold rules over raw features
//!
//! The first rule whose predicate holds decides the class; if none holds
//! the default class is emitted with score 0. A matched rule scores the
//! margin of its first leaf predicate (how far past the threshold the
//! feature was).

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, DimensionMismatch};
use crate::features::{FeatureKind, FeatureLayout};
use crate::types::{ClassId, ClassTable};

/// Condition over a feature vector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Predicate {
    /// `x[feature] > threshold`
    Above {
        /// Feature index
        feature: usize,
        /// Exclusive lower bound
        threshold: f64,
    },
    /// `x[feature] < threshold`
    Below {
        /// Feature index
        feature: usize,
        /// Exclusive upper bound
        threshold: f64,
    },
    /// `x[numerator] / x[denominator] > ratio`; never holds when the
    /// denominator is not positive
    RatioAbove {
        /// Numerator feature index
        numerator: usize,
        /// Denominator feature index
        denominator: usize,
        /// Exclusive lower bound on the ratio
        ratio: f64,
    },
    /// Every nested predicate holds
    AllOf {
        /// Nested predicates
        predicates: Vec<Predicate>,
    },
}

impl Predicate {
    /// `min < x[feature] < max`.
    #[must_use]
    pub fn within(feature: usize, min: f64, max: f64) -> Self {
        Self::AllOf {
            predicates: vec![
                Self::Above { feature, threshold: min },
                Self::Below { feature, threshold: max },
            ],
        }
    }

    /// Margin of the first leaf if the predicate holds.
    #[must_use]
    pub fn evaluate(&self, x: &[f64]) -> Option<f64> {
        match self {
            Self::Above { feature, threshold } => {
                let v = *x.get(*feature)?;
                (v > *threshold).then(|| v - threshold)
            }
            Self::Below { feature, threshold } => {
                let v = *x.get(*feature)?;
                (v < *threshold).then(|| threshold - v)
            }
            Self::RatioAbove { numerator, denominator, ratio } => {
                let n = *x.get(*numerator)?;
                let d = *x.get(*denominator)?;
                if d <= 0.0 {
                    return None;
                }
                let r = n / d;
                (r > *ratio).then(|| r - ratio)
            }
            Self::AllOf { predicates } => {
                let mut margin = None;
                for p in predicates {
                    let m = p.evaluate(x)?;
                    margin.get_or_insert(m);
                }
                margin
            }
        }
    }

    /// Largest feature index referenced.
    pub(crate) fn max_feature(&self) -> Option<usize> {
        match self {
            Self::Above { feature, .. } | Self::Below { feature, .. } => Some(*feature),
            Self::RatioAbove { numerator, denominator, .. } => Some((*numerator).max(*denominator)),
            Self::AllOf { predicates } => predicates.iter().filter_map(Self::max_feature).max(),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigurationError> {
        match self {
            Self::Above { threshold, .. } | Self::Below { threshold, .. } => {
                finite_threshold(*threshold)
            }
            Self::RatioAbove { ratio, .. } => finite_threshold(*ratio),
            Self::AllOf { predicates } => {
                if predicates.is_empty() {
                    return Err(ConfigurationError::MissingParameter { name: "rule.all_of" });
                }
                predicates.iter().try_for_each(Self::validate)
            }
        }
    }
}

fn finite_threshold(value: f64) -> Result<(), ConfigurationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigurationError::NonFiniteParameter { name: "rule.threshold", index: 0 })
    }
}

/// Named rule mapping a predicate to a class.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Human-readable name, used in diagnostics
    pub name: String,
    /// Condition that selects this rule
    pub predicate: Predicate,
    /// Class emitted when the predicate holds
    pub class: ClassId,
}

impl Rule {
    /// Create a rule.
    #[must_use]
    pub fn new(name: &str, predicate: Predicate, class: ClassId) -> Self {
        Self { name: String::from(name), predicate, class }
    }
}

/// Validated, ordered rule table.
#[derive(Clone, Debug, PartialEq)]
pub struct RuleSet {
    rules: Vec<Rule>,
    default_class: ClassId,
    class_count: usize,
    feature_count: usize,
}

impl RuleSet {
    /// Validate rules against a feature width and class count.
    ///
    /// # Errors
    ///
    /// A rule reading past `feature_count`, a class (rule or default)
    /// outside `class_count`, an empty `AllOf`, or a non-finite threshold.
    pub fn new(
        rules: Vec<Rule>,
        default_class: ClassId,
        class_count: usize,
        feature_count: usize,
    ) -> Result<Self, ConfigurationError> {
        if feature_count == 0 {
            return Err(ConfigurationError::MissingParameter { name: "rules.feature_count" });
        }
        let check_class = |class: ClassId| {
            if class.index() < class_count {
                Ok(())
            } else {
                Err(ConfigurationError::ClassOutOfRange { class: class.0, class_count })
            }
        };
        check_class(default_class)?;

        for rule in &rules {
            rule.predicate.validate()?;
            check_class(rule.class)?;
            if let Some(feature) = rule.predicate.max_feature() {
                if feature >= feature_count {
                    return Err(ConfigurationError::RuleFeatureOutOfRange {
                        rule: rule.name.clone(),
                        feature,
                        width: feature_count,
                    });
                }
            }
        }

        Ok(Self { rules, default_class, class_count, feature_count })
    }

    /// Threshold controller for a three-muscle hand.
    ///
    /// Channel 0 RMS above 400 closes the fingers, channel 1 RMS above 350
    /// opens the thumb, channel 2 RMS above 450 opens the fingers; checked
    /// in that order, otherwise `idle`. Thresholds are in raw ADC counts.
    ///
    /// # Errors
    ///
    /// The layout has fewer than three channels.
    pub fn hand_control(layout: &FeatureLayout) -> Result<(Self, ClassTable), ConfigurationError> {
        const IDLE: ClassId = ClassId(0);
        const CLOSE: ClassId = ClassId(1);
        const OPEN: ClassId = ClassId(2);
        const THUMB: ClassId = ClassId(3);

        let classes = ClassTable::from_names(&["idle", "close", "open", "thumb"]);
        let rms = |channel: usize| {
            layout.index_of(channel, FeatureKind::Rms).ok_or(ConfigurationError::Dimension(
                DimensionMismatch { stage: "hand control channels", expected: 3, got: layout.channels },
            ))
        };

        let rules = vec![
            Rule::new("close", Predicate::Above { feature: rms(0)?, threshold: 400.0 }, CLOSE),
            Rule::new("thumb", Predicate::Above { feature: rms(1)?, threshold: 350.0 }, THUMB),
            Rule::new("open", Predicate::Above { feature: rms(2)?, threshold: 450.0 }, OPEN),
        ];
        let set = Self::new(rules, IDLE, classes.len(), layout.feature_count())?;
        Ok((set, classes))
    }

    /// Rules in evaluation order.
    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Class emitted when no rule matches.
    #[must_use]
    pub fn default_class(&self) -> ClassId {
        self.default_class
    }

    /// Number of classes the rules may emit.
    #[must_use]
    pub fn class_count(&self) -> usize {
        self.class_count
    }

    /// Feature vector length the rules were validated against.
    #[must_use]
    pub fn feature_count(&self) -> usize {
        self.feature_count
    }

    /// Classify a feature vector.
    ///
    /// # Errors
    ///
    /// `DimensionMismatch` if `x` is not [`Self::feature_count`] long.
    pub fn classify(&self, x: &[f64]) -> Result<(ClassId, f64), DimensionMismatch> {
        if x.len() != self.feature_count {
            return Err(DimensionMismatch {
                stage: "rule classifier",
                expected: self.feature_count,
                got: x.len(),
            });
        }
        Ok(self
            .rules
            .iter()
            .find_map(|rule| rule.predicate.evaluate(x).map(|margin| (rule.class, margin)))
            .unwrap_or((self.default_class, 0.0)))
    }
}
