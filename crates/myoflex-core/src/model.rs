//! Immutable inference model
//!
//! A [`Model`] bundles everything fitted offline: the feature layout it was
//! trained under, the scaler, the classifier and the class names. It is
//! validated once on construction and never mutated afterwards, so it can
//! be shared read-only by any number of pipelines.
//!
//! A model may also carry a plausibility gate: predicates over the raw
//! feature vector that must all hold before a window is classified.
//! Windows failing the gate (electrode off, saturated ADC, crossed leads)
//! produce no prediction.

use alloc::string::String;
use alloc::vec::Vec;

use crate::classifier::{Classifier, ClassifierKind, Predicate, RuleSet};
use crate::error::{ConfigurationError, DimensionMismatch};
use crate::features::FeatureLayout;
use crate::normalize::Scaler;
use crate::types::{ClassId, ClassTable};

/// Fitted, shape-checked model.
#[derive(Clone, Debug, PartialEq)]
pub struct Model {
    layout: FeatureLayout,
    scaler: Scaler,
    classifier: Classifier,
    classes: ClassTable,
    gate: Vec<Predicate>,
}

impl Model {
    /// Assemble a model, checking every shape against the layout.
    ///
    /// # Errors
    ///
    /// Scaler or classifier width differs from the layout's feature count,
    /// or the class table size differs from the classifier's outputs.
    pub fn new(
        layout: FeatureLayout,
        scaler: Scaler,
        classifier: Classifier,
        classes: ClassTable,
    ) -> Result<Self, ConfigurationError> {
        let width = layout.feature_count();
        if scaler.width() != width {
            return Err(DimensionMismatch { stage: "scaler", expected: width, got: scaler.width() }.into());
        }
        if classifier.feature_count() != width {
            return Err(DimensionMismatch {
                stage: "classifier",
                expected: width,
                got: classifier.feature_count(),
            }
            .into());
        }
        if classes.len() != classifier.class_count() {
            return Err(DimensionMismatch {
                stage: "class table",
                expected: classifier.class_count(),
                got: classes.len(),
            }
            .into());
        }
        Ok(Self { layout, scaler, classifier, classes, gate: Vec::new() })
    }

    /// Attach a plausibility gate over raw features.
    ///
    /// # Errors
    ///
    /// A predicate reading past the feature vector, an empty `AllOf`, or a
    /// non-finite bound.
    pub fn with_gate(mut self, gate: Vec<Predicate>) -> Result<Self, ConfigurationError> {
        let width = self.feature_count();
        for predicate in &gate {
            predicate.validate()?;
            if let Some(feature) = predicate.max_feature() {
                if feature >= width {
                    return Err(ConfigurationError::RuleFeatureOutOfRange {
                        rule: String::from("gate"),
                        feature,
                        width,
                    });
                }
            }
        }
        self.gate = gate;
        Ok(self)
    }

    /// Plausibility predicates, empty when ungated.
    #[must_use]
    pub fn gate(&self) -> &[Predicate] {
        &self.gate
    }

    /// Whether a raw feature vector passes every gate predicate.
    #[must_use]
    pub fn is_plausible(&self, raw: &[f64]) -> bool {
        self.gate.iter().all(|p| p.evaluate(raw).is_some())
    }

    /// Rule-based model: identity scaler, rules read raw features.
    ///
    /// # Errors
    ///
    /// Same shape checks as [`Model::new`].
    pub fn rule_based(
        layout: FeatureLayout,
        rules: RuleSet,
        classes: ClassTable,
    ) -> Result<Self, ConfigurationError> {
        let scaler = Scaler::identity(layout.feature_count());
        Self::new(layout, scaler, Classifier::RuleBased(rules), classes)
    }

    /// Built-in three-channel hand controller, see [`RuleSet::hand_control`].
    ///
    /// # Errors
    ///
    /// The layout has fewer than three channels.
    pub fn hand_control(layout: FeatureLayout) -> Result<Self, ConfigurationError> {
        let (rules, classes) = RuleSet::hand_control(&layout)?;
        Self::rule_based(layout, rules, classes)
    }

    /// Feature layout the model was fitted under.
    #[must_use]
    pub fn layout(&self) -> &FeatureLayout {
        &self.layout
    }

    /// Feature normalizer.
    #[must_use]
    pub fn scaler(&self) -> &Scaler {
        &self.scaler
    }

    /// Classifier.
    #[must_use]
    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Class names.
    #[must_use]
    pub fn classes(&self) -> &ClassTable {
        &self.classes
    }

    /// Name of a class, if it exists.
    #[must_use]
    pub fn class_name(&self, class: ClassId) -> Option<&str> {
        self.classes.name(class)
    }

    /// Feature vector length.
    #[must_use]
    pub fn feature_count(&self) -> usize {
        self.layout.feature_count()
    }

    /// Refuse a model fitted under a different feature definition.
    ///
    /// # Errors
    ///
    /// `FeatureLayoutMismatch` naming the first field that differs.
    pub fn check_layout(&self, configured: &FeatureLayout) -> Result<(), ConfigurationError> {
        let reason = if self.layout.channels != configured.channels {
            "channel count differs"
        } else if self.layout.feature_set != configured.feature_set {
            "feature set differs"
        } else if self.layout.zero_crossing != configured.zero_crossing {
            "zero-crossing policy differs"
        } else {
            return Ok(());
        };
        Err(ConfigurationError::FeatureLayoutMismatch { reason })
    }

    /// Refuse a model whose strategy differs from the configured one.
    ///
    /// # Errors
    ///
    /// `ClassifierKindMismatch`.
    pub fn check_kind(&self, configured: ClassifierKind) -> Result<(), ConfigurationError> {
        let actual = self.classifier.kind();
        if actual == configured {
            Ok(())
        } else {
            Err(ConfigurationError::ClassifierKindMismatch {
                configured: configured.name(),
                model: actual.name(),
            })
        }
    }
}
