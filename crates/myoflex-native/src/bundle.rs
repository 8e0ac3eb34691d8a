//! Model parameter bundles
//!
//! A bundle is a versioned JSON document written by offline training and
//! read once at startup:
//!
//! ```json
//! {
//!   "format_version": 1,
//!   "channels": 3,
//!   "feature_set": "time_domain6",
//!   "zero_crossing": { "policy": "mean_crossing" },
//!   "feature_count": 18,
//!   "class_count": 2,
//!   "class_names": ["rest", "fist"],
//!   "scaler": { "mean": [...], "scale": [...] },
//!   "classifier": { "kind": "linear", "coefficients": [[...], [...]], "intercepts": [0.1, -0.1] }
//! }
//! ```
//!
//! `classifier.kind` is one of `linear`, `network` (`layers` of
//! `{weights, biases}` with weights shaped `[outputs][inputs]`) or `rules`
//! (`rules` plus `default_class`, scaler optional). An optional `gate`
//! lists predicates the raw features must satisfy before classification.
//! Every shape is checked before a [`Model`] is handed out.

use std::fs;
use std::path::Path;

use myoflex_core::classifier::{
    Classifier, ClassifierKind, DenseLayer, LinearModel, NetworkModel, Predicate, Rule, RuleSet,
};
use myoflex_core::error::ConfigurationError;
use myoflex_core::features::{FeatureLayout, FeatureSet, ZeroCrossing};
use myoflex_core::model::Model;
use myoflex_core::normalize::Scaler;
use myoflex_core::types::{ClassId, ClassTable};
use serde::{Deserialize, Serialize};

use crate::error::{BundleError, BundleResult};

/// Bundle layout version this build reads.
pub const FORMAT_VERSION: u32 = 1;

/// Scaler parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScalerParams {
    /// Per-feature means
    pub mean: Vec<f64>,
    /// Per-feature scales
    pub scale: Vec<f64>,
}

/// One network layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayerParams {
    /// `[outputs][inputs]`
    pub weights: Vec<Vec<f64>>,
    /// `[outputs]`
    pub biases: Vec<f64>,
}

/// Linear classifier parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinearParams {
    /// `[classes][features]`
    pub coefficients: Vec<Vec<f64>>,
    /// `[classes]`
    pub intercepts: Vec<f64>,
}

/// Network classifier parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NetworkParams {
    /// Layers in evaluation order
    pub layers: Vec<LayerParams>,
}

/// Rule classifier parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RuleParams {
    /// Rules in priority order
    pub rules: Vec<Rule>,
    /// Class when nothing matches
    pub default_class: ClassId,
}

/// Classifier section, tagged by `kind`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassifierParams {
    /// One-vs-rest linear
    Linear(LinearParams),
    /// Feed-forward network
    #[serde(alias = "mlp")]
    Network(NetworkParams),
    /// Threshold rules
    #[serde(alias = "rule_based")]
    Rules(RuleParams),
}

impl ClassifierParams {
    /// Strategy named by this section.
    #[must_use]
    pub fn kind(&self) -> ClassifierKind {
        match self {
            Self::Linear(_) => ClassifierKind::Linear,
            Self::Network(_) => ClassifierKind::Network,
            Self::Rules(_) => ClassifierKind::Rules,
        }
    }

    fn build(self, class_count: usize, feature_count: usize) -> Result<Classifier, ConfigurationError> {
        Ok(match self {
            Self::Linear(p) => Classifier::Linear(LinearModel::new(p.coefficients, p.intercepts)?),
            Self::Network(p) => {
                let layers = p
                    .layers
                    .into_iter()
                    .map(|l| DenseLayer::new(l.weights, l.biases))
                    .collect::<Result<Vec<_>, _>>()?;
                Classifier::Network(NetworkModel::new(layers)?)
            }
            Self::Rules(p) => {
                Classifier::RuleBased(RuleSet::new(p.rules, p.default_class, class_count, feature_count)?)
            }
        })
    }
}

/// Serialized model bundle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelBundle {
    /// Layout version
    pub format_version: u32,
    /// Channels the model was fitted on
    pub channels: usize,
    /// Per-channel feature order
    #[serde(default)]
    pub feature_set: FeatureSet,
    /// Zero-crossing policy used when fitting
    #[serde(default)]
    pub zero_crossing: ZeroCrossing,
    /// Declared feature vector length
    pub feature_count: usize,
    /// Declared number of classes
    pub class_count: usize,
    /// Class names in id order
    pub class_names: Vec<String>,
    /// Feature scaler; optional for rule bundles
    #[serde(default)]
    pub scaler: Option<ScalerParams>,
    /// Classifier parameters
    pub classifier: ClassifierParams,
    /// Plausibility predicates over raw features
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gate: Vec<Predicate>,
}

impl ModelBundle {
    /// Parse a bundle from JSON text.
    ///
    /// # Errors
    ///
    /// Malformed JSON, an unknown `classifier.kind`, or an unsupported
    /// `format_version`.
    pub fn from_json(text: &str) -> BundleResult<Self> {
        let value: serde_json::Value = serde_json::from_str(text)?;

        let version = value
            .get("format_version")
            .and_then(serde_json::Value::as_u64)
            .ok_or(ConfigurationError::MissingParameter { name: "format_version" })?;
        if version != u64::from(FORMAT_VERSION) {
            return Err(ConfigurationError::UnsupportedVersion {
                found: u32::try_from(version).unwrap_or(u32::MAX),
                supported: FORMAT_VERSION,
            }
            .into());
        }

        let kind = value
            .get("classifier")
            .and_then(|c| c.get("kind"))
            .and_then(serde_json::Value::as_str)
            .ok_or(ConfigurationError::MissingParameter { name: "classifier.kind" })?;
        ClassifierKind::parse(kind)?;

        Ok(serde_json::from_value(value)?)
    }

    /// Read and parse a bundle file.
    ///
    /// # Errors
    ///
    /// I/O failure or any [`ModelBundle::from_json`] error.
    pub fn load(path: &Path) -> BundleResult<Self> {
        let text = fs::read_to_string(path).map_err(|source| BundleError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Serialize as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Serialization failure.
    pub fn to_json(&self) -> BundleResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Feature layout declared by the bundle.
    ///
    /// # Errors
    ///
    /// Channel count or zero-crossing fraction out of range.
    pub fn layout(&self) -> Result<FeatureLayout, ConfigurationError> {
        FeatureLayout::new(self.channels, self.feature_set, self.zero_crossing)
    }

    /// Validate every shape and build the immutable model.
    ///
    /// # Errors
    ///
    /// Header counts that disagree with the parameters, or any shape or
    /// finiteness problem in the parameters themselves.
    pub fn into_model(self) -> BundleResult<Model> {
        let layout = self.layout()?;
        let feature_count = layout.feature_count();
        if self.feature_count != feature_count {
            return Err(BundleError::HeaderMismatch {
                field: "feature_count",
                declared: self.feature_count,
                actual: feature_count,
            });
        }
        if self.class_count != self.class_names.len() {
            return Err(BundleError::HeaderMismatch {
                field: "class_count",
                declared: self.class_count,
                actual: self.class_names.len(),
            });
        }

        let kind = self.classifier.kind();
        let scaler = match (self.scaler, kind) {
            (Some(p), _) => Scaler::new(p.mean, p.scale)?,
            (None, ClassifierKind::Rules) => Scaler::identity(feature_count),
            (None, _) => return Err(ConfigurationError::MissingParameter { name: "scaler" }.into()),
        };
        let classifier = self.classifier.build(self.class_count, feature_count)?;
        let classes = ClassTable::new(self.class_names);

        let model = Model::new(layout, scaler, classifier, classes)?.with_gate(self.gate)?;
        tracing::info!(
            "Loaded {} model: {} features, {} classes",
            kind,
            model.feature_count(),
            model.classes().len()
        );
        Ok(model)
    }
}

/// Load a model from a bundle file.
///
/// # Errors
///
/// Any read, parse or validation failure.
pub fn load_model(path: &Path) -> BundleResult<Model> {
    ModelBundle::load(path)?.into_model()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use serde_json::json;

    fn linear_bundle() -> serde_json::Value {
        json!({
            "format_version": 1,
            "channels": 1,
            "feature_set": "time_domain6",
            "zero_crossing": { "policy": "mean_crossing" },
            "feature_count": 6,
            "class_count": 2,
            "class_names": ["rest", "fist"],
            "scaler": { "mean": vec![0.0; 6], "scale": [1.0, 1.0, 1.0, 0.0, 1.0, 1.0] },
            "classifier": {
                "kind": "linear",
                "coefficients": [vec![0.0; 6], [1.0, 0.0, 0.0, 0.0, 0.0, 0.0]],
                "intercepts": [0.5, 0.0]
            }
        })
    }

    #[test]
    fn test_linear_bundle_loads() {
        let bundle = ModelBundle::from_json(&linear_bundle().to_string()).unwrap();
        let model = bundle.into_model().unwrap();
        assert_eq!(model.feature_count(), 6);
        assert_eq!(model.class_name(ClassId(1)), Some("fist"));
        assert_eq!(model.scaler().scale()[3], 1.0);
        assert_eq!(model.classifier().kind(), ClassifierKind::Linear);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", linear_bundle()).unwrap();
        let model = load_model(file.path()).unwrap();
        assert_eq!(model.classes().len(), 2);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_model(&dir.path().join("absent.json"));
        assert!(matches!(result, Err(BundleError::Io { .. })));
    }

    #[test]
    fn test_unknown_kind_is_configuration_error() {
        let mut value = linear_bundle();
        value["classifier"]["kind"] = json!("svm");
        let result = ModelBundle::from_json(&value.to_string());
        assert!(matches!(
            result,
            Err(BundleError::Invalid(ConfigurationError::UnknownClassifier { kind })) if kind == "svm"
        ));
    }

    #[test]
    fn test_kind_aliases_load() {
        let mut value = json!({
            "format_version": 1,
            "channels": 1,
            "feature_count": 6,
            "class_count": 2,
            "class_names": ["rest", "active"],
            "classifier": {
                "kind": "rule_based",
                "rules": [{
                    "name": "active",
                    "predicate": { "op": "above", "feature": 0, "threshold": 100.0 },
                    "class": 1
                }],
                "default_class": 0
            }
        });
        let bundle = ModelBundle::from_json(&value.to_string()).unwrap();
        assert_eq!(bundle.classifier.kind(), ClassifierKind::Rules);

        value["scaler"] = json!({ "mean": vec![0.0; 6], "scale": vec![1.0; 6] });
        value["classifier"] = json!({
            "kind": "mlp",
            "layers": [{ "weights": [vec![0.0; 6], vec![0.0; 6]], "biases": [0.0, 1.0] }]
        });
        let model = ModelBundle::from_json(&value.to_string()).unwrap().into_model().unwrap();
        assert_eq!(model.classifier().kind(), ClassifierKind::Network);
    }

    #[test]
    fn test_unsupported_version() {
        let mut value = linear_bundle();
        value["format_version"] = json!(2);
        assert!(matches!(
            ModelBundle::from_json(&value.to_string()),
            Err(BundleError::Invalid(ConfigurationError::UnsupportedVersion { found: 2, supported: 1 }))
        ));
    }

    #[test]
    fn test_feature_count_mismatch_refuses_load() {
        let mut value = linear_bundle();
        value["feature_count"] = json!(5);
        let result = ModelBundle::from_json(&value.to_string()).unwrap().into_model();
        assert!(matches!(result, Err(BundleError::HeaderMismatch { field: "feature_count", .. })));

        let mut value = linear_bundle();
        value["classifier"]["coefficients"] = json!([vec![0.0; 5], vec![0.0; 5]]);
        let result = ModelBundle::from_json(&value.to_string()).unwrap().into_model();
        assert!(matches!(result, Err(BundleError::Invalid(ConfigurationError::Dimension(_)))));
    }

    #[test]
    fn test_network_bundle() {
        let value = json!({
            "format_version": 1,
            "channels": 1,
            "feature_set": "time_domain6",
            "feature_count": 6,
            "class_count": 2,
            "class_names": ["rest", "fist"],
            "scaler": { "mean": vec![0.0; 6], "scale": vec![1.0; 6] },
            "classifier": {
                "kind": "network",
                "layers": [
                    { "weights": [[1.0, 0.0, 0.0, 0.0, 0.0, 0.0], vec![0.0; 6]], "biases": [0.0, 0.0] },
                    { "weights": [[0.0, 1.0], [1.0, 0.0]], "biases": [0.0, 0.0] }
                ]
            }
        });
        let model = ModelBundle::from_json(&value.to_string()).unwrap().into_model().unwrap();
        assert_eq!(model.classifier().kind(), ClassifierKind::Network);
        let (class, score) = model.classifier().classify(&[2.0, 0.0, 0.0, 0.0, 0.0, 0.0]).unwrap();
        assert_eq!(class, ClassId(1));
        assert!((score - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_rules_bundle_without_scaler() {
        let bundle = ModelBundle {
            format_version: FORMAT_VERSION,
            channels: 1,
            feature_set: FeatureSet::TimeDomain6,
            zero_crossing: ZeroCrossing::MeanCrossing,
            feature_count: 6,
            class_count: 2,
            class_names: vec!["rest".into(), "active".into()],
            scaler: None,
            classifier: ClassifierParams::Rules(RuleParams {
                rules: vec![Rule::new("active", Predicate::Above { feature: 0, threshold: 100.0 }, ClassId(1))],
                default_class: ClassId(0),
            }),
            gate: Vec::new(),
        };
        let text = bundle.to_json().unwrap();
        let model = ModelBundle::from_json(&text).unwrap().into_model().unwrap();
        assert_eq!(model.scaler(), &Scaler::identity(6));
        assert_eq!(model.classifier().classify(&[150.0, 0.0, 0.0, 0.0, 0.0, 0.0]).unwrap().0, ClassId(1));
    }

    #[test]
    fn test_gate_is_loaded_and_validated() {
        let mut value = linear_bundle();
        value["gate"] = json!([
            { "op": "all_of", "predicates": [
                { "op": "above", "feature": 2, "threshold": 300.0 },
                { "op": "below", "feature": 2, "threshold": 800.0 }
            ]}
        ]);
        let model = ModelBundle::from_json(&value.to_string()).unwrap().into_model().unwrap();
        assert_eq!(model.gate().len(), 1);
        assert!(model.is_plausible(&[0.0, 0.0, 500.0, 0.0, 0.0, 0.0]));
        assert!(!model.is_plausible(&[0.0; 6]));

        value["gate"] = json!([{ "op": "above", "feature": 6, "threshold": 0.0 }]);
        let result = ModelBundle::from_json(&value.to_string()).unwrap().into_model();
        assert!(matches!(
            result,
            Err(BundleError::Invalid(ConfigurationError::RuleFeatureOutOfRange { feature: 6, .. }))
        ));
    }

    #[test]
    fn test_linear_bundle_requires_scaler() {
        let mut value = linear_bundle();
        value.as_object_mut().unwrap().remove("scaler");
        let result = ModelBundle::from_json(&value.to_string()).unwrap().into_model();
        assert!(matches!(
            result,
            Err(BundleError::Invalid(ConfigurationError::MissingParameter { name: "scaler" }))
        ));
    }
}
