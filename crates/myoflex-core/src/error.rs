//! Error types for the Myoflex pipeline
//!
//! All errors work in `no_std` environments. Per-sample problems
//! ([`MalformedSample`]) are absorbed by the windower; shape problems
//! ([`DimensionMismatch`], [`ConfigurationError`]) are reported once while
//! the pipeline is being assembled and refuse startup.

use core::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// Sample Errors
// ============================================================================

/// A sample that cannot be admitted into the window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MalformedSample {
    /// Sample carries a different number of channels than configured
    ChannelCountMismatch {
        /// Channels configured on the windower
        expected: usize,
        /// Channels present in the sample
        got: usize,
    },
    /// Reading is NaN or infinite
    NonFinite {
        /// Channel index of the offending reading
        channel: usize,
    },
    /// Reading lies outside the configured valid range
    OutOfRange {
        /// Channel index of the offending reading
        channel: usize,
        /// The rejected reading
        value: f32,
    },
    /// Timestamp went backwards relative to the previous sample
    TimestampRegression {
        /// Previous accepted timestamp
        previous_us: u64,
        /// Rejected timestamp
        got_us: u64,
    },
}

impl fmt::Display for MalformedSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChannelCountMismatch { expected, got } => {
                write!(f, "Sample has {got} channels, expected {expected}")
            }
            Self::NonFinite { channel } => {
                write!(f, "Channel {channel} reading is not finite")
            }
            Self::OutOfRange { channel, value } => {
                write!(f, "Channel {channel} reading {value} outside valid range")
            }
            Self::TimestampRegression { previous_us, got_us } => {
                write!(f, "Timestamp regressed: {got_us}us after {previous_us}us")
            }
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for MalformedSample {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::ChannelCountMismatch { expected, got } => {
                defmt::write!(f, "Channels: {} != {}", got, expected);
            }
            Self::NonFinite { channel } => {
                defmt::write!(f, "Ch{} not finite", channel);
            }
            Self::OutOfRange { channel, .. } => {
                defmt::write!(f, "Ch{} out of range", channel);
            }
            Self::TimestampRegression { previous_us, got_us } => {
                defmt::write!(f, "Ts regress: {} -> {}", previous_us, got_us);
            }
        }
    }
}

// ============================================================================
// Dimension Errors
// ============================================================================

/// A vector whose length disagrees with what a pipeline stage expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionMismatch {
    /// Stage that rejected the vector
    pub stage: &'static str,
    /// Length the stage expects
    pub expected: usize,
    /// Length that was supplied
    pub got: usize,
}

impl fmt::Display for DimensionMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Dimension mismatch in {}: expected {}, got {}",
            self.stage, self.expected, self.got
        )
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for DimensionMismatch {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{}: {} != {}", self.stage, self.got, self.expected);
    }
}

// ============================================================================
// Configuration Errors
// ============================================================================

/// Fatal problems found while assembling a model or pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConfigurationError {
    /// Classifier kind string is not one of the known strategies
    UnknownClassifier {
        /// The kind that was requested
        kind: alloc::string::String,
    },
    /// Configured classifier kind disagrees with the loaded model
    ClassifierKindMismatch {
        /// Kind named by the configuration
        configured: &'static str,
        /// Kind carried by the model
        model: &'static str,
    },
    /// Required parameter absent or empty
    MissingParameter {
        /// Parameter name
        name: &'static str,
    },
    /// A vector or matrix has the wrong shape
    Dimension(DimensionMismatch),
    /// Parameter contains NaN or infinity
    NonFiniteParameter {
        /// Parameter name
        name: &'static str,
        /// Flat index of the offending entry
        index: usize,
    },
    /// Window geometry is invalid
    InvalidWindow {
        /// Description of the issue
        reason: &'static str,
    },
    /// Requested geometry exceeds a fixed buffer
    CapacityExceeded {
        /// Buffer that would overflow
        what: &'static str,
        /// Requested size
        requested: usize,
        /// Fixed capacity
        capacity: usize,
    },
    /// Model was fitted under a different feature definition
    FeatureLayoutMismatch {
        /// Description of the disagreement
        reason: &'static str,
    },
    /// Rule references a feature index past the layout width
    RuleFeatureOutOfRange {
        /// Rule name
        rule: alloc::string::String,
        /// Referenced feature index
        feature: usize,
        /// Number of features available
        width: usize,
    },
    /// Class id is outside the class table
    ClassOutOfRange {
        /// Offending class id
        class: u16,
        /// Number of classes
        class_count: usize,
    },
    /// Bundle format version is not supported
    UnsupportedVersion {
        /// Version found in the bundle
        found: u32,
        /// Version this build understands
        supported: u32,
    },
}

impl From<DimensionMismatch> for ConfigurationError {
    fn from(err: DimensionMismatch) -> Self {
        Self::Dimension(err)
    }
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownClassifier { kind } => {
                write!(f, "Unknown classifier kind: {kind}")
            }
            Self::ClassifierKindMismatch { configured, model } => {
                write!(f, "Configured classifier {configured} but model is {model}")
            }
            Self::MissingParameter { name } => {
                write!(f, "Missing required parameter: {name}")
            }
            Self::Dimension(err) => write!(f, "{err}"),
            Self::NonFiniteParameter { name, index } => {
                write!(f, "Parameter {name}[{index}] is not finite")
            }
            Self::InvalidWindow { reason } => {
                write!(f, "Invalid window: {reason}")
            }
            Self::CapacityExceeded { what, requested, capacity } => {
                write!(f, "{what} needs {requested} slots, capacity is {capacity}")
            }
            Self::FeatureLayoutMismatch { reason } => {
                write!(f, "Feature layout mismatch: {reason}")
            }
            Self::RuleFeatureOutOfRange { rule, feature, width } => {
                write!(f, "Rule {rule} reads feature {feature}, only {width} available")
            }
            Self::ClassOutOfRange { class, class_count } => {
                write!(f, "Class {class} outside table of {class_count}")
            }
            Self::UnsupportedVersion { found, supported } => {
                write!(f, "Bundle version {found} unsupported (expected {supported})")
            }
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ConfigurationError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::UnknownClassifier { .. } => defmt::write!(f, "Unknown classifier"),
            Self::ClassifierKindMismatch { configured, model } => {
                defmt::write!(f, "Kind {} != {}", configured, model);
            }
            Self::MissingParameter { name } => defmt::write!(f, "Missing: {}", name),
            Self::Dimension(err) => defmt::write!(f, "{}", err),
            Self::NonFiniteParameter { name, index } => {
                defmt::write!(f, "{}[{}] not finite", name, index);
            }
            Self::InvalidWindow { reason } => defmt::write!(f, "Window: {}", reason),
            Self::CapacityExceeded { what, requested, capacity } => {
                defmt::write!(f, "{}: {} > {}", what, requested, capacity);
            }
            Self::FeatureLayoutMismatch { reason } => defmt::write!(f, "Layout: {}", reason),
            Self::RuleFeatureOutOfRange { feature, width, .. } => {
                defmt::write!(f, "Rule feature {} >= {}", feature, width);
            }
            Self::ClassOutOfRange { class, class_count } => {
                defmt::write!(f, "Class {} >= {}", class, class_count);
            }
            Self::UnsupportedVersion { found, supported } => {
                defmt::write!(f, "Version {} != {}", found, supported);
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for MalformedSample {}

#[cfg(feature = "std")]
impl std::error::Error for DimensionMismatch {}

#[cfg(feature = "std")]
impl std::error::Error for ConfigurationError {}

// ============================================================================
// Tests
// ============================================================================
