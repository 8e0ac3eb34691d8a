//! Myoflex Core - `no_std` EMG gesture classification
//!
//! This crate turns a stream of multi-channel EMG samples into gesture
//! predictions with fixed memory and no allocation per sample. It runs on
//! microcontrollers as well as on a host; models are allocated once when
//! they are built and are read-only afterwards.
//!
//! # Modules
//!
//! - [`types`]: samples, class ids, predictions, class tables
//! - [`error`]: malformed-sample, dimension and configuration errors
//! - [`window`]: fixed-arena sliding windows
//! - [`features`]: time-domain features (RMS, VAR, MAV, SSC, ZC, WL)
//! - [`normalize`]: per-feature affine scaler
//! - [`classifier`]: linear, network and rule-based classifiers
//! - [`model`]: immutable fitted model
//! - [`pipeline`]: per-window orchestration and deadline monitoring
//! - [`smoothing`]: optional majority vote over recent predictions
//!
//! # Features
//!
//! - `std`: Enable standard library support
//! - `defmt`: Enable `defmt` formatting for embedded logging
//!
//! # Example
//!
//! ```rust
//! use myoflex_core::features::{FeatureLayout, FeatureSet, ZeroCrossing};
//! use myoflex_core::model::Model;
//! use myoflex_core::pipeline::Pipeline;
//! use myoflex_core::types::EmgSample;
//! use myoflex_core::window::WindowConfig;
//!
//! let layout = FeatureLayout::new(3, FeatureSet::TimeDomain6, ZeroCrossing::MeanCrossing).unwrap();
//! let model = Model::hand_control(layout).unwrap();
//! let mut pipeline: Pipeline<'_> = Pipeline::new(&model, WindowConfig::new(3, 150, 50)).unwrap();
//!
//! for i in 0..150u32 {
//!     let sample = EmgSample::from_readings(u64::from(i) * 1000, i, &[0.0, 0.0, 0.0]).unwrap();
//!     if let Some(prediction) = pipeline.push(&sample) {
//!         assert_eq!(model.class_name(prediction.class), Some("idle"));
//!     }
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_precision_loss)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod classifier;
pub mod error;
pub mod features;
pub mod math;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod smoothing;
pub mod types;
pub mod window;

// Re-export commonly used types at crate root
pub use classifier::{Classifier, ClassifierKind, LinearModel, NetworkModel, RuleSet};
pub use error::{ConfigurationError, DimensionMismatch, MalformedSample};
pub use features::{FeatureExtractor, FeatureLayout, FeatureSet, FeatureVector, ZeroCrossing};
pub use model::Model;
pub use normalize::Scaler;
pub use pipeline::{Clock, DeadlineExceeded, DeadlineMonitor, NoClock, Pipeline};
pub use smoothing::MajorityVote;
pub use types::{ClassId, ClassTable, EmgSample, Prediction};
pub use window::{Window, WindowConfig, Windower};
