//! Myoflex Native - Host-side ingestion and session running
//!
//! This crate wraps the `no_std` core for use on a workstation:
//! - Parsing firmware sample records (CSV and plotter lines)
//! - Loading versioned JSON model bundles
//! - TOML session configuration
//! - Replay and serial sample sources
//! - A session runner with ground-truth scoring
//!
//! # Modules
//!
//! - [`bridge`]: Sample sources (replay, USB serial)
//! - [`bundle`]: Model bundle format
//! - [`config`]: Session configuration
//! - [`ingest`]: Record parsing
//! - [`session`]: Session runner

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod bridge;
pub mod bundle;
pub mod config;
pub mod error;
pub mod ingest;
pub mod session;

// Re-export key types
pub use bridge::{ReplaySource, SampleSource};
pub use bundle::{load_model, ModelBundle};
pub use config::SessionConfig;
pub use error::{BundleError, ConfigError, IngestError, SessionError};
pub use ingest::{Record, RecordParser};
pub use session::{resolve_model, MonotonicClock, PredictionEvent, Session, SessionReport};

#[cfg(feature = "usb")]
pub use bridge::SerialSource;
