//! Host session runner
//!
//! Drives records from a [`SampleSource`] through a core [`Pipeline`],
//! hands every prediction to a sink, and summarizes the run. When the
//! records carry ground-truth gestures the report includes how often the
//! prediction agreed with the label of the sample that completed its
//! window.

use std::fmt;
use std::time::Instant;

use myoflex_core::classifier::ClassifierKind;
use myoflex_core::error::ConfigurationError;
use myoflex_core::model::Model;
use myoflex_core::pipeline::{Clock, DeadlineMonitor, Pipeline};
use myoflex_core::types::ClassId;

use crate::bridge::SampleSource;
use crate::bundle;
use crate::config::SessionConfig;
use crate::error::SessionResult;

/// Wall-clock time since construction, from [`Instant`].
#[derive(Clone, Copy, Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Clock starting now.
    #[must_use]
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_us(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_micros()).unwrap_or(u64::MAX)
    }
}

/// One prediction as seen by a downstream consumer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PredictionEvent<'a> {
    /// Predicted class
    pub class: ClassId,
    /// Class name from the model's table
    pub name: &'a str,
    /// Raw decision score
    pub score: f64,
    /// Window counter
    pub window_index: u64,
    /// Timestamp of the sample that completed the window
    pub timestamp_us: u64,
    /// Ground-truth gesture of that sample, if recorded
    pub truth: Option<ClassId>,
}

/// Summary of a finished session.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionReport {
    /// Records read from the source
    pub records: u64,
    /// Lines refused by the parser
    pub malformed_records: u64,
    /// Samples refused by the windower
    pub dropped_samples: u64,
    /// Windows refused by the model's plausibility gate
    pub implausible_windows: u64,
    /// Predictions emitted
    pub predictions: u64,
    /// Predictions whose window ended on a labelled sample
    pub labelled: u64,
    /// Labelled predictions matching the label
    pub agreements: u64,
    /// Timing counters
    pub deadline: DeadlineMonitor,
}

impl SessionReport {
    /// Fraction of labelled predictions matching ground truth.
    #[must_use]
    pub fn agreement(&self) -> Option<f64> {
        (self.labelled > 0).then(|| self.agreements as f64 / self.labelled as f64)
    }
}

impl fmt::Display for SessionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "records:      {}", self.records)?;
        writeln!(f, "malformed:    {}", self.malformed_records)?;
        writeln!(f, "dropped:      {}", self.dropped_samples)?;
        writeln!(f, "implausible:  {}", self.implausible_windows)?;
        writeln!(f, "predictions:  {}", self.predictions)?;
        write!(
            f,
            "overruns:     {} of {} (worst {}us)",
            self.deadline.overruns(),
            self.deadline.cycles(),
            self.deadline.worst_cycle_us()
        )?;
        if let Some(agreement) = self.agreement() {
            write!(f, "\nagreement:    {:.1}% of {}", agreement * 100.0, self.labelled)?;
        }
        Ok(())
    }
}

/// Model named by a configuration.
///
/// Loads `model_path` when set; a `rules` configuration without a bundle
/// falls back to the built-in hand controller.
///
/// # Errors
///
/// No model available for the configured classifier, or the bundle
/// failed to load.
pub fn resolve_model(config: &SessionConfig) -> SessionResult<Model> {
    match (&config.model_path, config.classifier_kind()?) {
        (Some(path), _) => {
            tracing::info!("Loading model bundle {}", path.display());
            Ok(bundle::load_model(path)?)
        }
        (None, ClassifierKind::Rules) => {
            tracing::info!("No model bundle, using built-in hand control rules");
            Ok(Model::hand_control(config.feature_layout()?)?)
        }
        (None, _) => Err(ConfigurationError::MissingParameter { name: "model_path" }.into()),
    }
}

/// Pipeline plus the accounting around it.
pub struct Session<'m> {
    pipeline: Pipeline<'m, MonotonicClock>,
    report: SessionReport,
}

impl<'m> Session<'m> {
    /// Assemble a session, refusing a model that does not fit the config.
    ///
    /// # Errors
    ///
    /// Classifier kind or feature layout mismatch, or invalid geometry.
    pub fn new(model: &'m Model, config: &SessionConfig) -> SessionResult<Self> {
        config.validate()?;
        model.check_kind(config.classifier_kind()?)?;
        model.check_layout(&config.feature_layout()?)?;

        let mut pipeline = Pipeline::with_clock(model, config.window_config(), MonotonicClock::new())?
            .with_deadline(config.deadline_budget_us());
        if config.smoothing > 0 {
            pipeline = pipeline.with_smoothing(config.smoothing)?;
        }

        tracing::info!(
            "Session ready: {} channels, window {} step {}, {} classifier, {} classes",
            config.channels,
            config.window,
            config.step,
            model.classifier().kind(),
            model.classes().len()
        );
        Ok(Self { pipeline, report: SessionReport::default() })
    }

    /// Run until the source ends.
    ///
    /// # Errors
    ///
    /// The source failed; predictions already delivered are kept.
    pub fn run<S, F>(&mut self, source: &mut S, mut sink: F) -> SessionResult<SessionReport>
    where
        S: SampleSource + ?Sized,
        F: FnMut(&PredictionEvent<'_>),
    {
        tracing::info!("Reading from {}", source.describe());
        let model = self.pipeline.model();

        while let Some(item) = source.next_record()? {
            let record = match item {
                Ok(record) => record,
                Err(err) => {
                    self.report.malformed_records += 1;
                    tracing::debug!("Dropping record: {}", err);
                    continue;
                }
            };
            self.report.records += 1;

            let Some(prediction) = self.pipeline.push(&record.sample) else {
                continue;
            };
            self.report.predictions += 1;
            if let Some(truth) = record.gesture {
                self.report.labelled += 1;
                if truth == prediction.class {
                    self.report.agreements += 1;
                }
            }
            if let Some(overrun) = self.pipeline.take_overrun() {
                tracing::warn!(
                    "Window {} took {}us, budget {}us",
                    overrun.window_index,
                    overrun.elapsed_us,
                    overrun.budget_us
                );
            }

            sink(&PredictionEvent {
                class: prediction.class,
                name: model.class_name(prediction.class).unwrap_or("?"),
                score: prediction.score,
                window_index: prediction.window_index,
                timestamp_us: record.sample.timestamp_us,
                truth: record.gesture,
            });
        }

        self.pipeline.stop();
        self.report.dropped_samples = self.pipeline.dropped();
        self.report.implausible_windows = self.pipeline.implausible();
        self.report.deadline = *self.pipeline.deadline();
        if self.report.dropped_samples > 0 || self.report.malformed_records > 0 {
            tracing::warn!(
                "{} malformed records, {} dropped samples",
                self.report.malformed_records,
                self.report.dropped_samples
            );
        }
        tracing::info!(
            "Session finished: {} records, {} predictions",
            self.report.records,
            self.report.predictions
        );
        Ok(self.report.clone())
    }
}
