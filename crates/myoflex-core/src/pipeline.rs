//! Streaming classification pipeline
//!
//! One cycle runs per completed window:
//!
//! ```text
//! EmgSample ─► Windower ─► FeatureExtractor ─► Scaler ─► Classifier ─► [MajorityVote] ─► Prediction
//! ```
//!
//! The pipeline owns all per-cycle scratch space, so a cycle never touches
//! the heap. The [`Model`] is borrowed and never mutated. Processing time
//! is measured through a [`Clock`] and compared against a per-window
//! budget; overruns are counted by the [`DeadlineMonitor`] while the
//! prediction is still emitted.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, DimensionMismatch};
use crate::features::{FeatureExtractor, FeatureVector};
use crate::model::Model;
use crate::smoothing::MajorityVote;
use crate::types::{ClassId, EmgSample, Prediction, MAX_FEATURES};
use crate::window::{Window, WindowConfig, Windower, DEFAULT_CAPACITY};

// ============================================================================
// Timing
// ============================================================================

/// Monotonic microsecond time source.
pub trait Clock {
    /// Current time in microseconds. Only differences are meaningful.
    fn now_us(&self) -> u64;
}

/// Clock that never advances; disables deadline tracking in practice.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoClock;

impl Clock for NoClock {
    #[inline]
    fn now_us(&self) -> u64 {
        0
    }
}

/// One window whose processing exceeded the budget.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadlineExceeded {
    /// Window that overran
    pub window_index: u64,
    /// Measured processing time
    pub elapsed_us: u64,
    /// Budget in force
    pub budget_us: u64,
}

#[cfg(feature = "defmt")]
impl defmt::Format for DeadlineExceeded {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "W{} took {}us > {}us", self.window_index, self.elapsed_us, self.budget_us);
    }
}

/// Per-cycle timing counters.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadlineMonitor {
    budget_us: Option<u64>,
    cycles: u64,
    overruns: u64,
    worst_cycle_us: u64,
    last_overrun: Option<DeadlineExceeded>,
}

impl DeadlineMonitor {
    /// Monitor with a budget, or `None` to only collect timings.
    #[must_use]
    pub const fn new(budget_us: Option<u64>) -> Self {
        Self { budget_us, cycles: 0, overruns: 0, worst_cycle_us: 0, last_overrun: None }
    }

    /// Record one cycle, returning the overrun if the budget was exceeded.
    pub fn record(&mut self, window_index: u64, elapsed_us: u64) -> Option<DeadlineExceeded> {
        self.cycles += 1;
        self.worst_cycle_us = self.worst_cycle_us.max(elapsed_us);
        let budget_us = self.budget_us?;
        if elapsed_us <= budget_us {
            return None;
        }
        let overrun = DeadlineExceeded { window_index, elapsed_us, budget_us };
        self.overruns += 1;
        self.last_overrun = Some(overrun);
        Some(overrun)
    }

    /// Budget in force.
    #[inline]
    #[must_use]
    pub const fn budget_us(&self) -> Option<u64> {
        self.budget_us
    }

    /// Cycles measured.
    #[inline]
    #[must_use]
    pub const fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Cycles that exceeded the budget.
    #[inline]
    #[must_use]
    pub const fn overruns(&self) -> u64 {
        self.overruns
    }

    /// Slowest cycle seen.
    #[inline]
    #[must_use]
    pub const fn worst_cycle_us(&self) -> u64 {
        self.worst_cycle_us
    }

    /// Most recent overrun.
    #[inline]
    #[must_use]
    pub const fn last_overrun(&self) -> Option<DeadlineExceeded> {
        self.last_overrun
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Windower, extractor, scaler and classifier wired together.
pub struct Pipeline<'m, K: Clock = NoClock, const CAP: usize = DEFAULT_CAPACITY> {
    model: &'m Model,
    windower: Windower<CAP>,
    extractor: FeatureExtractor,
    features: FeatureVector,
    normalized: [f64; MAX_FEATURES],
    smoother: Option<MajorityVote>,
    deadline: DeadlineMonitor,
    clock: K,
    last_overrun_seen: u64,
    implausible: u64,
}

impl<'m, const CAP: usize> Pipeline<'m, NoClock, CAP> {
    /// Untimed pipeline.
    ///
    /// # Errors
    ///
    /// See [`Pipeline::with_clock`].
    pub fn new(model: &'m Model, window: WindowConfig) -> Result<Self, ConfigurationError> {
        Self::with_clock(model, window, NoClock)
    }
}

impl<'m, K: Clock, const CAP: usize> Pipeline<'m, K, CAP> {
    /// Pipeline timed by `clock`.
    ///
    /// # Errors
    ///
    /// Invalid window geometry, or a window channel count that differs from
    /// the model's feature layout.
    pub fn with_clock(model: &'m Model, window: WindowConfig, clock: K) -> Result<Self, ConfigurationError> {
        if window.channels != model.layout().channels {
            return Err(DimensionMismatch {
                stage: "pipeline channels",
                expected: model.layout().channels,
                got: window.channels,
            }
            .into());
        }
        Ok(Self {
            model,
            windower: Windower::new(window)?,
            extractor: FeatureExtractor::new(*model.layout()),
            features: FeatureVector::new(),
            normalized: [0.0; MAX_FEATURES],
            smoother: None,
            deadline: DeadlineMonitor::default(),
            clock,
            last_overrun_seen: 0,
            implausible: 0,
        })
    }

    /// Layer a majority vote of `depth` predictions on top.
    ///
    /// # Errors
    ///
    /// Depth out of range, see [`MajorityVote::new`].
    pub fn with_smoothing(mut self, depth: usize) -> Result<Self, ConfigurationError> {
        self.smoother = Some(MajorityVote::new(depth)?);
        Ok(self)
    }

    /// Set the per-window processing budget.
    #[must_use]
    pub fn with_deadline(mut self, budget_us: u64) -> Self {
        self.deadline = DeadlineMonitor::new(Some(budget_us));
        self
    }

    /// Feed one sample; returns a prediction whenever a window completes.
    ///
    /// Malformed samples are dropped and counted, see [`Self::dropped`].
    /// Windows failing the model's gate yield nothing, see
    /// [`Self::implausible`].
    pub fn push(&mut self, sample: &EmgSample) -> Option<Prediction> {
        let window = self.windower.push(sample)?;
        let started = self.clock.now_us();

        let window_index = window.index();
        let scored = score_window(
            self.model,
            &self.extractor,
            &window,
            &mut self.features,
            &mut self.normalized,
        );
        let elapsed = self.clock.now_us().saturating_sub(started);
        self.deadline.record(window_index, elapsed);

        // Widths were checked against the model at construction
        debug_assert!(scored.is_ok(), "stage width mismatch: {scored:?}");
        let Some((class, score)) = scored.ok()? else {
            self.implausible += 1;
            return None;
        };

        let raw = Prediction { class, score, window_index };
        let prediction = match self.smoother.as_mut() {
            Some(vote) => vote.push(raw),
            None => raw,
        };
        Some(prediction)
    }

    /// Stop classifying: discard the partial window and vote history.
    pub fn stop(&mut self) {
        self.windower.reset();
        if let Some(vote) = self.smoother.as_mut() {
            vote.reset();
        }
    }

    /// Model in use.
    #[must_use]
    pub fn model(&self) -> &'m Model {
        self.model
    }

    /// Window geometry.
    #[must_use]
    pub fn window_config(&self) -> &WindowConfig {
        self.windower.config()
    }

    /// Samples rejected as malformed.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.windower.dropped()
    }

    /// Samples accepted since the last stop.
    #[must_use]
    pub fn accepted(&self) -> u64 {
        self.windower.accepted()
    }

    /// Windows refused by the model's plausibility gate.
    #[must_use]
    pub fn implausible(&self) -> u64 {
        self.implausible
    }

    /// Timing counters.
    #[must_use]
    pub fn deadline(&self) -> &DeadlineMonitor {
        &self.deadline
    }

    /// Overrun recorded since the previous call, if any.
    ///
    /// Lets a host loop log each overrun once without polling counters.
    pub fn take_overrun(&mut self) -> Option<DeadlineExceeded> {
        if self.deadline.overruns() == self.last_overrun_seen {
            return None;
        }
        self.last_overrun_seen = self.deadline.overruns();
        self.deadline.last_overrun()
    }
}

fn score_window(
    model: &Model,
    extractor: &FeatureExtractor,
    window: &Window<'_>,
    features: &mut FeatureVector,
    normalized: &mut [f64; MAX_FEATURES],
) -> Result<Option<(ClassId, f64)>, DimensionMismatch> {
    extractor.extract_into(window, features)?;
    if !model.is_plausible(features) {
        return Ok(None);
    }
    let normalized = &mut normalized[..features.len()];
    model.scaler().normalize(features, normalized)?;
    model.classifier().classify(normalized).map(Some)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    use crate::classifier::{Classifier, LinearModel};
    use crate::classifier::Predicate;
    use crate::features::{FeatureKind, FeatureLayout, FeatureSet, ZeroCrossing};
    use crate::normalize::Scaler;
    use crate::types::{ClassId, ClassTable};
    use alloc::vec;

    /// Advances by a fixed step on every read.
    struct SteppingClock {
        now: Cell<u64>,
        step: u64,
    }

    impl Clock for SteppingClock {
        fn now_us(&self) -> u64 {
            let t = self.now.get();
            self.now.set(t + self.step);
            t
        }
    }

    fn layout(channels: usize) -> FeatureLayout {
        FeatureLayout::new(channels, FeatureSet::TimeDomain6, ZeroCrossing::MeanCrossing).unwrap()
    }

    fn zero_model() -> Model {
        let linear = LinearModel::new(vec![vec![0.0; 18]], vec![0.0]).unwrap();
        Model::new(layout(3), Scaler::identity(18), Classifier::Linear(linear), ClassTable::from_names(&["rest"]))
            .unwrap()
    }

    fn sample(i: u32, readings: &[f32]) -> EmgSample {
        EmgSample::from_readings(u64::from(i) * 1000, i, readings).unwrap()
    }

    #[test]
    fn test_end_to_end_single_zero_class() {
        let model = zero_model();
        let mut pipeline: Pipeline<'_> = Pipeline::new(&model, WindowConfig::new(3, 8, 8)).unwrap();

        let ch1 = [0.0f32, 0.0, 0.0, 10.0, 10.0, 0.0, 0.0, 0.0];
        let mut predictions = vec![];
        for (i, &v) in ch1.iter().enumerate() {
            if let Some(p) = pipeline.push(&sample(i as u32, &[v, 0.0, 0.0])) {
                predictions.push(p);
            }
        }

        assert_eq!(predictions, vec![Prediction { class: ClassId(0), score: 0.0, window_index: 0 }]);
        assert_eq!(&pipeline.features[..6], &[5.0, 18.75, 2.5, 0.0, 2.0, 20.0]);
        assert!(pipeline.features[6..].iter().all(|&v| v == 0.0));
        // Identity scaler leaves the vector unchanged
        assert_eq!(&pipeline.normalized[..18], &pipeline.features[..]);
    }

    #[test]
    fn test_hand_control_pipeline() {
        let model = Model::hand_control(layout(3)).unwrap();
        let mut pipeline: Pipeline<'_> = Pipeline::new(&model, WindowConfig::new(3, 4, 2)).unwrap();

        let mut last = None;
        for i in 0..8u32 {
            // Channel 2 swings well past its 450 RMS threshold
            let v = if i % 2 == 0 { 600.0 } else { -600.0 };
            if let Some(p) = pipeline.push(&sample(i, &[0.0, 0.0, v])) {
                last = Some(p);
            }
        }
        let last = last.unwrap();
        assert_eq!(model.class_name(last.class), Some("open"));
        assert!((last.score - 150.0).abs() < 1e-9);
        assert_eq!(last.window_index, 2);
    }

    #[test]
    fn test_channel_mismatch_refuses_start() {
        let model = zero_model();
        let result: Result<Pipeline<'_>, _> = Pipeline::new(&model, WindowConfig::new(4, 8, 8));
        assert!(matches!(result, Err(ConfigurationError::Dimension(_))));
    }

    #[test]
    fn test_malformed_samples_do_not_stop_pipeline() {
        let model = zero_model();
        let mut pipeline: Pipeline<'_> = Pipeline::new(&model, WindowConfig::new(3, 4, 4)).unwrap();
        let mut emitted = 0;
        for i in 0..4u32 {
            assert!(pipeline.push(&sample(100 + i, &[f32::NAN, 0.0, 0.0])).is_none());
            if pipeline.push(&sample(200 + i, &[1.0, 0.0, 0.0])).is_some() {
                emitted += 1;
            }
        }
        assert_eq!(emitted, 1);
        assert_eq!(pipeline.dropped(), 4);
    }

    #[test]
    fn test_deadline_overrun_still_emits() {
        let model = zero_model();
        let clock = SteppingClock { now: Cell::new(0), step: 50 };
        let mut pipeline: Pipeline<'_, SteppingClock> =
            Pipeline::with_clock(&model, WindowConfig::new(3, 4, 4), clock).unwrap().with_deadline(10);

        let mut emitted = 0;
        for i in 0..8u32 {
            if pipeline.push(&sample(i, &[1.0, 2.0, 3.0])).is_some() {
                emitted += 1;
            }
        }
        assert_eq!(emitted, 2);
        assert_eq!(pipeline.deadline().cycles(), 2);
        assert_eq!(pipeline.deadline().overruns(), 2);
        assert_eq!(pipeline.deadline().worst_cycle_us(), 50);

        let overrun = pipeline.take_overrun().unwrap();
        assert_eq!(overrun.window_index, 1);
        assert_eq!(overrun.budget_us, 10);
        assert!(pipeline.take_overrun().is_none());
    }

    #[test]
    fn test_stop_discards_partial_window() {
        let model = zero_model();
        let mut pipeline: Pipeline<'_> = Pipeline::new(&model, WindowConfig::new(3, 4, 4)).unwrap();
        for i in 0..3u32 {
            pipeline.push(&sample(i, &[1.0, 1.0, 1.0]));
        }
        pipeline.stop();
        for i in 3..6u32 {
            assert!(pipeline.push(&sample(i, &[1.0, 1.0, 1.0])).is_none());
        }
        assert!(pipeline.push(&sample(6, &[1.0, 1.0, 1.0])).is_some());
    }

    #[test]
    fn test_smoothing_layer() {
        let model = Model::hand_control(layout(3)).unwrap();
        let mut pipeline: Pipeline<'_> =
            Pipeline::new(&model, WindowConfig::new(3, 2, 2)).unwrap().with_smoothing(3).unwrap();

        let burst = |v: f32| [[v, 0.0, 0.0], [-v, 0.0, 0.0]];
        let mut classes = vec![];
        let mut i = 0u32;
        for level in [0.0, 0.0, 900.0, 0.0] {
            for readings in burst(level) {
                if let Some(p) = pipeline.push(&sample(i, &readings)) {
                    classes.push(p.class);
                }
                i += 1;
            }
        }
        // The lone "close" window is outvoted by idle
        assert_eq!(classes, vec![ClassId(0); 4]);
    }

    #[test]
    fn test_implausible_windows_are_not_classified() {
        let mav0 = layout(3).index_of(0, FeatureKind::Mav).unwrap();
        let model = Model::hand_control(layout(3))
            .unwrap()
            .with_gate(vec![Predicate::within(mav0, 100.0, 1000.0)])
            .unwrap();
        let mut pipeline: Pipeline<'_> = Pipeline::new(&model, WindowConfig::new(3, 2, 2)).unwrap();

        let mut classes = vec![];
        let mut i = 0u32;
        // Flat lead, valid burst, saturated lead
        for level in [0.0f32, 600.0, 4000.0] {
            for v in [level, -level] {
                if let Some(p) = pipeline.push(&sample(i, &[v, 0.0, 0.0])) {
                    classes.push(p.class);
                }
                i += 1;
            }
        }
        assert_eq!(classes, vec![ClassId(1)]);
        assert_eq!(pipeline.implausible(), 2);
    }
}
