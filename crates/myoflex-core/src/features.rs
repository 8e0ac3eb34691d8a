//! Time-domain EMG feature extraction
//!
//! Every channel of a [`Window`] is reduced independently to a handful of
//! classic time-domain statistics:
//!
//! | Feature | Definition                                                      |
//! |---------|-----------------------------------------------------------------|
//! | RMS     | `sqrt(mean(x²))`                                                |
//! | VAR     | population variance                                             |
//! | MAV     | `mean(|x|)`                                                     |
//! | SSC     | interior `i` with `(x[i]-x[i-1]) * (x[i]-x[i+1]) > 0`           |
//! | ZC      | interior pairs whose mean-removed values change sign            |
//! | WL      | `Σ |x[i] - x[i-1]|`                                             |
//!
//! The order of features inside a channel block is fixed by the
//! [`FeatureSet`]; channel blocks follow channel order. A model must be
//! evaluated under the same [`FeatureLayout`] it was fitted with.

use heapless::Vec as HeaplessVec;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, DimensionMismatch};
use crate::math;
use crate::types::{MAX_CHANNELS, MAX_FEATURES, MAX_FEATURES_PER_CHANNEL};
use crate::window::Window;

/// Default minimum crossing magnitude, as a fraction of the window peak.
pub const DEFAULT_ZC_FRACTION: f64 = 0.01;

/// Fixed-capacity feature vector; never heap-allocated.
pub type FeatureVector = HeaplessVec<f64, MAX_FEATURES>;

// ============================================================================
// Feature Definitions
// ============================================================================

/// One time-domain statistic.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    /// Root mean square
    Rms,
    /// Population variance
    Var,
    /// Mean absolute value
    Mav,
    /// Slope sign change count
    Ssc,
    /// Zero crossing count
    Zc,
    /// Waveform length
    Wl,
}

impl FeatureKind {
    /// Short upper-case label
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Rms => "RMS",
            Self::Var => "VAR",
            Self::Mav => "MAV",
            Self::Ssc => "SSC",
            Self::Zc => "ZC",
            Self::Wl => "WL",
        }
    }
}

/// Per-channel feature order.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureSet {
    /// `[RMS, VAR, MAV, SSC, ZC, WL]`
    #[default]
    TimeDomain6,
    /// `[MAV, RMS, VAR, WL, ZC]`
    TimeDomain5,
}

impl FeatureSet {
    const SIX: [FeatureKind; 6] = [
        FeatureKind::Rms,
        FeatureKind::Var,
        FeatureKind::Mav,
        FeatureKind::Ssc,
        FeatureKind::Zc,
        FeatureKind::Wl,
    ];

    const FIVE: [FeatureKind; 5] = [
        FeatureKind::Mav,
        FeatureKind::Rms,
        FeatureKind::Var,
        FeatureKind::Wl,
        FeatureKind::Zc,
    ];

    /// Features in block order.
    #[must_use]
    pub const fn kinds(self) -> &'static [FeatureKind] {
        match self {
            Self::TimeDomain6 => &Self::SIX,
            Self::TimeDomain5 => &Self::FIVE,
        }
    }

    /// Features per channel.
    #[must_use]
    pub const fn per_channel(self) -> usize {
        self.kinds().len()
    }

    /// Stable identifier used in model bundles.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::TimeDomain6 => "time_domain6",
            Self::TimeDomain5 => "time_domain5",
        }
    }
}

/// Zero-crossing counting policy.
///
/// Both policies count sign changes of `x - mean` over interior adjacent
/// pairs `(x[i], x[i+1])`, `i` in `1..W-1`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum ZeroCrossing {
    /// Every sign change counts
    #[default]
    MeanCrossing,
    /// Only changes with `|x[i] - x[i+1]| >= fraction * max|x|`
    Thresholded {
        /// Fraction of the window's peak absolute reading
        fraction: f64,
    },
}

impl ZeroCrossing {
    /// Thresholded policy at [`DEFAULT_ZC_FRACTION`].
    #[must_use]
    pub const fn thresholded() -> Self {
        Self::Thresholded { fraction: DEFAULT_ZC_FRACTION }
    }
}

/// Complete description of how a feature vector is laid out.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureLayout {
    /// Channels contributing a block each
    pub channels: usize,
    /// Block order
    #[serde(default)]
    pub feature_set: FeatureSet,
    /// Zero-crossing policy
    #[serde(default)]
    pub zero_crossing: ZeroCrossing,
}

impl FeatureLayout {
    /// Validate and build a layout.
    ///
    /// # Errors
    ///
    /// Rejects zero or too many channels and threshold fractions outside
    /// `[0, 1)`.
    pub fn new(
        channels: usize,
        feature_set: FeatureSet,
        zero_crossing: ZeroCrossing,
    ) -> Result<Self, ConfigurationError> {
        if channels == 0 {
            return Err(ConfigurationError::MissingParameter { name: "channels" });
        }
        if channels > MAX_CHANNELS {
            return Err(ConfigurationError::CapacityExceeded {
                what: "channels",
                requested: channels,
                capacity: MAX_CHANNELS,
            });
        }
        if let ZeroCrossing::Thresholded { fraction } = zero_crossing {
            if !(0.0..1.0).contains(&fraction) {
                return Err(ConfigurationError::FeatureLayoutMismatch {
                    reason: "zero-crossing fraction must be in [0, 1)",
                });
            }
        }
        Ok(Self { channels, feature_set, zero_crossing })
    }

    /// Total feature count (`channels × per_channel`).
    #[must_use]
    pub const fn feature_count(&self) -> usize {
        self.channels * self.feature_set.per_channel()
    }

    /// Flat index of one channel's feature.
    #[must_use]
    pub fn index_of(&self, channel: usize, kind: FeatureKind) -> Option<usize> {
        if channel >= self.channels {
            return None;
        }
        let offset = self.feature_set.kinds().iter().position(|&k| k == kind)?;
        Some(channel * self.feature_set.per_channel() + offset)
    }

    /// Channel and feature at a flat index.
    #[must_use]
    pub fn describe(&self, index: usize) -> Option<(usize, FeatureKind)> {
        if index >= self.feature_count() {
            return None;
        }
        let per = self.feature_set.per_channel();
        Some((index / per, self.feature_set.kinds()[index % per]))
    }
}

// ============================================================================
// Per-Channel Statistics
// ============================================================================

/// All statistics of one channel.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct ChannelFeatures {
    /// Root mean square
    pub rms: f64,
    /// Population variance
    pub var: f64,
    /// Mean absolute value
    pub mav: f64,
    /// Slope sign changes
    pub ssc: u32,
    /// Zero crossings
    pub zc: u32,
    /// Waveform length
    pub wl: f64,
}

impl ChannelFeatures {
    /// Compute from an oldest-to-newest sequence of readings.
    ///
    /// The iterator is walked more than once, so it must be cheap to clone.
    pub fn compute<I>(readings: I, zero_crossing: ZeroCrossing) -> Self
    where
        I: Iterator<Item = f64> + Clone,
    {
        let mut n = 0usize;
        let mut sum = 0.0f64;
        let mut sum_sq = 0.0f64;
        let mut sum_abs = 0.0f64;
        let mut wl = 0.0f64;
        let mut ssc = 0u32;
        let mut prev2: Option<f64> = None;
        let mut prev: Option<f64> = None;

        for x in readings.clone() {
            n += 1;
            sum += x;
            sum_sq += x * x;
            sum_abs += x.abs();
            if let Some(p) = prev {
                wl += (x - p).abs();
                if let Some(pp) = prev2 {
                    // p is the interior point between pp and x
                    if (p - pp) * (p - x) > 0.0 {
                        ssc += 1;
                    }
                }
            }
            prev2 = prev;
            prev = Some(x);
        }

        if n == 0 {
            return Self::default();
        }

        let count = n as f64;
        let mean = sum / count;
        let var = math::population_variance(readings.clone(), mean);

        Self {
            rms: libm::sqrt(sum_sq / count),
            var,
            mav: sum_abs / count,
            ssc,
            zc: zero_crossings(readings, mean, zero_crossing),
            wl,
        }
    }

    /// Compute from a slice.
    #[must_use]
    pub fn from_slice(readings: &[f64], zero_crossing: ZeroCrossing) -> Self {
        Self::compute(readings.iter().copied(), zero_crossing)
    }

    /// Value of one feature.
    #[must_use]
    pub fn get(&self, kind: FeatureKind) -> f64 {
        match kind {
            FeatureKind::Rms => self.rms,
            FeatureKind::Var => self.var,
            FeatureKind::Mav => self.mav,
            FeatureKind::Ssc => f64::from(self.ssc),
            FeatureKind::Zc => f64::from(self.zc),
            FeatureKind::Wl => self.wl,
        }
    }
}

fn zero_crossings<I>(readings: I, mean: f64, policy: ZeroCrossing) -> u32
where
    I: Iterator<Item = f64> + Clone,
{
    let min_step = match policy {
        ZeroCrossing::MeanCrossing => None,
        ZeroCrossing::Thresholded { fraction } => {
            let peak = readings.clone().map(f64::abs).fold(0.0f64, f64::max);
            Some(fraction * peak)
        }
    };

    let mut zc = 0u32;
    let mut prev: Option<f64> = None;
    // Skip x[0]: pairs start at (x[1], x[2])
    for x in readings.skip(1) {
        if let Some(p) = prev {
            let crosses = (p - mean) * (x - mean) < 0.0;
            let large_enough = min_step.map_or(true, |t| (p - x).abs() >= t);
            if crosses && large_enough {
                zc += 1;
            }
        }
        prev = Some(x);
    }
    zc
}

// ============================================================================
// Extractor
// ============================================================================

/// Turns windows into feature vectors under a fixed layout.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FeatureExtractor {
    layout: FeatureLayout,
}

impl FeatureExtractor {
    /// Create an extractor for a layout.
    #[must_use]
    pub const fn new(layout: FeatureLayout) -> Self {
        Self { layout }
    }

    /// Layout this extractor produces.
    #[must_use]
    pub const fn layout(&self) -> &FeatureLayout {
        &self.layout
    }

    /// Output length.
    #[must_use]
    pub const fn feature_count(&self) -> usize {
        self.layout.feature_count()
    }

    /// Extract a fresh feature vector from a window.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` if the window's channel count differs
    /// from the layout.
    pub fn extract(&self, window: &Window<'_>) -> Result<FeatureVector, DimensionMismatch> {
        let mut out = FeatureVector::new();
        self.extract_into(window, &mut out)?;
        Ok(out)
    }

    /// Extract into a caller-owned vector, replacing its contents.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` if the window's channel count differs
    /// from the layout.
    pub fn extract_into(
        &self,
        window: &Window<'_>,
        out: &mut FeatureVector,
    ) -> Result<(), DimensionMismatch> {
        if window.channels() != self.layout.channels {
            return Err(DimensionMismatch {
                stage: "feature extractor",
                expected: self.layout.channels,
                got: window.channels(),
            });
        }

        out.clear();
        let kinds = self.layout.feature_set.kinds();
        let mut block = [0.0f64; MAX_FEATURES_PER_CHANNEL];
        for ch in 0..self.layout.channels {
            let readings = window.channel(ch).map(f64::from);
            let stats = ChannelFeatures::compute(readings, self.layout.zero_crossing);
            for (slot, &kind) in block.iter_mut().zip(kinds) {
                *slot = stats.get(kind);
            }
            out.extend_from_slice(&block[..kinds.len()]).map_err(|()| DimensionMismatch {
                stage: "feature vector",
                expected: MAX_FEATURES,
                got: self.layout.feature_count(),
            })?;
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
