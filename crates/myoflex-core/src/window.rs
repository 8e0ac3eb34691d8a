//! Fixed-capacity sliding windows over multi-channel EMG samples
//!
//! The [`Windower`] keeps the most recent `length` samples of every channel
//! in a flat arena indexed by a write cursor that advances modulo the window
//! length. Pushing never allocates. A [`Window`] view is emitted every
//! `step` accepted samples once the first `length` samples have arrived.
//!
//! ```
//! use myoflex_core::types::EmgSample;
//! use myoflex_core::window::{WindowConfig, Windower};
//!
//! let mut windower: Windower = Windower::new(WindowConfig::new(1, 4, 2)).unwrap();
//! let mut emitted = 0;
//! for i in 1..=10u32 {
//!     let sample = EmgSample::from_readings(u64::from(i), i, &[i as f32]).unwrap();
//!     if windower.push(&sample).is_some() {
//!         emitted += 1;
//!     }
//! }
//! assert_eq!(emitted, 4);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, MalformedSample};
use crate::types::{EmgSample, MAX_CHANNELS};

/// Default arena size in reading slots (channels × window length).
pub const DEFAULT_CAPACITY: usize = 4096;

/// Window geometry and admission rules.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Channels per sample
    pub channels: usize,
    /// Samples per window (W)
    pub length: usize,
    /// Samples between consecutive windows (S, `1..=W`)
    pub step: usize,
    /// Inclusive range a reading must fall in to be admitted
    #[serde(default)]
    pub valid_range: Option<(f32, f32)>,
}

impl WindowConfig {
    /// Geometry with no range check.
    #[must_use]
    pub const fn new(channels: usize, length: usize, step: usize) -> Self {
        Self { channels, length, step, valid_range: None }
    }

    /// Add an inclusive reading range.
    #[must_use]
    pub const fn with_valid_range(mut self, min: f32, max: f32) -> Self {
        self.valid_range = Some((min, max));
        self
    }

    /// Overlap fraction `(W - S) / W`.
    #[must_use]
    pub fn overlap(&self) -> f64 {
        if self.length == 0 {
            return 0.0;
        }
        (self.length - self.step.min(self.length)) as f64 / self.length as f64
    }

    fn validate(&self, capacity: usize) -> Result<(), ConfigurationError> {
        if self.channels == 0 {
            return Err(ConfigurationError::InvalidWindow { reason: "zero channels" });
        }
        if self.channels > MAX_CHANNELS {
            return Err(ConfigurationError::CapacityExceeded {
                what: "channels",
                requested: self.channels,
                capacity: MAX_CHANNELS,
            });
        }
        if self.length == 0 {
            return Err(ConfigurationError::InvalidWindow { reason: "zero length" });
        }
        if self.step == 0 || self.step > self.length {
            return Err(ConfigurationError::InvalidWindow { reason: "step must be in 1..=length" });
        }
        if let Some((min, max)) = self.valid_range {
            if min.is_nan() || max.is_nan() || min > max {
                return Err(ConfigurationError::InvalidWindow { reason: "empty valid range" });
            }
        }
        let slots = self.channels.saturating_mul(self.length);
        if slots > capacity {
            return Err(ConfigurationError::CapacityExceeded {
                what: "window arena",
                requested: slots,
                capacity,
            });
        }
        Ok(())
    }
}

/// Ring-buffer accumulator producing overlapping windows.
#[derive(Clone, Debug)]
pub struct Windower<const CAP: usize = DEFAULT_CAPACITY> {
    arena: [f32; CAP],
    config: WindowConfig,
    /// Next slot to overwrite, in `0..length`
    cursor: usize,
    /// Samples accepted since the last reset
    accepted: u64,
    /// Windows emitted since the last reset
    emitted: u64,
    /// Samples rejected since construction
    dropped: u64,
    last_timestamp_us: Option<u64>,
    newest_sequence: u32,
}

impl<const CAP: usize> Windower<CAP> {
    /// Create a windower for the given geometry.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` for a zero/oversized geometry or a
    /// step outside `1..=length`.
    pub fn new(config: WindowConfig) -> Result<Self, ConfigurationError> {
        config.validate(CAP)?;
        Ok(Self {
            arena: [0.0; CAP],
            config,
            cursor: 0,
            accepted: 0,
            emitted: 0,
            dropped: 0,
            last_timestamp_us: None,
            newest_sequence: 0,
        })
    }

    /// Window geometry.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &WindowConfig {
        &self.config
    }

    /// Samples rejected as malformed.
    #[inline]
    #[must_use]
    pub const fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Samples accepted since the last reset.
    #[inline]
    #[must_use]
    pub const fn accepted(&self) -> u64 {
        self.accepted
    }

    /// True once `length` samples have been accepted.
    #[inline]
    #[must_use]
    pub fn is_warm(&self) -> bool {
        self.accepted >= self.config.length as u64
    }

    /// Push a sample, absorbing malformed input.
    ///
    /// A rejected sample bumps [`dropped`](Self::dropped) and leaves the
    /// window untouched. `None` means no window is due yet.
    pub fn push(&mut self, sample: &EmgSample) -> Option<Window<'_>> {
        match self.admit(sample) {
            Ok(()) => self.emit(),
            Err(_) => {
                self.dropped += 1;
                None
            }
        }
    }

    /// Push a sample, reporting why it was rejected.
    ///
    /// # Errors
    ///
    /// Returns `MalformedSample` when the sample is refused. The rejection
    /// is not counted in [`dropped`](Self::dropped).
    pub fn try_push(&mut self, sample: &EmgSample) -> Result<Option<Window<'_>>, MalformedSample> {
        self.admit(sample)?;
        Ok(self.emit())
    }

    /// Discard all in-flight samples. The drop counter survives.
    pub fn reset(&mut self) {
        self.cursor = 0;
        self.accepted = 0;
        self.emitted = 0;
        self.last_timestamp_us = None;
    }

    fn validate(&self, sample: &EmgSample) -> Result<(), MalformedSample> {
        if sample.len() != self.config.channels {
            return Err(MalformedSample::ChannelCountMismatch {
                expected: self.config.channels,
                got: sample.len(),
            });
        }
        if let Some(previous_us) = self.last_timestamp_us {
            if sample.timestamp_us < previous_us {
                return Err(MalformedSample::TimestampRegression {
                    previous_us,
                    got_us: sample.timestamp_us,
                });
            }
        }
        for (channel, &value) in sample.readings().iter().enumerate() {
            if !value.is_finite() {
                return Err(MalformedSample::NonFinite { channel });
            }
            if let Some((min, max)) = self.config.valid_range {
                if value < min || value > max {
                    return Err(MalformedSample::OutOfRange { channel, value });
                }
            }
        }
        Ok(())
    }

    fn admit(&mut self, sample: &EmgSample) -> Result<(), MalformedSample> {
        self.validate(sample)?;

        let channels = self.config.channels;
        let base = self.cursor * channels;
        self.arena[base..base + channels].copy_from_slice(sample.readings());

        self.cursor = (self.cursor + 1) % self.config.length;
        self.accepted += 1;
        self.last_timestamp_us = Some(sample.timestamp_us);
        self.newest_sequence = sample.sequence;
        Ok(())
    }

    fn emit(&mut self) -> Option<Window<'_>> {
        let length = self.config.length as u64;
        if self.accepted < length || (self.accepted - length) % self.config.step as u64 != 0 {
            return None;
        }

        let index = self.emitted;
        self.emitted += 1;
        Some(Window {
            arena: &self.arena[..self.config.channels * self.config.length],
            channels: self.config.channels,
            length: self.config.length,
            // Cursor now points at the oldest sample
            start: self.cursor,
            index,
            newest_timestamp_us: self.last_timestamp_us.unwrap_or(0),
            newest_sequence: self.newest_sequence,
        })
    }
}

/// Borrowed oldest-to-newest view of the last `length` samples.
#[derive(Clone, Copy, Debug)]
pub struct Window<'a> {
    arena: &'a [f32],
    channels: usize,
    length: usize,
    start: usize,
    index: u64,
    newest_timestamp_us: u64,
    newest_sequence: u32,
}

impl<'a> Window<'a> {
    /// Samples per channel.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.length
    }

    /// Always false; windows are only emitted when full.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Number of channels.
    #[inline]
    #[must_use]
    pub const fn channels(&self) -> usize {
        self.channels
    }

    /// Count of windows emitted before this one.
    #[inline]
    #[must_use]
    pub const fn index(&self) -> u64 {
        self.index
    }

    /// Timestamp of the newest sample in the window.
    #[inline]
    #[must_use]
    pub const fn newest_timestamp_us(&self) -> u64 {
        self.newest_timestamp_us
    }

    /// Sequence number of the newest sample in the window.
    #[inline]
    #[must_use]
    pub const fn newest_sequence(&self) -> u32 {
        self.newest_sequence
    }

    /// Reading `i` (0 = oldest) of `channel`.
    #[must_use]
    pub fn get(&self, channel: usize, i: usize) -> Option<f32> {
        if channel >= self.channels || i >= self.length {
            return None;
        }
        Some(self.at(channel, i))
    }

    /// Oldest-to-newest readings of one channel.
    ///
    /// Yields nothing for an out-of-range channel.
    pub fn channel(&self, channel: usize) -> impl ExactSizeIterator<Item = f32> + Clone + 'a {
        let view = *self;
        let count = if channel < self.channels { self.length } else { 0 };
        (0..count).map(move |i| view.at(channel, i))
    }

    #[inline]
    fn at(&self, channel: usize, i: usize) -> f32 {
        let slot = (self.start + i) % self.length;
        self.arena[slot * self.channels + channel]
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    fn sample(i: u32, readings: &[f32]) -> EmgSample {
        EmgSample::from_readings(u64::from(i) * 1000, i, readings).unwrap()
    }

    #[test]
    fn test_emission_cadence_w4_s2() {
        let mut windower: Windower = Windower::new(WindowConfig::new(1, 4, 2)).unwrap();
        let mut emitted: Vec<(u32, Vec<f32>)> = Vec::new();

        for i in 1..=10u32 {
            if let Some(window) = windower.push(&sample(i, &[i as f32])) {
                emitted.push((i, window.channel(0).collect()));
            }
        }

        assert_eq!(
            emitted,
            [
                (4, alloc::vec![1.0, 2.0, 3.0, 4.0]),
                (6, alloc::vec![3.0, 4.0, 5.0, 6.0]),
                (8, alloc::vec![5.0, 6.0, 7.0, 8.0]),
                (10, alloc::vec![7.0, 8.0, 9.0, 10.0]),
            ]
        );
    }

    #[test]
    fn test_no_window_before_warm_up() {
        let mut windower: Windower = Windower::new(WindowConfig::new(2, 5, 1)).unwrap();
        for i in 0..4u32 {
            assert!(windower.push(&sample(i, &[1.0, 2.0])).is_none());
        }
        assert!(!windower.is_warm());
        assert!(windower.push(&sample(4, &[1.0, 2.0])).is_some());
    }

    #[test]
    fn test_multi_channel_ordering() {
        let mut windower: Windower = Windower::new(WindowConfig::new(2, 3, 3)).unwrap();
        windower.push(&sample(0, &[1.0, -1.0]));
        windower.push(&sample(1, &[2.0, -2.0]));
        let window = windower.push(&sample(2, &[3.0, -3.0])).unwrap();

        assert_eq!(window.channel(0).collect::<Vec<_>>(), [1.0, 2.0, 3.0]);
        assert_eq!(window.channel(1).collect::<Vec<_>>(), [-1.0, -2.0, -3.0]);
        assert_eq!(window.get(1, 2), Some(-3.0));
        assert_eq!(window.get(2, 0), None);
        assert_eq!(window.newest_sequence(), 2);
    }

    #[test]
    fn test_malformed_sample_is_dropped_without_state_change() {
        let mut windower: Windower = Windower::new(WindowConfig::new(1, 3, 1)).unwrap();
        windower.push(&sample(0, &[1.0]));
        windower.push(&sample(1, &[2.0]));

        assert!(windower.push(&sample(2, &[f32::NAN])).is_none());
        assert!(windower.push(&sample(3, &[1.0, 2.0])).is_none());
        assert_eq!(windower.dropped(), 2);
        assert_eq!(windower.accepted(), 2);

        let window = windower.push(&sample(4, &[3.0])).unwrap();
        assert_eq!(window.channel(0).collect::<Vec<_>>(), [1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_try_push_reports_reason() {
        let config = WindowConfig::new(1, 2, 1).with_valid_range(0.0, 4095.0);
        let mut windower: Windower = Windower::new(config).unwrap();

        let err = windower.try_push(&sample(0, &[5000.0])).unwrap_err();
        assert!(matches!(err, MalformedSample::OutOfRange { channel: 0, .. }));
        assert_eq!(windower.dropped(), 0);
    }

    #[test]
    fn test_timestamp_regression_rejected() {
        let mut windower: Windower = Windower::new(WindowConfig::new(1, 2, 1)).unwrap();
        windower.push(&EmgSample::from_readings(2000, 0, &[1.0]).unwrap());
        let err = windower
            .try_push(&EmgSample::from_readings(1000, 1, &[1.0]).unwrap())
            .unwrap_err();
        assert!(matches!(err, MalformedSample::TimestampRegression { .. }));
    }

    #[test]
    fn test_reset_discards_partial_window() {
        let mut windower: Windower = Windower::new(WindowConfig::new(1, 3, 1)).unwrap();
        windower.push(&sample(0, &[1.0]));
        windower.push(&sample(1, &[2.0]));
        windower.reset();

        assert!(windower.push(&sample(2, &[3.0])).is_none());
        assert!(windower.push(&sample(3, &[4.0])).is_none());
        let window = windower.push(&sample(4, &[5.0])).unwrap();
        assert_eq!(window.channel(0).collect::<Vec<_>>(), [3.0, 4.0, 5.0]);
        assert_eq!(window.index(), 0);
    }

    #[test]
    fn test_invalid_geometry_rejected() {
        assert!(Windower::<64>::new(WindowConfig::new(1, 4, 0)).is_err());
        assert!(Windower::<64>::new(WindowConfig::new(1, 4, 5)).is_err());
        assert!(Windower::<64>::new(WindowConfig::new(0, 4, 1)).is_err());
        assert!(matches!(
            Windower::<64>::new(WindowConfig::new(4, 32, 8)),
            Err(ConfigurationError::CapacityExceeded { requested: 128, .. })
        ));
    }

    #[test]
    fn test_overlap_fraction() {
        let config = WindowConfig::new(4, 150, 50);
        assert!((config.overlap() - 2.0 / 3.0).abs() < 1e-12);
    }
}
