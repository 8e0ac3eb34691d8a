//! Core types for the Myoflex pipeline
//!
//! - [`EmgSample`]: one multi-channel reading, fixed-size and `Copy`
//! - [`ClassId`]: enumerated gesture identifier
//! - [`Prediction`]: one classification result per completed window
//! - [`ClassTable`]: human-readable class names indexed by class id

use alloc::string::String;
use alloc::vec::Vec;

use serde::{Deserialize, Serialize};

/// Maximum number of EMG channels a sample can carry.
pub const MAX_CHANNELS: usize = 8;

/// Features emitted per channel by the widest feature set.
pub const MAX_FEATURES_PER_CHANNEL: usize = 6;

/// Upper bound on feature-vector length.
pub const MAX_FEATURES: usize = MAX_CHANNELS * MAX_FEATURES_PER_CHANNEL;

// ============================================================================
// EMG Sample
// ============================================================================

/// Single EMG sample containing up to [`MAX_CHANNELS`] readings.
///
/// Readings are in device-native units (ADC counts or microvolts,
/// whatever the model was fitted on). Unused trailing slots are zero.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmgSample {
    /// Timestamp in microseconds since acquisition start
    pub timestamp_us: u64,
    /// Sequence number assigned by the source
    pub sequence: u32,
    /// Channel readings
    pub channels: [f32; MAX_CHANNELS],
    /// Number of valid entries in `channels`
    pub channel_count: u8,
}

impl EmgSample {
    /// Create a sample with `channel_count` zeroed readings.
    ///
    /// Counts above [`MAX_CHANNELS`] are clamped.
    #[inline]
    #[must_use]
    pub const fn new(timestamp_us: u64, sequence: u32, channel_count: usize) -> Self {
        let count = if channel_count > MAX_CHANNELS { MAX_CHANNELS } else { channel_count };
        Self {
            timestamp_us,
            sequence,
            channels: [0.0; MAX_CHANNELS],
            channel_count: count as u8,
        }
    }

    /// Create a sample from a slice of readings.
    ///
    /// Returns `None` if the slice is longer than [`MAX_CHANNELS`].
    #[must_use]
    pub fn from_readings(timestamp_us: u64, sequence: u32, readings: &[f32]) -> Option<Self> {
        if readings.len() > MAX_CHANNELS {
            return None;
        }
        let mut sample = Self::new(timestamp_us, sequence, readings.len());
        sample.channels[..readings.len()].copy_from_slice(readings);
        Some(sample)
    }

    /// Valid readings as a slice.
    #[inline]
    #[must_use]
    pub fn readings(&self) -> &[f32] {
        &self.channels[..usize::from(self.channel_count)]
    }

    /// Number of valid channels.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.channel_count as usize
    }

    /// True when the sample carries no channels.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.channel_count == 0
    }

    /// Reading for one channel, if present.
    #[inline]
    #[must_use]
    pub fn channel(&self, index: usize) -> Option<f32> {
        self.readings().get(index).copied()
    }

    /// Set a channel reading. Out-of-range indices are ignored.
    #[inline]
    pub fn set_channel(&mut self, index: usize, value: f32) {
        if index < self.len() {
            self.channels[index] = value;
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for EmgSample {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "EMG[{}]@{}us x{}", self.sequence, self.timestamp_us, self.channel_count);
    }
}

// ============================================================================
// Classes and Predictions
// ============================================================================

/// Enumerated gesture identifier (index into the model's class table).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct ClassId(pub u16);

impl ClassId {
    /// Class id as an array index
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl core::fmt::Display for ClassId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ClassId {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "class{}", self.0);
    }
}

/// Result of classifying one window.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Winning class
    pub class: ClassId,
    /// Raw decision score of the winning class (not a probability)
    pub score: f64,
    /// Count of windows emitted before this one
    pub window_index: u64,
}

#[cfg(feature = "defmt")]
impl defmt::Format for Prediction {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "W{} -> {}", self.window_index, self.class);
    }
}

/// Human-readable class names indexed by class id.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassTable {
    names: Vec<String>,
}

impl ClassTable {
    /// Build a table from names in class-id order.
    #[must_use]
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    /// Build a table from string slices.
    #[must_use]
    pub fn from_names(names: &[&str]) -> Self {
        Self { names: names.iter().map(|n| String::from(*n)).collect() }
    }

    /// Number of classes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// True when the table holds no classes.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Name for a class id.
    #[must_use]
    pub fn name(&self, class: ClassId) -> Option<&str> {
        self.names.get(class.index()).map(String::as_str)
    }

    /// Look up a class id by name (exact match).
    #[must_use]
    pub fn id_of(&self, name: &str) -> Option<ClassId> {
        self.names
            .iter()
            .position(|n| n == name)
            .and_then(|i| u16::try_from(i).ok())
            .map(ClassId)
    }

    /// Iterate over names in class-id order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_from_readings() {
        let sample = EmgSample::from_readings(1000, 7, &[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(sample.len(), 3);
        assert_eq!(sample.readings(), &[1.0, 2.0, 3.0]);
        assert_eq!(sample.channel(3), None);
    }

    #[test]
    fn test_sample_rejects_too_many_channels() {
        let readings = [0.0f32; MAX_CHANNELS + 1];
        assert!(EmgSample::from_readings(0, 0, &readings).is_none());
    }

    #[test]
    fn test_set_channel_ignores_out_of_range() {
        let mut sample = EmgSample::new(0, 0, 2);
        sample.set_channel(1, 4.5);
        sample.set_channel(5, 9.0);
        assert_eq!(sample.readings(), &[0.0, 4.5]);
    }

    #[test]
    fn test_class_table_lookup() {
        let table = ClassTable::from_names(&["rest", "fist", "open"]);
        assert_eq!(table.name(ClassId(1)), Some("fist"));
        assert_eq!(table.name(ClassId(3)), None);
        assert_eq!(table.id_of("open"), Some(ClassId(2)));
    }
}
