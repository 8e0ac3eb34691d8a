//! Per-feature affine normalization
//!
//! `normalized[i] = (feature[i] - mean[i]) / scale[i]`, with parameters
//! fitted offline and frozen at load time.

use alloc::vec;
use alloc::vec::Vec;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, DimensionMismatch};

/// Frozen mean/scale pair for every feature.
///
/// Deserialization goes through [`Scaler::new`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawScaler")]
pub struct Scaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

#[derive(Deserialize)]
struct RawScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl TryFrom<RawScaler> for Scaler {
    type Error = ConfigurationError;

    fn try_from(raw: RawScaler) -> Result<Self, Self::Error> {
        Self::new(raw.mean, raw.scale)
    }
}

impl Scaler {
    /// Build a scaler from fitted parameters.
    ///
    /// Scale entries equal to zero are replaced by 1 so a degenerate
    /// feature passes through mean-centred instead of dividing by zero.
    ///
    /// # Errors
    ///
    /// Empty vectors, a length disagreement, or any non-finite entry.
    pub fn new(mean: Vec<f64>, mut scale: Vec<f64>) -> Result<Self, ConfigurationError> {
        if mean.is_empty() {
            return Err(ConfigurationError::MissingParameter { name: "scaler.mean" });
        }
        if scale.len() != mean.len() {
            return Err(DimensionMismatch {
                stage: "scaler.scale",
                expected: mean.len(),
                got: scale.len(),
            }
            .into());
        }
        check_finite("scaler.mean", &mean)?;
        check_finite("scaler.scale", &scale)?;

        for s in &mut scale {
            if *s == 0.0 {
                *s = 1.0;
            }
        }
        Ok(Self { mean, scale })
    }

    /// Pass-through scaler (mean 0, scale 1) of the given width.
    #[must_use]
    pub fn identity(width: usize) -> Self {
        Self { mean: vec![0.0; width], scale: vec![1.0; width] }
    }

    /// Number of features this scaler expects.
    #[inline]
    #[must_use]
    pub fn width(&self) -> usize {
        self.mean.len()
    }

    /// Fitted means.
    #[must_use]
    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    /// Effective scales (zeros already replaced).
    #[must_use]
    pub fn scale(&self) -> &[f64] {
        &self.scale
    }

    /// Normalize `features` into `out`.
    ///
    /// # Errors
    ///
    /// `DimensionMismatch` if either slice differs from [`Self::width`].
    pub fn normalize(&self, features: &[f64], out: &mut [f64]) -> Result<(), DimensionMismatch> {
        self.check_width(features.len())?;
        self.check_width(out.len())?;
        for (((o, &x), &m), &s) in out.iter_mut().zip(features).zip(&self.mean).zip(&self.scale) {
            *o = (x - m) / s;
        }
        Ok(())
    }

    /// Normalize in place.
    ///
    /// # Errors
    ///
    /// `DimensionMismatch` if `values` differs from [`Self::width`].
    pub fn normalize_in_place(&self, values: &mut [f64]) -> Result<(), DimensionMismatch> {
        self.check_width(values.len())?;
        for ((v, &m), &s) in values.iter_mut().zip(&self.mean).zip(&self.scale) {
            *v = (*v - m) / s;
        }
        Ok(())
    }

    fn check_width(&self, got: usize) -> Result<(), DimensionMismatch> {
        if got == self.width() {
            Ok(())
        } else {
            Err(DimensionMismatch { stage: "normalizer", expected: self.width(), got })
        }
    }
}

/// Reject NaN or infinite parameters.
pub(crate) fn check_finite(name: &'static str, values: &[f64]) -> Result<(), ConfigurationError> {
    match values.iter().position(|v| !v.is_finite()) {
        Some(index) => Err(ConfigurationError::NonFiniteParameter { name, index }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_maps_to_zero() {
        let scaler = Scaler::new(vec![1.0, -2.0, 10.0], vec![0.5, 4.0, 3.0]).unwrap();
        let mut out = [9.0; 3];
        scaler.normalize(&[1.0, -2.0, 10.0], &mut out).unwrap();
        assert_eq!(out, [0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_zero_scale_is_mean_centred_passthrough() {
        let scaler = Scaler::new(vec![2.0, 0.0], vec![0.0, 2.0]).unwrap();
        assert_eq!(scaler.scale(), &[1.0, 2.0]);
        let mut values = [7.0, 4.0];
        scaler.normalize_in_place(&mut values).unwrap();
        assert_eq!(values, [5.0, 2.0]);
    }

    #[test]
    fn test_identity_leaves_input_unchanged() {
        let scaler = Scaler::identity(4);
        let mut values = [1.5, -3.0, 0.0, 400.0];
        scaler.normalize_in_place(&mut values).unwrap();
        assert_eq!(values, [1.5, -3.0, 0.0, 400.0]);
    }

    #[test]
    fn test_width_mismatch() {
        let scaler = Scaler::identity(3);
        let mut values = [0.0; 4];
        let err = scaler.normalize_in_place(&mut values).unwrap_err();
        assert_eq!(err, DimensionMismatch { stage: "normalizer", expected: 3, got: 4 });
    }

    #[test]
    fn test_rejects_bad_parameters() {
        assert!(matches!(
            Scaler::new(vec![0.0, f64::NAN], vec![1.0, 1.0]),
            Err(ConfigurationError::NonFiniteParameter { name: "scaler.mean", index: 1 })
        ));
        assert!(matches!(
            Scaler::new(vec![0.0, 1.0], vec![1.0]),
            Err(ConfigurationError::Dimension(_))
        ));
        assert!(Scaler::new(vec![], vec![]).is_err());
    }

    #[test]
    fn test_deserialize_applies_zero_scale_guard() {
        let scaler: Scaler = serde_json::from_str(r#"{"mean":[1.0],"scale":[0.0]}"#).unwrap();
        assert_eq!(scaler.scale(), &[1.0]);
        let mut values = [3.0];
        scaler.normalize_in_place(&mut values).unwrap();
        assert_eq!(values, [2.0]);

        assert!(serde_json::from_str::<Scaler>(r#"{"mean":[1.0,2.0],"scale":[1.0]}"#).is_err());
        assert!(serde_json::from_str::<Scaler>(r#"{"mean":[],"scale":[]}"#).is_err());
    }
}
