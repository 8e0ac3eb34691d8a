//! One-vs-rest linear classifier
//!
//! `score[k] = intercept[k] + Σ_i coefficients[k][i] * x[i]`, winner is
//! the argmax with ties going to the lowest class id.

use alloc::vec::Vec;

use crate::error::{ConfigurationError, DimensionMismatch};
use crate::math;
use crate::normalize::check_finite;
use crate::types::ClassId;

/// Dense `[classes][features]` coefficient matrix plus intercepts.
#[derive(Clone, Debug, PartialEq)]
pub struct LinearModel {
    /// Row-major, `class_count × feature_count`
    coefficients: Vec<f64>,
    intercepts: Vec<f64>,
    feature_count: usize,
}

impl LinearModel {
    /// Build from per-class coefficient rows.
    ///
    /// # Errors
    ///
    /// Empty or ragged rows, intercept count not matching the row count,
    /// too many classes for a [`ClassId`], or non-finite entries.
    pub fn new(rows: Vec<Vec<f64>>, intercepts: Vec<f64>) -> Result<Self, ConfigurationError> {
        let class_count = rows.len();
        if class_count == 0 {
            return Err(ConfigurationError::MissingParameter { name: "linear.coefficients" });
        }
        if class_count > usize::from(u16::MAX) {
            return Err(ConfigurationError::CapacityExceeded {
                what: "classes",
                requested: class_count,
                capacity: usize::from(u16::MAX),
            });
        }
        let feature_count = rows[0].len();
        if feature_count == 0 {
            return Err(ConfigurationError::MissingParameter { name: "linear.coefficients" });
        }
        if intercepts.len() != class_count {
            return Err(DimensionMismatch {
                stage: "linear.intercepts",
                expected: class_count,
                got: intercepts.len(),
            }
            .into());
        }

        let mut coefficients = Vec::with_capacity(class_count * feature_count);
        for row in &rows {
            if row.len() != feature_count {
                return Err(DimensionMismatch {
                    stage: "linear.coefficients",
                    expected: feature_count,
                    got: row.len(),
                }
                .into());
            }
            coefficients.extend_from_slice(row);
        }
        check_finite("linear.coefficients", &coefficients)?;
        check_finite("linear.intercepts", &intercepts)?;

        Ok(Self { coefficients, intercepts, feature_count })
    }

    /// Feature vector length this model consumes.
    #[inline]
    #[must_use]
    pub fn feature_count(&self) -> usize {
        self.feature_count
    }

    /// Number of classes.
    #[inline]
    #[must_use]
    pub fn class_count(&self) -> usize {
        self.intercepts.len()
    }

    /// Coefficient row of one class.
    #[must_use]
    pub fn row(&self, class: usize) -> Option<&[f64]> {
        let start = class.checked_mul(self.feature_count)?;
        self.coefficients.get(start..start + self.feature_count)
    }

    /// Intercepts in class order.
    #[must_use]
    pub fn intercepts(&self) -> &[f64] {
        &self.intercepts
    }

    /// Score of a single class.
    fn score(&self, class: usize, x: &[f64]) -> f64 {
        let start = class * self.feature_count;
        let row = &self.coefficients[start..start + self.feature_count];
        self.intercepts[class] + math::dot(row, x)
    }

    /// Classify a normalized feature vector.
    ///
    /// # Errors
    ///
    /// `DimensionMismatch` if `x` is not [`Self::feature_count`] long.
    pub fn classify(&self, x: &[f64]) -> Result<(ClassId, f64), DimensionMismatch> {
        if x.len() != self.feature_count {
            return Err(DimensionMismatch {
                stage: "linear classifier",
                expected: self.feature_count,
                got: x.len(),
            });
        }

        let mut best = (0usize, self.score(0, x));
        for class in 1..self.class_count() {
            let s = self.score(class, x);
            if s > best.1 || best.1.is_nan() {
                best = (class, s);
            }
        }
        // class_count fits in u16, checked at construction
        Ok((ClassId(best.0 as u16), best.1))
    }
}
