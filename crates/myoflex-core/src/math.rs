//! Numeric helpers shared by the extractor and classifiers (`no_std`)
//!
//! Accumulation is always in `f64` so window statistics match the
//! double-precision definitions the models are fitted with.

// ============================================================================
// Statistics
// ============================================================================

/// Arithmetic mean. Zero for an empty input.
#[must_use]
pub fn mean<I>(values: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let mut sum = 0.0f64;
    let mut count = 0usize;
    for v in values {
        sum += v;
        count += 1;
    }
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Population variance (divides by N), two-pass around `mean`.
#[must_use]
pub fn population_variance<I>(values: I, mean: f64) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let mut sum_sq = 0.0f64;
    let mut count = 0usize;
    for v in values {
        let d = v - mean;
        sum_sq += d * d;
        count += 1;
    }
    if count == 0 {
        0.0
    } else {
        sum_sq / count as f64
    }
}

// ============================================================================
// Linear Algebra
// ============================================================================

/// Dot product over the common prefix of two slices.
#[inline]
#[must_use]
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Rectified-linear activation, applied in place.
#[inline]
pub fn relu_in_place(values: &mut [f64]) {
    for v in values {
        if *v < 0.0 {
            *v = 0.0;
        }
    }
}

/// Index and value of the maximum score.
///
/// Ties go to the lowest index: a later entry must be strictly greater to
/// win. NaN entries never win. Returns `None` for an empty slice.
#[must_use]
pub fn argmax(scores: &[f64]) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &s) in scores.iter().enumerate() {
        match best {
            None if !s.is_nan() => best = Some((i, s)),
            Some((_, b)) if s > b => best = Some((i, s)),
            _ => {}
        }
    }
    best.or_else(|| scores.first().map(|&s| (0, s)))
}

// ============================================================================
// Tests
// ============================================================================
