//! Min-max mapping of raw weights onto the 1..=100 score range.

use thiserror::Error;

pub const SCORE_MIN: f64 = 1.0;
pub const SCORE_MAX: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum NormalizeError {
    #[error("no values to normalise")]
    Empty,
    #[error("every value equals {value}")]
    Degenerate { value: f64 },
    #[error("value at position {index} is not finite")]
    NonFinite { index: usize },
}

/// Linear map of `value` from `[old_min, old_max]` onto `[new_min, new_max]`.
/// Callers must ensure `old_max != old_min`.
pub fn translate(value: f64, old_min: f64, old_max: f64, new_min: f64, new_max: f64) -> f64 {
    let scaled = (value - old_min) / (old_max - old_min);
    new_min + scaled * (new_max - new_min)
}

/// `(min, max)` of `values`, rejecting empty input and non-finite entries.
pub fn value_range(values: &[f64]) -> Result<(f64, f64), NormalizeError> {
    if values.is_empty() {
        return Err(NormalizeError::Empty);
    }
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for (index, &value) in values.iter().enumerate() {
        if !value.is_finite() {
            return Err(NormalizeError::NonFinite { index });
        }
        lo = lo.min(value);
        hi = hi.max(value);
    }
    Ok((lo, hi))
}

/// Normalises `values` onto `[SCORE_MIN, SCORE_MAX]` using their own range.
pub fn normalize(values: &[f64]) -> Result<Vec<f64>, NormalizeError> {
    let (lo, hi) = value_range(values)?;
    if hi == lo {
        return Err(NormalizeError::Degenerate { value: lo });
    }
    Ok(values
        .iter()
        .map(|&value| translate(value, lo, hi, SCORE_MIN, SCORE_MAX))
        .collect())
}

/// Integer scores as stored in the output score field.
pub fn integer_scores(values: &[f64]) -> Result<Vec<i64>, NormalizeError> {
    Ok(normalize(values)?
        .into_iter()
        .map(|score| score.round() as i64)
        .collect())
}
