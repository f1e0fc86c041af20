//! Scalar descriptive statistics used by the aggregation layer.
//!
//! These are deliberately tiny: once the tabular data has left Polars, all
//! numeric work happens on plain slices, so every aggregate cell remains
//! directly checkable against hand arithmetic.

/// Arithmetic mean. `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation with one delta degree of freedom.
///
/// `None` when fewer than two values are present, since the estimator is
/// undefined for a single observation.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let sum_sq: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some((sum_sq / (values.len() - 1) as f64).sqrt())
}

/// Standard error of the mean: sample standard deviation over `sqrt(n)`.
pub fn sem(values: &[f64]) -> Option<f64> {
    Some(sample_std(values)? / (values.len() as f64).sqrt())
}

/// Relative change from `first` to `last`, expressed in percent. `None`
/// when the baseline is zero (or the inputs are not finite) and the change
/// is undefined.
pub fn percent_change(first: f64, last: f64) -> Option<f64> {
    let change = (last - first) / first * 100.0;
    change.is_finite().then_some(change)
}
