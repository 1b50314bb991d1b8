//! Conditional label distribution of a single event under a parameter matrix.
//!
//! The same routines score events during training and at inference time.

use ndarray::ArrayView2;

use crate::event::Event;

/// Fill `out` with `ln P(label | event)` for every label.
///
/// The raw score of a label is the sum over active predicates of
/// `parameters[predicate][label] * value`, where a value that is not strictly
/// positive is replaced by `smoothing_floor`. Scores are normalized with
/// log-sum-exp.
///
/// # Panics
///
/// Panics if `out.len()` differs from the number of label columns or an event
/// predicate is outside the parameter rows. Callers validate IDs up front.
pub fn log_probabilities_into(
    event: &Event,
    parameters: ArrayView2<'_, f64>,
    smoothing_floor: f64,
    out: &mut [f64],
) {
    assert_eq!(out.len(), parameters.ncols());
    out.iter_mut().for_each(|s| *s = 0.0);

    for (predicate, value) in event.iter() {
        let value = if value > 0.0 { value } else { smoothing_floor };
        let row = parameters.row(predicate as usize);
        for (score, &weight) in out.iter_mut().zip(row.iter()) {
            *score += weight * value;
        }
    }

    let log_norm = logsumexp(out);
    out.iter_mut().for_each(|s| *s -= log_norm);
}

/// Fill `out` with `P(label | event)` for every label.
pub fn probabilities_into(
    event: &Event,
    parameters: ArrayView2<'_, f64>,
    smoothing_floor: f64,
    out: &mut [f64],
) {
    log_probabilities_into(event, parameters, smoothing_floor, out);
    out.iter_mut().for_each(|p| *p = p.exp());
}

/// Allocating variant of [`probabilities_into`].
pub fn score_event(
    event: &Event,
    parameters: ArrayView2<'_, f64>,
    smoothing_floor: f64,
) -> Vec<f64> {
    let mut probs = vec![0.0; parameters.ncols()];
    probabilities_into(event, parameters, smoothing_floor, &mut probs);
    probs
}

/// Log-sum-exp trick for numerical stability.
///
/// Returns NEG_INFINITY for empty slices. A NaN or infinite maximum is returned
/// as is so that divergence surfaces in the caller.
pub(crate) fn logsumexp(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NEG_INFINITY;
    }
    let max_val = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max_val.is_finite() {
        return max_val;
    }
    let sum: f64 = values.iter().map(|&v| (v - max_val).exp()).sum();
    max_val + sum.ln()
}
