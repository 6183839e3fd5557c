//! Loss and scoring helpers.
//!
//! The engine trains against [`squared_error`]: its gradient with respect to the
//! output is exactly `output - target`, which is what [`crate::Network::backward`]
//! propagates. [`cross_entropy`] is only reported, never differentiated.

/// Smallest probability fed to `ln`; anything below is clamped to it.
pub const PROB_FLOOR: f64 = 1e-10;

/// `0.5 * Σ (output[i] - target[i])^2`.
///
/// Shape contract: `output.len() == target.len()`.
#[inline]
pub fn squared_error(output: &[f64], target: &[f64]) -> f64 {
    assert_eq!(
        output.len(),
        target.len(),
        "output len {} does not match target len {}",
        output.len(),
        target.len()
    );

    let sum_sq = output
        .iter()
        .zip(target)
        .fold(0.0_f64, |acc, (&o, &t)| (o - t).mul_add(o - t, acc));
    0.5 * sum_sq
}

/// Mean binary cross-entropy over the output units.
///
/// `-(1/K) Σ [t ln(o) + (1 - t) ln(1 - o)]`, with both logs clamped through
/// [`safe_ln`] so a saturated output yields a large finite loss.
///
/// Shape contract: `output.len() == target.len()`.
pub fn cross_entropy(output: &[f64], target: &[f64]) -> f64 {
    assert_eq!(
        output.len(),
        target.len(),
        "output len {} does not match target len {}",
        output.len(),
        target.len()
    );

    if output.is_empty() {
        return 0.0;
    }

    let sum: f64 = output
        .iter()
        .zip(target)
        .map(|(&o, &t)| t * safe_ln(o) + (1.0 - t) * safe_ln(1.0 - o))
        .sum();
    -sum / output.len() as f64
}

/// `ln(x)` with `x` clamped to at least [`PROB_FLOOR`].
#[inline]
pub fn safe_ln(x: f64) -> f64 {
    // NaN also lands on the floor.
    if x >= PROB_FLOOR { x.ln() } else { PROB_FLOOR.ln() }
}

/// Index of the largest value (first one wins on ties). Returns 0 for an empty slice.
pub fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > values[best] {
            best = i;
        }
    }
    best
}
