//! Small numeric helpers shared by the network and the training loop.

use crate::error::{check_len, Error, Result};

/// Normalizes raw scores into a probability distribution.
///
/// The largest score is subtracted before exponentiating so large logits
/// cannot overflow. When the largest score is infinite, the scores equal to
/// it split the whole mass evenly. Fails on NaN scores.
pub fn softmax(scores: &[f64]) -> Result<Vec<f64>> {
    if scores.iter().any(|s| s.is_nan()) {
        return Err(Error::InvalidData("softmax of a NaN score".into()));
    }
    let max = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if max.is_infinite() {
        let count = scores.iter().filter(|&&s| s == max).count() as f64;
        return Ok(scores
            .iter()
            .map(|&s| if s == max { 1.0 / count } else { 0.0 })
            .collect());
    }
    let exps: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    Ok(exps.into_iter().map(|e| e / sum).collect())
}

/// Returns the index of the largest value. Ties go to the first index.
///
/// Returns `None` for an empty slice.
pub fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Encodes `label` as a vector with `1.0` at the label's index.
pub fn one_hot(label: usize, classes: usize) -> Result<Vec<f64>> {
    if label >= classes {
        return Err(Error::InvalidData(format!(
            "label {} out of range for {} classes",
            label, classes
        )));
    }
    let mut encoded = vec![0.0; classes];
    encoded[label] = 1.0;
    Ok(encoded)
}

/// Computes the mean squared error between `actual` and `expected`.
pub fn mean_square_error(actual: &[f64], expected: &[f64]) -> Result<f64> {
    check_len(actual.len(), expected.len())?;
    if actual.is_empty() {
        return Ok(0.0);
    }
    let error: f64 = actual
        .iter()
        .zip(expected)
        .map(|(a, e)| (a - e) * (a - e))
        .sum();
    Ok(error / actual.len() as f64)
}
