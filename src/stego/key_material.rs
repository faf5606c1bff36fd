// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Additive key-material channel.
//!
//! Plants the SHA-256 digest of a label into a weight tensor by adding
//! `digest[i] / 255 * EPSILON` to element `i` for the first 32 elements.
//! There is no exact extractor: given the unperturbed weights, the residual
//! is correlated against the offsets each candidate label would produce and
//! the best-scoring label wins.
//!
//! The perturbation moves values by many ULPs, so it overwrites whatever the
//! LSB channel wrote to the same elements. The generator keeps the two
//! channels on different tensors.

use crate::onnx::tensor::Tensor;
use crate::stego::error::StegoError;
use crate::stego::keys::{self, LABEL_DIGEST_LEN};

/// Scale of the additive perturbation.
pub const EPSILON: f32 = 1e-4;

/// Offsets that `label` adds to the first `n` elements (at most 32).
pub fn expected_offsets(label: &str, epsilon: f32, n: usize) -> Vec<f32> {
    keys::from_label(label)
        .iter()
        .take(n.min(LABEL_DIGEST_LEN))
        .map(|&b| (f32::from(b) / 255.0) * epsilon)
        .collect()
}

/// Add the label's offsets to `values` in place. Returns the number of
/// elements touched.
pub fn inject(values: &mut [f32], label: &str, epsilon: f32) -> usize {
    let offsets = expected_offsets(label, epsilon, values.len());
    for (value, offset) in values.iter_mut().zip(&offsets) {
        *value += offset;
    }
    offsets.len()
}

/// [`inject`] into a float initializer.
pub fn inject_tensor(tensor: &mut Tensor, label: &str, epsilon: f32) -> Result<usize, StegoError> {
    let name = tensor.name.clone();
    let values = tensor.as_f32_mut().ok_or(StegoError::NotFloatTensor(name))?;
    Ok(inject(values, label, epsilon))
}

/// Pearson correlation between the observed residual and the offsets `label`
/// would have produced. Returns 0.0 when either side has no variance.
pub fn correlate(observed: &[f32], reference: &[f32], label: &str, epsilon: f32) -> f64 {
    let n = observed.len().min(reference.len());
    let expected = expected_offsets(label, epsilon, n);
    let residual: Vec<f64> = observed
        .iter()
        .zip(reference)
        .take(expected.len())
        .map(|(&o, &r)| f64::from(o) - f64::from(r))
        .collect();
    let expected: Vec<f64> = expected.into_iter().map(f64::from).collect();
    pearson(&residual, &expected)
}

fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n < 2 {
        return 0.0;
    }
    let mean_a = a[..n].iter().sum::<f64>() / n as f64;
    let mean_b = b[..n].iter().sum::<f64>() / n as f64;
    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for i in 0..n {
        let da = a[i] - mean_a;
        let db = b[i] - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }
    if var_a <= f64::EPSILON * f64::EPSILON || var_b <= f64::EPSILON * f64::EPSILON {
        return 0.0;
    }
    cov / (var_a.sqrt() * var_b.sqrt())
}

/// Correlation score for one candidate label.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelScore {
    pub label: String,
    pub score: f64,
}

/// Score every candidate label, best first.
///
/// With the `parallel` feature the candidates are scored on the rayon pool.
pub fn rank_labels(
    observed: &[f32],
    reference: &[f32],
    candidates: &[String],
    epsilon: f32,
) -> Vec<LabelScore> {
    let score = |label: &String| LabelScore {
        label: label.clone(),
        score: correlate(observed, reference, label, epsilon),
    };

    #[cfg(feature = "parallel")]
    let mut scores: Vec<LabelScore> = {
        use rayon::prelude::*;
        candidates.par_iter().map(score).collect()
    };
    #[cfg(not(feature = "parallel"))]
    let mut scores: Vec<LabelScore> = candidates.iter().map(score).collect();

    scores.sort_by(|a, b| b.score.total_cmp(&a.score));
    scores
}
