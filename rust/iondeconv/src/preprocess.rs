//! Spectrum conditioning ahead of feature detection and fitting.
//!
//! Three steps, one pass: Savitzky-Golay smoothing of the measured
//! conductivities, a per-point SNR estimate (computed from local variance
//! when the caller does not supply one), and a dense cubic-spline resample
//! carrying first and second derivatives for the feature detector.

use crate::errors::{
    DeconvError,
    Result,
};
use crate::utils::CubicSpline;
use tracing::debug;

/// Dense grid oversampling factor relative to the input point count.
pub const DENSE_GRID_FACTOR: usize = 5;

/// Largest smoothing window; clamped down for short spectra.
const MAX_SMOOTHING_WINDOW: usize = 15;

/// Polynomial order of the smoothing fit; clamped to `window - 1`.
const SMOOTHING_POLY_ORDER: usize = 3;

/// Window for the local-variance noise estimate.
const SNR_VARIANCE_WINDOW: usize = 11;

/// Variance floor guarding the SNR division on flat data.
const MIN_VARIANCE: f64 = 1e-10;

/// Rescaled SNR range; weights derived from this stay finite and positive.
const SNR_MIN: f64 = 1.0;
const SNR_MAX: f64 = 11.0;

/// A spectrum after smoothing, SNR estimation and dense resampling.
///
/// Owned by one pipeline invocation and never mutated after creation.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ProcessedSpectrum {
    pub frequencies: Vec<f64>,
    pub conductivities: Vec<f64>,
    pub smoothed: Vec<f64>,
    /// Per-point SNR, rescaled to [1, 11].
    pub snr: Vec<f64>,
    pub dense_frequencies: Vec<f64>,
    pub dense_conductivities: Vec<f64>,
    pub first_derivative: Vec<f64>,
    pub second_derivative: Vec<f64>,
}

/// Smooths, weights and resamples a raw spectrum.
///
/// `snr` overrides the local-variance estimate when supplied; it must match
/// the spectrum length. Fails when fewer than 3 points are provided (no
/// smoothing window can be formed), when lengths mismatch, or when the
/// frequencies are not strictly increasing.
pub fn preprocess(
    frequencies: &[f64],
    conductivities: &[f64],
    snr: Option<&[f64]>,
) -> Result<ProcessedSpectrum> {
    let n = frequencies.len();
    if conductivities.len() != n {
        return Err(DeconvError::MismatchedLengths {
            expected: n,
            other: conductivities.len(),
            context: "conductivities",
        });
    }
    if n < 3 {
        return Err(DeconvError::InsufficientPoints {
            real: n,
            expected: 3,
        });
    }
    if let Some(provided) = snr {
        if provided.len() != n {
            return Err(DeconvError::MismatchedLengths {
                expected: n,
                other: provided.len(),
                context: "snr",
            });
        }
    }
    for i in 1..n {
        if frequencies[i] <= frequencies[i - 1] {
            return Err(DeconvError::UnorderedFrequencies { index: i });
        }
    }
    if conductivities.iter().any(|x| !x.is_finite()) {
        return Err(DeconvError::NonFiniteData {
            context: "conductivities",
        });
    }

    let window = smoothing_window(n);
    let order = SMOOTHING_POLY_ORDER.min(window - 1);
    debug!("Smoothing with window {} and polynomial order {}", window, order);

    let smoothed = savitzky_golay(conductivities, window, order);
    let snr = match snr {
        Some(provided) => provided.to_vec(),
        None => estimate_snr(conductivities, &smoothed),
    };

    let spline = CubicSpline::fit(frequencies, &smoothed)?;
    let dense_len = DENSE_GRID_FACTOR * n;
    let f_min = frequencies[0];
    let f_max = frequencies[n - 1];
    let step = (f_max - f_min) / (dense_len - 1) as f64;

    let mut dense_frequencies = Vec::with_capacity(dense_len);
    let mut dense_conductivities = Vec::with_capacity(dense_len);
    let mut first_derivative = Vec::with_capacity(dense_len);
    let mut second_derivative = Vec::with_capacity(dense_len);
    for j in 0..dense_len {
        let x = f_min + step * j as f64;
        let p = spline.evaluate(x);
        dense_frequencies.push(x);
        dense_conductivities.push(p.value);
        first_derivative.push(p.first_derivative);
        second_derivative.push(p.second_derivative);
    }

    Ok(ProcessedSpectrum {
        frequencies: frequencies.to_vec(),
        conductivities: conductivities.to_vec(),
        smoothed,
        snr,
        dense_frequencies,
        dense_conductivities,
        first_derivative,
        second_derivative,
    })
}

/// Largest odd window not exceeding the cap, floored at 3.
fn smoothing_window(n: usize) -> usize {
    MAX_SMOOTHING_WINDOW.min(n - (n % 2) - 1).max(3)
}

/// Savitzky-Golay smoothing via local least-squares polynomial fits.
///
/// Interior points use a centered window; the first and last `window / 2`
/// points reuse the boundary window with the fit evaluated at their actual
/// offset, so the output length always matches the input.
fn savitzky_golay(data: &[f64], window: usize, order: usize) -> Vec<f64> {
    let n = data.len();
    let half = window / 2;
    let center_weights = savgol_weights(window, order, half);

    let mut smoothed = Vec::with_capacity(n);
    for i in 0..n {
        let (start, eval) = if i < half {
            (0, i)
        } else if i + half >= n {
            (n - window, i - (n - window))
        } else {
            (i - half, half)
        };

        let edge_weights;
        let weights: &[f64] = if eval == half {
            &center_weights
        } else {
            edge_weights = savgol_weights(window, order, eval);
            &edge_weights
        };

        let mut acc = 0.0;
        for (j, w) in weights.iter().enumerate() {
            acc += w * data[start + j];
        }
        smoothed.push(acc);
    }
    smoothed
}

/// Weights reproducing the least-squares polynomial fit over `window`
/// points, evaluated at offset `eval_index` from the window start.
///
/// Solving `G c = e0` with `G` the Gram matrix of the offset monomials
/// gives the evaluation functional; the weight of point `j` is then the
/// polynomial `c` evaluated at that point's offset. Offsets are rescaled
/// into [-1, 1] to keep the moment system well conditioned.
fn savgol_weights(window: usize, order: usize, eval_index: usize) -> Vec<f64> {
    let terms = order + 1;
    let scale = eval_index.max(window - 1 - eval_index).max(1) as f64;
    let offsets: Vec<f64> = (0..window)
        .map(|j| (j as f64 - eval_index as f64) / scale)
        .collect();

    // Gram matrix G[r][c] = sum_j t_j^(r + c).
    let mut gram = vec![vec![0.0; terms]; terms];
    for t in &offsets {
        let mut powers = vec![1.0; 2 * terms - 1];
        for p in 1..powers.len() {
            powers[p] = powers[p - 1] * t;
        }
        for (r, row) in gram.iter_mut().enumerate() {
            for (c, entry) in row.iter_mut().enumerate() {
                *entry += powers[r + c];
            }
        }
    }

    let mut rhs = vec![0.0; terms];
    rhs[0] = 1.0;
    let coeffs = solve_dense(&mut gram, &mut rhs);

    offsets
        .iter()
        .map(|t| {
            let mut acc = 0.0;
            let mut power = 1.0;
            for c in &coeffs {
                acc += c * power;
                power *= t;
            }
            acc
        })
        .collect()
}

/// Gaussian elimination with partial pivoting; the systems here are at
/// most 4x4 and symmetric positive definite.
fn solve_dense(matrix: &mut [Vec<f64>], rhs: &mut [f64]) -> Vec<f64> {
    let n = rhs.len();
    for col in 0..n {
        let pivot_row = (col..n)
            .max_by(|&a, &b| {
                matrix[a][col]
                    .abs()
                    .partial_cmp(&matrix[b][col].abs())
                    .unwrap()
            })
            .unwrap();
        matrix.swap(col, pivot_row);
        rhs.swap(col, pivot_row);

        let pivot = matrix[col][col];
        for row in (col + 1)..n {
            let factor = matrix[row][col] / pivot;
            for k in col..n {
                matrix[row][k] -= factor * matrix[col][k];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    let mut solution = vec![0.0; n];
    for row in (0..n).rev() {
        let mut acc = rhs[row];
        for col in (row + 1)..n {
            acc -= matrix[row][col] * solution[col];
        }
        solution[row] = acc / matrix[row][row];
    }
    solution
}

/// Per-point SNR from local variance of the raw conductivities.
///
/// Variance over an 11-point window clipped at the boundaries, floored at
/// `MIN_VARIANCE`; the raw ratio `smoothed / sqrt(variance)` is rescaled
/// linearly into [1, 11]. A flat raw ratio maps to all-ones.
fn estimate_snr(raw: &[f64], smoothed: &[f64]) -> Vec<f64> {
    let n = raw.len();
    let half = SNR_VARIANCE_WINDOW / 2;

    let mut ratios = Vec::with_capacity(n);
    for i in 0..n {
        let lo = i.saturating_sub(half);
        let hi = (i + half + 1).min(n);
        let slice = &raw[lo..hi];

        let mean = slice.iter().sum::<f64>() / slice.len() as f64;
        let variance = slice
            .iter()
            .map(|x| (x - mean) * (x - mean))
            .sum::<f64>()
            / slice.len() as f64;
        let variance = variance.max(MIN_VARIANCE);

        ratios.push(smoothed[i] / variance.sqrt());
    }

    let lo = ratios.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = ratios.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = hi - lo;
    if span <= 0.0 {
        return vec![SNR_MIN; n];
    }

    ratios
        .iter()
        .map(|r| SNR_MIN + (SNR_MAX - SNR_MIN) * (r - lo) / span)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(n: usize) -> Vec<f64> {
        (0..n).map(|i| i as f64 * 100.0).collect()
    }

    #[test]
    fn test_constant_input_is_a_smoothing_fixed_point() {
        let freqs = ramp(40);
        let conds = vec![5.5; 40];
        let processed = preprocess(&freqs, &conds, None).unwrap();
        for (a, b) in processed.smoothed.iter().zip(conds.iter()) {
            assert!((a - b).abs() < 1e-9, "Expected {}, got {}", b, a);
        }
    }

    #[test]
    fn test_smoothed_length_matches_input() {
        for n in [3, 4, 7, 16, 100] {
            let freqs = ramp(n);
            let conds: Vec<f64> = freqs.iter().map(|f| (f / 300.0).sin()).collect();
            let processed = preprocess(&freqs, &conds, None).unwrap();
            assert_eq!(processed.smoothed.len(), n);
            assert_eq!(processed.snr.len(), n);
            assert_eq!(processed.dense_frequencies.len(), DENSE_GRID_FACTOR * n);
        }
    }

    #[test]
    fn test_cubic_data_passes_through_cubic_filter() {
        // A degree-3 polynomial is invariant under the order-3 fit.
        let freqs = ramp(30);
        let conds: Vec<f64> = (0..30)
            .map(|i| {
                let x = i as f64;
                0.001 * x * x * x - 0.2 * x * x + 3.0 * x - 7.0
            })
            .collect();
        let processed = preprocess(&freqs, &conds, None).unwrap();
        for (a, b) in processed.smoothed.iter().zip(conds.iter()) {
            assert!((a - b).abs() < 1e-6 * b.abs().max(1.0), "Expected {}, got {}", b, a);
        }
    }

    #[test]
    fn test_estimated_snr_within_range() {
        let freqs = ramp(60);
        let conds: Vec<f64> = freqs
            .iter()
            .map(|f| 3.0 + (f / 500.0).sin() + (f / 90.0).cos() * 0.2)
            .collect();
        let processed = preprocess(&freqs, &conds, None).unwrap();
        for s in &processed.snr {
            assert!((1.0..=11.0).contains(s), "SNR {} outside [1, 11]", s);
        }
    }

    #[test]
    fn test_supplied_snr_is_kept() {
        let freqs = ramp(10);
        let conds = vec![1.0; 10];
        let snr = vec![4.2; 10];
        let processed = preprocess(&freqs, &conds, Some(&snr)).unwrap();
        assert_eq!(processed.snr, snr);
    }

    #[test]
    fn test_too_few_points() {
        let result = preprocess(&[0.0, 1.0], &[1.0, 2.0], None);
        assert!(matches!(
            result,
            Err(DeconvError::InsufficientPoints { real: 2, expected: 3 })
        ));
    }

    #[test]
    fn test_length_mismatch() {
        let result = preprocess(&[0.0, 1.0, 2.0], &[1.0, 2.0], None);
        assert!(matches!(
            result,
            Err(DeconvError::MismatchedLengths { .. })
        ));
    }

    #[test]
    fn test_dense_grid_spans_input_domain() {
        let freqs = ramp(20);
        let conds: Vec<f64> = freqs.iter().map(|f| f * 0.01).collect();
        let processed = preprocess(&freqs, &conds, None).unwrap();
        let dense = &processed.dense_frequencies;
        assert_eq!(dense[0], freqs[0]);
        assert!((dense[dense.len() - 1] - freqs[19]).abs() < 1e-9);
    }
}
