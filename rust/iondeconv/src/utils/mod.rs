pub mod spline;

pub use spline::CubicSpline;

/// Linearly interpolated percentile, `q` in [0, 100].
///
/// Values are copied and sorted internally; NaNs are dropped. Returns 0.0
/// for an empty (or all-NaN) input rather than erroring, matching how the
/// rest of the pipeline treats degenerate data.
pub fn percentile(values: &[f64], q: f64) -> f64 {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|x| !x.is_nan()).collect();
    if sorted.is_empty() {
        return 0.0;
    }
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());

    let q = q.clamp(0.0, 100.0);
    let rank = (q / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let frac = rank - lo as f64;
        sorted[lo] * (1.0 - frac) + sorted[hi] * frac
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_median() {
        let vals = vec![3.0, 1.0, 2.0];
        assert_eq!(percentile(&vals, 50.0), 2.0);
    }

    #[test]
    fn test_percentile_interpolates() {
        let vals = vec![0.0, 10.0];
        assert!((percentile(&vals, 90.0) - 9.0).abs() < 1e-12);
    }

    #[test]
    fn test_percentile_empty() {
        let vals: Vec<f64> = vec![];
        assert_eq!(percentile(&vals, 90.0), 0.0);
    }
}
