//! Detection of structural events in the dense derivative curves.
//!
//! Three independent scans over the resampled spectrum: local maxima of
//! the conductivity (first-derivative sign flips), inflection points
//! (second-derivative sign flips) and high-curvature regions (|d2| above
//! the 90th percentile). An index may qualify in more than one category;
//! the final list is sorted by frequency and deliberately not deduplicated.

use crate::preprocess::ProcessedSpectrum;
use crate::utils::percentile;
use tracing::debug;

/// Percentile of |d2| above which a point counts as a slope change.
const SLOPE_CHANGE_PERCENTILE: f64 = 90.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    Peak,
    Inflection,
    SlopeChange,
}

/// A frequency-localized structural event.
///
/// `intensity` is the magnitude of the second derivative at the detected
/// index, for every kind.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Feature {
    pub kind: FeatureKind,
    pub frequency: f64,
    pub intensity: f64,
}

/// Scans the dense grid of a processed spectrum for features.
///
/// Empty output on featureless (e.g. strictly monotonic) data is not an
/// error.
pub fn detect_features(spectrum: &ProcessedSpectrum) -> Vec<Feature> {
    let freqs = &spectrum.dense_frequencies;
    let d1 = &spectrum.first_derivative;
    let d2 = &spectrum.second_derivative;
    let len = freqs.len();

    let mut features = Vec::new();
    if len < 3 {
        return features;
    }

    // Local maxima: slope flips from rising to falling.
    for i in 1..(len - 1) {
        if d1[i - 1] > 0.0 && d1[i] < 0.0 {
            features.push(Feature {
                kind: FeatureKind::Peak,
                frequency: freqs[i],
                intensity: d2[i].abs(),
            });
        }
    }

    // Inflections: curvature changes sign (or touches zero).
    for i in 1..(len - 1) {
        if d2[i] * d2[i + 1] <= 0.0 {
            features.push(Feature {
                kind: FeatureKind::Inflection,
                frequency: freqs[i],
                intensity: d2[i].abs(),
            });
        }
    }

    // High-curvature points relative to the whole spectrum.
    let magnitudes: Vec<f64> = d2.iter().map(|x| x.abs()).collect();
    let threshold = percentile(&magnitudes, SLOPE_CHANGE_PERCENTILE);
    for (i, magnitude) in magnitudes.iter().enumerate() {
        if *magnitude > threshold {
            features.push(Feature {
                kind: FeatureKind::SlopeChange,
                frequency: freqs[i],
                intensity: *magnitude,
            });
        }
    }

    features.sort_by(|a, b| a.frequency.partial_cmp(&b.frequency).unwrap());
    debug!("Detected {} features", features.len());
    features
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::preprocess;

    #[test]
    fn test_single_hump_yields_one_peak() {
        let freqs: Vec<f64> = (0..50).map(|i| i as f64 * 10.0).collect();
        let conds: Vec<f64> = freqs
            .iter()
            .map(|f| {
                let x = (f - 250.0) / 60.0;
                1.0 / (1.0 + x * x)
            })
            .collect();
        let processed = preprocess(&freqs, &conds, None).unwrap();
        let features = detect_features(&processed);

        let peaks: Vec<&Feature> = features
            .iter()
            .filter(|f| f.kind == FeatureKind::Peak)
            .collect();
        assert_eq!(peaks.len(), 1, "Expected one peak, got {:?}", peaks);
        assert!(
            (peaks[0].frequency - 250.0).abs() < 20.0,
            "Peak at {} too far from 250",
            peaks[0].frequency
        );
    }

    #[test]
    fn test_monotonic_ramp_has_no_peaks() {
        let freqs: Vec<f64> = (0..30).map(|i| i as f64 * 10.0).collect();
        let conds: Vec<f64> = freqs.iter().map(|f| f * 0.01).collect();
        let processed = preprocess(&freqs, &conds, None).unwrap();
        let features = detect_features(&processed);
        assert!(features.iter().all(|f| f.kind != FeatureKind::Peak));
    }

    #[test]
    fn test_features_sorted_by_frequency() {
        let freqs: Vec<f64> = (0..80).map(|i| i as f64 * 25.0).collect();
        let conds: Vec<f64> = freqs
            .iter()
            .map(|f| (f / 200.0).sin() + (f / 55.0).cos() * 0.3)
            .collect();
        let processed = preprocess(&freqs, &conds, None).unwrap();
        let features = detect_features(&processed);
        assert!(!features.is_empty());
        for pair in features.windows(2) {
            assert!(pair[0].frequency <= pair[1].frequency);
        }
    }
}
