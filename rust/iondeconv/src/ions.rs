//! The ion model library: which species the fit knows about, where their
//! electrical signatures sit in the frequency domain, and how detected
//! spectral structure nudges those priors.
//!
//! The default parameter table is an empirical prior built once and never
//! mutated; the adjustment step returns a fresh library.

use crate::features::Feature;
use tracing::debug;

/// Number of species in the library. Every ion-indexed structure in the
/// pipeline (parameters, profiles, coefficients, contributions,
/// concentrations) carries exactly this many entries, in `ALL` order.
pub const NUM_SPECIES: usize = 11;

/// Adjustment runs only when strictly more than this many features exist.
const MIN_FEATURES_FOR_ADJUSTMENT: usize = 3;

/// A gap larger than this (Hz) between consecutive sorted feature
/// frequencies starts a new cluster.
const CLUSTER_GAP_HZ: f64 = 5000.0;

/// Ions farther than this (Hz) from every cluster keep their defaults.
const MAX_ADJUST_DISTANCE_HZ: f64 = 20000.0;

/// Blend kept on the prior center; the rest moves toward the cluster mean.
const CENTER_PRIOR_WEIGHT: f64 = 0.7;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum IonSpecies {
    Calcium,
    Magnesium,
    Sodium,
    Potassium,
    Chloride,
    Bicarbonate,
    Sulfate,
    Nitrate,
    Fluoride,
    Iron,
    /// Catch-all for dissolved species responding above ~80 kHz.
    HighFrequency,
}

impl IonSpecies {
    pub const ALL: [IonSpecies; NUM_SPECIES] = [
        IonSpecies::Calcium,
        IonSpecies::Magnesium,
        IonSpecies::Sodium,
        IonSpecies::Potassium,
        IonSpecies::Chloride,
        IonSpecies::Bicarbonate,
        IonSpecies::Sulfate,
        IonSpecies::Nitrate,
        IonSpecies::Fluoride,
        IonSpecies::Iron,
        IonSpecies::HighFrequency,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            IonSpecies::Calcium => "calcium",
            IonSpecies::Magnesium => "magnesium",
            IonSpecies::Sodium => "sodium",
            IonSpecies::Potassium => "potassium",
            IonSpecies::Chloride => "chloride",
            IonSpecies::Bicarbonate => "bicarbonate",
            IonSpecies::Sulfate => "sulfate",
            IonSpecies::Nitrate => "nitrate",
            IonSpecies::Fluoride => "fluoride",
            IonSpecies::Iron => "iron",
            IonSpecies::HighFrequency => "high_frequency",
        }
    }

    /// Position of this species in `ALL`; the shared index for every
    /// ion-indexed array in the pipeline.
    pub fn index(&self) -> usize {
        Self::ALL.iter().position(|s| s == self).unwrap()
    }
}

impl std::fmt::Display for IonSpecies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Response-curve parameters for one species.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct IonParameters {
    /// Center of the response in Hz.
    pub center: f64,
    /// Half-width scale of the Lorentzian-like shape, Hz.
    pub width: f64,
    /// Skew applied to the normalized frequency; 0 keeps the shape even.
    pub asymmetry: f64,
    /// The profile is zero below this frequency.
    pub cutoff_low: f64,
    /// The profile is zero above this frequency.
    pub cutoff_high: f64,
}

impl IonParameters {
    pub fn new(center: f64, width: f64) -> Self {
        Self {
            center,
            width,
            asymmetry: 0.0,
            cutoff_low: 0.0,
            cutoff_high: f64::INFINITY,
        }
    }

    pub fn with_asymmetry(mut self, asymmetry: f64) -> Self {
        self.asymmetry = asymmetry;
        self
    }

    pub fn with_cutoffs(mut self, low: f64, high: f64) -> Self {
        self.cutoff_low = low;
        self.cutoff_high = high;
        self
    }
}

/// The full per-species parameter set, indexed in `IonSpecies::ALL` order.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct IonLibrary {
    params: [IonParameters; NUM_SPECIES],
}

impl Default for IonLibrary {
    fn default() -> Self {
        Self::default_library()
    }
}

impl IonLibrary {
    /// The hand-tuned default table covering the 0-100 kHz sweep range.
    pub fn default_library() -> Self {
        Self {
            params: [
                // calcium
                IonParameters::new(22_500.0, 8_500.0),
                // magnesium
                IonParameters::new(30_500.0, 8_500.0),
                // sodium
                IonParameters::new(6_500.0, 8_000.0),
                // potassium
                IonParameters::new(14_000.0, 8_000.0),
                // chloride
                IonParameters::new(40_000.0, 9_000.0),
                // bicarbonate
                IonParameters::new(49_000.0, 9_000.0),
                // sulfate
                IonParameters::new(58_000.0, 9_500.0),
                // nitrate
                IonParameters::new(67_000.0, 9_500.0),
                // fluoride
                IonParameters::new(75_500.0, 10_000.0),
                // iron
                IonParameters::new(84_000.0, 10_000.0).with_asymmetry(0.04),
                // high-frequency bucket
                IonParameters::new(94_000.0, 12_000.0)
                    .with_cutoffs(78_000.0, f64::INFINITY),
            ],
        }
    }

    pub fn get(&self, species: IonSpecies) -> &IonParameters {
        &self.params[species.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (IonSpecies, &IonParameters)> {
        IonSpecies::ALL.iter().copied().zip(self.params.iter())
    }

    /// Nudges default centers toward detected spectral structure.
    ///
    /// With 3 or fewer features the library is returned unchanged. Feature
    /// frequencies (already sorted) are clustered by sequential gap; each
    /// ion whose nearest cluster mean lies closer than the adjustment
    /// threshold blends its center toward that mean. Widths, asymmetries
    /// and cutoffs are never touched.
    pub fn adjusted(&self, features: &[Feature]) -> IonLibrary {
        let mut out = self.clone();
        if features.len() <= MIN_FEATURES_FOR_ADJUSTMENT {
            return out;
        }

        let cluster_means = cluster_means(features);
        for (species, params) in IonSpecies::ALL.iter().zip(out.params.iter_mut()) {
            let nearest = cluster_means
                .iter()
                .copied()
                .min_by(|a, b| {
                    (a - params.center)
                        .abs()
                        .partial_cmp(&(b - params.center).abs())
                        .unwrap()
                })
                .unwrap();
            let distance = (nearest - params.center).abs();
            if distance < MAX_ADJUST_DISTANCE_HZ {
                let blended = CENTER_PRIOR_WEIGHT * params.center
                    + (1.0 - CENTER_PRIOR_WEIGHT) * nearest;
                debug!(
                    "Shifting {} center {} -> {} (cluster at {})",
                    species, params.center, blended, nearest
                );
                params.center = blended;
            }
        }
        out
    }
}

/// Mean frequency of each sequential-proximity cluster.
fn cluster_means(features: &[Feature]) -> Vec<f64> {
    let mut means = Vec::new();
    let mut sum = features[0].frequency;
    let mut count = 1usize;
    let mut prev = features[0].frequency;

    for feature in &features[1..] {
        if feature.frequency - prev > CLUSTER_GAP_HZ {
            means.push(sum / count as f64);
            sum = 0.0;
            count = 0;
        }
        sum += feature.frequency;
        count += 1;
        prev = feature.frequency;
    }
    means.push(sum / count as f64);
    means
}

/// Evaluates the normalized reference profile for one species into `out`.
///
/// Lorentzian-like shape on the skewed normalized frequency, zeroed
/// outside the cutoff window, then rescaled so the maximum inside the
/// window is exactly 1.0. A window containing no positive mass leaves the
/// profile all-zero rather than dividing by it.
pub fn profile_into(params: &IonParameters, frequencies: &[f64], out: &mut Vec<f64>) {
    out.clear();
    out.reserve(frequencies.len());

    for f in frequencies {
        if *f < params.cutoff_low || *f > params.cutoff_high {
            out.push(0.0);
            continue;
        }
        let mut x = (f - params.center) / params.width;
        if params.asymmetry != 0.0 {
            x -= params.asymmetry * x * x;
        }
        out.push(1.0 / (1.0 + x * x));
    }

    let max = out.iter().copied().fold(0.0f64, f64::max);
    if max > 0.0 {
        for v in out.iter_mut() {
            *v /= max;
        }
    }
}

/// Allocating convenience wrapper around [`profile_into`].
pub fn profile(params: &IonParameters, frequencies: &[f64]) -> Vec<f64> {
    let mut out = Vec::new();
    profile_into(params, frequencies, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureKind;

    fn feature_at(frequency: f64) -> Feature {
        Feature {
            kind: FeatureKind::Peak,
            frequency,
            intensity: 1.0,
        }
    }

    #[test]
    fn test_profile_peaks_at_one_on_its_center() {
        let library = IonLibrary::default_library();
        for (species, params) in library.iter() {
            if params.center < params.cutoff_low || params.center > params.cutoff_high {
                continue;
            }
            let values = profile(params, &[params.center]);
            assert!(
                (values[0] - 1.0).abs() < 1e-12,
                "{} profile at center is {}",
                species,
                values[0]
            );
        }
    }

    #[test]
    fn test_profile_zero_outside_cutoffs() {
        let params = IonParameters::new(50_000.0, 5_000.0).with_cutoffs(40_000.0, 60_000.0);
        let freqs = vec![10_000.0, 39_999.0, 60_001.0, 90_000.0];
        let values = profile(&params, &freqs);
        assert!(values.iter().all(|v| *v == 0.0), "Got {:?}", values);
    }

    #[test]
    fn test_window_excluding_all_mass_yields_zero_profile() {
        let params = IonParameters::new(50_000.0, 5_000.0).with_cutoffs(40_000.0, 60_000.0);
        // Every sample outside the window: no rescaling, all zeros.
        let freqs = vec![0.0, 10_000.0, 90_000.0];
        let values = profile(&params, &freqs);
        assert_eq!(values, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_asymmetry_skews_the_shape() {
        let symmetric = IonParameters::new(50_000.0, 10_000.0);
        let skewed = symmetric.with_asymmetry(0.2);
        let freqs = vec![40_000.0, 50_000.0, 60_000.0];
        let sym_vals = profile(&symmetric, &freqs);
        let skew_vals = profile(&skewed, &freqs);
        assert!((sym_vals[0] - sym_vals[2]).abs() < 1e-12);
        assert!((skew_vals[0] - skew_vals[2]).abs() > 1e-6);
    }

    #[test]
    fn test_adjustment_noop_with_three_features() {
        let library = IonLibrary::default_library();
        let features = vec![
            feature_at(10_000.0),
            feature_at(10_500.0),
            feature_at(11_000.0),
        ];
        let adjusted = library.adjusted(&features);
        assert_eq!(adjusted, library);
    }

    #[test]
    fn test_adjustment_blends_toward_nearby_cluster() {
        let library = IonLibrary::default_library();
        // Four features tightly packed near the high-frequency bucket.
        let features = vec![
            feature_at(93_000.0),
            feature_at(93_400.0),
            feature_at(93_800.0),
            feature_at(94_200.0),
        ];
        let cluster_mean = (93_000.0 + 93_400.0 + 93_800.0 + 94_200.0) / 4.0;
        let adjusted = library.adjusted(&features);

        for (species, defaults) in library.iter() {
            let new_params = adjusted.get(species);
            let distance = (cluster_mean - defaults.center).abs();
            if distance < 20_000.0 {
                let expected = 0.7 * defaults.center + 0.3 * cluster_mean;
                assert!(
                    (new_params.center - expected).abs() < 1e-9,
                    "{} center {} != blended {}",
                    species,
                    new_params.center,
                    expected
                );
            } else {
                assert_eq!(new_params, defaults, "{} should be untouched", species);
            }
            // Only centers ever move.
            assert_eq!(new_params.width, defaults.width);
            assert_eq!(new_params.asymmetry, defaults.asymmetry);
            assert_eq!(new_params.cutoff_low, defaults.cutoff_low);
            assert_eq!(new_params.cutoff_high, defaults.cutoff_high);
        }
    }

    #[test]
    fn test_cluster_means_split_on_gap() {
        let features = vec![
            feature_at(1_000.0),
            feature_at(2_000.0),
            feature_at(20_000.0),
            feature_at(21_000.0),
        ];
        let means = cluster_means(&features);
        assert_eq!(means.len(), 2);
        assert!((means[0] - 1_500.0).abs() < 1e-9);
        assert!((means[1] - 20_500.0).abs() < 1e-9);
    }
}
