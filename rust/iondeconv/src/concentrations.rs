//! Converts fitted weights into reportable concentration figures.
//!
//! Without calibration factors the numbers are relative percentages of
//! the fitted response; with factors they become mg/L estimates. Species
//! missing from a supplied calibration map fall back to the mean of the
//! given factors — kept for compatibility with deployed calibrations, and
//! logged because it can quietly skew estimates.

use crate::deconv::DeconvolutionResult;
use crate::ions::{
    IonSpecies,
    NUM_SPECIES,
};
use std::collections::HashMap;
use tracing::warn;

/// Which convention produced the numbers in a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcentrationConvention {
    RelativePercent,
    CalibratedMilligramsPerLiter,
}

impl ConcentrationConvention {
    pub fn note(&self) -> &'static str {
        match self {
            ConcentrationConvention::RelativePercent => {
                "Values are relative percentages of the fitted response, not absolute concentrations."
            }
            ConcentrationConvention::CalibratedMilligramsPerLiter => {
                "Values are calibrated mg/L estimates."
            }
        }
    }
}

/// Per-species concentration figures, in `IonSpecies::ALL` order.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ConcentrationReport {
    pub values: [f64; NUM_SPECIES],
    pub convention: ConcentrationConvention,
}

impl ConcentrationReport {
    pub fn get(&self, species: IonSpecies) -> f64 {
        self.values[species.index()]
    }

    pub fn note(&self) -> &'static str {
        self.convention.note()
    }
}

/// Maps fitted coefficients to concentrations.
///
/// An absent (or empty) calibration map yields relative percentages; a
/// zero or negative coefficient sum yields all-zero percentages rather
/// than dividing by it.
pub fn convert(
    result: &DeconvolutionResult,
    calibration: Option<&HashMap<IonSpecies, f64>>,
) -> ConcentrationReport {
    match calibration {
        Some(factors) if !factors.is_empty() => calibrated(result, factors),
        _ => relative(result),
    }
}

fn relative(result: &DeconvolutionResult) -> ConcentrationReport {
    let total = result.coefficient_sum();
    let mut values = [0.0; NUM_SPECIES];
    if total > 0.0 {
        for (v, c) in values.iter_mut().zip(result.coefficients.iter()) {
            *v = 100.0 * c / total;
        }
    }
    ConcentrationReport {
        values,
        convention: ConcentrationConvention::RelativePercent,
    }
}

fn calibrated(
    result: &DeconvolutionResult,
    factors: &HashMap<IonSpecies, f64>,
) -> ConcentrationReport {
    let mean_factor = factors.values().sum::<f64>() / factors.len() as f64;

    let mut values = [0.0; NUM_SPECIES];
    for species in IonSpecies::ALL {
        let factor = match factors.get(&species) {
            Some(f) => *f,
            None => {
                warn!(
                    "No calibration factor for {}, substituting the mean factor {:.4}",
                    species, mean_factor
                );
                mean_factor
            }
        };
        values[species.index()] = result.coefficient(species) * factor;
    }
    ConcentrationReport {
        values,
        convention: ConcentrationConvention::CalibratedMilligramsPerLiter,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result_with(coefficients: [f64; NUM_SPECIES]) -> DeconvolutionResult {
        DeconvolutionResult {
            coefficients,
            baseline: 1.0,
            model: vec![],
            contributions: vec![],
            r_squared: 1.0,
            mse: 0.0,
        }
    }

    #[test]
    fn test_relative_percentages_sum_to_hundred() {
        let mut coefficients = [0.0; NUM_SPECIES];
        coefficients[0] = 2.0;
        coefficients[4] = 6.0;
        let report = convert(&result_with(coefficients), None);
        let sum: f64 = report.values.iter().sum();
        assert!((sum - 100.0).abs() < 1e-9, "Sum {}", sum);
        assert_eq!(report.convention, ConcentrationConvention::RelativePercent);
    }

    #[test]
    fn test_zero_coefficients_give_zero_percentages() {
        let report = convert(&result_with([0.0; NUM_SPECIES]), None);
        assert!(report.values.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_calibration_scales_coefficients() {
        let mut coefficients = [0.0; NUM_SPECIES];
        coefficients[IonSpecies::Sodium.index()] = 2.0;
        let mut factors = HashMap::new();
        factors.insert(IonSpecies::Sodium, 0.5);
        factors.insert(IonSpecies::Chloride, 1.5);

        let report = convert(&result_with(coefficients), Some(&factors));
        assert!((report.get(IonSpecies::Sodium) - 1.0).abs() < 1e-12);
        assert_eq!(
            report.convention,
            ConcentrationConvention::CalibratedMilligramsPerLiter
        );
    }

    #[test]
    fn test_missing_species_use_mean_factor() {
        let mut coefficients = [0.0; NUM_SPECIES];
        coefficients[IonSpecies::Iron.index()] = 4.0;
        let mut factors = HashMap::new();
        factors.insert(IonSpecies::Sodium, 1.0);
        factors.insert(IonSpecies::Chloride, 3.0);

        // Iron is not calibrated; mean factor is 2.0.
        let report = convert(&result_with(coefficients), Some(&factors));
        assert!((report.get(IonSpecies::Iron) - 8.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_calibration_falls_back_to_relative() {
        let mut coefficients = [0.0; NUM_SPECIES];
        coefficients[0] = 1.0;
        let factors = HashMap::new();
        let report = convert(&result_with(coefficients), Some(&factors));
        assert_eq!(report.convention, ConcentrationConvention::RelativePercent);
    }
}
