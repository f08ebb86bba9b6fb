//! The one-shot analysis pipeline: preprocess, detect, adjust, fit,
//! convert. No state survives between invocations.

use crate::concentrations::{
    convert,
    ConcentrationReport,
};
use crate::deconv::{
    deconvolve,
    DeconvolutionResult,
    DeconvolutionSettings,
};
use crate::errors::Result;
use crate::features::{
    detect_features,
    Feature,
};
use crate::ions::{
    IonLibrary,
    IonSpecies,
};
use crate::preprocess::{
    preprocess,
    ProcessedSpectrum,
};
use std::collections::HashMap;
use tracing::info;

/// Coefficient share of the total below which an ion is left out of the
/// printed report. Presentation only; stored values are unaffected.
const SIGNIFICANT_FRACTION: f64 = 0.01;

/// Everything one analysis produced.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AnalysisResult {
    pub spectrum: ProcessedSpectrum,
    pub features: Vec<Feature>,
    /// The feature-adjusted parameter set the fit actually used.
    pub parameters: IonLibrary,
    pub deconvolution: DeconvolutionResult,
    pub concentrations: ConcentrationReport,
}

impl AnalysisResult {
    /// Ions whose fitted coefficient exceeds 1% of the coefficient sum,
    /// paired with their concentration figure.
    pub fn significant_ions(&self) -> Vec<(IonSpecies, f64)> {
        let total = self.deconvolution.coefficient_sum();
        if total <= 0.0 {
            return Vec::new();
        }
        IonSpecies::ALL
            .iter()
            .filter(|s| self.deconvolution.coefficient(**s) > SIGNIFICANT_FRACTION * total)
            .map(|s| (*s, self.concentrations.get(*s)))
            .collect()
    }

    /// Prints the human-readable summary to stdout.
    pub fn print_report(&self) {
        println!("R^2: {:.4}", self.deconvolution.r_squared);
        println!("MSE: {:.6}", self.deconvolution.mse);
        for (species, value) in self.significant_ions() {
            println!("  {}: {:.2}", capitalize(species.name()), value);
        }
        println!("{}", self.concentrations.note());
    }
}

/// Runs the full pipeline with default fit settings.
pub fn analyze(
    frequencies: &[f64],
    conductivities: &[f64],
    snr: Option<&[f64]>,
    calibration: Option<&HashMap<IonSpecies, f64>>,
) -> Result<AnalysisResult> {
    analyze_with_settings(
        frequencies,
        conductivities,
        snr,
        calibration,
        &DeconvolutionSettings::default(),
    )
}

/// Runs the full pipeline with explicit fit settings.
pub fn analyze_with_settings(
    frequencies: &[f64],
    conductivities: &[f64],
    snr: Option<&[f64]>,
    calibration: Option<&HashMap<IonSpecies, f64>>,
    settings: &DeconvolutionSettings,
) -> Result<AnalysisResult> {
    let spectrum = preprocess(frequencies, conductivities, snr)?;
    let features = detect_features(&spectrum);
    info!(
        "Preprocessed {} points, detected {} features",
        spectrum.frequencies.len(),
        features.len()
    );

    let parameters = IonLibrary::default_library().adjusted(&features);
    let deconvolution = deconvolve(&spectrum, &parameters, settings);
    info!(
        "Fit finished: R^2 {:.4}, MSE {:.6e}",
        deconvolution.r_squared, deconvolution.mse
    );

    let concentrations = convert(&deconvolution, calibration);

    Ok(AnalysisResult {
        spectrum,
        features,
        parameters,
        deconvolution,
        concentrations,
    })
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("sodium"), "Sodium");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn test_analysis_produces_consistent_key_set() {
        let freqs: Vec<f64> = (0..60).map(|i| i as f64 * 1500.0).collect();
        let conds: Vec<f64> = freqs
            .iter()
            .map(|f| {
                let x = (f - 40_000.0) / 9_000.0;
                2.0 + 1.0 / (1.0 + x * x)
            })
            .collect();
        let result = analyze(&freqs, &conds, None, None).unwrap();

        assert_eq!(result.deconvolution.coefficients.len(), 11);
        assert_eq!(result.deconvolution.contributions.len(), 11);
        assert_eq!(result.concentrations.values.len(), 11);
        for contribution in &result.deconvolution.contributions {
            assert_eq!(contribution.len(), freqs.len());
        }
    }

    #[test]
    fn test_significant_ions_respect_threshold() {
        let freqs: Vec<f64> = (0..20).map(|i| i as f64 * 5000.0).collect();
        // Pure baseline: ions should carry essentially nothing.
        let conds = vec![1.0; 20];
        let result = analyze(&freqs, &conds, None, None).unwrap();
        let total = result.deconvolution.coefficient_sum();
        for (species, _) in result.significant_ions() {
            assert!(result.deconvolution.coefficient(species) > 0.01 * total);
        }
    }
}
