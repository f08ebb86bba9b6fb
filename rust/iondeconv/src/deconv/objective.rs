//! The weighted least-squares objective shared by both optimizers.
//!
//! One column per ion profile evaluated at the ORIGINAL measurement
//! frequencies (not the dense grid) plus an implicit constant baseline
//! column. Residuals are scaled by `sqrt(snr)` so noisy points pull less.

use crate::ions::{
    profile_into,
    IonLibrary,
    IonSpecies,
    NUM_SPECIES,
};
use crate::preprocess::ProcessedSpectrum;

/// Ion coefficients plus the trailing baseline term.
pub const NUM_COEFFICIENTS: usize = NUM_SPECIES + 1;

#[derive(Debug, Clone)]
pub struct WeightedDesign {
    columns: Vec<Vec<f64>>,
    target: Vec<f64>,
    weights: Vec<f64>,
}

impl WeightedDesign {
    pub fn new(spectrum: &ProcessedSpectrum, library: &IonLibrary) -> Self {
        let columns = IonSpecies::ALL
            .iter()
            .map(|species| {
                let mut col = Vec::new();
                profile_into(library.get(*species), &spectrum.frequencies, &mut col);
                col
            })
            .collect();
        let weights = spectrum.snr.iter().map(|s| s.sqrt()).collect();

        Self {
            columns,
            target: spectrum.smoothed.clone(),
            weights,
        }
    }

    pub fn num_points(&self) -> usize {
        self.target.len()
    }

    /// Weighted sum of squared residuals for a coefficient vector
    /// (`NUM_SPECIES` ion weights followed by the baseline).
    pub fn objective(&self, coefficients: &[f64]) -> f64 {
        debug_assert_eq!(coefficients.len(), NUM_COEFFICIENTS);
        let baseline = coefficients[NUM_SPECIES];

        let mut total = 0.0;
        for i in 0..self.target.len() {
            let mut model = baseline;
            for (coeff, column) in coefficients[..NUM_SPECIES].iter().zip(&self.columns) {
                model += coeff * column[i];
            }
            let residual = (self.target[i] - model) * self.weights[i];
            total += residual * residual;
        }
        total
    }

    /// Reconstructs the fitted model curve at the original frequencies.
    pub fn model_into(&self, coefficients: &[f64], out: &mut Vec<f64>) {
        let baseline = coefficients[NUM_SPECIES];
        out.clear();
        out.resize(self.target.len(), baseline);
        for (coeff, column) in coefficients[..NUM_SPECIES].iter().zip(&self.columns) {
            for (o, v) in out.iter_mut().zip(column.iter()) {
                *o += coeff * v;
            }
        }
    }

    /// One ion's scaled contribution curve.
    pub fn contribution(&self, species: IonSpecies, coefficient: f64) -> Vec<f64> {
        self.columns[species.index()]
            .iter()
            .map(|v| coefficient * v)
            .collect()
    }

    pub fn target(&self) -> &[f64] {
        &self.target
    }
}
