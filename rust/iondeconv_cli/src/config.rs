use iondeconv::{
    DeconvolutionSettings,
    IonSpecies,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    pub input: Option<InputConfig>,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    pub output: Option<OutputConfig>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "type")]
pub enum InputConfig {
    #[serde(rename = "spectrum")]
    Spectrum { path: PathBuf },
    /// The built-in demonstration sweep.
    #[serde(rename = "sample")]
    Sample,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct AnalysisConfig {
    /// Optional per-species calibration factors (mg/L per unit weight).
    pub calibration: Option<HashMap<IonSpecies, f64>>,
    #[serde(default)]
    pub settings: DeconvolutionSettings,
    /// Give each spectrum point an explicit SNR instead of estimating it.
    pub snr: Option<Vec<f64>>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OutputConfig {
    pub path: PathBuf,
}

/// On-disk spectrum format: two matching sequences plus optional SNR.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SpectrumFile {
    pub frequencies: Vec<f64>,
    pub conductivities: Vec<f64>,
    pub snr: Option<Vec<f64>>,
}
