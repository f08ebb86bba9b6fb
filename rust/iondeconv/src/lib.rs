#![doc = include_str!("../README.md")]

// Declare modules
pub mod concentrations;
pub mod deconv;
pub mod errors;
pub mod features;
pub mod ions;
pub mod pipeline;
pub mod plotting;
pub mod preprocess;
pub mod utils;

// Re-export main structures
pub use crate::concentrations::{
    ConcentrationConvention,
    ConcentrationReport,
};
pub use crate::deconv::{
    DeconvolutionResult,
    DeconvolutionSettings,
};
pub use crate::features::{
    Feature,
    FeatureKind,
};
pub use crate::ions::{
    IonLibrary,
    IonParameters,
    IonSpecies,
};
pub use crate::pipeline::{
    analyze,
    analyze_with_settings,
    AnalysisResult,
};
pub use crate::preprocess::ProcessedSpectrum;

// Re-export errors
pub use crate::errors::{
    DeconvError,
    Result,
};
