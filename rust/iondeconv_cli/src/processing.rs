use crate::config::{
    AnalysisConfig,
    InputConfig,
    OutputConfig,
    SpectrumFile,
};
use crate::errors::CliError;
use crate::sample_spectrum::sample_spectrum;
use iondeconv::plotting::display_analysis;
use iondeconv::{
    analyze_with_settings,
    AnalysisResult,
};
use std::time::Instant;
use tracing::info;

/// Loads the input, runs the pipeline, prints the report and writes the
/// optional JSON result.
pub fn run_analysis(
    input: &InputConfig,
    analysis: &AnalysisConfig,
    output: Option<&OutputConfig>,
    plot: bool,
) -> Result<AnalysisResult, CliError> {
    let (frequencies, conductivities, file_snr, label) = match input {
        InputConfig::Spectrum { path } => {
            info!("Reading spectrum from {:?}", path);
            let contents = std::fs::read_to_string(path).map_err(|e| CliError::Io {
                source: e.to_string(),
                path: Some(path.to_string_lossy().to_string()),
            })?;
            let file: SpectrumFile = serde_json::from_str(&contents)?;
            let label = path.to_string_lossy().to_string();
            (file.frequencies, file.conductivities, file.snr, label)
        }
        InputConfig::Sample => {
            info!("Using the built-in demonstration sweep");
            let (frequencies, conductivities) = sample_spectrum();
            (frequencies, conductivities, None, "sample sweep".to_string())
        }
    };

    // An SNR in the config wins over one stored next to the spectrum.
    let snr = analysis.snr.as_deref().or(file_snr.as_deref());

    let start = Instant::now();
    let result = analyze_with_settings(
        &frequencies,
        &conductivities,
        snr,
        analysis.calibration.as_ref(),
        &analysis.settings,
    )?;
    info!("Analysis of {} finished in {:?}", label, start.elapsed());

    result.print_report();
    if plot {
        display_analysis(
            &result.spectrum,
            &result.deconvolution,
            &result.parameters,
            Some(&label),
        );
    }

    if let Some(output) = output {
        let serialized = serde_json::to_string_pretty(&result)?;
        std::fs::write(&output.path, serialized).map_err(|e| CliError::Io {
            source: e.to_string(),
            path: Some(output.path.to_string_lossy().to_string()),
        })?;
        println!("Wrote result to {}", output.path.display());
    }

    Ok(result)
}
