mod cli;
mod config;
mod errors;
mod processing;
mod sample_spectrum;

use clap::Parser;
use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use cli::Cli;
use config::{
    Config,
    InputConfig,
    OutputConfig,
};

fn main() -> std::result::Result<(), errors::CliError> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        ) // This uses RUST_LOG environment variable
        .init();

    // Parse command line arguments
    let args = Cli::parse();

    // Load and parse configuration
    let mut config = match &args.config {
        Some(path) => {
            let conf = match std::fs::File::open(path) {
                Ok(x) => x,
                Err(e) => {
                    return Err(errors::CliError::Io {
                        source: e.to_string(),
                        path: Some(path.to_string_lossy().to_string()),
                    });
                }
            };
            match serde_json::from_reader::<_, Config>(conf) {
                Ok(x) => x,
                Err(e) => {
                    return Err(errors::CliError::ParseError { msg: e.to_string() });
                }
            }
        }
        None => Config::default(),
    };

    // Override config with command line arguments if provided
    if let Some(spectrum_file) = args.spectrum_file {
        config.input = Some(InputConfig::Spectrum {
            path: spectrum_file,
        });
    }
    if args.sample {
        config.input = Some(InputConfig::Sample);
    }
    if config.input.is_none() {
        return Err(errors::CliError::Config {
            source: "No input provided, please provide one in the config file, with --spectrum-file, or with --sample".to_string(),
        });
    }
    if let Some(output) = args.output {
        config.output = Some(OutputConfig { path: output });
    }
    if let Some(seed) = args.seed {
        config.analysis.settings.seed = seed;
    }
    info!("Parsed configuration: {:#?}", config.clone());

    let input = config.input.as_ref().unwrap();
    processing::run_analysis(
        input,
        &config.analysis,
        config.output.as_ref(),
        args.plot,
    )?;

    Ok(())
}
