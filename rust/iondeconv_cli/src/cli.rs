use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the JSON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Path to a JSON spectrum file (will over-write the config file)
    #[arg(short, long)]
    pub spectrum_file: Option<PathBuf>,

    /// Analyze the built-in demonstration sweep instead of a file
    #[arg(long)]
    pub sample: bool,

    /// Path for the JSON result output (will over-write the config file)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Render terminal charts after the textual report
    #[arg(short, long)]
    pub plot: bool,

    /// Override the optimizer seed from the config
    #[arg(long)]
    pub seed: Option<u64>,
}
