//! Terminal rendering of an analysis: fit overlay, residuals and per-ion
//! contributions. Pure consumer of the pipeline's outputs; nothing here
//! feeds back into the fit.

// ANSI color codes
const COLOR_GRAY: &str = "\x1b[90m";
const COLOR_CYAN: &str = "\x1b[96m";
const COLOR_RED: &str = "\x1b[91m";
const COLOR_RESET: &str = "\x1b[0m";

/// Palette cycled over the ion contribution rows.
const ION_COLORS: [&str; 6] = [
    "\x1b[91m", "\x1b[92m", "\x1b[93m", "\x1b[94m", "\x1b[95m", "\x1b[96m",
];

use crate::deconv::DeconvolutionResult;
use crate::ions::{
    IonLibrary,
    IonSpecies,
};
use crate::preprocess::ProcessedSpectrum;

/// Default chart width in columns.
const CHART_WIDTH: usize = 70;

/// Default chart height in rows.
const CHART_HEIGHT: usize = 14;

/// Prints the three stacked charts plus the stacked-contribution strip.
pub fn display_analysis(
    spectrum: &ProcessedSpectrum,
    result: &DeconvolutionResult,
    parameters: &IonLibrary,
    title: Option<&str>,
) {
    if let Some(title) = title {
        println!("\n{}", title);
    }
    println!("\n{}", format_fit_overlay(spectrum, result, CHART_WIDTH, CHART_HEIGHT));
    println!("{}", format_residuals(spectrum, result, CHART_WIDTH, CHART_HEIGHT / 2));
    println!("{}", format_contributions(spectrum, result, parameters, CHART_WIDTH));
}

/// Measured (cyan) and fitted (red) curves in one bordered chart.
pub fn format_fit_overlay(
    spectrum: &ProcessedSpectrum,
    result: &DeconvolutionResult,
    width: usize,
    height: usize,
) -> String {
    let series = [
        (&spectrum.smoothed, COLOR_CYAN, '●'),
        (&result.model, COLOR_RED, '○'),
    ];
    let freqs = &spectrum.frequencies;

    let mut y_min = f64::INFINITY;
    let mut y_max = f64::NEG_INFINITY;
    for (values, _, _) in &series {
        for v in values.iter().filter(|v| v.is_finite()) {
            y_min = y_min.min(*v);
            y_max = y_max.max(*v);
        }
    }
    if !y_min.is_finite() || !y_max.is_finite() || y_min == y_max {
        y_min = -1.0;
        y_max = 1.0;
    }

    let mut grid: Vec<Vec<(char, &str)>> = vec![vec![(' ', COLOR_RESET); width]; height];
    for (values, color, glyph) in series {
        rasterize(&mut grid, freqs, values, (y_min, y_max), glyph, color);
    }

    let mut output = String::new();
    push_bordered(&mut output, &grid, width);
    output.push_str(&format!(
        "  {}●{} measured (smoothed)  {}○{} fitted model  Y: [{:.3}, {:.3}]\n",
        COLOR_CYAN, COLOR_RESET, COLOR_RED, COLOR_RESET, y_min, y_max
    ));
    output
}

/// Residual chart centered on zero.
pub fn format_residuals(
    spectrum: &ProcessedSpectrum,
    result: &DeconvolutionResult,
    width: usize,
    height: usize,
) -> String {
    let residuals: Vec<f64> = spectrum
        .smoothed
        .iter()
        .zip(result.model.iter())
        .map(|(m, f)| m - f)
        .collect();
    let spread = residuals
        .iter()
        .fold(0.0f64, |acc, r| acc.max(r.abs()))
        .max(1e-12);

    let mut grid: Vec<Vec<(char, &str)>> = vec![vec![(' ', COLOR_RESET); width]; height];
    // Zero axis.
    let zero_row = height / 2;
    for cell in grid[zero_row].iter_mut() {
        *cell = ('─', COLOR_GRAY);
    }
    rasterize(
        &mut grid,
        &spectrum.frequencies,
        &residuals,
        (-spread, spread),
        '●',
        COLOR_CYAN,
    );

    let mut output = String::new();
    push_bordered(&mut output, &grid, width);
    output.push_str(&format!("  Residuals, max |r| = {:.4e}\n", spread));
    output
}

/// One block-character strip per contributing ion, brightness tracking the
/// contribution magnitude along the sweep.
pub fn format_contributions(
    spectrum: &ProcessedSpectrum,
    result: &DeconvolutionResult,
    parameters: &IonLibrary,
    width: usize,
) -> String {
    let peak = result
        .contributions
        .iter()
        .flat_map(|c| c.iter())
        .fold(0.0f64, |acc, v| acc.max(*v))
        .max(1e-12);
    let n = spectrum.frequencies.len();

    let mut output = String::new();
    for (row, species) in IonSpecies::ALL.iter().enumerate() {
        let contribution = &result.contributions[species.index()];
        if contribution.iter().all(|v| *v <= 0.0) {
            continue;
        }
        let color = ION_COLORS[row % ION_COLORS.len()];

        let mut strip = String::new();
        for col in 0..width {
            // Max pooling over the points landing in this column.
            let lo = col * n / width;
            let hi = (((col + 1) * n) / width).max(lo + 1).min(n);
            let value = contribution[lo..hi]
                .iter()
                .fold(0.0f64, |acc, v| acc.max(*v));
            strip.push_str(block_char(value / peak));
        }
        output.push_str(&format!(
            "  {:>14} {}{}{}  ({:.3} @ {:.0} Hz)\n",
            species.name(),
            color,
            strip,
            COLOR_RESET,
            result.coefficient(*species),
            parameters.get(*species).center,
        ));
    }
    output
}

fn rasterize(
    grid: &mut [Vec<(char, &'static str)>],
    xs: &[f64],
    ys: &[f64],
    y_range: (f64, f64),
    glyph: char,
    color: &'static str,
) {
    let height = grid.len();
    let width = grid[0].len();
    let (x_min, x_max) = (xs[0], xs[xs.len() - 1]);
    let x_span = (x_max - x_min).max(1e-12);
    let y_span = (y_range.1 - y_range.0).max(1e-12);

    for (x, y) in xs.iter().zip(ys.iter()) {
        if !y.is_finite() {
            continue;
        }
        let col = (((x - x_min) / x_span) * (width - 1) as f64).round() as usize;
        let normalized = ((y - y_range.0) / y_span).clamp(0.0, 1.0);
        let row = ((1.0 - normalized) * (height - 1) as f64).round() as usize;
        grid[row.min(height - 1)][col.min(width - 1)] = (glyph, color);
    }
}

fn push_bordered(output: &mut String, grid: &[Vec<(char, &str)>], width: usize) {
    output.push('╔');
    output.push_str(&"═".repeat(width));
    output.push_str("╗\n");
    for row in grid {
        output.push('║');
        for (ch, color) in row {
            if *ch == ' ' {
                output.push(' ');
            } else {
                output.push_str(&format!("{}{}{}", color, ch, COLOR_RESET));
            }
        }
        output.push_str("║\n");
    }
    output.push('╚');
    output.push_str(&"═".repeat(width));
    output.push_str("╝\n");
}

/// Maps a normalized intensity to a block character.
fn block_char(intensity: f64) -> &'static str {
    match intensity {
        i if i >= 0.875 => "█",
        i if i >= 0.625 => "▓",
        i if i >= 0.375 => "▒",
        i if i >= 0.125 => "░",
        i if i > 0.01 => "·",
        _ => " ",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deconv::{
        deconvolve,
        DeconvolutionSettings,
    };
    use crate::preprocess::preprocess;

    fn analyzed() -> (ProcessedSpectrum, DeconvolutionResult, IonLibrary) {
        let freqs: Vec<f64> = (0..40).map(|i| i as f64 * 2500.0).collect();
        let conds: Vec<f64> = freqs
            .iter()
            .map(|f| {
                let x = (f - 40_000.0) / 9_000.0;
                1.0 + 1.0 / (1.0 + x * x)
            })
            .collect();
        let spectrum = preprocess(&freqs, &conds, None).unwrap();
        let library = IonLibrary::default_library();
        let result = deconvolve(&spectrum, &library, &DeconvolutionSettings::default());
        (spectrum, result, library)
    }

    #[test]
    fn test_fit_overlay_has_borders_and_both_series() {
        let (spectrum, result, _) = analyzed();
        let chart = format_fit_overlay(&spectrum, &result, 40, 10);
        assert!(chart.contains('╔'));
        assert!(chart.contains('╝'));
        assert!(chart.contains('●'));
        assert!(chart.contains('○'));
    }

    #[test]
    fn test_residual_chart_renders() {
        let (spectrum, result, _) = analyzed();
        let chart = format_residuals(&spectrum, &result, 40, 6);
        assert!(chart.contains("Residuals"));
    }

    #[test]
    fn test_contribution_strips_name_species() {
        let (spectrum, result, library) = analyzed();
        let chart = format_contributions(&spectrum, &result, &library, 40);
        // At least one species should contribute visibly to this hump.
        assert!(!chart.is_empty());
    }
}
