use std::fmt::Display;

/// Errors raised when an input spectrum cannot support the pipeline.
///
/// Numerical degeneracy (flat data, zero coefficient sums, non-improving
/// optimizer runs) is NOT an error; those cases are handled with guarded
/// branches and produce well-formed, possibly degenerate results.
#[derive(Debug, Clone, PartialEq)]
pub enum DeconvError {
    /// The spectrum has fewer points than the smallest smoothing window.
    InsufficientPoints { real: usize, expected: usize },
    /// Two sequences that must share a length do not.
    MismatchedLengths {
        expected: usize,
        other: usize,
        context: &'static str,
    },
    /// Frequencies must be strictly increasing.
    UnorderedFrequencies { index: usize },
    /// A NaN or infinite value where finite data is required.
    NonFiniteData { context: &'static str },
}

impl Display for DeconvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeconvError::InsufficientPoints { real, expected } => {
                write!(
                    f,
                    "Expected at least {} spectrum points, got {}",
                    expected, real
                )
            }
            DeconvError::MismatchedLengths {
                expected,
                other,
                context,
            } => {
                write!(
                    f,
                    "Sequence length mismatch in {}: expected {}, got {}",
                    context, expected, other
                )
            }
            DeconvError::UnorderedFrequencies { index } => {
                write!(
                    f,
                    "Frequencies must be strictly increasing, violated at index {}",
                    index
                )
            }
            DeconvError::NonFiniteData { context } => {
                write!(f, "Non-finite value in {}", context)
            }
        }
    }
}

impl std::error::Error for DeconvError {}

pub type Result<T> = std::result::Result<T, DeconvError>;
