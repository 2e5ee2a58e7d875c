//! Error types for manifold operations.

/// Errors that can occur during manifold operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HypError {
    /// A point failed the manifold invariant check beyond tolerance.
    ///
    /// Signals an upstream bug (typically a layer that forgot to re-project).
    #[error("point {row} is off the manifold: residual {residual:.3e} > tolerance {tolerance:.3e}")]
    ManifoldViolation {
        row: usize,
        residual: f64,
        tolerance: f64,
    },

    /// NaN or Inf observed after the clamps were applied.
    #[error("numeric instability in {op}: {detail}")]
    NumericInstability { op: &'static str, detail: String },

    /// Unsupported manifold kind or inconsistent manifold settings.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Two inputs had incompatible dimensions.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// An operation received an empty input where at least one element is required.
    #[error("empty input: at least one point is required")]
    EmptyInput,

    /// Aggregation weights were negative, non-finite, or summed to ≤ 0.
    #[error("invalid weights: {0}")]
    InvalidWeights(String),

    /// Curvature must be finite and non-negative.
    #[error("invalid curvature {value}: must be finite and ≥ 0")]
    InvalidCurvature { value: f64 },

    /// Attempted to update a curvature that was created frozen.
    #[error("curvature is frozen and cannot be updated")]
    FrozenCurvature,
}

pub type Result<T> = std::result::Result<T, HypError>;
