//! Error types for RoI Align.
//!
//! The default normalization and sampling paths never fail: degenerate input
//! propagates as NaN or infinity. These errors are produced only by the
//! opt-in validation layer and by host read-back of tensor data.

use thiserror::Error;

/// Axis of a box extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Axis::X => write!(f, "x"),
            Axis::Y => write!(f, "y"),
        }
    }
}

/// Main error type for RoI Align operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RoiAlignError {
    /// A box whose upper extremum lies before its lower one.
    #[error("Inverted box {index}: {axis}1 = {lo} > {axis}2 = {hi}")]
    InvertedBox {
        index: usize,
        axis: Axis,
        lo: f64,
        hi: f64,
    },

    /// A box with a NaN or infinite coordinate.
    #[error("Non-finite coordinate in box {index}")]
    NonFiniteBox { index: usize },

    /// A batch index outside `[0, batch_size)`.
    #[error("Box {index} refers to batch {value}, out of range for batch size {batch_size}")]
    BoxIndexOutOfRange {
        index: usize,
        value: i64,
        batch_size: usize,
    },

    /// Boxes and batch indices differ in length.
    #[error("Cardinality mismatch: {boxes} boxes but {indices} box indices")]
    CardinalityMismatch { boxes: usize, indices: usize },

    /// An extent that would make a normalization denominator zero.
    #[error("Degenerate extent: {name} = {value}, need at least {minimum}")]
    DegenerateExtent {
        name: &'static str,
        value: usize,
        minimum: usize,
    },

    /// Tensor shape mismatch.
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Tensor data could not be read back to the host.
    #[error("Data conversion error: {0}")]
    DataConversion(String),
}

/// Result type for RoI Align operations.
pub type Result<T> = std::result::Result<T, RoiAlignError>;

impl RoiAlignError {
    /// Create an invalid configuration error.
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Create a data conversion error.
    pub fn data_conversion(msg: impl Into<String>) -> Self {
        Self::DataConversion(msg.into())
    }

    /// Create a shape mismatch error.
    pub fn shape_mismatch(expected: impl Into<Vec<usize>>, actual: impl Into<Vec<usize>>) -> Self {
        Self::ShapeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}
