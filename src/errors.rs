//! Centralized error handling for ARCheck
//!
//! Every check in the crate reports failures through [`ArCheckError`], so a
//! training harness can match on the precondition that was violated instead of
//! parsing messages.

use chrono::NaiveDateTime;
use thiserror::Error;

/// Main error type for ARCheck operations
#[derive(Debug, Error)]
pub enum ArCheckError {
    /// NetCDF file operation errors
    #[error("NetCDF error: {0}")]
    NetCDFError(#[from] netcdf::Error),

    /// I/O operation errors
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Array shape or dimension error
    #[error("Array error: {0}")]
    ArrayError(#[from] ndarray::ShapeError),

    /// JSON (Zarr metadata, settings files) errors
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Required dimensions are absent from an array or dataset
    #[error("The {name} must have also the '{missing:?}' dimension")]
    MissingDimensions { name: String, missing: Vec<String> },

    /// The time axis has gaps
    #[error("The process has been interrupted: missing timesteps between {}", format_gaps(.gaps))]
    MissingTimesteps {
        gaps: Vec<(NaiveDateTime, NaiveDateTime)>,
    },

    /// NaN or Inf values were found
    #[error("The variables {variables:?} contain {kind} values")]
    NonFiniteValues { kind: String, variables: Vec<String> },

    /// Two time-varying inputs do not share the same timesteps
    #[error("The {what} do not have the same timesteps!")]
    TimestepsMismatch { what: String },

    /// A required input was not provided
    #[error("{0}")]
    MissingInput(String),

    /// Dimension order differs where it must coincide
    #[error("{0}")]
    DimensionOrderMismatch(String),

    /// Timesteps could not be interpreted
    #[error("Invalid timesteps: {0}")]
    InvalidTimesteps(String),

    /// Requested timesteps are not available
    #[error("The following 'subset_timesteps' are not within 'timesteps': {missing:?}")]
    SubsetNotWithin { missing: Vec<NaiveDateTime> },

    /// Variable not found in a dataset or file
    #[error("Variable '{var}' not found")]
    VariableNotFound { var: String },

    /// Dimension not found in a variable
    #[error("Dimension '{dim}' not found in variable '{var}'")]
    DimensionNotFound { var: String, dim: String },

    /// Shapes or sizes do not agree
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Zarr store errors
    #[error("Zarr error: {0}")]
    Zarr(String),

    /// AR settings errors
    #[error("Invalid AR settings: {0}")]
    Settings(String),

    /// Verification errors
    #[error("Verification error: {0}")]
    Verification(String),

    /// Thread pool configuration error
    #[error("Thread pool error: {0}")]
    ThreadPool(String),
}

fn format_gaps(gaps: &[(NaiveDateTime, NaiveDateTime)]) -> String {
    if gaps.is_empty() {
        return "(irregular time step)".to_string();
    }
    gaps.iter()
        .map(|(start, end)| format!("{start} and {end}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type alias for ARCheck operations
pub type Result<T> = std::result::Result<T, ArCheckError>;
