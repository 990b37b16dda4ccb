//! Error types for minippl
//!
//! This module defines all error types used throughout the library. Every
//! variant of [`PplError`] is a programmer error: it is surfaced immediately
//! through `?` and never silently recovered from.

use thiserror::Error;

/// Site name type used by traces and the parameter store
pub type SiteName = String;

/// Error type for tensor shape operations
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ShapeError {
    /// Two shapes cannot be broadcast together
    #[error("Cannot broadcast shapes {left:?} and {right:?}")]
    Broadcast { left: Vec<usize>, right: Vec<usize> },

    /// A tensor cannot be expanded to the requested shape
    #[error("Cannot expand shape {from:?} to {to:?}")]
    Expand { from: Vec<usize>, to: Vec<usize> },

    /// Data length does not match the number of elements of a shape
    #[error("Data length {len} does not match shape {shape:?}")]
    DataLength { len: usize, shape: Vec<usize> },

    /// Operation requires a single-element tensor
    #[error("Expected a scalar tensor, got shape {0:?}")]
    NotScalar(Vec<usize>),
}

/// Top-level error type for model execution and inference
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PplError {
    /// Two sites with the same name were recorded in one trace
    #[error("Duplicate site name in trace: {0} (all sites must have unique names)")]
    DuplicateSite(SiteName),

    /// A parameter was referenced for the first time without an initial value
    #[error("Parameter {0} is not in the param store and no initial value was given")]
    MissingInitValue(SiteName),

    /// A captured parameter value has no unconstrained counterpart
    #[error("No unconstrained value is registered for parameter site {0}")]
    UnknownParameter(SiteName),

    /// Shape error from the tensor layer
    #[error("Shape error: {0}")]
    Shape(#[from] ShapeError),

    /// Plate dimensions must count from the right
    #[error("Plate dim must be negative, got {0}")]
    InvalidPlateDim(isize),

    /// Invalid distribution or optimizer configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Error type for parameter store persistence
#[derive(Debug, Error)]
pub enum ParamStoreError {
    /// IO error while reading or writing a parameter file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Stored state was written by a newer format version
    #[error("Version mismatch: expected at most {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    /// Parameter file not found
    #[error("Parameter file not found: {0}")]
    NotFound(String),

    /// Stored state could not be installed into the store
    #[error("Invalid parameter state: {0}")]
    Invalid(#[from] PplError),
}

/// Result type alias for model execution and inference
pub type PplResult<T> = Result<T, PplError>;
