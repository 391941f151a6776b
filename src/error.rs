use std::path::PathBuf;
use thiserror::Error;

/// Crate-wide error type for the downsampling engine.
#[derive(Error, Debug)]
pub enum DownsampleError {
    #[error("no input files for period {period} in {dir}")]
    MissingFiles { period: String, dir: PathBuf },

    #[error("shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("resolution error: {0}")]
    Resolution(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("write error for {path}: {reason}")]
    Write { path: PathBuf, reason: String },

    #[error("variable spec error: {0}")]
    VariableSpec(String),

    #[error("NetCDF error: {0}")]
    Netcdf(#[from] netcdf::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DownsampleError>;
