//! Unified error handling for the stop-matcher library.
//!
//! Only configuration and input-validation problems are errors: they abort a
//! run before any processing starts. Sparse data (a vehicle with one fix, a
//! stop no vehicle ever visits) is not an error and simply produces no rows.

use std::fmt;

/// Unified error type for stop-matcher operations.
#[derive(Debug, Clone)]
pub enum StopMatchError {
    /// The requested planar CRS is not supported
    UnsupportedCrs { epsg: u32 },
    /// Invalid configuration value (non-positive threshold, unknown policy)
    InvalidConfig { message: String },
    /// Route geometry unusable for linear referencing
    DegenerateRoute { message: String },
    /// No usable fixes remain after cleaning, so no run epoch exists
    NoFixes,
}

impl fmt::Display for StopMatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopMatchError::UnsupportedCrs { epsg } => {
                write!(f, "Unsupported planar CRS: EPSG:{}", epsg)
            }
            StopMatchError::InvalidConfig { message } => {
                write!(f, "Configuration error: {}", message)
            }
            StopMatchError::DegenerateRoute { message } => {
                write!(f, "Degenerate route geometry: {}", message)
            }
            StopMatchError::NoFixes => {
                write!(f, "No usable fixes after cleaning")
            }
        }
    }
}

impl std::error::Error for StopMatchError {}

/// Result type alias for stop-matcher operations.
pub type Result<T> = std::result::Result<T, StopMatchError>;

impl StopMatchError {
    /// Shorthand for a configuration error with a formatted message.
    pub fn config(message: impl Into<String>) -> Self {
        StopMatchError::InvalidConfig {
            message: message.into(),
        }
    }
}
