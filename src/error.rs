//! Error taxonomy for the registration pipeline.
//!
//! Only configuration mistakes are reported as [`Error`]. Every other failure
//! mode named in the specification (insufficient data, degenerate geometry,
//! numeric overflow) is recoverable and surfaces as an invalid
//! [`crate::solver::RegistrationSolution`] instead of an `Err`, so that a
//! caller sweeping many cloud pairs never has to unwind a `Result` for a
//! routine "these two scans don't overlap" outcome.

use thiserror::Error;

/// Errors that abort eagerly, at construction time.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// A configuration value is out of the range the algorithm requires.
    #[error("invalid configuration: {0}")]
    Configuration(String),
}

/// Convenience alias for fallible construction in this crate.
pub type Result<T> = core::result::Result<T, Error>;
