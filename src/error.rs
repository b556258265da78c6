//! Custom error types for the application.
//!
//! This module defines the primary error type, `DmmError`, for the whole crate.
//! Using the `thiserror` crate, it provides a centralized and consistent way to handle
//! the failures that can occur while resolving configuration, looking up calibrated
//! motor positions, or talking to the beamline devices.
//!
//! ## Error Hierarchy
//!
//! - **`Cli`**: Wraps `clap` errors, including the help and version "errors" that the
//!   binary turns into a clean exit.
//! - **`Config`**: Wraps errors from `figment` raised while merging the parameter layers
//!   into the typed parameter record (e.g. a non-numeric energy in the config file).
//! - **`Io`**: Wraps standard `std::io::Error`, covering config, log and calibration files.
//! - **`CalibrationFormat`** and the other `Calibration*` variants: the lookup table is
//!   unusable. These are always fatal since no safe motor position can be synthesized.
//! - **`Device`** / **`UnknownProcessVariable`**: failures reported by the process-variable
//!   layer. They are propagated as-is, never replaced by a default position.
//!
//! A missing or unparseable config file is not an error; it contributes no overrides.

use thiserror::Error;

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, DmmError>;

/// Every failure the library can report.
#[derive(Error, Debug)]
pub enum DmmError {
    /// Invalid command line, or a help/version request.
    #[error("Command line error: {0}")]
    Cli(#[from] clap::Error),

    /// The merged layers do not form a valid parameter set.
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// File system failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The calibration table is not valid JSON or lacks a motor.
    #[error("Calibration table error: {0}")]
    CalibrationFormat(#[from] serde_json::Error),

    /// No entry for the mode in the table.
    #[error("Calibration mode '{0}' not found in lookup table")]
    CalibrationModeNotFound(String),

    /// The mode has no calibrated energies.
    #[error("No calibrated energies available for mode '{0}'")]
    CalibrationEmpty(String),

    /// An energy key does not parse as a number.
    #[error("Calibrated energy key '{0}' is not a number")]
    CalibrationInvalidEnergy(String),

    /// A Mono entry lacks an arm motor.
    #[error("Calibration entry {energy} keV ({mode}) is missing '{field}'")]
    CalibrationMissingField {
        /// Table mode.
        mode: String,
        /// Energy key of the entry.
        energy: String,
        /// Missing motor.
        field: &'static str,
    },

    /// A process variable read or write failed.
    #[error("Device error: {0}")]
    Device(String),

    /// No process variable is bound to the motor.
    #[error("Unknown process variable: {0}")]
    UnknownProcessVariable(String),
}

impl From<figment::Error> for DmmError {
    fn from(err: figment::Error) -> Self {
        DmmError::Config(Box::new(err))
    }
}
