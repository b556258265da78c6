//! Core library for the DMM energy tool.
//!
//! This library resolves the operator's parameters (compiled-in defaults, an
//! INI config file and the command line), maps a requested energy onto the
//! nearest calibrated motor-position set, and talks to the beamline motors
//! through a process-variable seam. It is used by the `dmm` binary.

pub mod calibration;
pub mod config;
pub mod context;
pub mod device;
pub mod error;
pub mod logging;
pub mod report;
