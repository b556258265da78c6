//! Layered configuration for the DMM energy tool.
//!
//! Parameters come from three layers, lowest to highest precedence:
//!
//! 1. compiled-in defaults from the [`schema`] registry,
//! 2. the INI config file named by `--config` (see [`loader`]),
//! 3. options given on the command line (see [`merge`]).
//!
//! The result is a typed [`Params`] record. [`writer`] serializes it back to
//! the same INI layout, so an operator's saved session can serve as the
//! baseline for the next invocation.
//!
//! # Example
//!
//! ```no_run
//! use dmm_energy::config::{resolve, ParamSource};
//! use dmm_energy::context::ConfigContext;
//!
//! let ctx = ConfigContext::from_home();
//! if let Some(invocation) = resolve(&ctx, ["dmm", "status", "--energy", "24.9"])? {
//!     println!("energy: {:?}", invocation.params.param("energy"));
//! }
//! # Ok::<(), dmm_energy::error::DmmError>(())
//! ```

pub mod loader;
pub mod merge;
pub mod params;
pub mod schema;
pub mod value;
pub mod writer;

pub use loader::{load_layer, load_overrides, load_overrides_with};
pub use merge::{build_cli, parse_command_line, resolve, CommandKind, Invocation};
pub use params::{ParamSource, Params};
pub use schema::{Schema, MONO_PARAMS, PINK_PARAMS};
pub use value::{FieldValue, Layer};
pub use writer::{save_params_to_config, save_snapshot, snapshot_path, write_config};
