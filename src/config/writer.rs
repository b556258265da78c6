//! Config writer: typed parameters back to the INI format.
//!
//! Every schema section is written in order. Selected sections take their
//! values from the parameter set; all others fall back to compiled-in
//! defaults. Empty values are written as commented-out keys so the option
//! stays discoverable. The `config` field is never written.

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use ini::{EscapePolicy, Ini, WriteOption};
use tracing::info;

use super::params::{ParamSource, Params};
use super::schema::{Schema, MONO_PARAMS};
use super::value::format_float;
use crate::calibration::Mode;
use crate::context::ConfigContext;
use crate::error::AppResult;

const COMMENT_PREFIX: &str = "# ";
const SNAPSHOT_TIME_FORMAT: &str = "%Y-%m-%d_%H_%M_%S";

/// Write `path` from `schema`.
///
/// Fields of sections listed in `sections` take their value from `params`
/// when it has one; every other field gets its default (or empty).
pub fn write_config(
    path: impl AsRef<Path>,
    schema: &Schema,
    ctx: &ConfigContext,
    params: Option<&dyn ParamSource>,
    sections: &[&str],
) -> AppResult<()> {
    let path = path.as_ref();
    let mut ini = Ini::new();

    for section in schema.sections() {
        let selected = sections.contains(&section.name);
        let mut setter = ini.with_section(Some(section.name));
        for field in section.fields {
            if field.name == "config" {
                continue;
            }
            let value = params
                .filter(|_| selected)
                .and_then(|p| p.param(field.name))
                .or_else(|| field.default_value(ctx))
                .map(|v| v.to_string())
                .unwrap_or_default();

            let key = if value.is_empty() {
                format!("{COMMENT_PREFIX}{}", field.name)
            } else {
                field.name.to_string()
            };
            setter.set(key, value);
        }
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let opt = WriteOption {
        escape_policy: EscapePolicy::Nothing,
        kv_separator: " = ",
        ..Default::default()
    };
    ini.write_to_file_opt(path, opt)?;
    Ok(())
}

/// Name of a snapshot config:
/// `<stem>_<mode>_<energy>_<YYYY-MM-DD_HH_MM_SS><ext>`, next to `config`.
pub fn snapshot_path(config: &Path, mode: Mode, energy: f64, at: NaiveDateTime) -> PathBuf {
    let stem = config
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = config
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let name = format!(
        "{stem}_{mode}_{}_{}{ext}",
        format_float(energy),
        at.format(SNAPSHOT_TIME_FORMAT)
    );
    config.with_file_name(name)
}

/// Persist `sections` to the context's default config file.
///
/// Sections outside `sections` are written with their defaults, so a pink
/// run (`PINK_PARAMS`) leaves `energy` at the pink-beam marker.
pub fn save_params_to_config(
    ctx: &ConfigContext,
    params: &Params,
    sections: &[&str],
) -> AppResult<PathBuf> {
    let path = ctx.config_file.clone();
    write_config(&path, &Schema::dmm(), ctx, Some(params), sections)?;
    info!("  *** saved to {}", path.display());
    Ok(path)
}

/// Store the current state in a uniquely named copy of the active config.
pub fn save_snapshot(
    ctx: &ConfigContext,
    params: &Params,
    mode: Mode,
    at: NaiveDateTime,
) -> AppResult<PathBuf> {
    let path = snapshot_path(&params.config, mode, params.energy, at);
    write_config(&path, &Schema::dmm(), ctx, Some(params), MONO_PARAMS)?;
    info!("  *** saved to {}", path.display());
    Ok(path)
}
