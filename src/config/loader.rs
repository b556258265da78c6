//! Config loader: INI file to overrides.
//!
//! A missing or unparseable file is not an error. It simply contributes no
//! overrides, so a fresh install runs on compiled-in defaults.

use std::path::Path;

use ini::{Ini, ParseOption};
use tracing::{debug, warn};

use super::schema::{CliAction, FieldDescriptor, FieldKind, Schema};
use super::value::{normalize_key, Layer};

/// Read `path` with the options shared by every INI reader in the crate.
pub(crate) fn read_ini(path: &Path) -> Option<Ini> {
    let opt = ParseOption {
        enabled_escape: false,
        ..Default::default()
    };
    match Ini::load_from_file_opt(path, opt) {
        Ok(ini) => Some(ini),
        Err(e) => {
            debug!("No overrides from {}: {}", path.display(), e);
            None
        }
    }
}

/// Schema fields present in the file with a usable stored value, in schema order.
///
/// Empty values and the literal `None` mean "no override" and are dropped here.
fn stored_entries(schema: &Schema, path: &Path) -> Vec<(&'static FieldDescriptor, String)> {
    let Some(ini) = read_ini(path) else {
        return Vec::new();
    };

    let mut entries = Vec::new();
    for section in schema.sections() {
        let Some(props) = ini.section(Some(section.name)) else {
            continue;
        };
        for field in section.fields {
            let key = normalize_key(field.name);
            let Some((_, value)) = props.iter().find(|(k, _)| normalize_key(k) == key) else {
                continue;
            };
            if value.is_empty() || value == "None" {
                continue;
            }
            entries.push((field, value.to_string()));
        }
    }
    entries
}

/// Convert the config file into command-line style tokens.
///
/// Flags stored as `True` become a bare `--name`, multi-value fields become
/// `--name` followed by each comma-separated part, everything else becomes
/// `--name=value`.
pub fn load_overrides_with(schema: &Schema, path: impl AsRef<Path>) -> Vec<String> {
    let mut tokens = Vec::new();
    for (field, value) in stored_entries(schema, path.as_ref()) {
        match field.action {
            CliAction::Flag => {
                if value == "True" {
                    tokens.push(format!("--{}", field.name));
                }
            }
            CliAction::MultiValue => {
                tokens.push(format!("--{}", field.name));
                tokens.extend(value.split(',').map(|part| part.trim().to_string()));
            }
            CliAction::Value => tokens.push(format!("--{}={}", field.name, value)),
        }
    }
    tokens
}

/// [`load_overrides_with`] against the monochromator schema.
pub fn load_overrides(path: impl AsRef<Path>) -> Vec<String> {
    load_overrides_with(&Schema::dmm(), path)
}

/// The config file as typed values.
///
/// Applies the same skip rules as [`load_overrides_with`]; a flag only
/// overrides when stored as `True`. Values that do not parse as the field's
/// type are logged and skipped.
pub fn load_layer(schema: &Schema, path: impl AsRef<Path>) -> Layer {
    let path = path.as_ref();
    let mut layer = Layer::new();
    for (field, value) in stored_entries(schema, path) {
        if field.kind == FieldKind::Flag && value != "True" {
            continue;
        }
        match field.parse(&value) {
            Some(parsed) => {
                layer.insert(field.name, parsed);
            }
            None => warn!(
                "Ignoring '{} = {}' in {}: not a valid {:?}",
                field.name,
                value,
                path.display(),
                field.kind
            ),
        }
    }
    layer
}
