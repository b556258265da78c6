//! Status reporting through the log.
//!
//! Parameters are grouped by schema section and listed alphabetically.
//! Values that are `false` or the literal `"none"` are logged at WARN so they
//! stand out; everything else at INFO.

use tracing::{info, warn};

use crate::calibration::MotorPositions;
use crate::config::{ParamSource, Schema};

/// Log every resolved parameter, grouped by section.
pub fn report(params: &dyn ParamSource) {
    let schema = Schema::dmm();
    let sections: Vec<&str> = schema.sections().iter().map(|s| s.name).collect();
    report_with(&schema, params, &sections);
}

/// Log only the parameters of `sections`, e.g. a command's active sections.
pub fn report_sections(params: &dyn ParamSource, sections: &[&str]) {
    report_with(&Schema::dmm(), params, sections);
}

/// [`report`] against an arbitrary schema, restricted to `sections`.
///
/// Sections are visited in schema order whatever the order of `sections`.
pub fn report_with(schema: &Schema, params: &dyn ParamSource, sections: &[&str]) {
    let names = params.param_names();

    warn!("energy status start");
    for section in schema
        .sections()
        .iter()
        .filter(|section| sections.contains(&section.name))
    {
        let mut entries: Vec<&str> = names
            .iter()
            .map(String::as_str)
            .filter(|name| section.field(name).is_some())
            .collect();
        entries.sort_unstable();
        if entries.is_empty() {
            continue;
        }

        info!("{}", section.title);
        for name in entries {
            match params.param(name) {
                Some(value) if value.is_falsy_or_none() => warn!("  {:<16} {}", name, value),
                Some(value) => info!("  {:<16} {}", name, value),
                None => info!("  {:<16} -", name),
            }
        }
    }
    warn!("energy status end");
}

/// Log a motor position set, one motor per line.
pub fn report_positions(positions: &MotorPositions) {
    for (motor, value) in positions.entries() {
        info!("  {:<26} {}", motor, value);
    }
}
