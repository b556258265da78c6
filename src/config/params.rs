//! The resolved parameter set.
//!
//! `Params` is the strongly typed record produced once per invocation by the
//! argument merger. The calibration lookup and live device readings update it
//! in place; the config writer and the status reporter read it back through
//! [`ParamSource`], which exposes it as a name-to-value mapping.

use std::path::PathBuf;

use figment::{providers::Serialized, Figment};
use serde::{Deserialize, Serialize};

use super::value::{normalize_key, FieldValue, Layer};
use crate::calibration::{Calibration, MotorPositions};
use crate::error::AppResult;

/// Name-keyed read access to a parameter set.
pub trait ParamSource {
    /// Value of `name` (hyphens and underscores are equivalent), if set.
    fn param(&self, name: &str) -> Option<FieldValue>;

    /// Normalized names of every field that has a value.
    fn param_names(&self) -> Vec<String>;
}

/// Resolved parameters for one invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Params {
    /// Config file the file layer was read from.
    pub config: PathBuf,
    /// Directory for per-run log files.
    pub logs_home: PathBuf,
    /// DEBUG-level logging.
    pub verbose: bool,
    /// Show target positions without moving any motor.
    pub testing: bool,
    /// Skip confirmations and allow overwriting files.
    pub force: bool,
    /// Requested energy in keV, overwritten with the calibrated energy by [`Params::apply_calibration`].
    pub energy: f64,
    /// PV prefix of the energy IOC.
    pub energyioc_prefix: String,
    /// Motor positions from the calibration table or from live readings.
    #[serde(skip)]
    pub positions: Option<MotorPositions>,
}

const FIELD_NAMES: [&str; 7] = [
    "config",
    "logs_home",
    "verbose",
    "testing",
    "force",
    "energy",
    "energyioc_prefix",
];

impl Params {
    /// Merge `layers` from lowest to highest precedence into a typed record.
    ///
    /// The lowest layer must provide every field (normally the schema defaults).
    pub fn from_layers(layers: &[&Layer]) -> AppResult<Self> {
        let figment = layers.iter().fold(Figment::new(), |figment, layer| {
            figment.merge(Serialized::defaults((*layer).clone()))
        });
        Ok(figment.extract()?)
    }

    /// Replace the energy and motor positions with a calibrated point.
    pub fn apply_calibration(&mut self, calibration: Calibration) {
        self.energy = calibration.energy;
        self.positions = Some(calibration.positions);
    }
}

impl ParamSource for Params {
    fn param(&self, name: &str) -> Option<FieldValue> {
        let value = match normalize_key(name).as_str() {
            "config" => FieldValue::Text(self.config.to_string_lossy().into_owned()),
            "logs_home" => FieldValue::Text(self.logs_home.to_string_lossy().into_owned()),
            "verbose" => FieldValue::Bool(self.verbose),
            "testing" => FieldValue::Bool(self.testing),
            "force" => FieldValue::Bool(self.force),
            "energy" => FieldValue::Float(self.energy),
            "energyioc_prefix" => FieldValue::Text(self.energyioc_prefix.clone()),
            _ => return None,
        };
        Some(value)
    }

    fn param_names(&self) -> Vec<String> {
        FIELD_NAMES.iter().map(|name| name.to_string()).collect()
    }
}

impl ParamSource for Layer {
    fn param(&self, name: &str) -> Option<FieldValue> {
        self.get(name).cloned()
    }

    fn param_names(&self) -> Vec<String> {
        self.iter().map(|(name, _)| name.to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::Schema;
    use crate::context::ConfigContext;

    #[test]
    fn test_from_defaults_only() {
        let ctx = ConfigContext::with_root("/home/beams");
        let params = Params::from_layers(&[&Schema::dmm().defaults(&ctx)]).unwrap();

        assert_eq!(params.config, PathBuf::from("/home/beams/logs/dmm.conf"));
        assert_eq!(params.logs_home, PathBuf::from("/home/beams/logs"));
        assert!(!params.verbose && !params.testing && !params.force);
        assert_eq!(params.energy, -1.0);
        assert_eq!(params.energyioc_prefix, "2bm:MCTOptics:");
        assert!(params.positions.is_none());
    }

    #[test]
    fn test_higher_layer_wins() {
        let ctx = ConfigContext::with_root("/home/beams");
        let defaults = Schema::dmm().defaults(&ctx);

        let mut file = Layer::new();
        file.insert("energy", FieldValue::Float(20.0));
        file.insert("energyioc-prefix", FieldValue::Text("32id:Energy:".into()));

        let mut cli = Layer::new();
        cli.insert("energy", FieldValue::Float(30.0));
        cli.insert("verbose", FieldValue::Bool(true));

        let params = Params::from_layers(&[&defaults, &file, &cli]).unwrap();
        assert_eq!(params.energy, 30.0);
        assert_eq!(params.energyioc_prefix, "32id:Energy:");
        assert!(params.verbose);
    }

    #[test]
    fn test_every_schema_field_is_addressable() {
        let ctx = ConfigContext::with_root("/home/beams");
        let params = Params::from_layers(&[&Schema::dmm().defaults(&ctx)]).unwrap();

        for section in Schema::dmm().sections() {
            for field in section.fields {
                assert!(params.param(field.name).is_some(), "{}", field.name);
            }
        }
        assert_eq!(params.param("mirror_angle"), None);
    }
}
