//! Calibrated motor positions for DMM energy changes.
//!
//! The lookup table is a JSON document keyed by operating mode, then by
//! calibrated energy (as a string), holding one motor-position record per
//! energy:
//!
//! ```text
//! {
//!   "Mono": {
//!     "20.0": { "mirror_angle": 2.657, "dmm_us_arm": 0.91, ... },
//!     "24.9": { ... }
//!   },
//!   "Pink": { "30.0": { ... } }
//! }
//! ```
//!
//! A requested energy is mapped to the nearest calibrated energy. A request
//! that is not itself calibrated is logged as a warning and the calibrated
//! point is used; the lookup never refuses. Among equidistant candidates the
//! lower energy wins, whatever the order of the keys in the file.
//!
//! Any defect in the table (unreadable file, bad JSON, unknown mode, no
//! energies, non-numeric key, missing motor) is fatal: there is no safe
//! position to fall back to.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{AppResult, DmmError};

/// Operating mode, matching the top-level keys of the lookup table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    /// Monochromatic beam through the DMM.
    Mono,
    /// Pink (unmonochromatized) beam.
    Pink,
}

impl Mode {
    /// Top-level table key.
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Mono => "Mono",
            Mode::Pink => "Pink",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical names of every motor touched by an energy change, in table order.
pub const MOTOR_NAMES: [&str; 13] = [
    "mirror_angle",
    "mirror_vertical_position",
    "dmm_usy_ob",
    "dmm_usy_ib",
    "dmm_dsy",
    "dmm_us_arm",
    "dmm_ds_arm",
    "dmm_m2y",
    "dmm_usx",
    "dmm_dsx",
    "filter",
    "table_y",
    "flag",
];

/// Motors that only move in monochromatic mode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct MonoArms {
    pub dmm_us_arm: f64,
    pub dmm_ds_arm: f64,
    pub dmm_m2y: f64,
}

/// A complete, safe set of motor positions for one energy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct MotorPositions {
    pub mirror_angle: f64,
    pub mirror_vertical_position: f64,
    pub dmm_usy_ob: f64,
    pub dmm_usy_ib: f64,
    pub dmm_dsy: f64,
    pub dmm_usx: f64,
    pub dmm_dsx: f64,
    pub filter: f64,
    pub table_y: f64,
    pub flag: f64,
    /// Present for `Mono` calibrations and live readings only.
    pub arms: Option<MonoArms>,
}

impl MotorPositions {
    /// `(motor, position)` pairs in [`MOTOR_NAMES`] order, skipping absent arm motors.
    pub fn entries(&self) -> Vec<(&'static str, f64)> {
        let mut entries = vec![
            ("mirror_angle", self.mirror_angle),
            ("mirror_vertical_position", self.mirror_vertical_position),
            ("dmm_usy_ob", self.dmm_usy_ob),
            ("dmm_usy_ib", self.dmm_usy_ib),
            ("dmm_dsy", self.dmm_dsy),
        ];
        if let Some(arms) = self.arms {
            entries.extend([
                ("dmm_us_arm", arms.dmm_us_arm),
                ("dmm_ds_arm", arms.dmm_ds_arm),
                ("dmm_m2y", arms.dmm_m2y),
            ]);
        }
        entries.extend([
            ("dmm_usx", self.dmm_usx),
            ("dmm_dsx", self.dmm_dsx),
            ("filter", self.filter),
            ("table_y", self.table_y),
            ("flag", self.flag),
        ]);
        entries
    }

    /// Position of `motor`, or `None` if it is not part of this set.
    pub fn get(&self, motor: &str) -> Option<f64> {
        self.entries()
            .into_iter()
            .find(|(name, _)| *name == motor)
            .map(|(_, value)| value)
    }
}

/// One calibrated point as stored in the table.
#[derive(Debug, Clone, Deserialize)]
struct CalibrationRecord {
    mirror_angle: f64,
    mirror_vertical_position: f64,
    dmm_usy_ob: f64,
    dmm_usy_ib: f64,
    dmm_dsy: f64,
    #[serde(default)]
    dmm_us_arm: Option<f64>,
    #[serde(default)]
    dmm_ds_arm: Option<f64>,
    #[serde(default)]
    dmm_m2y: Option<f64>,
    dmm_usx: f64,
    dmm_dsx: f64,
    filter: f64,
    table_y: f64,
    flag: f64,
}

/// Result of a lookup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    /// Mode the table was searched in.
    pub mode: Mode,
    /// Energy asked for, in keV.
    pub requested: f64,
    /// The calibrated energy actually used.
    pub energy: f64,
    /// Motor positions stored for `energy`.
    pub positions: MotorPositions,
}

impl Calibration {
    /// Whether the requested energy is itself a calibrated point.
    pub fn is_exact(&self) -> bool {
        self.requested == self.energy
    }
}

/// Pick the candidate closest to `target`; on a tie the lower value wins.
pub fn nearest(candidates: &[f64], target: f64) -> Option<f64> {
    candidates.iter().copied().min_by(|a, b| {
        let da = (a - target).abs();
        let db = (b - target).abs();
        da.total_cmp(&db).then(a.total_cmp(b))
    })
}

/// The parsed lookup table.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct CalibrationTable {
    modes: BTreeMap<String, BTreeMap<String, CalibrationRecord>>,
}

impl CalibrationTable {
    /// Read and parse the table at `path`.
    pub fn load(path: impl AsRef<Path>) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&contents)
    }

    /// Parse a table from its JSON text.
    pub fn from_json(contents: &str) -> AppResult<Self> {
        Ok(serde_json::from_str(contents)?)
    }

    fn mode_entries(&self, mode: Mode) -> AppResult<&BTreeMap<String, CalibrationRecord>> {
        let entries = self
            .modes
            .get(mode.as_str())
            .ok_or_else(|| DmmError::CalibrationModeNotFound(mode.to_string()))?;
        if entries.is_empty() {
            return Err(DmmError::CalibrationEmpty(mode.to_string()));
        }
        Ok(entries)
    }

    /// Calibrated energies for `mode`, paired with their table keys, in ascending order.
    pub fn energies(&self, mode: Mode) -> AppResult<Vec<(f64, &str)>> {
        let mut energies = self
            .mode_entries(mode)?
            .keys()
            .map(|key| {
                key.trim()
                    .parse::<f64>()
                    .map(|energy| (energy, key.as_str()))
                    .map_err(|_| DmmError::CalibrationInvalidEnergy(key.clone()))
            })
            .collect::<AppResult<Vec<_>>>()?;
        energies.sort_by(|(a, _), (b, _)| a.total_cmp(b));
        Ok(energies)
    }

    /// Map `requested` to the nearest calibrated energy and its motor positions.
    pub fn lookup(&self, mode: Mode, requested: f64) -> AppResult<Calibration> {
        let entries = self.mode_entries(mode)?;
        let energies = self.energies(mode)?;
        let candidates: Vec<f64> = energies.iter().map(|(energy, _)| *energy).collect();

        let calibrated = nearest(&candidates, requested)
            .and_then(|energy| energies.iter().find(|(e, _)| *e == energy))
            .and_then(|(energy, key)| entries.get(*key).map(|record| (*energy, *key, record)));
        let Some((energy, key, record)) = calibrated else {
            return Err(DmmError::CalibrationEmpty(mode.to_string()));
        };

        if requested != energy {
            let options: Vec<&str> = energies.iter().map(|(_, key)| *key).collect();
            warn!(
                "   *** Energy requested is {} keV, the closest calibrated energy is {}",
                requested, energy
            );
            info!("   *** Options are [{}] keV", options.join(", "));
        }
        info!("   *** Change Energy for {} as {} *** ", mode, energy);

        let arms = match mode {
            Mode::Mono => Some(Self::mono_arms(record, key)?),
            Mode::Pink => None,
        };
        let positions = MotorPositions {
            mirror_angle: record.mirror_angle,
            mirror_vertical_position: record.mirror_vertical_position,
            dmm_usy_ob: record.dmm_usy_ob,
            dmm_usy_ib: record.dmm_usy_ib,
            dmm_dsy: record.dmm_dsy,
            dmm_usx: record.dmm_usx,
            dmm_dsx: record.dmm_dsx,
            filter: record.filter,
            table_y: record.table_y,
            flag: record.flag,
            arms,
        };

        Ok(Calibration {
            mode,
            requested,
            energy,
            positions,
        })
    }

    fn mono_arms(record: &CalibrationRecord, key: &str) -> AppResult<MonoArms> {
        let missing = |field: &'static str| DmmError::CalibrationMissingField {
            mode: Mode::Mono.to_string(),
            energy: key.to_string(),
            field,
        };
        Ok(MonoArms {
            dmm_us_arm: record.dmm_us_arm.ok_or_else(|| missing("dmm_us_arm"))?,
            dmm_ds_arm: record.dmm_ds_arm.ok_or_else(|| missing("dmm_ds_arm"))?,
            dmm_m2y: record.dmm_m2y.ok_or_else(|| missing("dmm_m2y"))?,
        })
    }
}

/// Load the table at `path` and look up `requested` for `mode`.
///
/// The table is read afresh on every call.
pub fn calibrate(path: impl AsRef<Path>, mode: Mode, requested: f64) -> AppResult<Calibration> {
    CalibrationTable::load(path)?.lookup(mode, requested)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    fn record(base: f64, with_arms: bool) -> serde_json::Value {
        let mut value = serde_json::json!({
            "mirror_angle": base,
            "mirror_vertical_position": base + 0.1,
            "dmm_usy_ob": base + 0.2,
            "dmm_usy_ib": base + 0.3,
            "dmm_dsy": base + 0.4,
            "dmm_usx": base + 0.5,
            "dmm_dsx": base + 0.6,
            "filter": 4.0,
            "table_y": base + 0.7,
            "flag": base + 0.8,
        });
        if with_arms {
            value["dmm_us_arm"] = serde_json::json!(base + 1.0);
            value["dmm_ds_arm"] = serde_json::json!(base + 1.1);
            value["dmm_m2y"] = serde_json::json!(base + 1.2);
        }
        value
    }

    fn table() -> CalibrationTable {
        let json = serde_json::json!({
            "Mono": {
                "22.0": record(2.0, true),
                "20.0": record(1.0, true),
                "30.0": record(3.0, true),
            },
            "Pink": {
                "30.0": record(5.0, false),
            },
        });
        CalibrationTable::from_json(&json.to_string()).unwrap()
    }

    #[test]
    fn test_nearest_prefers_lower_on_tie() {
        assert_eq!(nearest(&[22.0, 20.0], 21.0), Some(20.0));
        assert_eq!(nearest(&[20.0, 22.0], 21.0), Some(20.0));
        assert_eq!(nearest(&[20.0, 22.0], 21.5), Some(22.0));
        assert_eq!(nearest(&[], 21.0), None);
    }

    #[test]
    fn test_exact_energy_is_used_as_is() {
        let cal = table().lookup(Mode::Mono, 30.0).unwrap();
        assert!(cal.is_exact());
        assert_eq!(cal.energy, 30.0);
        assert_eq!(cal.positions.mirror_angle, 3.0);
    }

    #[test]
    fn test_mono_includes_arm_motors() {
        let cal = table().lookup(Mode::Mono, 21.0).unwrap();
        assert_eq!(cal.energy, 20.0);
        assert!(!cal.is_exact());

        let arms = cal.positions.arms.unwrap();
        assert_eq!(arms.dmm_us_arm, 1.0 + 1.0);
        assert_eq!(arms.dmm_m2y, 1.0 + 1.2);
        assert_eq!(cal.positions.entries().len(), 13);
    }

    #[test]
    fn test_pink_never_includes_arm_motors() {
        for requested in [-1.0, 0.0, 30.0, 1000.0] {
            let cal = table().lookup(Mode::Pink, requested).unwrap();
            assert_eq!(cal.energy, 30.0);
            assert!(cal.positions.arms.is_none());
            assert_eq!(cal.positions.get("dmm_us_arm"), None);
            assert_eq!(cal.positions.entries().len(), 10);
        }
    }

    #[test]
    fn test_unknown_mode_is_fatal() {
        let table = CalibrationTable::from_json(r#"{"Mono": {"20.0": null}}"#);
        assert!(matches!(table, Err(DmmError::CalibrationFormat(_))));

        let json = serde_json::json!({ "Mono": { "20.0": record(1.0, true) } });
        let table = CalibrationTable::from_json(&json.to_string()).unwrap();
        assert!(matches!(
            table.lookup(Mode::Pink, 20.0),
            Err(DmmError::CalibrationModeNotFound(_))
        ));
    }

    #[test]
    fn test_empty_mode_is_fatal() {
        let table = CalibrationTable::from_json(r#"{"Mono": {}}"#).unwrap();
        assert!(matches!(
            table.lookup(Mode::Mono, 20.0),
            Err(DmmError::CalibrationEmpty(_))
        ));
    }

    #[test]
    fn test_non_numeric_key_is_fatal() {
        let json = serde_json::json!({ "Mono": { "twenty": record(1.0, true) } });
        let table = CalibrationTable::from_json(&json.to_string()).unwrap();
        assert!(matches!(
            table.lookup(Mode::Mono, 20.0),
            Err(DmmError::CalibrationInvalidEnergy(key)) if key == "twenty"
        ));
    }

    #[test]
    fn test_mono_record_without_arms_is_fatal() {
        let json = serde_json::json!({ "Mono": { "20.0": record(1.0, false) } });
        let table = CalibrationTable::from_json(&json.to_string()).unwrap();
        assert!(matches!(
            table.lookup(Mode::Mono, 20.0),
            Err(DmmError::CalibrationMissingField { field: "dmm_us_arm", .. })
        ));
    }

    #[traced_test]
    #[test]
    fn test_options_listed_in_numeric_order() {
        let json = serde_json::json!({
            "Mono": {
                "100.0": record(1.0, true),
                "20.0": record(2.0, true),
                "9.5": record(3.0, true),
            },
        });
        let table = CalibrationTable::from_json(&json.to_string()).unwrap();

        let energies: Vec<f64> = table
            .energies(Mode::Mono)
            .unwrap()
            .into_iter()
            .map(|(energy, _)| energy)
            .collect();
        assert_eq!(energies, vec![9.5, 20.0, 100.0]);

        table.lookup(Mode::Mono, 25.0).unwrap();
        assert!(logs_contain("Options are [9.5, 20.0, 100.0] keV"));
    }
}
