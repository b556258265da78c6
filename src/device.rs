//! Process-variable access for the motors moved by an energy change.
//!
//! The control system itself is out of reach of this crate: a motor is
//! anything implementing [`ProcessVariable`]. [`EnergyChangePvs`] maps the
//! logical motor names of the calibration table to those variables.
//!
//! `SimulatedPv` keeps its value in memory. A set built from simulated
//! variables reports itself through [`EnergyChangePvs::is_simulated`].

use std::cell::Cell;
use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::calibration::{MonoArms, MotorPositions, MOTOR_NAMES};
use crate::error::{AppResult, DmmError};

/// A named, addressable control-system value.
pub trait ProcessVariable {
    /// Full PV name, e.g. `2bm:MCTOptics:MirrorAngle`.
    fn name(&self) -> &str;

    /// Blocking read of the current value.
    fn get(&self) -> AppResult<f64>;

    /// Blocking write of a new value.
    fn put(&self, value: f64) -> AppResult<()>;
}

/// In-memory process variable.
#[derive(Debug)]
pub struct SimulatedPv {
    name: String,
    value: Cell<f64>,
}

impl SimulatedPv {
    /// A variable named `name` holding `initial`.
    pub fn new(name: impl Into<String>, initial: f64) -> Self {
        Self {
            name: name.into(),
            value: Cell::new(initial),
        }
    }
}

impl ProcessVariable for SimulatedPv {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self) -> AppResult<f64> {
        Ok(self.value.get())
    }

    fn put(&self, value: f64) -> AppResult<()> {
        debug!("SimulatedPv: {} <- {}", self.name, value);
        self.value.set(value);
        Ok(())
    }
}

/// `mirror_vertical_position` -> `MirrorVerticalPosition`
fn pv_suffix(motor: &str) -> String {
    motor
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

/// Logical motor name to process variable.
#[derive(Default)]
pub struct EnergyChangePvs {
    pvs: BTreeMap<&'static str, Box<dyn ProcessVariable>>,
    simulated: bool,
}

impl EnergyChangePvs {
    /// An empty set; motors are added with [`EnergyChangePvs::insert`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulated variables for every motor, named `<prefix><MotorName>`.
    pub fn simulated(prefix: &str) -> Self {
        let mut pvs = Self::new();
        for motor in MOTOR_NAMES {
            let name = format!("{prefix}{}", pv_suffix(motor));
            pvs.insert(motor, Box::new(SimulatedPv::new(name, 0.0)));
        }
        pvs.simulated = true;
        pvs
    }

    /// Whether this set was built by [`EnergyChangePvs::simulated`].
    ///
    /// Moves and readings through a simulated set never reach the beamline.
    pub fn is_simulated(&self) -> bool {
        self.simulated
    }

    /// Bind `motor` to `pv`, replacing any previous binding.
    pub fn insert(&mut self, motor: &'static str, pv: Box<dyn ProcessVariable>) {
        self.pvs.insert(motor, pv);
    }

    /// The process variable bound to `motor`.
    pub fn pv(&self, motor: &str) -> AppResult<&dyn ProcessVariable> {
        self.pvs
            .get(motor)
            .map(|pv| &**pv)
            .ok_or_else(|| DmmError::UnknownProcessVariable(motor.to_string()))
    }

    /// Read `motor`.
    pub fn get(&self, motor: &str) -> AppResult<f64> {
        self.pv(motor)?.get()
    }

    /// Write `value` to `motor`.
    pub fn put(&self, motor: &str, value: f64) -> AppResult<()> {
        self.pv(motor)?.put(value)
    }
}

/// Read every motor. A failed read aborts; no position is ever defaulted.
pub fn read_positions(pvs: &EnergyChangePvs) -> AppResult<MotorPositions> {
    info!("save current beamline positions to config");
    Ok(MotorPositions {
        mirror_angle: pvs.get("mirror_angle")?,
        mirror_vertical_position: pvs.get("mirror_vertical_position")?,
        dmm_usy_ob: pvs.get("dmm_usy_ob")?,
        dmm_usy_ib: pvs.get("dmm_usy_ib")?,
        dmm_dsy: pvs.get("dmm_dsy")?,
        dmm_usx: pvs.get("dmm_usx")?,
        dmm_dsx: pvs.get("dmm_dsx")?,
        filter: pvs.get("filter")?,
        table_y: pvs.get("table_y")?,
        flag: pvs.get("flag")?,
        arms: Some(MonoArms {
            dmm_us_arm: pvs.get("dmm_us_arm")?,
            dmm_ds_arm: pvs.get("dmm_ds_arm")?,
            dmm_m2y: pvs.get("dmm_m2y")?,
        }),
    })
}

/// Drive every motor in `positions` to its target.
pub fn apply_positions(pvs: &EnergyChangePvs, positions: &MotorPositions) -> AppResult<()> {
    for (motor, value) in positions.entries() {
        let pv = pvs.pv(motor)?;
        info!("  {:<26} -> {} ({})", motor, value, pv.name());
        pv.put(value)?;
    }
    Ok(())
}
