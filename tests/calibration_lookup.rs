use std::path::PathBuf;

use dmm_energy::calibration::{calibrate, Mode};
use dmm_energy::config::{
    load_layer, resolve, save_params_to_config, CommandKind, FieldValue, Schema,
};
use dmm_energy::context::ConfigContext;
use dmm_energy::device::{apply_positions, read_positions, EnergyChangePvs};
use dmm_energy::error::DmmError;
use serde_json::json;
use tempfile::TempDir;

fn point(mirror_angle: f64, dmm_m2y: Option<f64>) -> serde_json::Value {
    let mut value = json!({
        "mirror_angle": mirror_angle,
        "mirror_vertical_position": -0.1,
        "dmm_usy_ob": -5.6,
        "dmm_usy_ib": -4.6,
        "dmm_dsy": -5.08,
        "dmm_usx": 82.5,
        "dmm_dsx": 82.5,
        "filter": 4,
        "table_y": 7.0,
        "flag": 5.0,
    });
    if let Some(m2y) = dmm_m2y {
        value["dmm_us_arm"] = json!(0.91);
        value["dmm_ds_arm"] = json!(0.9);
        value["dmm_m2y"] = json!(m2y);
    }
    value
}

fn write_table(table: serde_json::Value) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dmm.json");
    std::fs::write(&path, table.to_string()).unwrap();
    (dir, path)
}

fn beamline_table() -> serde_json::Value {
    json!({
        "Mono": {
            "20.0": point(2.657, Some(11.2)),
            "22.0": point(2.412, Some(12.9)),
            "24.9": point(2.133, Some(14.7)),
        },
        "Pink": {
            "30.0": point(0.0, None),
        },
    })
}

#[test]
fn test_between_two_points_picks_the_lower() {
    let (_dir, path) = write_table(beamline_table());

    let cal = calibrate(&path, Mode::Mono, 21.0).unwrap();
    assert_eq!(cal.energy, 20.0);
    assert_eq!(cal.requested, 21.0);
    assert_eq!(cal.positions.mirror_angle, 2.657);
    assert_eq!(cal.positions.get("dmm_m2y"), Some(11.2));
    assert_eq!(cal.positions.get("dmm_us_arm"), Some(0.91));
}

#[test]
fn test_nearest_wins_when_not_equidistant() {
    let (_dir, path) = write_table(beamline_table());

    assert_eq!(calibrate(&path, Mode::Mono, 24.0).unwrap().energy, 24.9);
    assert_eq!(calibrate(&path, Mode::Mono, 5.0).unwrap().energy, 20.0);
    assert_eq!(calibrate(&path, Mode::Mono, 99.0).unwrap().energy, 24.9);
}

#[test]
fn test_pink_has_no_arm_motors() {
    let (_dir, path) = write_table(beamline_table());

    for requested in [-1.0, 20.0, 30.0, 45.5] {
        let cal = calibrate(&path, Mode::Pink, requested).unwrap();
        assert!(cal.positions.arms.is_none());
        for motor in ["dmm_us_arm", "dmm_ds_arm", "dmm_m2y"] {
            assert_eq!(cal.positions.get(motor), None);
        }
    }
}

#[test]
fn test_table_defects_are_fatal() {
    assert!(matches!(
        calibrate("/nonexistent/dmm.json", Mode::Mono, 20.0),
        Err(DmmError::Io(_))
    ));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dmm.json");
    std::fs::write(&path, "{ not json").unwrap();
    assert!(matches!(
        calibrate(&path, Mode::Mono, 20.0),
        Err(DmmError::CalibrationFormat(_))
    ));

    let (_dir, path) = write_table(json!({ "Mono": {} }));
    assert!(matches!(
        calibrate(&path, Mode::Mono, 20.0),
        Err(DmmError::CalibrationEmpty(_))
    ));
}

#[test]
fn test_table_is_reloaded_on_every_call() {
    let (_dir, path) = write_table(beamline_table());
    assert_eq!(calibrate(&path, Mode::Mono, 30.0).unwrap().energy, 24.9);

    std::fs::write(
        &path,
        json!({ "Mono": { "30.0": point(1.9, Some(16.0)) } }).to_string(),
    )
    .unwrap();
    assert_eq!(calibrate(&path, Mode::Mono, 30.0).unwrap().energy, 30.0);
}

#[test]
fn test_energy_change_updates_params_device_and_config() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = ConfigContext::with_root(dir.path());
    std::fs::create_dir_all(&ctx.logs_home).unwrap();
    std::fs::write(&ctx.calibration_file, beamline_table().to_string()).unwrap();

    let mut params = resolve(&ctx, ["dmm", "mono", "--energy", "23"])
        .unwrap()
        .unwrap()
        .params;
    let cal = calibrate(&ctx.calibration_file, Mode::Mono, params.energy).unwrap();
    params.apply_calibration(cal);
    assert_eq!(params.energy, 22.0);

    let pvs = EnergyChangePvs::simulated(&params.energyioc_prefix);
    apply_positions(&pvs, params.positions.as_ref().unwrap()).unwrap();
    assert_eq!(read_positions(&pvs).unwrap(), cal.positions);

    save_params_to_config(&ctx, &params, CommandKind::Mono.sections()).unwrap();
    let saved = load_layer(&Schema::dmm(), &ctx.config_file);
    assert_eq!(saved.get("energy"), Some(&FieldValue::Float(22.0)));
}

#[test]
fn test_pink_change_keeps_pink_marker_for_next_save() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = ConfigContext::with_root(dir.path());
    std::fs::create_dir_all(&ctx.logs_home).unwrap();
    std::fs::write(&ctx.calibration_file, beamline_table().to_string()).unwrap();
    std::fs::write(&ctx.config_file, "[energy]\nenergy = 24.9\n").unwrap();

    let invocation = resolve(&ctx, ["dmm", "pink"]).unwrap().unwrap();
    let mut params = invocation.params;
    let cal = calibrate(&ctx.calibration_file, Mode::Pink, params.energy).unwrap();
    assert_eq!(cal.energy, 30.0);
    params.apply_calibration(cal);

    save_params_to_config(&ctx, &params, invocation.command.sections()).unwrap();
    let saved = load_layer(&Schema::dmm(), &ctx.config_file);
    assert_eq!(saved.get("energy"), Some(&FieldValue::Float(-1.0)));

    let next = resolve(&ctx, ["dmm", "save"]).unwrap().unwrap().params;
    assert_eq!(next.energy, -1.0);
}
