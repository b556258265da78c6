//! `dmm`: configure and drive DMM energy changes.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use chrono::Local;
use tracing::{error, info, warn};

use dmm_energy::calibration::{calibrate, Calibration, Mode};
use dmm_energy::config::{
    build_cli, resolve, save_params_to_config, save_snapshot, write_config, CommandKind,
    Invocation, Params, Schema,
};
use dmm_energy::context::ConfigContext;
use dmm_energy::device::{apply_positions, read_positions, EnergyChangePvs};
use dmm_energy::error::DmmError;
use dmm_energy::logging;
use dmm_energy::report::{report_positions, report_sections};

fn main() -> Result<()> {
    let ctx = ConfigContext::from_home();

    let invocation = match resolve(&ctx, std::env::args_os()) {
        Ok(Some(invocation)) => invocation,
        Ok(None) => {
            build_cli(&Schema::dmm()).print_help()?;
            return Ok(());
        }
        Err(DmmError::Cli(e)) => e.exit(),
        Err(e) => return Err(e).context("Failed to resolve parameters"),
    };
    let Invocation {
        command,
        mut params,
    } = invocation;

    if let Some(path) = logging::init(&params.logs_home, params.verbose) {
        info!("Log file: {}", path.display());
    }

    match command {
        CommandKind::Init => init(&ctx, &params),
        CommandKind::Status => {
            report_sections(&params, &command.active_sections());
            Ok(())
        }
        CommandKind::Mono | CommandKind::Pink => {
            let pvs = connect(&params.energyioc_prefix);
            change_energy(&ctx, &pvs, command, &mut params)
        }
        CommandKind::Save => {
            let pvs = connect(&params.energyioc_prefix);
            save(&ctx, &pvs, &mut params)
        }
    }
}

/// Process variables for the energy-change motors under `prefix`.
fn connect(prefix: &str) -> EnergyChangePvs {
    let pvs = EnergyChangePvs::simulated(prefix);
    if pvs.is_simulated() {
        warn!(
            "No control-system client is linked: {}* moves and readings are simulated in memory",
            prefix
        );
    }
    pvs
}

fn init(ctx: &ConfigContext, params: &Params) -> Result<()> {
    if params.config.exists() && !params.force {
        error!(
            "{} already exists. Use --force to overwrite it.",
            params.config.display()
        );
        return Ok(());
    }
    write_config(&params.config, &Schema::dmm(), ctx, None, &[])
        .with_context(|| format!("Failed to write {}", params.config.display()))?;
    info!("Created default configuration {}", params.config.display());
    Ok(())
}

fn confirm(calibration: &Calibration) -> Result<bool> {
    print!(
        "Move to {} keV instead of {} keV? [y/N] ",
        calibration.energy, calibration.requested
    );
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes" | "Yes"))
}

fn change_energy(
    ctx: &ConfigContext,
    pvs: &EnergyChangePvs,
    command: CommandKind,
    params: &mut Params,
) -> Result<()> {
    let mode = if command == CommandKind::Pink {
        Mode::Pink
    } else {
        Mode::Mono
    };
    let calibration = calibrate(&ctx.calibration_file, mode, params.energy).with_context(|| {
        format!(
            "No safe motor positions from {}",
            ctx.calibration_file.display()
        )
    })?;

    // Pink requests carry the pink-beam marker, never a calibrated energy.
    let confirm_needed = mode == Mode::Mono && !calibration.is_exact();
    if confirm_needed && !params.force && !params.testing && !confirm(&calibration)? {
        warn!("Energy change aborted");
        return Ok(());
    }

    params.apply_calibration(calibration);
    info!("Target positions for {} at {} keV", mode, calibration.energy);
    report_positions(&calibration.positions);

    if params.testing {
        warn!("Testing mode: the DMM motors will not move");
    } else {
        apply_positions(pvs, &calibration.positions)?;
    }

    save_params_to_config(ctx, params, command.sections())?;
    report_sections(&*params, &command.active_sections());
    Ok(())
}

fn save(ctx: &ConfigContext, pvs: &EnergyChangePvs, params: &mut Params) -> Result<()> {
    let positions = read_positions(pvs).context("Failed to read current beamline positions")?;
    params.positions = Some(positions);

    let mode = if params.energy < 0.0 {
        Mode::Pink
    } else {
        Mode::Mono
    };
    save_snapshot(ctx, params, mode, Local::now().naive_local())?;
    report_positions(&positions);
    Ok(())
}
