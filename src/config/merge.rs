//! Argument merger: defaults, config file and command line, in that order.
//!
//! The command line interface is generated from the schema, one sub-command
//! per [`CommandKind`]. Arguments carry no clap-side defaults, so the command
//! line layer holds exactly the options the operator typed. The config file
//! named by `--config` (or the context default) sits between the compiled-in
//! defaults and that layer.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::error::ErrorKind;
use clap::parser::ValueSource;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use tracing::debug;

use super::loader::load_layer;
use super::params::Params;
use super::schema::{
    CliAction, FieldDescriptor, FieldKind, Schema, GENERAL, MONO_PARAMS, PINK_PARAMS,
};
use super::value::{FieldValue, Layer};
use crate::context::ConfigContext;
use crate::error::AppResult;

/// Sub-commands of the `dmm` tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// Write a default config file.
    Init,
    /// Report the resolved parameters.
    Status,
    /// Monochromatic energy change.
    Mono,
    /// Switch to pink beam.
    Pink,
    /// Snapshot live positions into a config file.
    Save,
}

impl CommandKind {
    /// Every command, in help order.
    pub const ALL: [CommandKind; 5] = [
        CommandKind::Init,
        CommandKind::Status,
        CommandKind::Mono,
        CommandKind::Pink,
        CommandKind::Save,
    ];

    /// Sub-command name on the command line.
    pub fn name(self) -> &'static str {
        match self {
            CommandKind::Init => "init",
            CommandKind::Status => "status",
            CommandKind::Mono => "mono",
            CommandKind::Pink => "pink",
            CommandKind::Save => "save",
        }
    }

    fn about(self) -> &'static str {
        match self {
            CommandKind::Init => "Create a configuration file with default values",
            CommandKind::Status => "Show the resolved DMM energy settings",
            CommandKind::Mono => "Move the DMM to the calibrated position nearest --energy",
            CommandKind::Pink => "Move the beamline to the pink beam configuration",
            CommandKind::Save => "Save the current beamline positions to a time-stamped config file",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }

    /// Sections this command persists, not counting `general`.
    pub fn sections(self) -> &'static [&'static str] {
        match self {
            CommandKind::Init => &[],
            CommandKind::Pink => PINK_PARAMS,
            CommandKind::Status | CommandKind::Mono | CommandKind::Save => MONO_PARAMS,
        }
    }

    /// Sections whose options the command accepts: its own plus `general`.
    pub fn active_sections(self) -> Vec<&'static str> {
        let mut sections = self.sections().to_vec();
        sections.push(GENERAL);
        sections
    }
}

/// Outcome of a successful resolution.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Selected sub-command.
    pub command: CommandKind,
    /// Parameters after merging all layers.
    pub params: Params,
}

fn field_arg(field: &'static FieldDescriptor) -> Arg {
    let mut arg = Arg::new(field.name).long(field.name).help(field.help);
    if let Some(metavar) = field.metavar {
        arg = arg.value_name(metavar);
    }
    match (field.action, field.kind) {
        (CliAction::Flag, _) => arg.action(ArgAction::SetTrue),
        (CliAction::MultiValue, _) => arg.action(ArgAction::Append).num_args(1..),
        (CliAction::Value, FieldKind::Float) => arg
            .action(ArgAction::Set)
            .value_parser(value_parser!(f64))
            .allow_negative_numbers(true),
        (CliAction::Value, _) => arg.action(ArgAction::Set),
    }
}

fn section_args(schema: &Schema, sections: &[&str]) -> Vec<Arg> {
    sections
        .iter()
        .filter_map(|name| schema.section(name))
        .flat_map(|section| section.sorted_fields())
        .map(field_arg)
        .collect()
}

/// Build the `dmm` command line interface from `schema`.
pub fn build_cli(schema: &Schema) -> Command {
    let mut cli = Command::new("dmm")
        .about("Double crystal multilayer monochromator (DMM) energy control")
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand_required(true)
        .arg_required_else_help(true);
    for command in CommandKind::ALL {
        cli = cli.subcommand(
            Command::new(command.name())
                .about(command.about())
                .args(section_args(schema, &command.active_sections())),
        );
    }
    cli
}

/// Options the operator actually typed, as a typed layer.
fn typed_layer(schema: &Schema, sections: &[&str], matches: &ArgMatches) -> Layer {
    let mut layer = Layer::new();
    let fields = sections
        .iter()
        .filter_map(|name| schema.section(name))
        .flat_map(|section| section.fields.iter());

    for field in fields {
        if matches.value_source(field.name) != Some(ValueSource::CommandLine) {
            continue;
        }
        let value = match (field.action, field.kind) {
            (CliAction::Flag, _) => Some(FieldValue::Bool(matches.get_flag(field.name))),
            (CliAction::MultiValue, _) => matches
                .get_many::<String>(field.name)
                .map(|values| FieldValue::List(values.cloned().collect())),
            (CliAction::Value, FieldKind::Float) => {
                matches.get_one::<f64>(field.name).copied().map(FieldValue::Float)
            }
            (CliAction::Value, _) => matches
                .get_one::<String>(field.name)
                .cloned()
                .map(FieldValue::Text),
        };
        if let Some(value) = value {
            layer.insert(field.name, value);
        }
    }
    layer
}

/// Parse `argv` (program name first) into the selected command and its layer.
pub fn parse_command_line<I, T>(schema: &Schema, argv: I) -> AppResult<(CommandKind, Layer)>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let mut cli = build_cli(schema);
    let matches = cli.try_get_matches_from_mut(argv)?;

    let Some((name, sub_matches)) = matches.subcommand() else {
        return Err(cli
            .error(ErrorKind::MissingSubcommand, "a command is required")
            .into());
    };
    let Some(command) = CommandKind::from_name(name) else {
        return Err(cli
            .error(ErrorKind::InvalidSubcommand, format!("unknown command '{name}'"))
            .into());
    };
    let layer = typed_layer(schema, &command.active_sections(), sub_matches);
    Ok((command, layer))
}

/// Keep only the fields that belong to `sections`.
fn restrict(schema: &Schema, layer: &Layer, sections: &[&str]) -> Layer {
    let mut restricted = Layer::new();
    for section in sections.iter().filter_map(|name| schema.section(name)) {
        for field in section.fields {
            if let Some(value) = layer.get(field.name) {
                restricted.insert(field.name, value.clone());
            }
        }
    }
    restricted
}

/// Resolve the full parameter set for this invocation.
///
/// Precedence, lowest to highest: compiled-in defaults, the config file, the
/// command line. Returns `Ok(None)` when `argv` holds nothing but the program
/// name; no defaults are parsed in that case.
pub fn resolve<I, T>(ctx: &ConfigContext, argv: I) -> AppResult<Option<Invocation>>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let argv: Vec<OsString> = argv.into_iter().map(Into::into).collect();
    if argv.len() <= 1 {
        return Ok(None);
    }

    let schema = Schema::dmm();
    let (command, cli_layer) = parse_command_line(&schema, argv)?;

    let config_file = match cli_layer.get("config") {
        Some(FieldValue::Text(path)) => PathBuf::from(path),
        _ => ctx.config_file.clone(),
    };
    let active = command.active_sections();
    let file_layer = restrict(&schema, &load_layer(&schema, &config_file), &active);
    debug!(
        "Resolving '{}' with {} override(s) from {} and {} from the command line",
        command.name(),
        file_layer.len(),
        config_file.display(),
        cli_layer.len()
    );

    let defaults = schema.defaults(ctx);
    let params = Params::from_layers(&[&defaults, &file_layer, &cli_layer])?;
    Ok(Some(Invocation { command, params }))
}
