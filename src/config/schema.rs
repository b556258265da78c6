//! Schema registry: the fixed, ordered set of config sections and their fields.
//!
//! Every other config component walks this table. Sections are kept in
//! declaration order; that order drives INI layout and override token order.
//! Fields within a section are declared in the order they appear on disk.

use super::value::{normalize_key, FieldValue, Layer};
use crate::context::ConfigContext;

/// Name of the section that is always active.
pub const GENERAL: &str = "general";

/// Sections persisted together for monochromatic operation.
pub const MONO_PARAMS: &[&str] = &["energy", "energyioc"];

/// Sections persisted for pink-beam operation.
pub const PINK_PARAMS: &[&str] = &["energyioc"];

/// Energy value meaning "pink beam, no monochromator".
pub const PINK_BEAM_ENERGY: f64 = -1.0;

/// Default EPICS IOC prefix hosting the energy PV.
pub const DEFAULT_ENERGYIOC_PREFIX: &str = "2bm:MCTOptics:";

/// Semantic type of a field's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Free text or a path.
    Text,
    /// Floating-point number.
    Float,
    /// Boolean, stored as `True`/`False`.
    Flag,
    /// Comma-separated list.
    List,
}

/// How the field is expressed on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliAction {
    /// `--name=value`
    Value,
    /// `--name`, presence only
    Flag,
    /// `--name a b c`
    MultiValue,
}

/// Compiled-in default of a field.
///
/// Path defaults are resolved against the [`ConfigContext`] rather than baked in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldDefault {
    /// No default; the field is written commented out.
    None,
    /// Fixed boolean.
    Bool(bool),
    /// Fixed number.
    Float(f64),
    /// Fixed text.
    Text(&'static str),
    /// [`ConfigContext::config_file`].
    ConfigFile,
    /// [`ConfigContext::logs_home`].
    LogsHome,
}

/// Immutable description of one config field.
#[derive(Debug, Clone, Copy)]
pub struct FieldDescriptor {
    /// Hyphenated name, used as INI key and `--long` option.
    pub name: &'static str,
    /// Compiled-in default.
    pub default: FieldDefault,
    /// Value type.
    pub kind: FieldKind,
    /// Help text shown by `--help`.
    pub help: &'static str,
    /// Command-line form.
    pub action: CliAction,
    /// Value placeholder in the help output.
    pub metavar: Option<&'static str>,
}

impl FieldDescriptor {
    /// The default resolved against `ctx`, or `None` when the field has no default.
    pub fn default_value(&self, ctx: &ConfigContext) -> Option<FieldValue> {
        match self.default {
            FieldDefault::None => None,
            FieldDefault::Bool(b) => Some(FieldValue::Bool(b)),
            FieldDefault::Float(v) => Some(FieldValue::Float(v)),
            FieldDefault::Text(s) => Some(FieldValue::Text(s.to_string())),
            FieldDefault::ConfigFile => Some(FieldValue::Text(
                ctx.config_file.to_string_lossy().into_owned(),
            )),
            FieldDefault::LogsHome => Some(FieldValue::Text(
                ctx.logs_home.to_string_lossy().into_owned(),
            )),
        }
    }

    /// Parse the stored string form of this field.
    ///
    /// Flags only accept `True`/`False`; anything unparseable yields `None`.
    pub fn parse(&self, raw: &str) -> Option<FieldValue> {
        match self.kind {
            FieldKind::Flag => match raw {
                "True" => Some(FieldValue::Bool(true)),
                "False" => Some(FieldValue::Bool(false)),
                _ => None,
            },
            FieldKind::Float => raw.trim().parse().ok().map(FieldValue::Float),
            FieldKind::Text => Some(FieldValue::Text(raw.to_string())),
            FieldKind::List => Some(FieldValue::List(
                raw.split(',').map(|part| part.trim().to_string()).collect(),
            )),
        }
    }
}

/// Named, ordered group of fields.
#[derive(Debug)]
pub struct Section {
    /// INI section name.
    pub name: &'static str,
    /// Heading used by the status report.
    pub title: &'static str,
    /// Fields in on-disk order.
    pub fields: &'static [FieldDescriptor],
}

impl Section {
    /// Field called `name`, hyphens and underscores alike.
    pub fn field(&self, name: &str) -> Option<&'static FieldDescriptor> {
        let key = normalize_key(name);
        self.fields.iter().find(|f| normalize_key(f.name) == key)
    }

    /// Fields sorted by name, the order used to build command-line arguments.
    pub fn sorted_fields(&self) -> Vec<&'static FieldDescriptor> {
        let mut fields: Vec<_> = self.fields.iter().collect();
        fields.sort_by_key(|f| f.name);
        fields
    }
}

static GENERAL_FIELDS: [FieldDescriptor; 5] = [
    FieldDescriptor {
        name: "config",
        default: FieldDefault::ConfigFile,
        kind: FieldKind::Text,
        help: "File name of configuration file",
        action: CliAction::Value,
        metavar: Some("FILE"),
    },
    FieldDescriptor {
        name: "logs-home",
        default: FieldDefault::LogsHome,
        kind: FieldKind::Text,
        help: "Log file directory",
        action: CliAction::Value,
        metavar: Some("FILE"),
    },
    FieldDescriptor {
        name: "verbose",
        default: FieldDefault::Bool(false),
        kind: FieldKind::Flag,
        help: "Verbose output",
        action: CliAction::Flag,
        metavar: None,
    },
    FieldDescriptor {
        name: "testing",
        default: FieldDefault::Bool(false),
        kind: FieldKind::Flag,
        help: "Enable test mode to show DMM new motor positions. The DMM motors will not move",
        action: CliAction::Flag,
        metavar: None,
    },
    FieldDescriptor {
        name: "force",
        default: FieldDefault::Bool(false),
        kind: FieldKind::Flag,
        help: "When set the energy change will occur without a confirmation request",
        action: CliAction::Flag,
        metavar: None,
    },
];

static ENERGY_FIELDS: [FieldDescriptor; 1] = [FieldDescriptor {
    name: "energy",
    default: FieldDefault::Float(PINK_BEAM_ENERGY),
    kind: FieldKind::Float,
    help: "Desired double crystal multilayer (DMM) monochromator energy. Default (-1) = Pink beam",
    action: CliAction::Value,
    metavar: Some("FLOAT"),
}];

static ENERGYIOC_FIELDS: [FieldDescriptor; 1] = [FieldDescriptor {
    name: "energyioc-prefix",
    default: FieldDefault::Text(DEFAULT_ENERGYIOC_PREFIX),
    kind: FieldKind::Text,
    help: "The epics IOC hosting the Energy PV, i.e. '2bm:MCTOptics:'",
    action: CliAction::Value,
    metavar: Some("STRING"),
}];

static SECTIONS: [Section; 3] = [
    Section {
        name: GENERAL,
        title: "General",
        fields: &GENERAL_FIELDS,
    },
    Section {
        name: "energy",
        title: "DMM Energy",
        fields: &ENERGY_FIELDS,
    },
    Section {
        name: "energyioc",
        title: "Energy IOC",
        fields: &ENERGYIOC_FIELDS,
    },
];

/// Read-only view over an ordered list of sections.
#[derive(Debug, Clone, Copy)]
pub struct Schema {
    sections: &'static [Section],
}

impl Schema {
    /// Wrap an arbitrary section table.
    pub const fn new(sections: &'static [Section]) -> Self {
        Self { sections }
    }

    /// The monochromator schema: `general`, `energy`, `energyioc`.
    pub fn dmm() -> Self {
        Self::new(&SECTIONS)
    }

    /// All sections in declaration order.
    pub fn sections(&self) -> &'static [Section] {
        self.sections
    }

    /// Section called `name`.
    pub fn section(&self, name: &str) -> Option<&'static Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// Locate a field by (normalized) name across all sections.
    pub fn field(&self, name: &str) -> Option<(&'static Section, &'static FieldDescriptor)> {
        self.sections
            .iter()
            .find_map(|section| section.field(name).map(|field| (section, field)))
    }

    /// Every field's compiled-in default, the lowest-precedence layer.
    pub fn defaults(&self, ctx: &ConfigContext) -> Layer {
        let mut layer = Layer::new();
        for section in self.sections {
            for field in section.fields {
                if let Some(value) = field.default_value(ctx) {
                    layer.insert(field.name, value);
                }
            }
        }
        layer
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::dmm()
    }
}
