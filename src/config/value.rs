//! Typed field values and the override layers built from them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single typed parameter value.
///
/// `Display` renders the on-disk INI form: booleans as `True`/`False`, floats
/// always with a fractional part, lists comma-joined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Presence-only flag.
    Bool(bool),
    /// Numeric value, e.g. an energy in keV.
    Float(f64),
    /// Free text, e.g. a path or a PV prefix.
    Text(String),
    /// Multi-valued option.
    List(Vec<String>),
}

impl FieldValue {
    /// True when the value would be written as an empty string.
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Text(s) => s.is_empty(),
            FieldValue::List(items) => items.is_empty(),
            FieldValue::Bool(_) | FieldValue::Float(_) => false,
        }
    }

    /// Values that deserve attention in a status report: `false` or the literal `"none"`.
    pub fn is_falsy_or_none(&self) -> bool {
        match self {
            FieldValue::Bool(b) => !b,
            FieldValue::Text(s) => s == "none",
            _ => false,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Bool(true) => write!(f, "True"),
            FieldValue::Bool(false) => write!(f, "False"),
            FieldValue::Float(v) => write!(f, "{}", format_float(*v)),
            FieldValue::Text(s) => write!(f, "{s}"),
            FieldValue::List(items) => write!(f, "{}", items.join(", ")),
        }
    }
}

/// Formats a float so that whole numbers keep a trailing `.0` (`20.0`, `-1.0`).
pub fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

/// Canonical key for a field name: hyphens and underscores are equivalent.
pub fn normalize_key(name: &str) -> String {
    name.replace('-', "_")
}

/// One precedence layer: normalized field name to typed value.
///
/// Serializes as a flat map so it can be fed straight into a `figment` provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Layer(BTreeMap<String, FieldValue>);

impl Layer {
    /// An empty layer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, normalizing `name`. Returns the previous value if any.
    pub fn insert(&mut self, name: &str, value: FieldValue) -> Option<FieldValue> {
        self.0.insert(normalize_key(name), value)
    }

    /// Value of `name`, hyphens and underscores alike.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.0.get(&normalize_key(name))
    }

    /// Whether `name` has a value in this layer.
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(&normalize_key(name))
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the layer holds no value.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `(normalized name, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Overlay `other` on top of `self`; `other` wins on conflicts.
    pub fn overlay(&mut self, other: &Layer) {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_ini_form() {
        assert_eq!(FieldValue::Bool(true).to_string(), "True");
        assert_eq!(FieldValue::Bool(false).to_string(), "False");
        assert_eq!(FieldValue::Float(-1.0).to_string(), "-1.0");
        assert_eq!(FieldValue::Float(20.5).to_string(), "20.5");
        assert_eq!(
            FieldValue::List(vec!["a".into(), "b".into()]).to_string(),
            "a, b"
        );
    }

    #[test]
    fn test_layer_normalizes_keys() {
        let mut layer = Layer::new();
        layer.insert("energyioc-prefix", FieldValue::Text("2bm:X:".into()));
        assert!(layer.contains("energyioc_prefix"));
        assert_eq!(
            layer.get("energyioc-prefix"),
            Some(&FieldValue::Text("2bm:X:".into()))
        );
    }

    #[test]
    fn test_overlay_later_wins() {
        let mut base = Layer::new();
        base.insert("energy", FieldValue::Float(-1.0));
        base.insert("verbose", FieldValue::Bool(false));

        let mut top = Layer::new();
        top.insert("energy", FieldValue::Float(24.9));

        base.overlay(&top);
        assert_eq!(base.get("energy"), Some(&FieldValue::Float(24.9)));
        assert_eq!(base.get("verbose"), Some(&FieldValue::Bool(false)));
    }

    #[test]
    fn test_falsy_or_none() {
        assert!(FieldValue::Bool(false).is_falsy_or_none());
        assert!(FieldValue::Text("none".into()).is_falsy_or_none());
        assert!(!FieldValue::Text("None".into()).is_falsy_or_none());
        assert!(!FieldValue::Float(0.0).is_falsy_or_none());
    }
}
