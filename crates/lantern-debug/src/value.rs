//! Inspection-facing value model.
//!
//! Hosts convert their live values into [`Value`] when a frame is inspected.
//! The debugger never mutates values; it only classifies and renders them.

use std::fmt::Write as _;

use indexmap::IndexMap;
use smol_str::SmolStr;

/// A structured object with named fields and a runtime type name.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectValue {
    /// Runtime type identifier, used for handler lookup.
    pub type_name: SmolStr,
    /// Named fields in declaration order.
    pub fields: IndexMap<SmolStr, Value>,
}

impl ObjectValue {
    #[must_use]
    pub fn new(type_name: impl Into<SmolStr>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: IndexMap::new(),
        }
    }

    /// Builder-style field insertion.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<SmolStr>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// A live value as seen by the inspector.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    /// Insertion-ordered mapping with arbitrary keys.
    Map(Vec<(Value, Value)>),
    Object(ObjectValue),
    /// Host handle without inspectable structure.
    Opaque { type_name: SmolStr, repr: String },
}

impl Value {
    /// Runtime type identifier.
    #[must_use]
    pub fn type_name(&self) -> &str {
        match self {
            Value::Null => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Object(object) => object.type_name.as_str(),
            Value::Opaque { type_name, .. } => type_name.as_str(),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(text) => Some(text),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Int(value) => Some(*value as f64),
            Value::Float(value) => Some(*value),
            _ => None,
        }
    }

    /// Truthiness used by hosts for conditions.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(value) => *value,
            Value::Int(value) => *value != 0,
            Value::Float(value) => *value != 0.0,
            Value::Str(text) => !text.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Map(entries) => !entries.is_empty(),
            Value::Object(_) | Value::Opaque { .. } => true,
        }
    }

    /// Key text used for child names: strings are used as-is.
    #[must_use]
    pub fn key_text(&self) -> String {
        match self {
            Value::Str(text) => text.clone(),
            other => other.repr(),
        }
    }

    /// Printable representation. Strings are quoted and escaped, so the
    /// result never spans multiple lines.
    #[must_use]
    pub fn repr(&self) -> String {
        let mut out = String::new();
        write_repr(&mut out, self);
        out
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<ObjectValue> for Value {
    fn from(value: ObjectValue) -> Self {
        Value::Object(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

fn write_repr(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("nil"),
        Value::Bool(value) => out.push_str(if *value { "true" } else { "false" }),
        Value::Int(value) => {
            let _ = write!(out, "{value}");
        }
        Value::Float(value) => {
            if value.fract() == 0.0 && value.is_finite() {
                let _ = write!(out, "{value:.1}");
            } else {
                let _ = write!(out, "{value}");
            }
        }
        Value::Str(text) => {
            let _ = write!(out, "{text:?}");
        }
        Value::List(items) => {
            out.push('[');
            for (idx, item) in items.iter().enumerate() {
                if idx > 0 {
                    out.push_str(", ");
                }
                write_repr(out, item);
            }
            out.push(']');
        }
        Value::Map(entries) => {
            out.push('{');
            for (idx, (key, item)) in entries.iter().enumerate() {
                if idx > 0 {
                    out.push_str(", ");
                }
                write_repr(out, key);
                out.push_str(": ");
                write_repr(out, item);
            }
            out.push('}');
        }
        Value::Object(object) => {
            let _ = write!(out, "<{} object>", object.type_name);
        }
        Value::Opaque { repr, .. } => out.push_str(repr),
    }
}
