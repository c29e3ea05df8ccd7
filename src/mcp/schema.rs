//! Operation descriptors and the argument decoder.
//!
//! Every tool declares its inputs as [`ParamSpec`]s. Raw JSON arguments pass
//! through [`decode`] exactly once, producing [`DecodedArgs`] of tagged
//! scalars before any handler code runs.

use rmcp::model::JsonObject;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::BridgeError;

/// Declared kind of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Text,
    /// Any JSON number, truncated toward zero
    Integer,
    Number,
    /// Literal JSON boolean only
    Boolean,
}

impl ParamKind {
    fn json_type(self) -> &'static str {
        match self {
            ParamKind::Text => "string",
            ParamKind::Integer => "integer",
            ParamKind::Number => "number",
            ParamKind::Boolean => "boolean",
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.json_type())
    }
}

/// A decoded, strongly typed argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Text(String),
    Integer(i64),
    Number(f64),
    Boolean(bool),
}

impl ArgValue {
    pub fn kind(&self) -> ParamKind {
        match self {
            ArgValue::Text(_) => ParamKind::Text,
            ArgValue::Integer(_) => ParamKind::Integer,
            ArgValue::Number(_) => ParamKind::Number,
            ArgValue::Boolean(_) => ParamKind::Boolean,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            ArgValue::Text(s) => json!(s),
            ArgValue::Integer(i) => json!(i),
            ArgValue::Number(n) => json!(n),
            ArgValue::Boolean(b) => json!(b),
        }
    }
}

/// Declaration of one operation input.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
    pub default: Option<ArgValue>,
    pub description: &'static str,
}

impl ParamSpec {
    fn new(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: false,
            default: None,
            description,
        }
    }

    pub fn text(name: &'static str, description: &'static str) -> Self {
        Self::new(name, ParamKind::Text, description)
    }

    pub fn integer(name: &'static str, description: &'static str) -> Self {
        Self::new(name, ParamKind::Integer, description)
    }

    pub fn number(name: &'static str, description: &'static str) -> Self {
        Self::new(name, ParamKind::Number, description)
    }

    pub fn boolean(name: &'static str, description: &'static str) -> Self {
        Self::new(name, ParamKind::Boolean, description)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, value: ArgValue) -> Self {
        self.default = Some(value);
        self
    }

    pub fn default_integer(self, value: i64) -> Self {
        self.default_value(ArgValue::Integer(value))
    }

    pub fn default_text(self, value: &str) -> Self {
        self.default_value(ArgValue::Text(value.to_string()))
    }

    pub fn default_bool(self, value: bool) -> Self {
        self.default_value(ArgValue::Boolean(value))
    }

    /// Coerce one present JSON value to this parameter's kind.
    fn coerce(&self, raw: &Value) -> Result<ArgValue, BridgeError> {
        let value = match (self.kind, raw) {
            (ParamKind::Text, Value::String(s)) => Some(ArgValue::Text(s.clone())),
            (ParamKind::Integer, Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
                .map(ArgValue::Integer),
            (ParamKind::Number, Value::Number(n)) => n.as_f64().map(ArgValue::Number),
            (ParamKind::Boolean, Value::Bool(b)) => Some(ArgValue::Boolean(*b)),
            _ => None,
        };
        value.ok_or_else(|| {
            BridgeError::validation(
                self.name,
                format!("expected {}, got {}", self.kind, json_type_name(raw)),
            )
        })
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Immutable description of a named operation.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub params: Vec<ParamSpec>,
}

impl OperationDescriptor {
    pub fn new(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            params: Vec::new(),
        }
    }

    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.params.push(spec);
        self
    }

    /// Reject descriptors whose schema is internally inconsistent.
    pub fn validate(&self) -> Result<(), BridgeError> {
        let mut seen = HashSet::new();
        for spec in &self.params {
            if !seen.insert(spec.name) {
                return Err(BridgeError::Registry(format!(
                    "operation '{}' declares parameter '{}' twice",
                    self.name, spec.name
                )));
            }
            if let Some(default) = &spec.default {
                if spec.required {
                    return Err(BridgeError::Registry(format!(
                        "operation '{}': required parameter '{}' cannot have a default",
                        self.name, spec.name
                    )));
                }
                if default.kind() != spec.kind {
                    return Err(BridgeError::Registry(format!(
                        "operation '{}': default for '{}' is {}, declared {}",
                        self.name,
                        spec.name,
                        default.kind(),
                        spec.kind
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn required_params(&self) -> impl Iterator<Item = &ParamSpec> {
        self.params.iter().filter(|p| p.required)
    }

    /// JSON Schema advertised in `tools/list`.
    pub fn input_schema(&self) -> Arc<JsonObject> {
        let mut properties = Map::new();
        for spec in &self.params {
            let mut prop = Map::new();
            prop.insert("type".into(), json!(spec.kind.json_type()));
            prop.insert("description".into(), json!(spec.description));
            if let Some(default) = &spec.default {
                prop.insert("default".into(), default.to_json());
            }
            properties.insert(spec.name.to_string(), Value::Object(prop));
        }
        let required: Vec<&str> = self.required_params().map(|p| p.name).collect();

        let mut schema = Map::new();
        schema.insert("type".into(), json!("object"));
        schema.insert("properties".into(), Value::Object(properties));
        if !required.is_empty() {
            schema.insert("required".into(), json!(required));
        }
        Arc::new(schema)
    }
}

/// Arguments after schema validation. Absent optional parameters without a
/// default are simply missing from the map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedArgs {
    values: BTreeMap<&'static str, ArgValue>,
}

impl DecodedArgs {
    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.values.get(name)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(ArgValue::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Text value with surrounding whitespace removed; blank counts as absent.
    pub fn non_blank(&self, name: &str) -> Option<&str> {
        self.text(name).map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        match self.values.get(name) {
            Some(ArgValue::Integer(i)) => Some(*i),
            _ => None,
        }
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        match self.values.get(name) {
            Some(ArgValue::Number(n)) => Some(*n),
            Some(ArgValue::Integer(i)) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn boolean(&self, name: &str) -> Option<bool> {
        match self.values.get(name) {
            Some(ArgValue::Boolean(b)) => Some(*b),
            _ => None,
        }
    }

    /// Required text parameter. Blank strings are rejected here because an
    /// empty id can never address anything.
    pub fn require_text(&self, name: &str) -> Result<&str, BridgeError> {
        self.non_blank(name)
            .ok_or_else(|| BridgeError::validation(name, "must be a non-empty string"))
    }

    pub fn require_integer(&self, name: &str) -> Result<i64, BridgeError> {
        self.integer(name)
            .ok_or_else(|| BridgeError::validation(name, "missing required parameter"))
    }

    pub fn require_bool(&self, name: &str) -> Result<bool, BridgeError> {
        self.boolean(name)
            .ok_or_else(|| BridgeError::validation(name, "missing required parameter"))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Validate and coerce raw arguments against a parameter list.
///
/// Stops at the first failing parameter; every error names it.
pub fn decode(params: &[ParamSpec], raw: &JsonObject) -> Result<DecodedArgs, BridgeError> {
    let mut values = BTreeMap::new();
    for spec in params {
        match raw.get(spec.name).filter(|v| !v.is_null()) {
            Some(value) => {
                values.insert(spec.name, spec.coerce(value)?);
            }
            None if spec.required => {
                return Err(BridgeError::validation(
                    spec.name,
                    format!("missing required parameter (expected {})", spec.kind),
                ));
            }
            None => {
                if let Some(default) = &spec.default {
                    values.insert(spec.name, default.clone());
                }
            }
        }
    }
    Ok(DecodedArgs { values })
}
