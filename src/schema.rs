//! Tool input schemas and argument validation
//!
//! Schemas are declared in the JSON-Schema-shaped form tools advertise over
//! `tools/list` ({"type": "object", "properties": ..., "required": ...}) and
//! parsed into a tagged structure so validation is plain Rust, not dynamic
//! JSON walking. Validation is strict: no coercions, "5" is not a number.

use std::collections::BTreeMap;

use serde_json::{json, Map, Value};

use crate::error::{HostError, Result};

/// Declared type of a single schema property
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyType {
    Number,
    Integer,
    String,
    Boolean,
    Object,
    Array,
}

impl PropertyType {
    /// Parse a JSON Schema type name
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "number" => Some(PropertyType::Number),
            "integer" => Some(PropertyType::Integer),
            "string" => Some(PropertyType::String),
            "boolean" => Some(PropertyType::Boolean),
            "object" => Some(PropertyType::Object),
            "array" => Some(PropertyType::Array),
            _ => None,
        }
    }

    /// JSON Schema type name
    pub fn as_str(self) -> &'static str {
        match self {
            PropertyType::Number => "number",
            PropertyType::Integer => "integer",
            PropertyType::String => "string",
            PropertyType::Boolean => "boolean",
            PropertyType::Object => "object",
            PropertyType::Array => "array",
        }
    }

    /// Strict type check, no coercion
    pub fn matches(self, value: &Value) -> bool {
        match self {
            PropertyType::Number => value.is_number(),
            // a fractional number does not satisfy integer
            PropertyType::Integer => value.is_i64() || value.is_u64(),
            PropertyType::String => value.is_string(),
            PropertyType::Boolean => value.is_boolean(),
            PropertyType::Object => value.is_object(),
            PropertyType::Array => value.is_array(),
        }
    }
}

/// Name of the JSON type a value actually has, for diagnostics
fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A single declared property
#[derive(Debug, Clone)]
pub struct PropertySpec {
    pub kind: PropertyType,
    pub description: Option<String>,
}

/// Structural description of a tool's accepted arguments
#[derive(Debug, Clone)]
pub struct ToolSchema {
    properties: BTreeMap<String, PropertySpec>,
    required: Vec<String>,
    additional_properties: bool,
}

impl ToolSchema {
    /// Parse and self-validate a JSON-Schema-shaped declaration
    ///
    /// Fails on a non-object root, unknown type names, or a `required` entry
    /// naming a property that was never declared.
    pub fn parse(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| schema_err("schema root must be an object"))?;

        match obj.get("type") {
            Some(Value::String(t)) if t == "object" => {}
            Some(other) => {
                return Err(schema_err(&format!(
                    "schema root type must be \"object\", got {}",
                    other
                )))
            }
            None => return Err(schema_err("schema root is missing \"type\"")),
        }

        let mut properties = BTreeMap::new();
        if let Some(props) = obj.get("properties") {
            let props = props
                .as_object()
                .ok_or_else(|| schema_err("\"properties\" must be an object"))?;
            for (name, decl) in props {
                properties.insert(name.clone(), parse_property(name, decl)?);
            }
        }

        let mut required = Vec::new();
        if let Some(req) = obj.get("required") {
            let req = req
                .as_array()
                .ok_or_else(|| schema_err("\"required\" must be an array"))?;
            for entry in req {
                let name = entry
                    .as_str()
                    .ok_or_else(|| schema_err("\"required\" entries must be strings"))?;
                if !properties.contains_key(name) {
                    return Err(schema_err(&format!(
                        "required property \"{}\" is not declared",
                        name
                    )));
                }
                required.push(name.to_string());
            }
        }

        let additional_properties = obj
            .get("additionalProperties")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        Ok(Self {
            properties,
            required,
            additional_properties,
        })
    }

    /// Validate an argument bundle against this schema
    ///
    /// Returns the arguments unchanged on success. The error message names
    /// the offending field so it can travel into the wire error record.
    pub fn validate<'a>(&self, arguments: &'a Value) -> Result<&'a Map<String, Value>> {
        let args = arguments.as_object().ok_or_else(|| {
            HostError::InvalidInput(format!(
                "arguments must be an object, got {}",
                type_name(arguments)
            ))
        })?;

        for name in &self.required {
            if !args.contains_key(name) {
                return Err(HostError::InvalidInput(format!(
                    "\"{}\": required property is missing",
                    name
                )));
            }
        }

        for (name, value) in args {
            match self.properties.get(name) {
                Some(spec) => {
                    if !spec.kind.matches(value) {
                        return Err(HostError::InvalidInput(format!(
                            "\"{}\": expected {}, got {}",
                            name,
                            spec.kind.as_str(),
                            type_name(value)
                        )));
                    }
                }
                None if self.additional_properties => {}
                None => {
                    return Err(HostError::InvalidInput(format!(
                        "\"{}\": unexpected property",
                        name
                    )));
                }
            }
        }

        Ok(args)
    }

    /// Render back into the JSON Schema form advertised over `tools/list`
    pub fn to_value(&self) -> Value {
        let mut props = Map::new();
        for (name, spec) in &self.properties {
            let mut decl = Map::new();
            decl.insert("type".to_string(), json!(spec.kind.as_str()));
            if let Some(desc) = &spec.description {
                decl.insert("description".to_string(), json!(desc));
            }
            props.insert(name.clone(), Value::Object(decl));
        }

        let mut out = Map::new();
        out.insert("type".to_string(), json!("object"));
        out.insert("properties".to_string(), Value::Object(props));
        if !self.required.is_empty() {
            out.insert("required".to_string(), json!(self.required));
        }
        if self.additional_properties {
            out.insert("additionalProperties".to_string(), json!(true));
        }
        Value::Object(out)
    }

    /// Names of declared properties
    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }

    /// Names of required properties
    pub fn required_names(&self) -> &[String] {
        &self.required
    }
}

fn parse_property(name: &str, decl: &Value) -> Result<PropertySpec> {
    let decl = decl
        .as_object()
        .ok_or_else(|| schema_err(&format!("property \"{}\" must be an object", name)))?;
    let type_str = decl
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| schema_err(&format!("property \"{}\" is missing \"type\"", name)))?;
    let kind = PropertyType::parse(type_str)
        .ok_or_else(|| schema_err(&format!("property \"{}\": unknown type \"{}\"", name, type_str)))?;
    let description = decl
        .get("description")
        .and_then(Value::as_str)
        .map(String::from);
    Ok(PropertySpec { kind, description })
}

fn schema_err(message: &str) -> HostError {
    HostError::InvalidSchema {
        tool: String::new(),
        message: message.to_string(),
    }
}
