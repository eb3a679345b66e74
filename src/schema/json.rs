//! JSON Schema backend built on the `jsonschema` crate.
//!
//! Schemas are compiled once at construction. Every validator error becomes
//! one [`ValidationIssue`]: its instance path is turned into a dotted field
//! (`address.zip`, `tags.2`) and its failing keyword becomes the issue kind.
//! `required` and `additionalProperties` errors name the missing or
//! unexpected property itself.

use super::core::{InputLocation, Schema, SchemaRef, ValidationIssue};
use crate::error::EngineError;
use jsonschema::error::ValidationErrorKind;
use jsonschema::{ValidationError, Validator};
use serde_json::{Map, Number, Value};
use std::fmt;
use std::sync::Arc;

/// A JSON Schema document plus its compiled validators.
#[derive(Clone)]
pub struct JsonSchema {
    raw: Value,
    optional: bool,
    compiled: Result<Arc<Validator>, String>,
}

impl JsonSchema {
    /// Wrap a schema document. Compilation errors are kept and reported by
    /// [`Schema::check`], which route construction calls.
    #[must_use]
    pub fn new(raw: Value) -> Self {
        Self::with_optional(raw, false)
    }

    /// Wrap a schema document, failing immediately if it does not compile.
    pub fn try_new(raw: Value) -> Result<Self, EngineError> {
        let schema = Self::new(raw);
        schema
            .check()
            .map_err(|reason| EngineError::InvalidSchema {
                context: "json schema".to_string(),
                reason,
            })?;
        Ok(schema)
    }

    fn with_optional(raw: Value, optional: bool) -> Self {
        let compiled = compile(&raw);
        Self {
            raw,
            optional,
            compiled,
        }
    }

    /// The wrapped schema document
    #[must_use]
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    fn required(&self) -> Vec<&str> {
        self.raw
            .get("required")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }
}

impl fmt::Debug for JsonSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonSchema")
            .field("raw", &self.raw)
            .field("optional", &self.optional)
            .field("compiled", &self.compiled.is_ok())
            .finish()
    }
}

impl Schema for JsonSchema {
    fn backend(&self) -> &'static str {
        "jsonschema"
    }

    fn check(&self) -> Result<(), String> {
        self.compiled.as_ref().map(|_| ()).map_err(Clone::clone)
    }

    fn parse(&self, raw: &Value, location: InputLocation) -> Result<Value, Vec<ValidationIssue>> {
        let validator = self
            .compiled
            .as_ref()
            .map_err(|reason| vec![ValidationIssue::new("", "invalid_schema", reason.clone())])?;

        let value = if location.coerces_strings() {
            coerce(&self.raw, raw)
        } else {
            raw.clone()
        };

        if validator.is_valid(&value) {
            return Ok(value);
        }
        let issues: Vec<ValidationIssue> = validator
            .iter_errors(&value)
            .flat_map(|err| to_issues(&err))
            .collect();
        if issues.is_empty() {
            // is_valid and iter_errors disagreeing should not happen; never pass invalid data
            return Err(vec![ValidationIssue::new(
                "",
                "value_error",
                "value does not match schema",
            )]);
        }
        Err(issues)
    }

    fn is_optional(&self) -> bool {
        self.optional || self.raw.get("default").is_some()
    }

    fn is_nullable(&self) -> bool {
        if self.raw.get("nullable").and_then(Value::as_bool) == Some(true) {
            return true;
        }
        if declares_type(&self.raw, "null") {
            return true;
        }
        ["anyOf", "oneOf"].iter().any(|key| {
            self.raw
                .get(*key)
                .and_then(Value::as_array)
                .is_some_and(|branches| branches.iter().any(|b| declares_type(b, "null")))
        })
    }

    fn description(&self) -> Option<String> {
        self.raw
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    fn structural(&self) -> Value {
        self.raw.clone()
    }

    fn fields(&self) -> Vec<(String, SchemaRef)> {
        let required = self.required();
        self.raw
            .get("properties")
            .and_then(Value::as_object)
            .map(|props| {
                props
                    .iter()
                    .map(|(name, sub)| {
                        let optional = !required.contains(&name.as_str());
                        let schema: SchemaRef =
                            Arc::new(JsonSchema::with_optional(sub.clone(), optional));
                        (name.clone(), schema)
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn compile(raw: &Value) -> Result<Arc<Validator>, String> {
    if !raw.is_object() && !raw.is_boolean() {
        return Err(format!("schema must be a JSON object, got {raw}"));
    }
    jsonschema::validator_for(raw)
        .map(Arc::new)
        .map_err(|e| e.to_string())
}

/// One issue per violated field.
fn to_issues(err: &ValidationError<'_>) -> Vec<ValidationIssue> {
    let path: Vec<String> = err
        .instance_path()
        .iter()
        .map(|segment| segment.to_string())
        .collect();

    match err.kind() {
        ValidationErrorKind::Required { property } => {
            let name = property
                .as_str()
                .map_or_else(|| property.to_string(), str::to_string);
            vec![ValidationIssue::new(
                dotted(&path, Some(name.as_str())),
                "missing",
                "field required",
            )]
        }
        ValidationErrorKind::AdditionalProperties { unexpected }
        | ValidationErrorKind::UnevaluatedProperties { unexpected }
            if !unexpected.is_empty() =>
        {
            let keyword = err.kind().keyword();
            unexpected
                .iter()
                .map(|name| {
                    ValidationIssue::new(
                        dotted(&path, Some(name.as_str())),
                        keyword,
                        "extra field not permitted",
                    )
                })
                .collect()
        }
        kind => vec![ValidationIssue::new(
            dotted(&path, None),
            kind.keyword(),
            err.to_string(),
        )],
    }
}

fn dotted(path: &[String], leaf: Option<&str>) -> String {
    let mut field = path.join(".");
    if let Some(leaf) = leaf {
        if !field.is_empty() {
            field.push('.');
        }
        field.push_str(leaf);
    }
    field
}

fn declares_type(schema: &Value, ty: &str) -> bool {
    match schema.get("type") {
        Some(Value::String(s)) => s == ty,
        Some(Value::Array(types)) => types.iter().any(|t| t.as_str() == Some(ty)),
        _ => false,
    }
}

fn declared_types(schema: &Value) -> Vec<&str> {
    match schema.get("type") {
        Some(Value::String(s)) => vec![s.as_str()],
        Some(Value::Array(types)) => types.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

/// Convert wire strings into the scalar types the schema declares.
///
/// Values that cannot be converted are left untouched so the validator
/// reports them with its own message.
fn coerce(schema: &Value, value: &Value) -> Value {
    match value {
        Value::Object(object) => {
            let Some(props) = schema.get("properties").and_then(Value::as_object) else {
                return value.clone();
            };
            let coerced: Map<String, Value> = object
                .iter()
                .map(|(k, v)| {
                    let v = props.get(k).map_or_else(|| v.clone(), |sub| coerce(sub, v));
                    (k.clone(), v)
                })
                .collect();
            Value::Object(coerced)
        }
        Value::Array(items) => {
            if declares_type(schema, "array") {
                let item_schema = schema.get("items").cloned().unwrap_or(Value::Bool(true));
                Value::Array(items.iter().map(|i| coerce(&item_schema, i)).collect())
            } else {
                // Repeated query key for a scalar field: last value wins
                items.last().map_or(Value::Null, |last| coerce(schema, last))
            }
        }
        Value::String(s) => {
            if declares_type(schema, "array") {
                let item_schema = schema.get("items").cloned().unwrap_or(Value::Bool(true));
                return Value::Array(vec![coerce(&item_schema, value)]);
            }
            declared_types(schema)
                .into_iter()
                .find_map(|ty| coerce_scalar(ty, s))
                .unwrap_or_else(|| value.clone())
        }
        _ => value.clone(),
    }
}

fn coerce_scalar(ty: &str, raw: &str) -> Option<Value> {
    let s = raw.trim();
    match ty {
        "string" => Some(Value::String(raw.to_string())),
        "integer" => s.parse::<i64>().ok().map(Value::from),
        "number" => s
            .parse::<i64>()
            .ok()
            .map(Value::from)
            .or_else(|| s.parse::<f64>().ok().and_then(Number::from_f64).map(Value::Number)),
        "boolean" => match s.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(Value::Bool(true)),
            "false" | "0" | "no" | "off" => Some(Value::Bool(false)),
            _ => None,
        },
        "null" if s.is_empty() || s == "null" => Some(Value::Null),
        _ => None,
    }
}
