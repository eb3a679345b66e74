use crate::error::EngineError;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Where a validated value came from.
///
/// Path and query inputs arrive as strings and are coerced to their declared
/// scalar types before validation; bodies and responses are validated as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputLocation {
    Path,
    Query,
    Body,
    Response,
}

impl InputLocation {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            InputLocation::Path => "path",
            InputLocation::Query => "query",
            InputLocation::Body => "body",
            InputLocation::Response => "response",
        }
    }

    /// Whether raw values at this location are wire strings that need coercion
    #[must_use]
    pub fn coerces_strings(&self) -> bool {
        matches!(self, InputLocation::Path | InputLocation::Query)
    }
}

impl fmt::Display for InputLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One violated field.
///
/// `field` is a dot-separated path relative to the validated value; the empty
/// string means the value as a whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub field: String,
    pub kind: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(
        field: impl Into<String>,
        kind: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        ValidationIssue {
            field: field.into(),
            kind: kind.into(),
            message: message.into(),
        }
    }
}

/// Capability surface a validation backend implements.
///
/// The route engine never sees a backend's own types: routes hold
/// [`SchemaRef`]s, and the pipeline and document generator only call these
/// methods (through [`SchemaAdapter`]).
pub trait Schema: Send + Sync + fmt::Debug {
    /// Backend name used in diagnostics
    fn backend(&self) -> &'static str;

    /// Report why this schema cannot be used, if it cannot
    fn check(&self) -> Result<(), String>;

    /// Validate `raw` and return the parsed (possibly coerced) value
    fn parse(&self, raw: &Value, location: InputLocation) -> Result<Value, Vec<ValidationIssue>>;

    fn is_optional(&self) -> bool;

    fn is_nullable(&self) -> bool;

    fn description(&self) -> Option<String>;

    /// JSON-Schema-equivalent tree used verbatim in generated documents
    fn structural(&self) -> Value;

    /// Named fields of an object schema; empty for anything else
    fn fields(&self) -> Vec<(String, SchemaRef)>;
}

pub type SchemaRef = Arc<dyn Schema>;

/// Conversion into a shared schema handle.
///
/// Implemented for every [`Schema`], for existing [`SchemaRef`]s, and for raw
/// `serde_json::Value`s (interpreted as JSON Schema).
pub trait IntoSchemaRef {
    fn into_schema_ref(self) -> SchemaRef;
}

impl<S: Schema + 'static> IntoSchemaRef for S {
    fn into_schema_ref(self) -> SchemaRef {
        Arc::new(self)
    }
}

impl IntoSchemaRef for SchemaRef {
    fn into_schema_ref(self) -> SchemaRef {
        self
    }
}

impl IntoSchemaRef for Value {
    fn into_schema_ref(self) -> SchemaRef {
        Arc::new(super::JsonSchema::new(self))
    }
}

/// Guarded entry point to schema capabilities.
///
/// Every operation fails with [`EngineError::InvalidSchema`] when handed an
/// absent or malformed schema, so misconfiguration surfaces at setup instead
/// of silently skipping validation.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaAdapter;

impl SchemaAdapter {
    #[must_use]
    pub fn new() -> Self {
        SchemaAdapter
    }

    /// Validate a raw value, returning the parsed value or every violated field.
    pub fn validate(
        &self,
        schema: Option<&SchemaRef>,
        raw: &Value,
        location: InputLocation,
    ) -> Result<Value, EngineError> {
        let schema = self.guard(schema, location.as_str())?;
        schema
            .parse(raw, location)
            .map_err(|issues| EngineError::Validation { location, issues })
    }

    pub fn is_optional(&self, schema: Option<&SchemaRef>) -> Result<bool, EngineError> {
        Ok(self.guard(schema, "optionality check")?.is_optional())
    }

    pub fn is_nullable(&self, schema: Option<&SchemaRef>) -> Result<bool, EngineError> {
        Ok(self.guard(schema, "nullability check")?.is_nullable())
    }

    pub fn describe(&self, schema: Option<&SchemaRef>) -> Result<Option<String>, EngineError> {
        Ok(self.guard(schema, "description")?.description())
    }

    pub fn to_structural_schema(&self, schema: Option<&SchemaRef>) -> Result<Value, EngineError> {
        Ok(self.guard(schema, "structural schema")?.structural())
    }

    pub fn fields(
        &self,
        schema: Option<&SchemaRef>,
    ) -> Result<Vec<(String, SchemaRef)>, EngineError> {
        Ok(self.guard(schema, "field listing")?.fields())
    }

    /// Fail unless `schema` is present and usable.
    pub fn guard<'a>(
        &self,
        schema: Option<&'a SchemaRef>,
        context: &str,
    ) -> Result<&'a SchemaRef, EngineError> {
        let schema = schema.ok_or_else(|| EngineError::InvalidSchema {
            context: context.to_string(),
            reason: "schema reference is absent".to_string(),
        })?;
        schema.check().map_err(|reason| EngineError::InvalidSchema {
            context: format!("{context} ({})", schema.backend()),
            reason,
        })?;
        Ok(schema)
    }
}
