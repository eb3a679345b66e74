use super::document::{
    Components, Document, Info, MediaType, Operation, Parameter, ParameterLocation, PathItem,
    RequestBody, Response, Server, OPENAPI_VERSION,
};
use crate::error::EngineError;
use crate::route::Route;
use crate::schema::{SchemaAdapter, SchemaRef};
use http::StatusCode;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Media type of every structured request and response body
pub const JSON_MEDIA_TYPE: &str = "application/json";

const VALIDATION_ERROR_REF: &str = "#/components/schemas/HTTPValidationError";

/// Document-level information supplied by the application.
///
/// `title` and `version` are mandatory at generation time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentInfo {
    pub title: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
    pub servers: Vec<Server>,
}

impl DocumentInfo {
    #[must_use]
    pub fn new(title: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            version: Some(version.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn server(mut self, url: impl Into<String>) -> Self {
        self.servers.push(Server {
            url: url.into(),
            description: None,
        });
        self
    }
}

/// Anything that can hand out the current document and per-route schemas.
///
/// The engine implements this; handlers reach it through
/// [`crate::route::RequestContext::introspection`].
pub trait Introspect: Send + Sync {
    /// Generate the document from the current registry contents
    fn document(&self) -> Result<Document, EngineError>;

    /// Schema summary of the route with this operation id
    fn route_schema(&self, operation_id: &str) -> Option<Result<Value, EngineError>>;
}

/// Build the interface description for `routes`.
///
/// Pure function of its inputs: the same routes and info always produce the
/// same document. Routes declared with `include_in_schema(false)` are skipped.
///
/// Fails when title or version is missing or blank, or when the sequence
/// repeats a (method, path) pair or an operation id.
pub fn generate<'a, I>(routes: I, info: &DocumentInfo) -> Result<Document, EngineError>
where
    I: IntoIterator<Item = &'a Arc<Route>>,
{
    let title = required_info(info.title.as_deref(), "title")?;
    let version = required_info(info.version.as_deref(), "version")?;
    let adapter = SchemaAdapter::new();

    let mut paths: BTreeMap<String, PathItem> = BTreeMap::new();
    let mut operation_ids = HashSet::new();
    let mut needs_validation_schemas = false;
    let mut count = 0usize;

    for route in routes {
        if route.metadata().hidden {
            continue;
        }
        if !operation_ids.insert(route.operation_id()) {
            return Err(EngineError::Configuration(format!(
                "operation id '{}' appears more than once in the route sequence",
                route.operation_id()
            )));
        }
        let method = route.method().as_str().to_ascii_lowercase();
        let item = paths.entry(route.path().to_string()).or_default();
        if item.contains_key(&method) {
            return Err(EngineError::Configuration(format!(
                "route {} appears more than once in the route sequence",
                route.label()
            )));
        }
        let operation = build_operation(&adapter, route)?;
        needs_validation_schemas |= operation.responses.contains_key("422");
        item.insert(method, operation);
        count += 1;
    }

    debug!(routes_count = count, title = %title, version = %version, "Document generated");

    Ok(Document {
        openapi: OPENAPI_VERSION.to_string(),
        info: Info {
            title,
            version,
            description: info.description.clone(),
        },
        servers: info.servers.clone(),
        paths,
        components: needs_validation_schemas.then(validation_components),
    })
}

fn required_info(value: Option<&str>, field: &str) -> Result<String, EngineError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(EngineError::Configuration(format!(
            "document info.{field} is required"
        ))),
    }
}

fn build_operation(adapter: &SchemaAdapter, route: &Route) -> Result<Operation, EngineError> {
    let mut parameters = path_parameters(adapter, route)?;
    if let Some(query) = route.query_schema() {
        for (name, field) in adapter.fields(Some(query))? {
            parameters.push(parameter(adapter, name, &field, ParameterLocation::Query)?);
        }
    }

    let request_body = route
        .body_schema()
        .map(|schema| -> Result<RequestBody, EngineError> {
            Ok(RequestBody {
                required: true,
                content: json_content(adapter.to_structural_schema(Some(schema))?),
            })
        })
        .transpose()?;

    let mut responses = BTreeMap::new();
    let content = match route.response_schema() {
        Some(schema) => json_content(adapter.to_structural_schema(Some(schema))?),
        None => BTreeMap::new(),
    };
    responses.insert(
        route.status().as_str().to_string(),
        Response {
            description: reason(route.status()),
            content,
        },
    );
    let has_inputs = route.params_schema().is_some()
        || route.query_schema().is_some()
        || route.body_schema().is_some();
    if has_inputs {
        responses
            .entry(StatusCode::UNPROCESSABLE_ENTITY.as_str().to_string())
            .or_insert_with(|| Response {
                description: "Validation Error".to_string(),
                content: json_content(json!({ "$ref": VALIDATION_ERROR_REF })),
            });
    }

    let metadata = route.metadata();
    Ok(Operation {
        operation_id: metadata.operation_id.clone(),
        summary: metadata.summary.clone(),
        description: metadata.description.clone(),
        tags: metadata.tags.clone(),
        parameters,
        request_body,
        responses,
        deprecated: metadata.deprecated,
    })
}

/// One parameter per template segment, in template order.
///
/// Path parameters are always required: a matched path carries every segment.
fn path_parameters(adapter: &SchemaAdapter, route: &Route) -> Result<Vec<Parameter>, EngineError> {
    let fields = match route.params_schema() {
        Some(schema) => adapter.fields(Some(schema))?,
        None => Vec::new(),
    };
    route
        .template()
        .param_names()
        .map(|name| {
            let Some((_, field)) = fields.iter().find(|(n, _)| n == name) else {
                return Ok(Parameter {
                    name: name.to_string(),
                    location: ParameterLocation::Path,
                    required: true,
                    schema: json!({ "type": "string" }),
                    description: None,
                });
            };
            let mut param = parameter(adapter, name.to_string(), field, ParameterLocation::Path)?;
            param.required = true;
            Ok(param)
        })
        .collect()
}

fn parameter(
    adapter: &SchemaAdapter,
    name: String,
    field: &SchemaRef,
    location: ParameterLocation,
) -> Result<Parameter, EngineError> {
    Ok(Parameter {
        name,
        location,
        required: !adapter.is_optional(Some(field))?,
        schema: adapter.to_structural_schema(Some(field))?,
        description: adapter.describe(Some(field))?,
    })
}

fn json_content(schema: Value) -> BTreeMap<String, MediaType> {
    BTreeMap::from([(JSON_MEDIA_TYPE.to_string(), MediaType { schema })])
}

fn reason(status: StatusCode) -> String {
    status
        .canonical_reason()
        .unwrap_or("Successful Response")
        .to_string()
}

fn validation_components() -> Components {
    Components {
        schemas: BTreeMap::from([
            (
                "HTTPValidationError".to_string(),
                json!({
                    "title": "HTTPValidationError",
                    "type": "object",
                    "properties": {
                        "status": { "type": "integer" },
                        "detail": { "type": "string" },
                        "errors": {
                            "type": "array",
                            "items": { "$ref": "#/components/schemas/ValidationError" }
                        }
                    },
                    "required": ["status", "detail"]
                }),
            ),
            (
                "ValidationError".to_string(),
                json!({
                    "title": "ValidationError",
                    "type": "object",
                    "properties": {
                        "loc": { "type": "array", "items": { "type": "string" } },
                        "msg": { "type": "string" },
                        "type": { "type": "string" }
                    },
                    "required": ["loc", "msg", "type"]
                }),
            ),
        ]),
    }
}

/// Summary of one route's declared contract, served by the schema
/// introspection endpoint.
pub fn route_schema(route: &Route) -> Result<Value, EngineError> {
    let adapter = SchemaAdapter::new();
    let structural = |schema: Option<&SchemaRef>| -> Result<Value, EngineError> {
        match schema {
            Some(schema) => adapter.to_structural_schema(Some(schema)),
            None => Ok(Value::Null),
        }
    };
    let dependencies: Vec<Value> = route
        .dependencies()
        .iter()
        .map(|(name, dep)| {
            json!({
                "name": name,
                "lifetime": dep.lifetime().as_str(),
                "requires": dep.required(),
            })
        })
        .collect();

    Ok(json!({
        "operationId": route.operation_id(),
        "method": route.method().as_str(),
        "path": route.path(),
        "status": route.status().as_u16(),
        "params": structural(route.params_schema())?,
        "query": structural(route.query_schema())?,
        "body": structural(route.body_schema())?,
        "response": structural(route.response_schema())?,
        "dependencies": dependencies,
        "background": route.background_enabled(),
    }))
}
