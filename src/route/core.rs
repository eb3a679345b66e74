use super::context::RequestContext;
use super::template::PathTemplate;
use crate::dependency::Dependency;
use crate::error::{EngineError, HandlerError};
use crate::schema::{IntoSchemaRef, SchemaAdapter, SchemaRef};
use futures::future::BoxFuture;
use http::{Method, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Future returned by a type-erased handler
pub type HandlerFuture = BoxFuture<'static, Result<Value, HandlerError>>;

/// Type-erased route handler: takes the request context, yields a JSON value
pub type Handler = Arc<dyn Fn(RequestContext) -> HandlerFuture + Send + Sync>;

/// Documentation-only metadata; the request pipeline never reads it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteMetadata {
    pub tags: Vec<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub operation_id: String,
    pub deprecated: bool,
    /// Left out of generated documents (still routable and introspectable)
    pub hidden: bool,
}

/// Options accepted when declaring a route.
///
/// Every option is independent and optional except the handler; building a
/// [`Route`] without one fails with [`EngineError::MissingHandler`].
///
/// ```rust
/// use brrtapi::route::{Route, RouteConfig};
/// use http::Method;
/// use serde_json::json;
///
/// let route = Route::new(
///     Method::GET,
///     "/users/{id}",
///     RouteConfig::new()
///         .params(json!({
///             "type": "object",
///             "properties": { "id": { "type": "integer" } },
///             "required": ["id"]
///         }))
///         .summary("Fetch one user")
///         .handler(|ctx| async move { Ok(json!({ "id": ctx.params()["id"] })) }),
/// )
/// .unwrap();
/// assert_eq!(route.operation_id(), "get_users_id");
/// ```
#[derive(Default)]
pub struct RouteConfig {
    params: Option<SchemaRef>,
    query: Option<SchemaRef>,
    body: Option<SchemaRef>,
    response: Option<SchemaRef>,
    status: Option<u16>,
    dependencies: Vec<(String, Dependency)>,
    background: bool,
    handler: Option<Handler>,
    tags: Vec<String>,
    summary: Option<String>,
    description: Option<String>,
    operation_id: Option<String>,
    deprecated: bool,
    hidden: bool,
}

impl RouteConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schema of the path parameters; its field names must equal the template's
    #[must_use]
    pub fn params(mut self, schema: impl IntoSchemaRef) -> Self {
        self.params = Some(schema.into_schema_ref());
        self
    }

    #[must_use]
    pub fn query(mut self, schema: impl IntoSchemaRef) -> Self {
        self.query = Some(schema.into_schema_ref());
        self
    }

    #[must_use]
    pub fn body(mut self, schema: impl IntoSchemaRef) -> Self {
        self.body = Some(schema.into_schema_ref());
        self
    }

    #[must_use]
    pub fn response(mut self, schema: impl IntoSchemaRef) -> Self {
        self.response = Some(schema.into_schema_ref());
        self
    }

    /// Success status code (default 200)
    #[must_use]
    pub fn status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Declare a dependency; resolution follows declaration order.
    #[must_use]
    pub fn dependency(mut self, name: impl Into<String>, dependency: Dependency) -> Self {
        let name = name.into();
        self.dependencies.retain(|(existing, _)| existing != &name);
        self.dependencies.push((name, dependency));
        self
    }

    /// Allow the handler to submit background tasks
    #[must_use]
    pub fn background(mut self, enabled: bool) -> Self {
        self.background = enabled;
        self
    }

    /// Set the handler.
    ///
    /// Any serializable output is accepted and converted to JSON once the
    /// handler returns.
    #[must_use]
    pub fn handler<F, Fut, T>(mut self, handler: F) -> Self
    where
        F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, HandlerError>> + Send + 'static,
        T: Serialize,
    {
        let handler: Handler = Arc::new(move |ctx: RequestContext| -> HandlerFuture {
            let fut = handler(ctx);
            Box::pin(async move {
                let output = fut.await?;
                Ok(serde_json::to_value(output)?)
            })
        });
        self.handler = Some(handler);
        self
    }

    /// Set an already type-erased handler
    #[must_use]
    pub fn raw_handler(mut self, handler: Handler) -> Self {
        self.handler = Some(handler);
        self
    }

    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    #[must_use]
    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn operation_id(mut self, operation_id: impl Into<String>) -> Self {
        self.operation_id = Some(operation_id.into());
        self
    }

    #[must_use]
    pub fn deprecated(mut self, deprecated: bool) -> Self {
        self.deprecated = deprecated;
        self
    }

    /// Whether the route appears in generated documents (default true)
    #[must_use]
    pub fn include_in_schema(mut self, include: bool) -> Self {
        self.hidden = !include;
        self
    }
}

/// One declared endpoint. Immutable once constructed.
pub struct Route {
    method: Method,
    template: PathTemplate,
    params: Option<SchemaRef>,
    query: Option<SchemaRef>,
    body: Option<SchemaRef>,
    response: Option<SchemaRef>,
    status: StatusCode,
    dependencies: Vec<(String, Dependency)>,
    background: bool,
    metadata: RouteMetadata,
    handler: Handler,
}

impl Route {
    /// Validate a declaration and build the route.
    ///
    /// Fails when the template is malformed, a declared schema is unusable,
    /// the params schema does not name exactly the template's parameters,
    /// the status code is out of range, or no handler is set.
    pub fn new(method: Method, path: &str, config: RouteConfig) -> Result<Self, EngineError> {
        let template = PathTemplate::parse(path)?;

        let Some(handler) = config.handler else {
            return Err(EngineError::MissingHandler {
                method,
                path: template.as_str().to_string(),
            });
        };

        let adapter = SchemaAdapter::new();
        for (schema, what) in [
            (&config.params, "path parameters"),
            (&config.query, "query"),
            (&config.body, "request body"),
            (&config.response, "response"),
        ] {
            if schema.is_some() {
                adapter.guard(schema.as_ref(), &format!("{what} of {method} {template}"))?;
            }
        }

        let declared: BTreeSet<String> = match &config.params {
            Some(schema) => adapter
                .fields(Some(schema))?
                .into_iter()
                .map(|(name, _)| name)
                .collect(),
            None => BTreeSet::new(),
        };
        let in_template: BTreeSet<String> = template.param_names().map(str::to_string).collect();
        if config.params.is_some() && declared != in_template {
            return Err(EngineError::InvalidRoute {
                path: template.as_str().to_string(),
                reason: format!(
                    "path parameters {in_template:?} do not match params schema fields {declared:?}"
                ),
            });
        }

        let status_code = config.status.unwrap_or(200);
        let status = StatusCode::from_u16(status_code).map_err(|_| EngineError::InvalidRoute {
            path: template.as_str().to_string(),
            reason: format!("status code {status_code} is out of range"),
        })?;

        let operation_id = config
            .operation_id
            .unwrap_or_else(|| generate_operation_id(&method, &template));

        Ok(Self {
            method,
            template,
            params: config.params,
            query: config.query,
            body: config.body,
            response: config.response,
            status,
            dependencies: config.dependencies,
            background: config.background,
            metadata: RouteMetadata {
                tags: config.tags,
                summary: config.summary,
                description: config.description,
                operation_id,
                deprecated: config.deprecated,
                hidden: config.hidden,
            },
            handler,
        })
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn template(&self) -> &PathTemplate {
        &self.template
    }

    /// Normalized path template
    #[must_use]
    pub fn path(&self) -> &str {
        self.template.as_str()
    }

    /// `METHOD /path` label used in logs and errors
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} {}", self.method, self.template)
    }

    #[must_use]
    pub fn params_schema(&self) -> Option<&SchemaRef> {
        self.params.as_ref()
    }

    #[must_use]
    pub fn query_schema(&self) -> Option<&SchemaRef> {
        self.query.as_ref()
    }

    #[must_use]
    pub fn body_schema(&self) -> Option<&SchemaRef> {
        self.body.as_ref()
    }

    #[must_use]
    pub fn response_schema(&self) -> Option<&SchemaRef> {
        self.response.as_ref()
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub fn dependencies(&self) -> &[(String, Dependency)] {
        &self.dependencies
    }

    #[must_use]
    pub fn background_enabled(&self) -> bool {
        self.background
    }

    #[must_use]
    pub fn metadata(&self) -> &RouteMetadata {
        &self.metadata
    }

    #[must_use]
    pub fn operation_id(&self) -> &str {
        &self.metadata.operation_id
    }

    #[must_use]
    pub fn handler(&self) -> &Handler {
        &self.handler
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("path", &self.template.as_str())
            .field("status", &self.status)
            .field(
                "dependencies",
                &self.dependencies.iter().map(|(n, _)| n).collect::<Vec<_>>(),
            )
            .field("background", &self.background)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

/// `GET /users/{id}/posts` -> `get_users_id_posts`
fn generate_operation_id(method: &Method, template: &PathTemplate) -> String {
    let mut id = method.as_str().to_lowercase();
    for segment in super::template::split_segments(template.as_str()) {
        let cleaned: String = segment
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
            .collect();
        let cleaned = cleaned.trim_matches('_');
        if !cleaned.is_empty() {
            id.push('_');
            id.push_str(cleaned);
        }
    }
    if template.segments().is_empty() {
        id.push_str("_root");
    }
    id
}
