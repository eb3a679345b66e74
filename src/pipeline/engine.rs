use super::request::{EngineRequest, EngineResponse};
use crate::background::{BackgroundTasks, PendingTask, TaskSupervisor};
use crate::config::EngineConfig;
use crate::dependency::{CleanupFailure, Injector, RequestScope, ResolutionPlan};
use crate::error::{panic_message, EngineError, HandlerError};
use crate::ids::RequestId;
use crate::openapi::{self, Document, DocumentInfo, Introspect};
use crate::registry::{RouteMatch, RouteRegistry};
use crate::route::{HeaderVec, ParamVec, RequestContext, RequestHead, Route};
use crate::schema::{InputLocation, SchemaAdapter, SchemaRef, ValidationIssue};
use crate::transport::{TransportAdapter, TransportCallback};
use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

pub(crate) struct EngineInner {
    pub(crate) config: EngineConfig,
    pub(crate) info: DocumentInfo,
    pub(crate) registry: RouteRegistry,
    pub(crate) plans: HashMap<String, ResolutionPlan>,
    pub(crate) injector: Injector,
    pub(crate) supervisor: TaskSupervisor,
}

impl Introspect for EngineInner {
    fn document(&self) -> Result<Document, EngineError> {
        openapi::generate(self.registry.list(), &self.info)
    }

    fn route_schema(&self, operation_id: &str) -> Option<Result<Value, EngineError>> {
        self.registry
            .by_operation_id(operation_id)
            .map(|route| openapi::route_schema(route))
    }
}

/// The serving side: a frozen registry plus the injector and supervisor.
///
/// Cloning is cheap and shares everything; clones can serve concurrently.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

/// What the handler produced, before the response is encoded
struct Handled {
    route: Arc<Route>,
    body: Value,
    headers: HeaderVec,
    tasks: Vec<PendingTask>,
}

/// A finished request whose background tasks have not started yet.
///
/// The transport writes [`response`](Self::response) first and then calls
/// [`AfterResponse::run`]. Dropping the [`AfterResponse`] without running it
/// discards the tasks.
#[must_use = "queued background tasks only start through AfterResponse::run"]
pub struct Dispatched {
    pub response: EngineResponse,
    pub after: AfterResponse,
}

impl Dispatched {
    #[must_use]
    pub fn into_parts(self) -> (EngineResponse, AfterResponse) {
        (self.response, self.after)
    }
}

/// Background tasks waiting for their response to be committed
pub struct AfterResponse {
    supervisor: TaskSupervisor,
    tasks: Vec<PendingTask>,
}

impl AfterResponse {
    /// Tasks that will start on [`run`](Self::run)
    #[must_use]
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    /// Hand the tasks to the supervisor. Returns the number started.
    pub fn run(self) -> usize {
        if self.tasks.is_empty() {
            return 0;
        }
        self.supervisor.submit(self.tasks)
    }
}

impl std::fmt::Debug for AfterResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AfterResponse")
            .field("pending", &self.tasks.len())
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for Dispatched {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatched")
            .field("response", &self.response)
            .field("after", &self.after)
            .finish()
    }
}

impl Engine {
    pub(crate) fn from_inner(inner: EngineInner) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn registry(&self) -> &RouteRegistry {
        &self.inner.registry
    }

    #[must_use]
    pub fn injector(&self) -> &Injector {
        &self.inner.injector
    }

    #[must_use]
    pub fn supervisor(&self) -> &TaskSupervisor {
        &self.inner.supervisor
    }

    /// Generate the document from the current registry
    pub fn openapi_document(&self) -> Result<Document, EngineError> {
        self.inner.document()
    }

    /// Contract summary of one route, `None` for an unknown operation id
    #[must_use]
    pub fn route_schema(&self, operation_id: &str) -> Option<Result<Value, EngineError>> {
        self.inner.route_schema(operation_id)
    }

    /// Run one request through the pipeline and start its background tasks.
    ///
    /// Tasks are submitted once the response is built and request-scoped
    /// dependencies are torn down. Transports that can tell when the
    /// response has been written should use [`dispatch`](Self::dispatch).
    pub async fn handle(&self, request: EngineRequest) -> EngineResponse {
        let (response, after) = self.dispatch(request).await.into_parts();
        after.run();
        response
    }

    /// Run one request through the pipeline without starting its tasks.
    ///
    /// Matching, validation (path, query, body), dependency resolution,
    /// handler, response contract check. Dependency teardown runs whatever
    /// the outcome. Every failure becomes a problem response and carries no
    /// tasks.
    pub async fn dispatch(&self, request: EngineRequest) -> Dispatched {
        let started = Instant::now();
        let request_id = RequestId::from_header_or_new(request.header_value("x-request-id"));
        let head = Arc::new(RequestHead {
            request_id,
            method: request.method.clone(),
            path: request.path.clone(),
            headers: request.headers.clone(),
        });

        let (mut response, tasks) = match self.process(&head, &request).await {
            Ok(mut handled) => {
                let tasks = std::mem::take(&mut handled.tasks);
                (self.success_response(handled), tasks)
            }
            Err(err) => (self.error_response(&head, &err), Vec::new()),
        };
        response
            .headers
            .push(("x-request-id".to_string(), request_id.to_string()));

        info!(
            request_id = %request_id,
            method = %head.method,
            path = %head.path,
            status = response.status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            tasks = tasks.len(),
            "Request complete"
        );
        Dispatched {
            response,
            after: AfterResponse {
                supervisor: self.inner.supervisor.clone(),
                tasks,
            },
        }
    }

    async fn process(
        &self,
        head: &Arc<RequestHead>,
        request: &EngineRequest,
    ) -> Result<Handled, EngineError> {
        let RouteMatch { route, params } =
            self.inner.registry.find(&request.method, &request.path)?;

        let adapter = SchemaAdapter::new();
        let raw_params = Value::Object(
            params
                .iter()
                .map(|(k, v)| (k.to_string(), Value::String(v.clone())))
                .collect::<Map<String, Value>>(),
        );
        let parsed_params = validate_input(
            &adapter,
            &route,
            route.params_schema(),
            raw_params,
            InputLocation::Path,
        )?;
        let query = validate_input(
            &adapter,
            &route,
            route.query_schema(),
            request.query_object(),
            InputLocation::Query,
        )?;
        let body = parse_body(&adapter, &route, &request.body)?;

        let plan = self.inner.plans.get(&route.label()).ok_or_else(|| {
            EngineError::Configuration(format!("no dependency plan for {}", route.label()))
        })?;
        let mut scope = RequestScope::new();
        let outcome = self
            .invoke(head, &route, params, parsed_params, query, body, plan, &mut scope)
            .await;

        let failures = scope.teardown().await;
        if !failures.is_empty() {
            warn!(
                request_id = %head.request_id,
                route = %route.label(),
                failures = failures.len(),
                "Request dependency teardown reported failures"
            );
        }
        outcome
    }

    #[allow(clippy::too_many_arguments)]
    async fn invoke(
        &self,
        head: &Arc<RequestHead>,
        route: &Arc<Route>,
        raw_params: ParamVec,
        params: Value,
        query: Value,
        body: Value,
        plan: &ResolutionPlan,
        scope: &mut RequestScope,
    ) -> Result<Handled, EngineError> {
        let dependencies = self.inner.injector.resolve(plan, head, scope).await?;

        let label: Arc<str> = Arc::from(route.label());
        let background = BackgroundTasks::new(Arc::clone(&label), route.background_enabled());
        let response_headers = Arc::new(Mutex::new(HeaderVec::new()));
        let introspection: Arc<dyn Introspect> = Arc::clone(&self.inner) as Arc<dyn Introspect>;
        let ctx = RequestContext::new(
            Arc::clone(head),
            Arc::clone(&label),
            raw_params,
            params,
            query,
            body,
            dependencies,
            background.clone(),
            Arc::clone(&response_headers),
            Some(introspection),
        );

        let handler = Arc::clone(route.handler());
        let started = Instant::now();
        let result = AssertUnwindSafe(async move { handler(ctx).await })
            .catch_unwind()
            .await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let output = match result {
            Ok(Ok(value)) => value,
            Ok(Err(err)) => {
                discard_tasks(&background, &label);
                return Err(EngineError::Handler(err));
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(
                    request_id = %head.request_id,
                    route = %label,
                    panic = %message,
                    "Handler panicked"
                );
                discard_tasks(&background, &label);
                return Err(EngineError::Handler(HandlerError::internal(format!(
                    "handler panicked: {message}"
                ))));
            }
        };
        debug!(request_id = %head.request_id, route = %label, elapsed_ms, "Handler complete");

        if self.inner.config.validate_responses {
            if let Some(schema) = route.response_schema() {
                let checked =
                    SchemaAdapter::new().validate(Some(schema), &output, InputLocation::Response);
                if let Err(err) = checked {
                    discard_tasks(&background, &label);
                    return Err(contract_violation(&label, err));
                }
            }
        }

        let tasks = background.drain();
        let headers = std::mem::take(&mut *response_headers.lock());
        Ok(Handled {
            route: Arc::clone(route),
            body: output,
            headers,
            tasks,
        })
    }

    fn success_response(&self, handled: Handled) -> EngineResponse {
        let mut headers: Vec<(String, String)> = Vec::with_capacity(handled.headers.len() + 2);
        if !handled.headers.iter().any(|(k, _)| k.as_ref() == "content-type") {
            headers.push(("content-type".to_string(), "application/json".to_string()));
        }
        headers.extend(handled.headers.into_iter().map(|(k, v)| (k.to_string(), v)));
        EngineResponse {
            status: handled.route.status(),
            headers,
            body: handled.body,
        }
    }

    fn error_response(&self, head: &RequestHead, err: &EngineError) -> EngineResponse {
        let problem = err.to_problem(self.inner.config.expose_internal_errors);
        if err.is_client_error() {
            debug!(
                request_id = %head.request_id,
                method = %head.method,
                path = %head.path,
                status = problem.status,
                error = %err,
                "Request rejected"
            );
        } else {
            error!(
                request_id = %head.request_id,
                method = %head.method,
                path = %head.path,
                status = problem.status,
                error = %err,
                "Request failed"
            );
        }

        let mut headers = vec![("content-type".to_string(), "application/json".to_string())];
        headers.extend(problem.headers.iter().cloned());
        let body = serde_json::to_value(&problem)
            .unwrap_or_else(|_| json!({ "status": problem.status, "detail": problem.detail }));
        EngineResponse {
            status: err.status(),
            headers,
            body,
        }
    }

    /// Register every route with a transport; each callback runs
    /// [`dispatch`](Self::dispatch). Returns the number of routes mounted.
    pub fn mount<A>(&self, adapter: &mut A) -> anyhow::Result<usize>
    where
        A: TransportAdapter + ?Sized,
    {
        let mut mounted = 0;
        for route in self.inner.registry.list() {
            let engine = self.clone();
            let callback: TransportCallback =
                Arc::new(move |request: EngineRequest| -> BoxFuture<'static, Dispatched> {
                    let engine = engine.clone();
                    Box::pin(async move { engine.dispatch(request).await })
                });
            adapter.register(route.method(), route.path(), callback)?;
            mounted += 1;
        }
        info!(routes_count = mounted, "Routes mounted on transport");
        Ok(mounted)
    }

    /// Wait for running background tasks, then run singleton cleanup hooks
    /// in reverse creation order.
    pub async fn shutdown(&self) -> Vec<CleanupFailure> {
        self.inner.supervisor.wait_idle().await;
        let failures = self.inner.injector.shutdown().await;
        info!(cleanup_failures = failures.len(), "Engine shut down");
        failures
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("registry", &self.inner.registry)
            .field("supervisor", &self.inner.supervisor)
            .finish_non_exhaustive()
    }
}

fn validate_input(
    adapter: &SchemaAdapter,
    route: &Route,
    schema: Option<&SchemaRef>,
    raw: Value,
    location: InputLocation,
) -> Result<Value, EngineError> {
    let Some(schema) = schema else {
        return Ok(raw);
    };
    adapter.validate(Some(schema), &raw, location).inspect_err(|err| {
        debug!(route = %route.label(), location = %location, error = %err, "Validation failed");
    })
}

/// Empty body is `null`. With a schema the body must be JSON; without one,
/// non-JSON text is passed through as a string.
fn parse_body(adapter: &SchemaAdapter, route: &Route, bytes: &[u8]) -> Result<Value, EngineError> {
    let schema = route.body_schema();
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return validate_input(adapter, route, schema, Value::Null, InputLocation::Body);
    }
    match serde_json::from_slice::<Value>(bytes) {
        Ok(value) => validate_input(adapter, route, schema, value, InputLocation::Body),
        Err(err) if schema.is_some() => Err(EngineError::Validation {
            location: InputLocation::Body,
            issues: vec![ValidationIssue::new("", "json_invalid", err.to_string())],
        }),
        Err(_) => Ok(Value::String(String::from_utf8_lossy(bytes).into_owned())),
    }
}

fn contract_violation(route: &str, err: EngineError) -> EngineError {
    let issues = match err {
        EngineError::Validation { issues, .. } => issues,
        other => vec![ValidationIssue::new("", "invalid_schema", other.to_string())],
    };
    error!(route = %route, issues = issues.len(), "Response violates declared schema");
    EngineError::ResponseContractViolation {
        route: route.to_string(),
        issues,
    }
}

fn discard_tasks(background: &BackgroundTasks, route: &str) {
    let dropped = background.drain();
    if !dropped.is_empty() {
        debug!(route = %route, tasks = dropped.len(), "Background tasks discarded after failure");
    }
}
