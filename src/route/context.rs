use crate::background::{BackgroundTasks, TaskOptions};
use crate::dependency::Dependencies;
use crate::error::{EngineError, HandlerError};
use crate::ids::{RequestId, TaskId};
use crate::openapi::Introspect;
use http::Method;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use smallvec::SmallVec;
use std::future::Future;
use std::sync::Arc;

/// Maximum number of path parameters before heap allocation
pub const MAX_INLINE_PARAMS: usize = 8;

/// Maximum number of headers before heap allocation
pub const MAX_INLINE_HEADERS: usize = 16;

/// Raw path parameters as extracted by the registry (name, raw segment)
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Header storage; names are lowercase
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// Transport-level facts about the inbound request.
#[derive(Debug, Clone)]
pub struct RequestHead {
    pub request_id: RequestId,
    pub method: Method,
    pub path: String,
    pub headers: HeaderVec,
}

impl RequestHead {
    /// Case-insensitive header lookup
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Everything a handler receives for one request.
///
/// Inputs are already validated (and coerced, for path and query) when the
/// handler runs. Inputs without a declared schema are passed through as-is.
pub struct RequestContext {
    head: Arc<RequestHead>,
    route: Arc<str>,
    raw_params: ParamVec,
    params: Value,
    query: Value,
    body: Value,
    dependencies: Dependencies,
    background: BackgroundTasks,
    response_headers: Arc<Mutex<HeaderVec>>,
    introspection: Option<Arc<dyn Introspect>>,
}

impl RequestContext {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        head: Arc<RequestHead>,
        route: Arc<str>,
        raw_params: ParamVec,
        params: Value,
        query: Value,
        body: Value,
        dependencies: Dependencies,
        background: BackgroundTasks,
        response_headers: Arc<Mutex<HeaderVec>>,
        introspection: Option<Arc<dyn Introspect>>,
    ) -> Self {
        Self {
            head,
            route,
            raw_params,
            params,
            query,
            body,
            dependencies,
            background,
            response_headers,
            introspection,
        }
    }

    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.head.request_id
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.head.method
    }

    /// Request path as received
    #[must_use]
    pub fn path(&self) -> &str {
        &self.head.path
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.header(name)
    }

    #[must_use]
    pub fn head(&self) -> &Arc<RequestHead> {
        &self.head
    }

    /// `METHOD /template` of the matched route
    #[must_use]
    pub fn route(&self) -> &str {
        &self.route
    }

    /// Parsed path parameters (an object keyed by parameter name)
    #[must_use]
    pub fn params(&self) -> &Value {
        &self.params
    }

    /// Raw path segment captured for `name`, before coercion
    #[must_use]
    pub fn raw_param(&self, name: &str) -> Option<&str> {
        self.raw_params
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn query(&self) -> &Value {
        &self.query
    }

    #[must_use]
    pub fn body(&self) -> &Value {
        &self.body
    }

    /// Deserialize the parsed path parameters into `T`.
    pub fn params_as<T: DeserializeOwned>(&self) -> Result<T, HandlerError> {
        Ok(T::deserialize(&self.params)?)
    }

    pub fn query_as<T: DeserializeOwned>(&self) -> Result<T, HandlerError> {
        Ok(T::deserialize(&self.query)?)
    }

    pub fn body_as<T: DeserializeOwned>(&self) -> Result<T, HandlerError> {
        Ok(T::deserialize(&self.body)?)
    }

    /// All dependencies resolved for this request
    #[must_use]
    pub fn dependencies(&self) -> &Dependencies {
        &self.dependencies
    }

    /// A resolved dependency by name and type.
    pub fn dependency<T: Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>, HandlerError> {
        self.dependencies.get::<T>(name).ok_or_else(|| {
            HandlerError::internal(format!(
                "dependency '{name}' is not resolved for {} or has a different type",
                self.route
            ))
        })
    }

    /// Background task queue of this request.
    ///
    /// Fails unless the route declared the background capability.
    pub fn background(&self) -> Result<&BackgroundTasks, HandlerError> {
        if self.background.is_enabled() {
            Ok(&self.background)
        } else {
            Err(HandlerError::Internal(
                EngineError::BackgroundTasksDisabled {
                    route: self.route.to_string(),
                }
                .into(),
            ))
        }
    }

    /// Shorthand for `background()?.add_task(action, options)`.
    pub fn add_task<F, Fut>(&self, action: F, options: TaskOptions) -> Result<TaskId, HandlerError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Ok(self.background()?.add_task(action, options))
    }

    /// Add a header to the successful response (names are lowercased).
    pub fn set_response_header(&self, name: &str, value: impl Into<String>) {
        let name: Arc<str> = Arc::from(name.to_ascii_lowercase());
        let mut headers = self.response_headers.lock();
        headers.retain(|(k, _)| *k != name);
        headers.push((name, value.into()));
    }

    /// Access to the generated document, available to the built-in docs routes
    /// and to any handler running inside an engine.
    pub fn introspection(&self) -> Result<&Arc<dyn Introspect>, HandlerError> {
        self.introspection
            .as_ref()
            .ok_or_else(|| HandlerError::internal("no engine introspection is attached"))
    }
}
