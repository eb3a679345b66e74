use super::radix::RadixNode;
use crate::error::EngineError;
use crate::route::{split_segments, ParamVec, Route};
use http::Method;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Result of matching a request path to a route
#[derive(Debug, Clone)]
pub struct RouteMatch {
    /// The matched route (shared with the registry)
    pub route: Arc<Route>,
    /// Raw path segments captured for each `{name}`, in template order
    pub params: ParamVec,
}

impl RouteMatch {
    /// Raw value captured for `name`
    #[inline]
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }
}

/// The single source of truth for declared routes.
///
/// Mutated only during setup. [`freeze`](Self::freeze) turns it read-only;
/// afterwards it is shared behind an `Arc` and read concurrently.
pub struct RouteRegistry {
    routes: Vec<Arc<Route>>,
    tree: RadixNode,
    frozen: bool,
}

impl Default for RouteRegistry {
    fn default() -> Self {
        Self {
            routes: Vec::new(),
            tree: RadixNode::root(),
            frozen: false,
        }
    }
}

impl RouteRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a route.
    ///
    /// Fails when the same (method, normalized path) exists, when the template
    /// overlaps a same-method template through a literal-vs-parameter
    /// position, when the operation id is taken, or after [`freeze`](Self::freeze).
    pub fn register(&mut self, route: Route) -> Result<Arc<Route>, EngineError> {
        self.check(&route)?;
        let route = Arc::new(route);
        self.tree
            .insert(route.template().segments(), Arc::clone(&route));
        self.routes.push(Arc::clone(&route));
        info!(
            method = %route.method(),
            path = %route.path(),
            operation_id = %route.operation_id(),
            routes_count = self.routes.len(),
            "Route registered"
        );
        Ok(route)
    }

    /// Register a reserved route only if nothing conflicting exists.
    ///
    /// Returns `None` when the route was skipped.
    pub fn register_default(&mut self, route: Route) -> Option<Arc<Route>> {
        match self.register(route) {
            Ok(route) => Some(route),
            Err(err) => {
                info!(reason = %err, "Reserved route skipped");
                None
            }
        }
    }

    fn check(&self, route: &Route) -> Result<(), EngineError> {
        if self.frozen {
            return Err(EngineError::RegistryFrozen);
        }
        for existing in self.routes.iter().filter(|r| r.method() == route.method()) {
            if existing.template().key() == route.template().key() {
                return Err(EngineError::DuplicateRoute {
                    method: route.method().clone(),
                    path: route.path().to_string(),
                });
            }
            if existing.template().overlaps(route.template()) {
                return Err(EngineError::AmbiguousRoute {
                    method: route.method().clone(),
                    path: route.path().to_string(),
                    existing: existing.path().to_string(),
                });
            }
        }
        if let Some(existing) = self.by_operation_id(route.operation_id()) {
            return Err(EngineError::DuplicateOperationId {
                operation_id: route.operation_id().to_string(),
                existing: existing.label(),
            });
        }
        Ok(())
    }

    /// Match a request to a route.
    ///
    /// The path is normalized first. Literal segments match case-sensitively;
    /// `{name}` segments match any single non-empty segment. When the path
    /// matches only routes of other methods the error is
    /// [`EngineError::MethodNotAllowed`], otherwise [`EngineError::NotFound`].
    pub fn find(&self, method: &Method, raw_path: &str) -> Result<RouteMatch, EngineError> {
        let started = Instant::now();
        let segments: Vec<&str> = split_segments(raw_path).collect();
        let mut params = ParamVec::new();

        if let Some(route) = self.tree.search(&segments, method, &mut params) {
            let elapsed = started.elapsed();
            if elapsed > Duration::from_millis(1) {
                warn!(
                    method = %method,
                    path = %raw_path,
                    route_pattern = %route.path(),
                    duration_us = elapsed.as_micros() as u64,
                    "Slow route matching detected"
                );
            } else {
                debug!(
                    method = %method,
                    path = %raw_path,
                    route_pattern = %route.path(),
                    path_params = ?params,
                    "Route matched"
                );
            }
            return Ok(RouteMatch { route, params });
        }

        let mut allowed = Vec::new();
        self.tree.allowed(&segments, &mut allowed);
        if allowed.is_empty() {
            debug!(method = %method, path = %raw_path, "No route matched");
            Err(EngineError::NotFound {
                method: method.clone(),
                path: raw_path.to_string(),
            })
        } else {
            debug!(method = %method, path = %raw_path, allowed = ?allowed, "Method not allowed");
            Err(EngineError::MethodNotAllowed {
                method: method.clone(),
                path: raw_path.to_string(),
                allowed,
            })
        }
    }

    /// Every route in registration order.
    ///
    /// Each call yields a fresh iterator, so listing can be restarted.
    pub fn list(&self) -> impl Iterator<Item = &Arc<Route>> + '_ {
        self.routes.iter()
    }

    #[must_use]
    pub fn by_operation_id(&self, operation_id: &str) -> Option<&Arc<Route>> {
        self.routes.iter().find(|r| r.operation_id() == operation_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Reject further registrations
    pub fn freeze(&mut self) {
        if !self.frozen {
            info!(routes_count = self.routes.len(), "Route registry frozen");
        }
        self.frozen = true;
    }

    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }
}

impl std::fmt::Debug for RouteRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteRegistry")
            .field(
                "routes",
                &self.routes.iter().map(|r| r.label()).collect::<Vec<_>>(),
            )
            .field("frozen", &self.frozen)
            .finish()
    }
}
