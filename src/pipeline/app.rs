use super::builtin;
use super::engine::{Engine, EngineInner};
use crate::background::{SupervisorConfig, TaskSupervisor};
use crate::config::EngineConfig;
use crate::dependency::{Dependency, Injector, ResolutionPlan};
use crate::error::EngineError;
use crate::openapi::{generate, DocumentInfo};
use crate::registry::RouteRegistry;
use crate::route::{Route, RouteConfig};
use http::Method;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Setup-time aggregate: collects providers and routes, then freezes into an
/// [`Engine`].
///
/// Every registration is checked immediately (template, schemas, conflicts,
/// dependency graph), so a misdeclared route fails at the call that declared
/// it. Providers must be declared before the routes that use them.
pub struct App {
    config: EngineConfig,
    info: DocumentInfo,
    registry: RouteRegistry,
    injector: Injector,
    plans: HashMap<String, ResolutionPlan>,
}

impl App {
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            info: DocumentInfo::new("API", "0.1.0"),
            registry: RouteRegistry::new(),
            injector: Injector::new(),
            plans: HashMap::new(),
        }
    }

    /// Document title, version and servers
    pub fn info(&mut self, info: DocumentInfo) -> &mut Self {
        self.info = info;
        self
    }

    /// Make a dependency resolvable by name from every route.
    pub fn provide(&mut self, name: impl Into<String>, dependency: Dependency) -> &mut Self {
        self.injector.provide(name, dependency);
        self
    }

    /// Declare a route.
    pub fn route(
        &mut self,
        method: Method,
        path: &str,
        config: RouteConfig,
    ) -> Result<Arc<Route>, EngineError> {
        self.register(Route::new(method, path, config)?)
    }

    pub fn get(&mut self, path: &str, config: RouteConfig) -> Result<Arc<Route>, EngineError> {
        self.route(Method::GET, path, config)
    }

    pub fn post(&mut self, path: &str, config: RouteConfig) -> Result<Arc<Route>, EngineError> {
        self.route(Method::POST, path, config)
    }

    pub fn put(&mut self, path: &str, config: RouteConfig) -> Result<Arc<Route>, EngineError> {
        self.route(Method::PUT, path, config)
    }

    pub fn patch(&mut self, path: &str, config: RouteConfig) -> Result<Arc<Route>, EngineError> {
        self.route(Method::PATCH, path, config)
    }

    pub fn delete(&mut self, path: &str, config: RouteConfig) -> Result<Arc<Route>, EngineError> {
        self.route(Method::DELETE, path, config)
    }

    /// Register an already-built route.
    ///
    /// The dependency plan is computed first, so a route with a broken graph
    /// never reaches the registry.
    pub fn register(&mut self, route: Route) -> Result<Arc<Route>, EngineError> {
        let plan = self.injector.plan(&route)?;
        let route = self.registry.register(route)?;
        self.plans.insert(route.label(), plan);
        Ok(route)
    }

    #[must_use]
    pub fn registry(&self) -> &RouteRegistry {
        &self.registry
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Freeze the registry and produce the serving engine.
    ///
    /// Registers the reserved documentation routes where nothing conflicts and
    /// generates the document once, so bad document info fails here rather
    /// than on the first docs request.
    pub fn build(mut self) -> Result<Engine, EngineError> {
        if self.config.register_docs_routes {
            for route in builtin::docs_routes(&self.config)? {
                let plan = self.injector.plan(&route)?;
                if let Some(route) = self.registry.register_default(route) {
                    self.plans.insert(route.label(), plan);
                }
            }
        }

        let document = generate(self.registry.list(), &self.info)?;
        self.registry.freeze();

        let supervisor = TaskSupervisor::new(SupervisorConfig::from(&self.config));
        info!(
            routes_count = self.registry.len(),
            documented_paths = document.paths.len(),
            providers = self.injector.providers().len(),
            "Engine built"
        );

        Ok(Engine::from_inner(EngineInner {
            config: self.config,
            info: self.info,
            registry: self.registry,
            plans: self.plans,
            injector: self.injector,
            supervisor,
        }))
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("info", &self.info)
            .field("registry", &self.registry)
            .field("providers", &self.injector.providers().len())
            .finish_non_exhaustive()
    }
}
