use super::core::{CleanupFn, Dependencies, Dependency, DependencyContext, DependencyId, Instance, Lifetime};
use crate::error::{panic_message, EngineError};
use crate::route::{RequestHead, Route};
use dashmap::DashMap;
use futures::FutureExt;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// One step of a resolution plan
#[derive(Debug, Clone)]
pub struct PlanStep {
    pub name: Arc<str>,
    pub dependency: Dependency,
    /// Names this step's factory receives, already resolved by earlier steps
    pub requires: Vec<Arc<str>>,
}

/// Resolution order for one route, computed at registration.
///
/// Steps are in declaration order with each step's requirements placed
/// before it, so resolving front to back never waits on a later step.
#[derive(Debug, Clone, Default)]
pub struct ResolutionPlan {
    route: String,
    steps: Vec<PlanStep>,
}

impl ResolutionPlan {
    #[must_use]
    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    /// Step names in resolution order
    pub fn order(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(|s| s.name.as_ref())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// A cleanup hook that failed; reported, never fatal to the others.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupFailure {
    pub name: String,
    pub message: String,
}

/// Resolves declared dependencies and owns the singleton cache.
///
/// Concurrent first uses of a singleton may each run its factory; the first
/// value stored wins and every request observes that one. Factories should be
/// idempotent when running twice matters.
#[derive(Default)]
pub struct Injector {
    providers: Vec<(String, Dependency)>,
    singletons: DashMap<DependencyId, Instance>,
    created: Mutex<Vec<(Arc<str>, Dependency)>>,
}

impl Injector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a dependency resolvable by name from every route.
    ///
    /// Route-level declarations with the same name take precedence.
    pub fn provide(&mut self, name: impl Into<String>, dependency: Dependency) {
        let name = name.into();
        self.providers.retain(|(existing, _)| *existing != name);
        self.providers.push((name, dependency));
    }

    #[must_use]
    pub fn providers(&self) -> &[(String, Dependency)] {
        &self.providers
    }

    /// Number of singletons created so far
    #[must_use]
    pub fn singleton_count(&self) -> usize {
        self.singletons.len()
    }

    /// Compute the resolution plan of a route.
    ///
    /// Fails on names that resolve nowhere, on cycles, and on singletons that
    /// require request-scoped values.
    pub fn plan(&self, route: &Route) -> Result<ResolutionPlan, EngineError> {
        let mut planner = Planner {
            route,
            providers: &self.providers,
            steps: Vec::new(),
            done: HashSet::new(),
            stack: Vec::new(),
        };
        for (name, _) in route.dependencies() {
            planner.visit(name)?;
        }
        let plan = ResolutionPlan {
            route: route.label(),
            steps: planner.steps,
        };
        debug!(
            route = %plan.route,
            order = ?plan.order().collect::<Vec<_>>(),
            "Dependency plan computed"
        );
        Ok(plan)
    }

    /// Resolve every step of `plan` for one request.
    ///
    /// Request-scoped instances are recorded in `scope`; the caller must
    /// tear the scope down whatever the outcome, including on error here.
    pub async fn resolve(
        &self,
        plan: &ResolutionPlan,
        head: &Arc<RequestHead>,
        scope: &mut RequestScope,
    ) -> Result<Dependencies, EngineError> {
        let mut resolved = Dependencies::default();
        for step in &plan.steps {
            let instance = match step.dependency.lifetime() {
                Lifetime::Singleton => {
                    let ctx = DependencyContext::new(None, resolved.subset(&step.requires));
                    self.singleton(step, ctx).await?
                }
                Lifetime::Request => {
                    let ctx = DependencyContext::new(
                        Some(Arc::clone(head)),
                        resolved.subset(&step.requires),
                    );
                    let instance = run_factory(step, ctx).await?;
                    scope.record(
                        Arc::clone(&step.name),
                        Arc::clone(&instance),
                        step.dependency.cleanup().cloned(),
                    );
                    instance
                }
            };
            debug!(
                route = %plan.route,
                request_id = %head.request_id,
                dependency = %step.name,
                lifetime = step.dependency.lifetime().as_str(),
                "Dependency resolved"
            );
            resolved.insert(Arc::clone(&step.name), instance);
        }
        Ok(resolved)
    }

    async fn singleton(
        &self,
        step: &PlanStep,
        ctx: DependencyContext,
    ) -> Result<Instance, EngineError> {
        let id = step.dependency.id();
        if let Some(cached) = self.singletons.get(&id) {
            return Ok(Arc::clone(cached.value()));
        }

        // The factory runs without holding any map lock
        let created = run_factory(step, ctx).await?;

        let mut inserted = false;
        let value = {
            let entry = self.singletons.entry(id).or_insert_with(|| {
                inserted = true;
                created
            });
            Arc::clone(entry.value())
        };
        if inserted {
            self.created
                .lock()
                .push((Arc::clone(&step.name), step.dependency.clone()));
            info!(
                dependency = %step.name,
                type_name = step.dependency.type_name(),
                "Singleton dependency created"
            );
        } else {
            debug!(
                dependency = %step.name,
                "Concurrent singleton construction lost the race; using the cached value"
            );
        }
        Ok(value)
    }

    /// Drop every cached singleton, running cleanup hooks in reverse
    /// creation order. Failures are logged and returned.
    pub async fn shutdown(&self) -> Vec<CleanupFailure> {
        let created = std::mem::take(&mut *self.created.lock());
        let mut failures = Vec::new();
        for (name, dependency) in created.into_iter().rev() {
            let Some((_, instance)) = self.singletons.remove(&dependency.id()) else {
                continue;
            };
            if let Some(cleanup) = dependency.cleanup() {
                if let Some(failure) = run_cleanup(&name, instance, cleanup).await {
                    failures.push(failure);
                }
            }
        }
        self.singletons.clear();
        info!(failures = failures.len(), "Singleton dependencies released");
        failures
    }
}

struct Planner<'a> {
    route: &'a Route,
    providers: &'a [(String, Dependency)],
    steps: Vec<PlanStep>,
    done: HashSet<String>,
    stack: Vec<String>,
}

impl Planner<'_> {
    fn lookup(&self, name: &str) -> Option<&Dependency> {
        self.route
            .dependencies()
            .iter()
            .chain(self.providers.iter())
            .find(|(n, _)| n == name)
            .map(|(_, d)| d)
    }

    fn visit(&mut self, name: &str) -> Result<(), EngineError> {
        if self.done.contains(name) {
            return Ok(());
        }
        if let Some(pos) = self.stack.iter().position(|n| n == name) {
            let mut cycle = self.stack[pos..].to_vec();
            cycle.push(name.to_string());
            return Err(EngineError::DependencyCycle { cycle });
        }
        let dependency = self
            .lookup(name)
            .cloned()
            .ok_or_else(|| EngineError::UnknownDependency {
                route: self.route.label(),
                name: name.to_string(),
            })?;

        self.stack.push(name.to_string());
        for required in dependency.required() {
            self.visit(required)?;
            let required_lifetime = self.lookup(required).map(Dependency::lifetime);
            if dependency.lifetime() == Lifetime::Singleton
                && required_lifetime == Some(Lifetime::Request)
            {
                return Err(EngineError::DependencyScope {
                    singleton: name.to_string(),
                    request_scoped: required.clone(),
                });
            }
        }
        self.stack.pop();

        self.done.insert(name.to_string());
        self.steps.push(PlanStep {
            name: Arc::from(name),
            requires: dependency.required().iter().map(|r| Arc::from(r.as_str())).collect(),
            dependency,
        });
        Ok(())
    }
}

async fn run_factory(step: &PlanStep, ctx: DependencyContext) -> Result<Instance, EngineError> {
    let fut = (step.dependency.factory())(ctx);
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(Ok(instance)) => Ok(instance),
        Ok(Err(err)) => {
            let message = format!("{err:#}");
            error!(dependency = %step.name, error = %message, "Dependency factory failed");
            Err(EngineError::DependencyResolution {
                name: step.name.to_string(),
                message,
            })
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            error!(dependency = %step.name, panic = %message, "Dependency factory panicked");
            Err(EngineError::DependencyResolution {
                name: step.name.to_string(),
                message: format!("factory panicked: {message}"),
            })
        }
    }
}

async fn run_cleanup(name: &str, instance: Instance, cleanup: &CleanupFn) -> Option<CleanupFailure> {
    let outcome = AssertUnwindSafe(cleanup(instance)).catch_unwind().await;
    let message = match outcome {
        Ok(Ok(())) => {
            debug!(dependency = %name, "Dependency cleanup complete");
            return None;
        }
        Ok(Err(err)) => format!("{err:#}"),
        Err(panic) => format!("cleanup panicked: {}", panic_message(panic.as_ref())),
    };
    warn!(dependency = %name, error = %message, "Dependency cleanup failed");
    Some(CleanupFailure {
        name: name.to_string(),
        message,
    })
}

struct ScopedInstance {
    name: Arc<str>,
    instance: Instance,
    cleanup: Option<CleanupFn>,
}

/// Request-scoped instances of one request, in resolution order.
#[derive(Default)]
pub struct RequestScope {
    entries: Vec<ScopedInstance>,
}

impl RequestScope {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&mut self, name: Arc<str>, instance: Instance, cleanup: Option<CleanupFn>) {
        self.entries.push(ScopedInstance {
            name,
            instance,
            cleanup,
        });
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Run every cleanup hook once, newest instance first.
    ///
    /// A failing or panicking hook is reported and the remaining hooks still run.
    pub async fn teardown(mut self) -> Vec<CleanupFailure> {
        let entries = std::mem::take(&mut self.entries);
        let mut failures = Vec::new();
        for entry in entries.into_iter().rev() {
            if let Some(cleanup) = &entry.cleanup {
                if let Some(failure) = run_cleanup(&entry.name, entry.instance, cleanup).await {
                    failures.push(failure);
                }
            }
        }
        failures
    }
}

impl Drop for RequestScope {
    fn drop(&mut self) {
        let pending = self.entries.iter().filter(|e| e.cleanup.is_some()).count();
        if pending > 0 {
            warn!(
                pending,
                "Request scope dropped without teardown; cleanup hooks skipped"
            );
        }
    }
}
