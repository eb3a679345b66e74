use crate::route::RequestHead;
use anyhow::anyhow;
use futures::future::BoxFuture;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A resolved dependency value, type-erased
pub type Instance = Arc<dyn Any + Send + Sync>;

pub(crate) type FactoryFn =
    Arc<dyn Fn(DependencyContext) -> BoxFuture<'static, anyhow::Result<Instance>> + Send + Sync>;

pub(crate) type CleanupFn =
    Arc<dyn Fn(Instance) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// How long a resolved value lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifetime {
    /// Computed once per process and shared by every request
    Singleton,
    /// Computed once per request and torn down when the request completes
    Request,
}

impl Lifetime {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Lifetime::Singleton => "singleton",
            Lifetime::Request => "request",
        }
    }
}

/// Identity of a descriptor. Clones share it; the singleton cache is keyed by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DependencyId(u64);

/// How to produce a value a handler needs.
///
/// ```rust
/// use brrtapi::dependency::Dependency;
///
/// struct Pool;
/// struct Session { user: String }
///
/// let pool = Dependency::singleton(|_| async { Ok(Pool) });
/// let session = Dependency::request(|ctx| async move {
///     let user = ctx.header("x-user").unwrap_or("anonymous").to_string();
///     Ok(Session { user })
/// })
/// .requires("pool")
/// .on_cleanup(|session: std::sync::Arc<Session>| async move {
///     assert!(!session.user.is_empty());
///     Ok(())
/// });
/// # let _ = (pool, session);
/// ```
#[derive(Clone)]
pub struct Dependency {
    id: DependencyId,
    lifetime: Lifetime,
    type_name: &'static str,
    factory: FactoryFn,
    cleanup: Option<CleanupFn>,
    requires: Vec<String>,
}

impl Dependency {
    /// A process-wide value computed on first use and cached.
    pub fn singleton<F, Fut, T>(factory: F) -> Self
    where
        F: Fn(DependencyContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
        T: Send + Sync + 'static,
    {
        Self::from_factory(Lifetime::Singleton, factory)
    }

    /// A value computed fresh for every request.
    pub fn request<F, Fut, T>(factory: F) -> Self
    where
        F: Fn(DependencyContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
        T: Send + Sync + 'static,
    {
        Self::from_factory(Lifetime::Request, factory)
    }

    /// A singleton wrapping an already-built value
    pub fn value<T: Send + Sync + 'static>(value: T) -> Self {
        let instance: Instance = Arc::new(value);
        let factory: FactoryFn = Arc::new(
            move |_: DependencyContext| -> BoxFuture<'static, anyhow::Result<Instance>> {
                let instance = Arc::clone(&instance);
                Box::pin(async move { Ok(instance) })
            },
        );
        Self::from_parts(Lifetime::Singleton, std::any::type_name::<T>(), factory)
    }

    fn from_factory<F, Fut, T>(lifetime: Lifetime, factory: F) -> Self
    where
        F: Fn(DependencyContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
        T: Send + Sync + 'static,
    {
        let factory: FactoryFn = Arc::new(
            move |ctx: DependencyContext| -> BoxFuture<'static, anyhow::Result<Instance>> {
                let fut = factory(ctx);
                Box::pin(async move {
                    let value = fut.await?;
                    Ok(Arc::new(value) as Instance)
                })
            },
        );
        Self::from_parts(lifetime, std::any::type_name::<T>(), factory)
    }

    fn from_parts(lifetime: Lifetime, type_name: &'static str, factory: FactoryFn) -> Self {
        Self {
            id: DependencyId(NEXT_ID.fetch_add(1, Ordering::Relaxed)),
            lifetime,
            type_name,
            factory,
            cleanup: None,
            requires: Vec::new(),
        }
    }

    /// Declare that the factory needs another dependency, by name.
    ///
    /// Names resolve against the route's own dependencies first, then the
    /// application-wide providers.
    #[must_use]
    pub fn requires(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.requires.contains(&name) {
            self.requires.push(name);
        }
        self
    }

    /// Hook run once when a resolved instance is discarded: at the end of the
    /// request for request-scoped values, at engine shutdown for singletons.
    #[must_use]
    pub fn on_cleanup<T, F, Fut>(mut self, hook: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(Arc<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let cleanup: CleanupFn = Arc::new(
            move |instance: Instance| -> BoxFuture<'static, anyhow::Result<()>> {
                match instance.downcast::<T>() {
                    Ok(value) => Box::pin(hook(value)),
                    Err(_) => Box::pin(async {
                        Err(anyhow!(
                            "cleanup expects {} but the factory produced another type",
                            std::any::type_name::<T>()
                        ))
                    }),
                }
            },
        );
        self.cleanup = Some(cleanup);
        self
    }

    #[must_use]
    pub fn id(&self) -> DependencyId {
        self.id
    }

    #[must_use]
    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    /// Rust type name of the produced value
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    #[must_use]
    pub fn required(&self) -> &[String] {
        &self.requires
    }

    #[must_use]
    pub fn has_cleanup(&self) -> bool {
        self.cleanup.is_some()
    }

    pub(crate) fn factory(&self) -> &FactoryFn {
        &self.factory
    }

    pub(crate) fn cleanup(&self) -> Option<&CleanupFn> {
        self.cleanup.as_ref()
    }
}

impl fmt::Debug for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dependency")
            .field("id", &self.id)
            .field("lifetime", &self.lifetime)
            .field("type_name", &self.type_name)
            .field("requires", &self.requires)
            .field("cleanup", &self.cleanup.is_some())
            .finish()
    }
}

/// Values resolved so far, by name, in resolution order.
#[derive(Clone, Default)]
pub struct Dependencies {
    values: Vec<(Arc<str>, Instance)>,
}

impl Dependencies {
    /// The value registered under `name`, if it has type `T`
    #[must_use]
    pub fn get<T: Send + Sync + 'static>(&self, name: &str) -> Option<Arc<T>> {
        self.get_instance(name)
            .and_then(|instance| Arc::clone(instance).downcast::<T>().ok())
    }

    #[must_use]
    pub fn get_instance(&self, name: &str) -> Option<&Instance> {
        self.values
            .iter()
            .find(|(n, _)| n.as_ref() == name)
            .map(|(_, v)| v)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get_instance(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(n, _)| n.as_ref())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub(crate) fn insert(&mut self, name: Arc<str>, instance: Instance) {
        self.values.retain(|(n, _)| *n != name);
        self.values.push((name, instance));
    }

    pub(crate) fn subset(&self, names: &[Arc<str>]) -> Self {
        Self {
            values: self
                .values
                .iter()
                .filter(|(n, _)| names.contains(n))
                .map(|(n, v)| (Arc::clone(n), Arc::clone(v)))
                .collect(),
        }
    }
}

impl fmt::Debug for Dependencies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// What a factory sees: the values it declared via [`Dependency::requires`]
/// and, for request-scoped factories, the inbound request.
#[derive(Clone, Default)]
pub struct DependencyContext {
    head: Option<Arc<RequestHead>>,
    resolved: Dependencies,
}

impl DependencyContext {
    pub(crate) fn new(head: Option<Arc<RequestHead>>, resolved: Dependencies) -> Self {
        Self { head, resolved }
    }

    /// The inbound request; `None` for singleton factories
    #[must_use]
    pub fn request(&self) -> Option<&RequestHead> {
        self.head.as_deref()
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.as_ref().and_then(|head| head.header(name))
    }

    /// A required dependency by name and type
    pub fn get<T: Send + Sync + 'static>(&self, name: &str) -> anyhow::Result<Arc<T>> {
        self.resolved.get::<T>(name).ok_or_else(|| {
            anyhow!(
                "required dependency '{name}' is missing or is not a {}",
                std::any::type_name::<T>()
            )
        })
    }
}
