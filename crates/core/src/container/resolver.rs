use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use uuid::Uuid;

use crate::config::{ScopedResolutionPolicy, SingletonConstruction};
use crate::container::autowiring::{ConstructorInjector, Injectable};
use crate::container::cache::{CacheKey, InstanceCache};
use crate::container::descriptor::{downcast, erase, Activation, Instance, ServiceDescriptor, ServiceId, ServiceLifetime};
use crate::container::generics::ClosedGeneric;
use crate::container::ioc_container::Container;
use crate::container::scope::Scope;
use crate::errors::CoreError;

/// Services currently being resolved, outermost request first
#[derive(Debug, Clone, Default)]
pub struct ResolutionPath {
    pub services: Vec<ServiceId>,
}

impl ResolutionPath {
    /// Create a new resolution path
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a service to the resolution path
    pub fn push(&mut self, service_id: ServiceId) {
        self.services.push(service_id);
    }

    /// Remove the last service from the resolution path
    pub fn pop(&mut self) -> Option<ServiceId> {
        self.services.pop()
    }

    /// Check if the path contains a service (for cycle detection)
    pub fn contains(&self, service_id: &ServiceId) -> bool {
        self.services.contains(service_id)
    }

    pub fn depth(&self) -> usize {
        self.services.len()
    }

    /// Display names along the path
    pub fn chain(&self) -> Vec<String> {
        self.services.iter().map(ServiceId::display_name).collect()
    }

    /// Get the path as a string for error messages
    pub fn path_string(&self) -> String {
        self.chain().join(" -> ")
    }
}

thread_local! {
    static ACTIVE_PATHS: RefCell<HashMap<Uuid, Rc<RefCell<ResolutionPath>>>> =
        RefCell::new(HashMap::new());
}

/// Resolution path in flight on the current thread for one container hierarchy.
///
/// The outermost resolution of a hierarchy publishes its path; resolutions
/// started through a `Container` or `Scope` handle while it runs (from a
/// factory or a condition predicate) join that path instead of starting a
/// fresh one, so cycle detection and the depth limit still apply.
pub(crate) struct ThreadPath {
    root: Uuid,
    path: Rc<RefCell<ResolutionPath>>,
    outermost: bool,
}

impl ThreadPath {
    /// Join the path of the hierarchy rooted at `root`, publishing a new one
    /// when no resolution is running
    pub(crate) fn join(root: Uuid) -> Self {
        ACTIVE_PATHS.with(|active| {
            let mut active = active.borrow_mut();
            match active.get(&root) {
                Some(path) => Self {
                    root,
                    path: path.clone(),
                    outermost: false,
                },
                None => {
                    let path = Rc::new(RefCell::new(ResolutionPath::new()));
                    active.insert(root, path.clone());
                    Self {
                        root,
                        path,
                        outermost: true,
                    }
                }
            }
        })
    }

    pub(crate) fn is_outermost(&self) -> bool {
        self.outermost
    }

    pub(crate) fn path(&self) -> &RefCell<ResolutionPath> {
        &self.path
    }
}

impl Drop for ThreadPath {
    fn drop(&mut self) {
        if !self.outermost {
            return;
        }
        // the thread-local is gone during thread teardown
        let _ = ACTIVE_PATHS.try_with(|active| {
            if let Ok(mut active) = active.try_borrow_mut() {
                active.remove(&self.root);
            }
        });
    }
}

/// Pops its entry off the path when dropped, including on early returns
struct PathEntry<'p> {
    path: &'p RefCell<ResolutionPath>,
}

impl Drop for PathEntry<'_> {
    fn drop(&mut self) {
        self.path.borrow_mut().pop();
    }
}

type Fallback<'f> = &'f dyn Fn(&Resolver<'_>) -> Result<Instance, CoreError>;

/// Context of one in-flight top-level resolution.
///
/// Every factory, constructor and decorator receives the resolver of the
/// request that triggered it, so nested resolutions share the resolution
/// path and the active scope.
pub struct Resolver<'a> {
    container: &'a Container,
    scope: Option<&'a Scope>,
    path: &'a RefCell<ResolutionPath>,
}

impl<'a> Resolver<'a> {
    pub(crate) fn new(
        container: &'a Container,
        scope: Option<&'a Scope>,
        path: &'a RefCell<ResolutionPath>,
    ) -> Self {
        Self {
            container,
            scope,
            path,
        }
    }

    /// Container whose registrations are being resolved
    pub fn container(&self) -> &Container {
        self.container
    }

    /// Scope the request was made in, if any
    pub fn scope(&self) -> Option<&Scope> {
        self.scope
    }

    /// Number of services currently being resolved
    pub fn depth(&self) -> usize {
        self.path.borrow().depth()
    }

    /// Copy of the current resolution path
    pub fn path(&self) -> ResolutionPath {
        self.path.borrow().clone()
    }

    fn delegate<'p>(&self, parent: &'p Container) -> Resolver<'p>
    where
        'a: 'p,
    {
        Resolver {
            container: parent,
            scope: self.scope,
            path: self.path,
        }
    }

    fn enter(&self, service_id: &ServiceId) -> Result<PathEntry<'a>, CoreError> {
        let mut path = self.path.borrow_mut();

        if path.contains(service_id) {
            let mut chain = path.chain();
            chain.push(service_id.display_name());
            tracing::debug!(chain = %chain.join(" -> "), "circular dependency detected");
            return Err(CoreError::CircularDependency {
                chain,
                cycle_service: service_id.display_name(),
            });
        }

        let max_depth = self.container.config().max_resolution_depth;
        if path.depth() >= max_depth {
            return Err(CoreError::ResolutionDepthExceeded {
                service_type: service_id.display_name(),
                max_depth,
            });
        }

        path.push(service_id.clone());
        Ok(PathEntry { path: self.path })
    }

    /// Resolve the default registration of `service_id`'s type.
    ///
    /// `fallback` builds the service when no container in the hierarchy has
    /// a registration for it.
    pub(crate) fn resolve_instance(
        &self,
        service_id: &ServiceId,
        fallback: Option<Fallback<'_>>,
    ) -> Result<Instance, CoreError> {
        let _entry = self.enter(service_id)?;
        tracing::trace!(service = %service_id, depth = self.depth(), "resolving service");
        self.resolve_entered(service_id, fallback, true)
    }

    fn resolve_entered(
        &self,
        service_id: &ServiceId,
        fallback: Option<Fallback<'_>>,
        decorate: bool,
    ) -> Result<Instance, CoreError> {
        self.container.ensure_active()?;

        let primaries = self.container.primaries(service_id.type_id)?;
        if primaries.is_empty() {
            if let Some(parent) = self.container.parent() {
                if parent.contains_service(service_id)? {
                    return self.delegate(parent).resolve_entered(service_id, fallback, decorate);
                }
            }
            return match fallback {
                Some(build) => build(self),
                None => Err(CoreError::service_not_found(service_id.type_name())),
            };
        }

        let descriptor = primaries
            .iter()
            .rev()
            .find(|descriptor| descriptor.is_eligible(self.container))
            .ok_or_else(|| {
                CoreError::resolution_failed(
                    service_id.type_name(),
                    format!("none of {} registration(s) satisfied its condition", primaries.len()),
                )
            })?;

        let instance = self.materialize(descriptor)?;
        if !decorate {
            return Ok(instance);
        }

        let decorators = self.container.decorators(service_id.type_id)?;
        self.apply_decorators(descriptor, instance, &decorators)
    }

    fn materialize(&self, descriptor: &ServiceDescriptor) -> Result<Instance, CoreError> {
        match &descriptor.activation {
            Activation::Instance(instance) => Ok(instance.clone()),
            Activation::Factory(factory) => self.cached(
                descriptor,
                CacheKey::primary(descriptor.id),
                descriptor.lifetime,
                || factory(self),
            ),
            Activation::Decorator(_) => Err(CoreError::resolution_failed(
                descriptor.service_id.type_name(),
                "a decorator cannot be activated on its own",
            )),
        }
    }

    fn apply_decorators(
        &self,
        target: &ServiceDescriptor,
        mut instance: Instance,
        decorators: &[Arc<ServiceDescriptor>],
    ) -> Result<Instance, CoreError> {
        // Decorated instances share the lifetime of the registration they wrap
        let lifetime = target.effective_lifetime();

        for decorator in decorators {
            if let Activation::Decorator(wrap) = &decorator.activation {
                let inner = instance;
                instance = self.cached(
                    decorator,
                    CacheKey::decorated(decorator.id, target.id),
                    lifetime,
                    || wrap(inner, self),
                )?;
            }
        }

        Ok(instance)
    }

    fn cached<F>(
        &self,
        descriptor: &ServiceDescriptor,
        key: CacheKey,
        lifetime: ServiceLifetime,
        build: F,
    ) -> Result<Instance, CoreError>
    where
        F: FnOnce() -> Result<Instance, CoreError>,
    {
        match lifetime {
            ServiceLifetime::Transient => build(),
            ServiceLifetime::Singleton => self.cache_in(self.container.singletons(), descriptor, key, build),
            ServiceLifetime::Scoped => match self.scope {
                Some(scope) => self.cache_in(scope.cache(), descriptor, key, build),
                None => match self.container.config().scoped_resolution {
                    ScopedResolutionPolicy::Reject => Err(CoreError::ScopeRequired {
                        service_type: descriptor.service_id.display_name(),
                    }),
                    ScopedResolutionPolicy::Singleton => {
                        self.cache_in(self.container.singletons(), descriptor, key, build)
                    }
                },
            },
        }
    }

    fn cache_in<F>(
        &self,
        cache: &InstanceCache,
        descriptor: &ServiceDescriptor,
        key: CacheKey,
        build: F,
    ) -> Result<Instance, CoreError>
    where
        F: FnOnce() -> Result<Instance, CoreError>,
    {
        if let Some(instance) = cache.get(&key)? {
            return Ok(instance);
        }

        let service_type = descriptor.service_id.type_name();
        match self.container.config().singleton_construction {
            SingletonConstruction::Optimistic => {
                let instance = build()?;
                cache.get_or_insert(key, service_type, instance, descriptor.disposer.clone())
            }
            SingletonConstruction::Serialized => {
                let lock = cache.construction_lock(key)?;
                let _guard = lock.lock().map_err(|_| CoreError::lock("singleton construction"))?;
                if let Some(instance) = cache.get(&key)? {
                    return Ok(instance);
                }
                let instance = build()?;
                cache.get_or_insert(key, service_type, instance, descriptor.disposer.clone())
            }
        }
    }

    /// Resolve `S`, delegating to ancestors and falling back to `fallback`
    pub(crate) fn resolve_typed<S>(&self, fallback: Option<Fallback<'_>>) -> Result<Arc<S>, CoreError>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        let service_id = ServiceId::of::<S>();
        let instance = self.resolve_instance(&service_id, fallback)?;
        cast::<S>(&service_id, &instance)
    }

    pub(crate) fn resolve_injectable_typed<T: Injectable>(&self) -> Result<Arc<T>, CoreError> {
        let construct: Fallback<'_> = &|resolver: &Resolver<'_>| {
            tracing::trace!(service = std::any::type_name::<T>(), "constructing unregistered type");
            ConstructorInjector::construct::<T>(resolver).map(|service| erase(Arc::new(service)))
        };
        self.resolve_typed::<T>(Some(construct))
    }

    pub(crate) fn resolve_generic_typed<S>(&self) -> Result<Arc<S>, CoreError>
    where
        S: ?Sized + ClosedGeneric,
    {
        let service_id = ServiceId::of::<S>();
        if !self.container.contains_service(&service_id)? {
            self.container.specialize_open_generic::<S>()?;
        }
        self.resolve_typed::<S>(None)
    }

    pub(crate) fn resolve_last_typed<S>(&self) -> Result<Arc<S>, CoreError>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        let service_id = ServiceId::of::<S>();
        let _entry = self.enter(&service_id)?;
        let instance = self.resolve_entered(&service_id, None, false)?;
        cast::<S>(&service_id, &instance)
    }

    pub(crate) fn resolve_named_typed<S>(&self, name: &str) -> Result<Arc<S>, CoreError>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        let service_id = ServiceId::named::<S>(name);
        let _entry = self.enter(&service_id)?;
        let instance = self.resolve_named_entered(&service_id)?;
        cast::<S>(&service_id, &instance)
    }

    /// Resolve an unnamed or named key without knowing its static type
    pub(crate) fn resolve_key(&self, service_id: &ServiceId) -> Result<Instance, CoreError> {
        match service_id.name {
            Some(_) => {
                let _entry = self.enter(service_id)?;
                self.resolve_named_entered(service_id)
            }
            None => self.resolve_instance(service_id, None),
        }
    }

    fn resolve_named_entered(&self, service_id: &ServiceId) -> Result<Instance, CoreError> {
        self.container.ensure_active()?;

        match self.container.named(service_id)? {
            Some(descriptor) => {
                if !descriptor.is_eligible(self.container) {
                    return Err(CoreError::resolution_failed(
                        service_id.display_name(),
                        "registration condition is not satisfied",
                    ));
                }
                self.materialize(&descriptor)
            }
            None => match self.container.parent() {
                Some(parent) => self.delegate(parent).resolve_named_entered(service_id),
                None => Err(CoreError::service_not_found(service_id.display_name())),
            },
        }
    }

    pub(crate) fn resolve_all_typed<S>(&self) -> Result<Vec<Arc<S>>, CoreError>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        let service_id = ServiceId::of::<S>();
        let _entry = self.enter(&service_id)?;
        self.resolve_all_entered::<S>(&service_id)
    }

    fn resolve_all_entered<S>(&self, service_id: &ServiceId) -> Result<Vec<Arc<S>>, CoreError>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        self.container.ensure_active()?;

        let primaries = self.container.primaries(service_id.type_id)?;
        if primaries.is_empty() {
            return match self.container.parent() {
                Some(parent) => self.delegate(parent).resolve_all_entered::<S>(service_id),
                None => Ok(Vec::new()),
            };
        }

        primaries
            .iter()
            .filter(|descriptor| descriptor.is_eligible(self.container))
            .map(|descriptor| {
                let instance = self.materialize(descriptor)?;
                cast::<S>(service_id, &instance)
            })
            .collect()
    }
}

impl std::fmt::Debug for Resolver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("container", &self.container.id())
            .field("scope", &self.scope.map(Scope::id))
            .field("path", &self.path.borrow().path_string())
            .finish()
    }
}

fn cast<S: ?Sized + Send + Sync + 'static>(
    service_id: &ServiceId,
    instance: &Instance,
) -> Result<Arc<S>, CoreError> {
    downcast::<S>(instance).ok_or_else(|| {
        CoreError::resolution_failed(
            service_id.display_name(),
            "registered instance does not match the requested service type",
        )
    })
}

/// Resolution surface shared by [`Container`], [`Scope`] and [`Resolver`]
pub trait DependencyResolver {
    /// Run `f` with a resolver for this context.
    ///
    /// Containers and scopes start a new top-level resolution; a [`Resolver`]
    /// hands out itself so nested lookups keep the resolution path.
    fn with_resolver<R, F>(&self, f: F) -> Result<R, CoreError>
    where
        F: FnOnce(&Resolver<'_>) -> Result<R, CoreError>;

    /// Resolve the most recently registered eligible implementation of `S`
    fn resolve<S>(&self) -> Result<Arc<S>, CoreError>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        self.with_resolver(|resolver| resolver.resolve_typed::<S>(None))
    }

    /// Resolve `T`, constructing it by constructor injection when it has no
    /// registration anywhere in the hierarchy
    fn resolve_injectable<T: Injectable>(&self) -> Result<Arc<T>, CoreError> {
        self.with_resolver(|resolver| resolver.resolve_injectable_typed::<T>())
    }

    /// Resolve a closed generic type, specializing an open registration on demand
    fn resolve_generic<S>(&self) -> Result<Arc<S>, CoreError>
    where
        S: ?Sized + ClosedGeneric,
    {
        self.with_resolver(|resolver| resolver.resolve_generic_typed::<S>())
    }

    /// Like [`resolve`](Self::resolve), with every error mapped to `None`
    fn try_resolve<S>(&self) -> Option<Arc<S>>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        self.resolve::<S>().ok()
    }

    /// Like [`resolve_named`](Self::resolve_named), with every error mapped to `None`
    fn try_resolve_named<S>(&self, name: &str) -> Option<Arc<S>>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        self.resolve_named::<S>(name).ok()
    }

    /// Every eligible unnamed registration of `S` in registration order, undecorated
    fn resolve_all<S>(&self) -> Result<Vec<Arc<S>>, CoreError>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        self.with_resolver(|resolver| resolver.resolve_all_typed::<S>())
    }

    /// Resolve the registration of `S` with the given name
    fn resolve_named<S>(&self, name: &str) -> Result<Arc<S>, CoreError>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        self.with_resolver(|resolver| resolver.resolve_named_typed::<S>(name))
    }

    /// Instances of [`resolve_all`](Self::resolve_all) accepted by `predicate`
    fn resolve_where<S, P>(&self, predicate: P) -> Result<Vec<Arc<S>>, CoreError>
    where
        S: ?Sized + Send + Sync + 'static,
        P: Fn(&Arc<S>) -> bool,
    {
        let services = self.resolve_all::<S>()?;
        Ok(services.into_iter().filter(|service| predicate(service)).collect())
    }

    /// The registration [`resolve`](Self::resolve) would pick, without decorators
    fn resolve_last<S>(&self) -> Result<Arc<S>, CoreError>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        self.with_resolver(|resolver| resolver.resolve_last_typed::<S>())
    }
}

impl DependencyResolver for Resolver<'_> {
    fn with_resolver<R, F>(&self, f: F) -> Result<R, CoreError>
    where
        F: FnOnce(&Resolver<'_>) -> Result<R, CoreError>,
    {
        f(self)
    }
}
