use std::any::TypeId;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use std::time::Instant;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::ContainerConfig;
use crate::container::autowiring::{Decorator, Implements, Injectable};
use crate::container::builder::ContainerBuilder;
use crate::container::cache::{dispose_all, InstanceCache};
use crate::container::debug::{ContainerReport, PerformanceCounters, PerformanceStats, RegistrationInfo};
use crate::container::descriptor::{
    DescriptorId, ServiceDescriptor, ServiceDescriptorBuilder, ServiceId, ServiceLifetime,
};
use crate::container::generics::{ClosedGeneric, GenericDefinition, GenericImplementation, OpenGenericRegistration};
use crate::container::registry::ServiceRegistry;
use crate::container::resolver::{DependencyResolver, Resolver, ThreadPath};
use crate::container::scope::{Scope, ScopeId, ScopeState};
use crate::container::validation::{captive_dependencies, VerificationReport};
use crate::errors::CoreError;

type RegistrationListener = Arc<dyn Fn(&RegistrationInfo) + Send + Sync>;

struct ContainerState {
    id: Uuid,
    config: ContainerConfig,
    registry: RwLock<ServiceRegistry>,
    singletons: InstanceCache,
    scopes: RwLock<HashMap<ScopeId, Weak<ScopeState>>>,
    parent: Option<Container>,
    depth: usize,
    children: Mutex<Vec<Weak<ContainerState>>>,
    stats: PerformanceCounters,
    listeners: RwLock<Vec<RegistrationListener>>,
    disposed: AtomicBool,
    created_at: DateTime<Utc>,
}

impl Drop for ContainerState {
    fn drop(&mut self) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        // last handle gone without an explicit dispose
        if let Ok(entries) = self.singletons.drain() {
            if let Err(error) = dispose_all(entries) {
                tracing::warn!(container = %self.id, %error, "container dropped with failing disposal");
            }
        }
    }
}

/// Service container.
///
/// `Container` is a cheap handle: clones share the same registrations and
/// caches. Registration and resolution take `&self` and are safe to call
/// from several threads at once.
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerState>,
}

impl Container {
    /// Create a root container with the default configuration
    pub fn new() -> Self {
        Self::from_parts(ContainerConfig::default(), None)
    }

    /// Create a root container with a validated configuration
    pub fn with_config(config: ContainerConfig) -> Result<Self, CoreError> {
        config.validate()?;
        Ok(Self::from_parts(config, None))
    }

    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    fn from_parts(config: ContainerConfig, parent: Option<Container>) -> Self {
        let depth = parent.as_ref().map_or(0, |parent| parent.depth() + 1);
        let container = Self {
            inner: Arc::new(ContainerState {
                id: Uuid::new_v4(),
                stats: PerformanceCounters::new(&config),
                config,
                registry: RwLock::new(ServiceRegistry::new()),
                singletons: InstanceCache::new("singleton instances"),
                scopes: RwLock::new(HashMap::new()),
                parent,
                depth,
                children: Mutex::new(Vec::new()),
                listeners: RwLock::new(Vec::new()),
                disposed: AtomicBool::new(false),
                created_at: Utc::now(),
            }),
        };
        tracing::info!(container = %container.id(), depth, "container created");
        container
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.inner.config
    }

    /// Container this one delegates to
    pub fn parent(&self) -> Option<&Container> {
        self.inner.parent.as_ref()
    }

    /// Number of ancestors
    pub fn depth(&self) -> usize {
        self.inner.depth
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.inner.created_at
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    pub(crate) fn ensure_active(&self) -> Result<(), CoreError> {
        if self.is_disposed() {
            return Err(CoreError::disposed(format!("container {}", self.id())));
        }
        Ok(())
    }

    fn read_registry(&self) -> Result<RwLockReadGuard<'_, ServiceRegistry>, CoreError> {
        self.inner
            .registry
            .read()
            .map_err(|_| CoreError::lock("service registry"))
    }

    fn write_registry(&self) -> Result<RwLockWriteGuard<'_, ServiceRegistry>, CoreError> {
        self.inner
            .registry
            .write()
            .map_err(|_| CoreError::lock("service registry"))
    }

    pub(crate) fn singletons(&self) -> &InstanceCache {
        &self.inner.singletons
    }

    pub(crate) fn primaries(&self, type_id: TypeId) -> Result<Vec<Arc<ServiceDescriptor>>, CoreError> {
        Ok(self.read_registry()?.primaries(type_id))
    }

    pub(crate) fn decorators(&self, type_id: TypeId) -> Result<Vec<Arc<ServiceDescriptor>>, CoreError> {
        Ok(self.read_registry()?.decorators(type_id))
    }

    pub(crate) fn named(&self, service_id: &ServiceId) -> Result<Option<Arc<ServiceDescriptor>>, CoreError> {
        Ok(self.read_registry()?.named(service_id))
    }

    /// Whether this container or an ancestor can satisfy `service_id`
    pub(crate) fn contains_service(&self, service_id: &ServiceId) -> Result<bool, CoreError> {
        let mut current = Some(self);
        while let Some(container) = current {
            if container.read_registry()?.contains(service_id) {
                return Ok(true);
            }
            current = container.parent();
        }
        Ok(false)
    }

    /// Id of the outermost ancestor, shared by the whole hierarchy
    pub(crate) fn root_id(&self) -> Uuid {
        let mut root = self;
        while let Some(parent) = root.parent() {
            root = parent;
        }
        root.id()
    }

    /// Run `f` as a top-level resolution, or as part of the resolution
    /// already running on this thread, recording statistics
    pub(crate) fn run_resolution<R, F>(&self, scope: Option<&Scope>, f: F) -> Result<R, CoreError>
    where
        F: FnOnce(&Resolver<'_>) -> Result<R, CoreError>,
    {
        let thread_path = ThreadPath::join(self.root_id());
        let resolver = Resolver::new(self, scope, thread_path.path());

        // nested resolutions through a handle belong to the outer request
        if !thread_path.is_outermost() || !self.inner.stats.is_enabled() {
            return f(&resolver);
        }

        let started = Instant::now();
        let result = f(&resolver);
        self.inner.stats.record(started.elapsed(), result.is_ok());
        result
    }

    // Registration

    /// Register a descriptor built with [`ServiceDescriptor`]'s fluent builder
    pub fn add_descriptor(&self, descriptor: ServiceDescriptor) -> Result<&Self, CoreError> {
        self.ensure_active()?;
        let descriptor = self.write_registry()?.add(descriptor)?;
        self.notify_registered(&descriptor);
        Ok(self)
    }

    fn notify_registered(&self, descriptor: &ServiceDescriptor) {
        let info = RegistrationInfo::from(descriptor);
        tracing::debug!(
            container = %self.id(),
            service = %info.service_type,
            implementation = info.implementation_type.as_deref().unwrap_or("<factory>"),
            lifetime = %info.lifetime,
            name = info.name.as_deref().unwrap_or(""),
            "service registered"
        );

        let listeners = match self.inner.listeners.read() {
            Ok(listeners) => listeners.clone(),
            Err(_) => return,
        };
        for listener in listeners {
            listener(&info);
        }
    }

    /// Call `listener` after every successful registration
    pub fn on_service_registered<F>(&self, listener: F) -> Result<(), CoreError>
    where
        F: Fn(&RegistrationInfo) + Send + Sync + 'static,
    {
        self.inner
            .listeners
            .write()
            .map_err(|_| CoreError::lock("registration listeners"))?
            .push(Arc::new(listener));
        Ok(())
    }

    fn register_type<S, I>(&self, lifetime: ServiceLifetime) -> Result<&Self, CoreError>
    where
        S: ?Sized + Send + Sync + 'static,
        I: Injectable + Implements<S>,
    {
        self.add_descriptor(
            ServiceDescriptor::with_lifetime::<S>(lifetime)
                .implemented_by::<I>()
                .build()?,
        )
    }

    fn register_factory<S, F>(&self, lifetime: ServiceLifetime, factory: F) -> Result<&Self, CoreError>
    where
        S: ?Sized + Send + Sync + 'static,
        F: Fn(&Resolver<'_>) -> Result<Arc<S>, CoreError> + Send + Sync + 'static,
    {
        self.add_descriptor(
            ServiceDescriptor::with_lifetime::<S>(lifetime)
                .factory(factory)
                .build()?,
        )
    }

    /// Register `I` as the singleton implementation of `S`
    pub fn register_singleton<S, I>(&self) -> Result<&Self, CoreError>
    where
        S: ?Sized + Send + Sync + 'static,
        I: Injectable + Implements<S>,
    {
        self.register_type::<S, I>(ServiceLifetime::Singleton)
    }

    /// Register `I` as a transient implementation of `S`
    pub fn register_transient<S, I>(&self) -> Result<&Self, CoreError>
    where
        S: ?Sized + Send + Sync + 'static,
        I: Injectable + Implements<S>,
    {
        self.register_type::<S, I>(ServiceLifetime::Transient)
    }

    /// Register `I` as the per-scope implementation of `S`
    pub fn register_scoped<S, I>(&self) -> Result<&Self, CoreError>
    where
        S: ?Sized + Send + Sync + 'static,
        I: Injectable + Implements<S>,
    {
        self.register_type::<S, I>(ServiceLifetime::Scoped)
    }

    pub fn register_singleton_factory<S, F>(&self, factory: F) -> Result<&Self, CoreError>
    where
        S: ?Sized + Send + Sync + 'static,
        F: Fn(&Resolver<'_>) -> Result<Arc<S>, CoreError> + Send + Sync + 'static,
    {
        self.register_factory(ServiceLifetime::Singleton, factory)
    }

    pub fn register_transient_factory<S, F>(&self, factory: F) -> Result<&Self, CoreError>
    where
        S: ?Sized + Send + Sync + 'static,
        F: Fn(&Resolver<'_>) -> Result<Arc<S>, CoreError> + Send + Sync + 'static,
    {
        self.register_factory(ServiceLifetime::Transient, factory)
    }

    pub fn register_scoped_factory<S, F>(&self, factory: F) -> Result<&Self, CoreError>
    where
        S: ?Sized + Send + Sync + 'static,
        F: Fn(&Resolver<'_>) -> Result<Arc<S>, CoreError> + Send + Sync + 'static,
    {
        self.register_factory(ServiceLifetime::Scoped, factory)
    }

    /// Register a pre-built singleton
    pub fn register_instance<S>(&self, instance: Arc<S>) -> Result<&Self, CoreError>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        self.add_descriptor(ServiceDescriptor::singleton::<S>().instance(instance).build()?)
    }

    /// Register every implementation of `collection` as a transient `S`, in order
    pub fn register_collection<S>(&self, collection: CollectionBuilder<S>) -> Result<&Self, CoreError>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        if collection.is_empty() {
            return Err(CoreError::InvalidServiceDescriptor {
                message: format!(
                    "collection for {} has no implementations",
                    std::any::type_name::<S>()
                ),
            });
        }

        self.ensure_active()?;
        let descriptors = collection
            .members
            .into_iter()
            .map(ServiceDescriptorBuilder::build)
            .collect::<Result<Vec<_>, _>>()?;

        let added = {
            let mut registry = self.write_registry()?;
            descriptors
                .into_iter()
                .map(|descriptor| registry.add(descriptor))
                .collect::<Result<Vec<_>, _>>()?
        };
        for descriptor in &added {
            self.notify_registered(descriptor);
        }
        Ok(self)
    }

    /// Register `I` as the singleton `S` reachable only by `name`
    pub fn register_named<S, I>(&self, name: impl Into<String>) -> Result<&Self, CoreError>
    where
        S: ?Sized + Send + Sync + 'static,
        I: Injectable + Implements<S>,
    {
        self.add_descriptor(
            ServiceDescriptor::singleton::<S>()
                .named(name)
                .implemented_by::<I>()
                .build()?,
        )
    }

    /// Register `I` as a singleton `S` that is only eligible while `predicate` holds
    pub fn register_conditional<S, I, P>(&self, predicate: P) -> Result<&Self, CoreError>
    where
        S: ?Sized + Send + Sync + 'static,
        I: Injectable + Implements<S>,
        P: Fn(&Container) -> bool + Send + Sync + 'static,
    {
        self.add_descriptor(
            ServiceDescriptor::singleton::<S>()
                .implemented_by::<I>()
                .when(predicate)
                .build()?,
        )
    }

    /// Wrap every resolution of `S` with `D`.
    ///
    /// Decorators apply in registration order; at least one registration of
    /// `S` must exist in this container.
    pub fn register_decorator<S, D>(&self) -> Result<&Self, CoreError>
    where
        S: ?Sized + Send + Sync + 'static,
        D: Decorator<S>,
    {
        // the store replaces the lifetime with the one of the wrapped registration
        self.add_descriptor(ServiceDescriptor::decorator::<S, D>(ServiceLifetime::Transient))
    }

    /// Register an open generic implementation for definition `D`
    pub fn register_open_generic<D, I>(&self, lifetime: ServiceLifetime) -> Result<&Self, CoreError>
    where
        D: GenericDefinition,
        I: GenericImplementation<Definition = D>,
    {
        self.ensure_active()?;
        let registration = OpenGenericRegistration::new::<D, I>(lifetime);
        tracing::debug!(
            container = %self.id(),
            definition = registration.definition,
            implementation = registration.implementation.type_name(),
            %lifetime,
            "open generic registered"
        );
        self.write_registry()?.add_open_generic(TypeId::of::<D>(), registration);
        Ok(self)
    }

    /// Memoize a descriptor for `S` in the nearest container holding an open
    /// registration for its definition. Does nothing when there is none.
    pub(crate) fn specialize_open_generic<S>(&self) -> Result<(), CoreError>
    where
        S: ?Sized + ClosedGeneric,
    {
        let definition = TypeId::of::<S::Definition>();
        let mut current = Some(self);

        while let Some(container) = current {
            let registration = container.read_registry()?.open_generic(definition);
            if let Some(registration) = registration {
                return container.memoize_specialization::<S>(&registration);
            }
            current = container.parent();
        }

        Ok(())
    }

    fn memoize_specialization<S>(&self, registration: &OpenGenericRegistration) -> Result<(), CoreError>
    where
        S: ?Sized + ClosedGeneric,
    {
        let implementation = registration.implementation;
        let mut descriptor = ServiceDescriptor::with_lifetime::<S>(registration.lifetime)
            .factory(move |resolver: &Resolver<'_>| S::specialize(&implementation, resolver))
            .build()?;
        descriptor.implementation_type = Some(implementation.type_name());

        let added = {
            let mut registry = self.write_registry()?;
            if registry.contains(&ServiceId::of::<S>()) {
                None
            } else {
                Some(registry.add(descriptor)?)
            }
        };

        if let Some(descriptor) = added {
            tracing::debug!(
                definition = registration.definition,
                service = std::any::type_name::<S>(),
                "specialized open generic"
            );
            self.notify_registered(&descriptor);
        }
        Ok(())
    }

    /// Replace every registration of `S` with a transient `I`.
    ///
    /// Cached singletons of the old registrations are dropped without being
    /// disposed.
    pub fn replace<S, I>(&self) -> Result<&Self, CoreError>
    where
        S: ?Sized + Send + Sync + 'static,
        I: Injectable + Implements<S>,
    {
        self.replace_with(
            ServiceDescriptor::transient::<S>()
                .implemented_by::<I>()
                .build()?,
        )
    }

    /// Replace every registration of `S` with a transient factory
    pub fn replace_factory<S, F>(&self, factory: F) -> Result<&Self, CoreError>
    where
        S: ?Sized + Send + Sync + 'static,
        F: Fn(&Resolver<'_>) -> Result<Arc<S>, CoreError> + Send + Sync + 'static,
    {
        self.replace_with(ServiceDescriptor::transient::<S>().factory(factory).build()?)
    }

    fn replace_with(&self, descriptor: ServiceDescriptor) -> Result<&Self, CoreError> {
        self.ensure_active()?;
        let type_id = descriptor.service_id.type_id;

        let (removed, added) = {
            let mut registry = self.write_registry()?;
            let removed = registry.remove_type(type_id);
            (removed, registry.add(descriptor)?)
        };

        let dropped = self.evict(&removed)?;
        tracing::debug!(
            service = added.service_id.type_name(),
            replaced = removed.len(),
            dropped,
            "service replaced"
        );
        self.notify_registered(&added);
        Ok(self)
    }

    /// Remove cached singletons of `descriptors`, returning how many were dropped
    fn evict(&self, descriptors: &[Arc<ServiceDescriptor>]) -> Result<usize, CoreError> {
        let ids: Vec<DescriptorId> = descriptors.iter().map(|descriptor| descriptor.id()).collect();
        let evicted = self
            .inner
            .singletons
            .remove_where(|key| ids.iter().any(|id| key.involves(*id)))?;
        Ok(evicted.len())
    }

    /// Remove every registration of `S`, named ones included, and dispose
    /// its cached singletons. Returns whether anything was registered.
    pub fn unregister<S>(&self) -> Result<bool, CoreError>
    where
        S: ?Sized + 'static,
    {
        self.ensure_active()?;
        let removed = self.write_registry()?.remove_type(TypeId::of::<S>());
        if removed.is_empty() {
            return Ok(false);
        }

        let ids: Vec<DescriptorId> = removed.iter().map(|descriptor| descriptor.id()).collect();
        let evicted = self
            .inner
            .singletons
            .remove_where(|key| ids.iter().any(|id| key.involves(*id)))?;

        tracing::debug!(
            service = std::any::type_name::<S>(),
            registrations = removed.len(),
            instances = evicted.len(),
            "service unregistered"
        );
        dispose_all(evicted)?;
        Ok(true)
    }

    /// Remove every registration and dispose every cached singleton
    pub fn clear(&self) -> Result<(), CoreError> {
        self.ensure_active()?;
        let removed = self.write_registry()?.clear();
        let evicted = self.inner.singletons.drain()?;
        tracing::debug!(
            container = %self.id(),
            registrations = removed.len(),
            instances = evicted.len(),
            "container cleared"
        );
        dispose_all(evicted)
    }

    // Queries

    /// Whether `S` has an unnamed registration here or in an ancestor
    pub fn is_registered<S: ?Sized + 'static>(&self) -> bool {
        self.is_registered_id(&ServiceId::of::<S>())
    }

    /// Whether `S` is registered under `name` here or in an ancestor
    pub fn is_registered_named<S: ?Sized + 'static>(&self, name: &str) -> bool {
        self.is_registered_id(&ServiceId::named::<S>(name))
    }

    pub fn is_registered_id(&self, service_id: &ServiceId) -> bool {
        self.contains_service(service_id).unwrap_or(false)
    }

    // Scopes and hierarchy

    /// Open a new scope for `Scoped` services
    pub fn create_scope(&self) -> Result<Scope, CoreError> {
        self.ensure_active()?;
        let scope = Scope::new(self.clone());
        self.inner
            .scopes
            .write()
            .map_err(|_| CoreError::lock("active scopes"))?
            .insert(scope.id(), Arc::downgrade(scope.state()));
        tracing::debug!(container = %self.id(), scope = %scope.id(), "scope created");
        Ok(scope)
    }

    pub(crate) fn forget_scope(&self, id: ScopeId) {
        if let Ok(mut scopes) = self.inner.scopes.write() {
            scopes.remove(&id);
        }
    }

    pub fn active_scope_count(&self) -> usize {
        self.inner
            .scopes
            .read()
            .map(|scopes| scopes.len())
            .unwrap_or(0)
    }

    /// Create a child that delegates unregistered types to this container
    pub fn create_child_container(&self) -> Result<Container, CoreError> {
        self.create_child_with_config(self.inner.config.clone())
    }

    pub(crate) fn create_child_with_config(&self, config: ContainerConfig) -> Result<Container, CoreError> {
        self.ensure_active()?;
        config.validate()?;

        let child = Self::from_parts(config, Some(self.clone()));
        let mut children = self
            .inner
            .children
            .lock()
            .map_err(|_| CoreError::lock("child containers"))?;
        children.retain(|child| child.strong_count() > 0);
        children.push(Arc::downgrade(&child.inner));
        Ok(child)
    }

    /// Dispose active scopes, cached singletons, registrations and child
    /// containers, in that order.
    ///
    /// Every disposable instance is attempted; failures are reported together.
    /// Calling this more than once is a no-op.
    pub fn dispose(&self) -> Result<(), CoreError> {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        tracing::info!(container = %self.id(), "disposing container");

        let mut failures = Vec::new();

        let scopes: Vec<Weak<ScopeState>> = match self.inner.scopes.write() {
            Ok(mut scopes) => scopes.drain().map(|(_, scope)| scope).collect(),
            Err(_) => Vec::new(),
        };
        for scope in scopes.iter().filter_map(Weak::upgrade) {
            tracing::debug!(scope = %scope.id(), "disposing active scope");
            absorb(&mut failures, scope.dispose());
        }

        absorb(&mut failures, self.inner.singletons.drain().and_then(dispose_all));

        match self.inner.registry.write() {
            Ok(mut registry) => {
                registry.clear();
            }
            Err(_) => failures.push(CoreError::lock("service registry").to_string()),
        }

        let children: Vec<Weak<ContainerState>> = match self.inner.children.lock() {
            Ok(mut children) => children.drain(..).collect(),
            Err(_) => Vec::new(),
        };
        for child in children.iter().filter_map(Weak::upgrade) {
            absorb(&mut failures, Container { inner: child }.dispose());
        }

        if failures.is_empty() {
            Ok(())
        } else {
            tracing::warn!(container = %self.id(), failures = failures.len(), "container disposed with failures");
            Err(CoreError::DisposalFailed { failures })
        }
    }

    // Diagnostics

    /// Resolve every registration inside a temporary scope and report the
    /// ones that fail, without stopping at the first failure
    pub fn validate_services(&self) -> Result<VerificationReport, CoreError> {
        self.ensure_active()?;
        let (targets, descriptors) = {
            let registry = self.read_registry()?;
            (registry.verification_targets(), registry.all())
        };

        let scope = self.create_scope()?;
        let mut report = VerificationReport::new();
        for target in &targets {
            let thread_path = ThreadPath::join(self.root_id());
            let resolver = Resolver::new(self, Some(&scope), thread_path.path());
            report.record(target, resolver.resolve_key(target).map(|_| ()));
        }

        let lifetimes: HashMap<ServiceId, ServiceLifetime> = descriptors
            .iter()
            .filter(|descriptor| !descriptor.is_decorator() && descriptor.service_id.name.is_none())
            .map(|descriptor| (descriptor.service_id.clone(), descriptor.effective_lifetime()))
            .collect();
        report.warnings = captive_dependencies(&descriptors, &lifetimes);

        if let Err(error) = scope.dispose() {
            tracing::warn!(%error, "verification scope disposal failed");
        }

        tracing::info!(
            container = %self.id(),
            checked = report.checked,
            failures = report.failures.len(),
            warnings = report.warnings.len(),
            "verification finished"
        );
        Ok(report)
    }

    /// Like [`validate_services`](Self::validate_services), failing with
    /// [`CoreError::VerificationFailed`] when any registration is broken
    pub fn verify(&self) -> Result<VerificationReport, CoreError> {
        self.validate_services()?.into_result()
    }

    /// Every registration of this container, in registration order
    pub fn registration_info(&self) -> Result<Vec<RegistrationInfo>, CoreError> {
        Ok(self
            .read_registry()?
            .all()
            .iter()
            .map(|descriptor| RegistrationInfo::from(descriptor.as_ref()))
            .collect())
    }

    pub fn performance_stats(&self) -> PerformanceStats {
        let mut stats = PerformanceStats::default();
        self.inner.stats.fill(&mut stats);
        stats.registered_services = self.read_registry().map(|registry| registry.len()).unwrap_or(0);
        stats.cached_singletons = self.inner.singletons.len();
        stats.active_scopes = self.active_scope_count();
        stats
    }

    pub fn report(&self) -> Result<ContainerReport, CoreError> {
        let (service_types, open_generics) = {
            let registry = self.read_registry()?;
            (registry.type_count(), registry.open_generic_count())
        };
        Ok(ContainerReport {
            container_id: self.id().to_string(),
            depth: self.depth(),
            generated_at: Utc::now(),
            registrations: self.registration_info()?,
            service_types,
            open_generics,
            stats: self.performance_stats(),
        })
    }

    /// Text dump of registrations and statistics
    pub fn debug_report(&self) -> Result<String, CoreError> {
        Ok(self.report()?.to_string())
    }
}

fn absorb(failures: &mut Vec<String>, result: Result<(), CoreError>) {
    match result {
        Ok(()) => {}
        Err(CoreError::DisposalFailed { failures: nested }) => failures.extend(nested),
        Err(error) => failures.push(error.to_string()),
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl DependencyResolver for Container {
    fn with_resolver<R, F>(&self, f: F) -> Result<R, CoreError>
    where
        F: FnOnce(&Resolver<'_>) -> Result<R, CoreError>,
    {
        self.run_resolution(None, f)
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("id", &self.inner.id)
            .field("depth", &self.inner.depth)
            .field(
                "registrations",
                &self.read_registry().map(|registry| registry.len()).unwrap_or(0),
            )
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Implementations registered together by [`Container::register_collection`]
pub struct CollectionBuilder<S: ?Sized> {
    members: Vec<ServiceDescriptorBuilder<S>>,
    _phantom: PhantomData<fn() -> Arc<S>>,
}

impl<S: ?Sized + Send + Sync + 'static> CollectionBuilder<S> {
    pub fn new() -> Self {
        Self {
            members: Vec::new(),
            _phantom: PhantomData,
        }
    }

    /// Append an implementation built by constructor injection
    pub fn add<I>(mut self) -> Self
    where
        I: Injectable + Implements<S>,
    {
        self.members
            .push(ServiceDescriptor::transient::<S>().implemented_by::<I>());
        self
    }

    /// Append an implementation built by a factory
    pub fn add_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(&Resolver<'_>) -> Result<Arc<S>, CoreError> + Send + Sync + 'static,
    {
        self.members.push(ServiceDescriptor::transient::<S>().factory(factory));
        self
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl<S: ?Sized + Send + Sync + 'static> Default for CollectionBuilder<S> {
    fn default() -> Self {
        Self::new()
    }
}
