use std::any::{Any, TypeId};
use std::marker::PhantomData;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::container::autowiring::{ConstructorInjector, Decorator, Implements, Injectable, ParameterInfo};
use crate::container::ioc_container::Container;
use crate::container::resolver::Resolver;
use crate::errors::CoreError;
use crate::foundation::Disposable;

/// Service identifier combining type and optional name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceId {
    pub type_id: TypeId,
    pub type_name: &'static str,
    pub name: Option<String>,
}

impl ServiceId {
    /// Create a new service ID for a type
    pub fn of<T: 'static + ?Sized>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            name: None,
        }
    }

    /// Create a named service ID for a type
    pub fn named<T: 'static + ?Sized>(name: impl Into<String>) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            name: Some(name.into()),
        }
    }

    /// Get the type name as a string
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Same type, no name
    pub fn unnamed(&self) -> Self {
        Self {
            type_id: self.type_id,
            type_name: self.type_name,
            name: None,
        }
    }

    /// Human readable form used in errors and reports
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => format!("{}({})", self.type_name, name),
            None => self.type_name.to_string(),
        }
    }
}

impl std::fmt::Display for ServiceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.display_name())
    }
}

/// Service lifetime enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ServiceLifetime {
    /// Single instance shared across the container
    #[default]
    Singleton,
    /// New instance created for each resolution
    Transient,
    /// One instance per scope
    Scoped,
}

impl ServiceLifetime {
    /// Check if the lifetime is singleton
    pub fn is_singleton(&self) -> bool {
        matches!(self, ServiceLifetime::Singleton)
    }

    /// Check if the lifetime is transient
    pub fn is_transient(&self) -> bool {
        matches!(self, ServiceLifetime::Transient)
    }

    /// Check if the lifetime is scoped
    pub fn is_scoped(&self) -> bool {
        matches!(self, ServiceLifetime::Scoped)
    }

    /// Get the lifetime name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceLifetime::Singleton => "singleton",
            ServiceLifetime::Transient => "transient",
            ServiceLifetime::Scoped => "scoped",
        }
    }
}

impl std::fmt::Display for ServiceLifetime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ServiceLifetime {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "singleton" => Ok(ServiceLifetime::Singleton),
            "transient" => Ok(ServiceLifetime::Transient),
            "scoped" => Ok(ServiceLifetime::Scoped),
            _ => Err(CoreError::InvalidServiceLifetime {
                lifetime: s.to_string(),
            }),
        }
    }
}

/// Type-erased service instance.
///
/// `service` always holds an `Arc<S>` for the service type `S`, which lets
/// trait-object services share the same storage as concrete ones. The
/// implementation's disposal contract travels with it, since it cannot be
/// recovered from a `dyn Trait` service later.
pub(crate) struct Erased {
    service: Box<dyn Any + Send + Sync>,
    disposable: Option<Arc<dyn Disposable>>,
}

impl Erased {
    pub(crate) fn disposable(&self) -> Option<&Arc<dyn Disposable>> {
        self.disposable.as_ref()
    }
}

pub(crate) type Instance = Arc<Erased>;

pub(crate) fn erase<S: ?Sized + Send + Sync + 'static>(service: Arc<S>) -> Instance {
    erase_with(service, None)
}

pub(crate) fn erase_with<S: ?Sized + Send + Sync + 'static>(
    service: Arc<S>,
    disposable: Option<Arc<dyn Disposable>>,
) -> Instance {
    Arc::new(Erased {
        service: Box::new(service),
        disposable,
    })
}

pub(crate) fn downcast<S: ?Sized + Send + Sync + 'static>(instance: &Instance) -> Option<Arc<S>> {
    instance.service.downcast_ref::<Arc<S>>().cloned()
}

/// Factory producing a new instance
pub(crate) type ServiceFactory =
    Arc<dyn Fn(&Resolver<'_>) -> Result<Instance, CoreError> + Send + Sync>;

/// Factory wrapping an already-resolved instance
pub(crate) type DecoratorFactory =
    Arc<dyn Fn(Instance, &Resolver<'_>) -> Result<Instance, CoreError> + Send + Sync>;

/// Eligibility predicate evaluated at resolution time
pub(crate) type Condition = Arc<dyn Fn(&Container) -> bool + Send + Sync>;

/// Disposal hook run when a cached instance is released
pub(crate) type Disposer = Arc<dyn Fn(&Instance) -> Result<(), CoreError> + Send + Sync>;

/// Per-container unique id of a registered descriptor
pub type DescriptorId = u64;

/// How instances of a descriptor come into existence
#[derive(Clone)]
pub(crate) enum Activation {
    /// Built by a factory (type-pair registrations compile to one)
    Factory(ServiceFactory),
    /// Pre-built instance, always shared
    Instance(Instance),
    /// Wraps the instance produced by the previous link of the chain
    Decorator(DecoratorFactory),
}

impl std::fmt::Debug for Activation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Activation::Factory(_) => write!(f, "Factory(<factory_fn>)"),
            Activation::Instance(_) => write!(f, "Instance(<instance>)"),
            Activation::Decorator(_) => write!(f, "Decorator(<decorator_fn>)"),
        }
    }
}

/// Service descriptor containing all metadata for a registration
pub struct ServiceDescriptor {
    /// Assigned by the container when the descriptor is registered
    pub(crate) id: DescriptorId,
    /// Service identifier (type + optional name)
    pub service_id: ServiceId,
    /// Implementation type name, when known
    pub implementation_type: Option<&'static str>,
    /// Service lifetime
    pub lifetime: ServiceLifetime,
    pub(crate) activation: Activation,
    pub(crate) condition: Option<Condition>,
    pub(crate) disposer: Option<Disposer>,
    /// Constructor parameters of the implementation, for diagnostics
    pub dependencies: Vec<ParameterInfo>,
    pub registered_at: DateTime<Utc>,
}

impl std::fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceDescriptor")
            .field("id", &self.id)
            .field("service_id", &self.service_id)
            .field("implementation_type", &self.implementation_type)
            .field("lifetime", &self.lifetime)
            .field("activation", &self.activation)
            .field("conditional", &self.condition.is_some())
            .field("disposable", &self.disposer.is_some())
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

impl ServiceDescriptor {
    /// Start a singleton descriptor for `S`
    pub fn singleton<S: ?Sized + Send + Sync + 'static>() -> ServiceDescriptorBuilder<S> {
        ServiceDescriptorBuilder::new(ServiceLifetime::Singleton)
    }

    /// Start a transient descriptor for `S`
    pub fn transient<S: ?Sized + Send + Sync + 'static>() -> ServiceDescriptorBuilder<S> {
        ServiceDescriptorBuilder::new(ServiceLifetime::Transient)
    }

    /// Start a scoped descriptor for `S`
    pub fn scoped<S: ?Sized + Send + Sync + 'static>() -> ServiceDescriptorBuilder<S> {
        ServiceDescriptorBuilder::new(ServiceLifetime::Scoped)
    }

    /// Start a descriptor for `S` with the given lifetime
    pub fn with_lifetime<S: ?Sized + Send + Sync + 'static>(
        lifetime: ServiceLifetime,
    ) -> ServiceDescriptorBuilder<S> {
        ServiceDescriptorBuilder::new(lifetime)
    }

    /// Decorator descriptor wrapping `S` with `D`
    pub(crate) fn decorator<S, D>(lifetime: ServiceLifetime) -> ServiceDescriptor
    where
        S: ?Sized + Send + Sync + 'static,
        D: Decorator<S>,
    {
        let service_type = std::any::type_name::<S>();
        let factory: DecoratorFactory = Arc::new(move |inner: Instance, resolver: &Resolver<'_>| {
            let inner = downcast::<S>(&inner).ok_or_else(|| {
                CoreError::resolution_failed(service_type, "decorated instance has an unexpected type")
            })?;
            let decorated = D::decorate(inner, resolver)
                .map_err(|error| CoreError::activation(std::any::type_name::<D>(), error))?;
            Ok(erase(<D as Implements<S>>::into_service(Arc::new(decorated))))
        });

        ServiceDescriptor {
            id: 0,
            service_id: ServiceId::of::<S>(),
            implementation_type: Some(std::any::type_name::<D>()),
            lifetime,
            activation: Activation::Decorator(factory),
            condition: None,
            disposer: None,
            dependencies: vec![ParameterInfo::required::<S>()],
            registered_at: Utc::now(),
        }
    }

    /// Whether this descriptor wraps another registration
    pub fn is_decorator(&self) -> bool {
        matches!(self.activation, Activation::Decorator(_))
    }

    /// Whether this descriptor carries a pre-built instance
    pub fn has_instance(&self) -> bool {
        matches!(self.activation, Activation::Instance(_))
    }

    /// Whether this descriptor is activated by a factory
    pub fn has_factory(&self) -> bool {
        matches!(self.activation, Activation::Factory(_))
    }

    /// Whether this descriptor is gated by a predicate
    pub fn is_conditional(&self) -> bool {
        self.condition.is_some()
    }

    /// Id assigned at registration
    pub fn id(&self) -> DescriptorId {
        self.id
    }

    /// Lifetime actually applied when materializing this descriptor
    pub fn effective_lifetime(&self) -> ServiceLifetime {
        if self.has_instance() {
            ServiceLifetime::Singleton
        } else {
            self.lifetime
        }
    }

    /// Evaluate the registration condition against a container
    pub(crate) fn is_eligible(&self, container: &Container) -> bool {
        self.condition
            .as_ref()
            .map_or(true, |condition| condition(container))
    }
}

/// Fluent builder for [`ServiceDescriptor`]
pub struct ServiceDescriptorBuilder<S: ?Sized> {
    name: Option<String>,
    lifetime: ServiceLifetime,
    implementation_type: Option<&'static str>,
    activation: Option<Activation>,
    condition: Option<Condition>,
    disposer: Option<Disposer>,
    dependencies: Vec<ParameterInfo>,
    _phantom: PhantomData<fn() -> Arc<S>>,
}

impl<S: ?Sized + Send + Sync + 'static> ServiceDescriptorBuilder<S> {
    fn new(lifetime: ServiceLifetime) -> Self {
        Self {
            name: None,
            lifetime,
            implementation_type: None,
            activation: None,
            condition: None,
            disposer: None,
            dependencies: Vec::new(),
            _phantom: PhantomData,
        }
    }

    /// Set the service name
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Override the lifetime
    pub fn lifetime(mut self, lifetime: ServiceLifetime) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Build instances by constructor injection of `I`
    pub fn implemented_by<I>(mut self) -> Self
    where
        I: Injectable + Implements<S>,
    {
        let factory: ServiceFactory = Arc::new(|resolver: &Resolver<'_>| {
            let implementation = Arc::new(ConstructorInjector::construct::<I>(resolver)?);
            let disposable = I::as_disposable(implementation.clone());
            Ok(erase_with(<I as Implements<S>>::into_service(implementation), disposable))
        });
        self.implementation_type = Some(std::any::type_name::<I>());
        self.dependencies = ConstructorInjector::dependencies::<I>();
        self.activation = Some(Activation::Factory(factory));
        self
    }

    /// Build instances with a factory closure
    pub fn factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(&Resolver<'_>) -> Result<Arc<S>, CoreError> + Send + Sync + 'static,
    {
        let service_type = std::any::type_name::<S>();
        let factory: ServiceFactory = Arc::new(move |resolver: &Resolver<'_>| {
            factory(resolver)
                .map(erase::<S>)
                .map_err(|error| CoreError::activation(service_type, error))
        });
        self.activation = Some(Activation::Factory(factory));
        self
    }

    /// Use a pre-built instance; forces singleton semantics
    pub fn instance(mut self, instance: Arc<S>) -> Self {
        self.lifetime = ServiceLifetime::Singleton;
        self.activation = Some(Activation::Instance(erase(instance)));
        self
    }

    /// Only resolve this descriptor while `condition` holds
    pub fn when<P>(mut self, condition: P) -> Self
    where
        P: Fn(&Container) -> bool + Send + Sync + 'static,
    {
        self.condition = Some(Arc::new(condition));
        self
    }

    /// Run `dispose` when a cached instance of this descriptor is released.
    ///
    /// Takes the place of the implementation's own
    /// [`Injectable::as_disposable`] hook.
    pub fn disposed_with<F>(mut self, dispose: F) -> Self
    where
        F: Fn(&S) -> Result<(), CoreError> + Send + Sync + 'static,
    {
        self.disposer = Some(Arc::new(move |instance: &Instance| match downcast::<S>(instance) {
            Some(service) => dispose(&*service),
            None => Ok(()),
        }));
        self
    }

    /// Record constructor parameter metadata for factory registrations
    pub fn depends_on(mut self, parameter: ParameterInfo) -> Self {
        self.dependencies.push(parameter);
        self
    }

    /// Build the service descriptor
    pub fn build(self) -> Result<ServiceDescriptor, CoreError> {
        let activation = self.activation.ok_or_else(|| CoreError::InvalidServiceDescriptor {
            message: format!(
                "descriptor for {} needs a factory, an instance or an implementation type",
                std::any::type_name::<S>()
            ),
        })?;

        let service_id = match self.name {
            Some(name) => ServiceId::named::<S>(name),
            None => ServiceId::of::<S>(),
        };

        let lifetime = match activation {
            Activation::Instance(_) => ServiceLifetime::Singleton,
            _ => self.lifetime,
        };

        Ok(ServiceDescriptor {
            id: 0,
            service_id,
            implementation_type: self.implementation_type,
            lifetime,
            activation,
            condition: self.condition,
            disposer: self.disposer,
            dependencies: self.dependencies,
            registered_at: Utc::now(),
        })
    }
}

impl<S: ?Sized + Disposable + Send + Sync + 'static> ServiceDescriptorBuilder<S> {
    /// Dispose cached instances through their [`Disposable`] implementation
    pub fn disposable(self) -> Self {
        self.disposed_with(|service: &S| service.dispose())
    }
}
