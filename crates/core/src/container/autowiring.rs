use std::ops::Deref;
use std::sync::Arc;

use crate::container::descriptor::ServiceId;
use crate::container::resolver::{DependencyResolver, Resolver};
use crate::errors::CoreError;
use crate::foundation::Disposable;

/// Trait for concrete types the container can build by constructor injection.
///
/// Rust has no runtime reflection, so a type lists its public constructors
/// explicitly. The [`ConstructorInjector`] picks the constructor with the
/// most parameters.
///
/// Types that also implement [`Disposable`] override
/// [`as_disposable`](Injectable::as_disposable) so cached instances are
/// disposed together with their container or scope.
///
/// ```rust
/// use std::sync::Arc;
/// use chimera_core::container::{Constructor, Injectable};
///
/// struct Clock;
/// impl Injectable for Clock {
///     fn constructors() -> Vec<Constructor<Self>> {
///         vec![Constructor::new("new", |()| Ok(Clock))]
///     }
/// }
///
/// struct Greenhouse {
///     clock: Arc<Clock>,
/// }
/// impl Injectable for Greenhouse {
///     fn constructors() -> Vec<Constructor<Self>> {
///         vec![Constructor::new("new", |(clock,): (Arc<Clock>,)| Ok(Greenhouse { clock }))]
///     }
/// }
/// ```
pub trait Injectable: Send + Sync + Sized + 'static {
    /// Constructors in declaration order
    fn constructors() -> Vec<Constructor<Self>>;

    /// Disposal contract of a built instance, `None` unless overridden
    fn as_disposable(self: Arc<Self>) -> Option<Arc<dyn Disposable>> {
        None
    }
}

/// Upcast from an implementation to the service type it is registered as.
///
/// Every type implements `Implements<Self>`; trait-object services are
/// connected with [`implements!`](crate::implements).
pub trait Implements<S: ?Sized>: Send + Sync + 'static {
    fn into_service(self: Arc<Self>) -> Arc<S>;
}

impl<T: Send + Sync + 'static> Implements<T> for T {
    fn into_service(self: Arc<Self>) -> Arc<T> {
        self
    }
}

/// Declare that a concrete type can be registered as one or more trait objects
///
/// ```rust
/// use chimera_core::implements;
///
/// trait Logger: Send + Sync {}
/// struct FileLogger;
/// impl Logger for FileLogger {}
///
/// implements!(FileLogger => dyn Logger);
/// ```
#[macro_export]
macro_rules! implements {
    ($implementation:ty => $($service:ty),+ $(,)?) => {
        $(
            impl $crate::container::Implements<$service> for $implementation {
                fn into_service(self: ::std::sync::Arc<Self>) -> ::std::sync::Arc<$service> {
                    self
                }
            }
        )+
    };
}

/// A type that wraps an existing instance of `S` to add behavior.
///
/// Decorators get the full resolver so they can request further
/// dependencies besides the wrapped instance.
pub trait Decorator<S: ?Sized>: Implements<S> + Sized {
    fn decorate(inner: Arc<S>, resolver: &Resolver<'_>) -> Result<Self, CoreError>;
}

/// Metadata about a constructor parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterInfo {
    /// The type name of the parameter
    pub type_name: &'static str,
    /// The service ID this parameter requires
    pub service_id: ServiceId,
    /// Whether this parameter is optional
    pub is_optional: bool,
}

impl ParameterInfo {
    /// A parameter that must resolve
    pub fn required<S: ?Sized + 'static>() -> Self {
        Self {
            type_name: std::any::type_name::<S>(),
            service_id: ServiceId::of::<S>(),
            is_optional: false,
        }
    }

    /// A parameter that becomes `None` when the service is not registered
    pub fn optional<S: ?Sized + 'static>() -> Self {
        Self {
            is_optional: true,
            ..Self::required::<S>()
        }
    }
}

/// Helper trait for extracting constructor parameters
pub trait ConstructorParameter: Sized {
    /// Describe this parameter
    fn parameter_info() -> ParameterInfo;

    /// Resolve this parameter from the in-flight resolution
    fn resolve_parameter(resolver: &Resolver<'_>) -> Result<Self, CoreError>;
}

/// Implementation for Arc<S> parameters, resolved from registrations
impl<S: ?Sized + Send + Sync + 'static> ConstructorParameter for Arc<S> {
    fn parameter_info() -> ParameterInfo {
        ParameterInfo::required::<S>()
    }

    fn resolve_parameter(resolver: &Resolver<'_>) -> Result<Self, CoreError> {
        resolver.resolve::<S>()
    }
}

/// Implementation for Option<Arc<S>> parameters (optional dependencies).
///
/// Only a missing registration of `S` itself yields `None`; failures while
/// building a registered `S` still propagate.
impl<S: ?Sized + Send + Sync + 'static> ConstructorParameter for Option<Arc<S>> {
    fn parameter_info() -> ParameterInfo {
        ParameterInfo::optional::<S>()
    }

    fn resolve_parameter(resolver: &Resolver<'_>) -> Result<Self, CoreError> {
        if !resolver.container().is_registered::<S>() {
            return Ok(None);
        }
        resolver.resolve::<S>().map(Some)
    }
}

/// Implementation for Vec<Arc<S>> parameters, resolved as a collection
impl<S: ?Sized + Send + Sync + 'static> ConstructorParameter for Vec<Arc<S>> {
    fn parameter_info() -> ParameterInfo {
        ParameterInfo::optional::<S>()
    }

    fn resolve_parameter(resolver: &Resolver<'_>) -> Result<Self, CoreError> {
        resolver.resolve_all::<S>()
    }
}

/// Parameter holding a concrete [`Injectable`] dependency.
///
/// Unlike `Arc<T>` it falls back to constructor injection when `T` has no
/// registration of its own.
pub struct Autowired<T: Injectable>(Arc<T>);

impl<T: Injectable> Autowired<T> {
    pub fn into_inner(self) -> Arc<T> {
        self.0
    }
}

impl<T: Injectable> Deref for Autowired<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: Injectable> Clone for Autowired<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: Injectable> ConstructorParameter for Autowired<T> {
    fn parameter_info() -> ParameterInfo {
        ParameterInfo::required::<T>()
    }

    fn resolve_parameter(resolver: &Resolver<'_>) -> Result<Self, CoreError> {
        resolver.resolve_injectable::<T>().map(Autowired)
    }
}

/// A full parameter list, implemented for tuples of [`ConstructorParameter`]s
pub trait ConstructorParameters: Sized {
    fn parameter_infos() -> Vec<ParameterInfo>;

    fn resolve_parameters(resolver: &Resolver<'_>) -> Result<Self, CoreError>;
}

macro_rules! impl_constructor_parameters {
    ($($param:ident),*) => {
        impl<$($param: ConstructorParameter),*> ConstructorParameters for ($($param,)*) {
            fn parameter_infos() -> Vec<ParameterInfo> {
                vec![$($param::parameter_info()),*]
            }

            #[allow(unused_variables)]
            fn resolve_parameters(resolver: &Resolver<'_>) -> Result<Self, CoreError> {
                Ok(($($param::resolve_parameter(resolver)?,)*))
            }
        }
    };
}

impl_constructor_parameters!();
impl_constructor_parameters!(P1);
impl_constructor_parameters!(P1, P2);
impl_constructor_parameters!(P1, P2, P3);
impl_constructor_parameters!(P1, P2, P3, P4);
impl_constructor_parameters!(P1, P2, P3, P4, P5);
impl_constructor_parameters!(P1, P2, P3, P4, P5, P6);
impl_constructor_parameters!(P1, P2, P3, P4, P5, P6, P7);
impl_constructor_parameters!(P1, P2, P3, P4, P5, P6, P7, P8);

type Activate<T> = Box<dyn Fn(&Resolver<'_>) -> Result<T, CoreError> + Send + Sync>;

/// One public constructor of an [`Injectable`] type
pub struct Constructor<T> {
    name: &'static str,
    parameters: Vec<ParameterInfo>,
    activate: Activate<T>,
}

impl<T: 'static> Constructor<T> {
    /// Declare a constructor whose parameters are resolved as the tuple `P`
    pub fn new<P, F>(name: &'static str, build: F) -> Self
    where
        P: ConstructorParameters + 'static,
        F: Fn(P) -> Result<T, CoreError> + Send + Sync + 'static,
    {
        Self {
            name,
            parameters: P::parameter_infos(),
            activate: Box::new(move |resolver: &Resolver<'_>| {
                build(P::resolve_parameters(resolver)?)
            }),
        }
    }
}

impl<T> Constructor<T> {
    /// Constructor name, for diagnostics
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Parameter metadata in declaration order
    pub fn parameters(&self) -> &[ParameterInfo] {
        &self.parameters
    }

    /// Number of parameters
    pub fn arity(&self) -> usize {
        self.parameters.len()
    }
}

impl<T> std::fmt::Debug for Constructor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Constructor")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .finish()
    }
}

/// Builds [`Injectable`] types with their greediest constructor
pub struct ConstructorInjector;

impl ConstructorInjector {
    /// Pick the constructor with the most parameters.
    ///
    /// Ties go to the constructor declared first.
    pub fn select<T>(constructors: &[Constructor<T>]) -> Option<&Constructor<T>> {
        constructors.iter().fold(None, |best: Option<&Constructor<T>>, candidate| match best {
            Some(current) if current.arity() >= candidate.arity() => Some(current),
            _ => Some(candidate),
        })
    }

    /// Construct `T`, resolving every parameter through `resolver`
    pub fn construct<T: Injectable>(resolver: &Resolver<'_>) -> Result<T, CoreError> {
        let type_name = std::any::type_name::<T>();
        let constructors = T::constructors();
        let constructor = Self::select(&constructors).ok_or_else(|| {
            CoreError::resolution_failed(type_name, "type declares no public constructor")
        })?;

        tracing::trace!(
            service = type_name,
            constructor = constructor.name,
            parameters = constructor.arity(),
            "constructor injection"
        );

        (constructor.activate)(resolver).map_err(|error| CoreError::activation(type_name, error))
    }

    /// Parameters of the constructor that would be selected for `T`
    pub fn dependencies<T: Injectable>() -> Vec<ParameterInfo> {
        Self::select(&T::constructors())
            .map(|constructor| constructor.parameters.clone())
            .unwrap_or_default()
    }
}
