//! Open generic registrations.
//!
//! Rust generics are monomorphized, so an "open" registration cannot hold a
//! factory for every possible closing type. Instead the unbound definition
//! and implementation are represented by marker types. When a closed type is
//! first requested, the container hands it the implementation marker that
//! was registered for its definition, and the closed type builds the
//! matching implementation.
//!
//! ```rust
//! use std::marker::PhantomData;
//! use std::sync::Arc;
//! use chimera_core::container::{
//!     ClosedGeneric, Container, DependencyResolver, GenericDefinition,
//!     GenericImplementation, OpenImplementation, Resolver, ServiceLifetime,
//! };
//! use chimera_core::CoreError;
//!
//! trait Repository<T>: Send + Sync {
//!     fn backend(&self) -> &'static str;
//! }
//!
//! /// `Repository<T>`
//! struct AnyRepository;
//! impl GenericDefinition for AnyRepository {}
//!
//! /// `MemoryRepository<T>`
//! struct AnyMemoryRepository;
//! impl GenericImplementation for AnyMemoryRepository {
//!     type Definition = AnyRepository;
//! }
//!
//! struct MemoryRepository<T> {
//!     _items: PhantomData<fn() -> T>,
//! }
//!
//! impl<T: 'static> Repository<T> for MemoryRepository<T> {
//!     fn backend(&self) -> &'static str {
//!         "memory"
//!     }
//! }
//!
//! impl<T: 'static> ClosedGeneric for dyn Repository<T> {
//!     type Definition = AnyRepository;
//!
//!     fn specialize(
//!         implementation: &OpenImplementation,
//!         _resolver: &Resolver<'_>,
//!     ) -> Result<Arc<Self>, CoreError> {
//!         if implementation.is::<AnyMemoryRepository>() {
//!             return Ok(Arc::new(MemoryRepository::<T> { _items: PhantomData }));
//!         }
//!         Err(implementation.unsupported::<Self>())
//!     }
//! }
//!
//! let container = Container::new();
//! container
//!     .register_open_generic::<AnyRepository, AnyMemoryRepository>(ServiceLifetime::Singleton)
//!     .unwrap();
//!
//! let plants = container.resolve_generic::<dyn Repository<u32>>().unwrap();
//! let again = container.resolve_generic::<dyn Repository<u32>>().unwrap();
//! assert!(Arc::ptr_eq(&plants, &again));
//! assert_eq!(plants.backend(), "memory");
//! ```

use std::any::TypeId;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::container::descriptor::ServiceLifetime;
use crate::container::resolver::Resolver;
use crate::errors::CoreError;

/// Marker standing for an unbound generic service type such as `Repository<T>`
pub trait GenericDefinition: 'static {}

/// Marker standing for an unbound generic implementation such as `MemoryRepository<T>`
pub trait GenericImplementation: 'static {
    type Definition: GenericDefinition;
}

/// The implementation marker an open registration was made with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenImplementation {
    type_id: TypeId,
    type_name: &'static str,
}

impl OpenImplementation {
    pub fn of<I: GenericImplementation>() -> Self {
        Self {
            type_id: TypeId::of::<I>(),
            type_name: std::any::type_name::<I>(),
        }
    }

    /// Whether this is the marker `I`
    pub fn is<I: GenericImplementation>(&self) -> bool {
        self.type_id == TypeId::of::<I>()
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Error for a closed type `S` this implementation cannot build
    pub fn unsupported<S: ?Sized>(&self) -> CoreError {
        CoreError::resolution_failed(
            std::any::type_name::<S>(),
            format!("open implementation {} does not build this type", self.type_name),
        )
    }
}

/// A closed generic service type such as `Repository<Plant>`
pub trait ClosedGeneric: Send + Sync + 'static {
    type Definition: GenericDefinition;

    /// Build the instance `implementation` provides for this closed type
    fn specialize(
        implementation: &OpenImplementation,
        resolver: &Resolver<'_>,
    ) -> Result<Arc<Self>, CoreError>;
}

/// An open generic registration
#[derive(Debug, Clone)]
pub struct OpenGenericRegistration {
    pub definition: &'static str,
    pub implementation: OpenImplementation,
    pub lifetime: ServiceLifetime,
    pub registered_at: DateTime<Utc>,
}

impl OpenGenericRegistration {
    pub(crate) fn new<D, I>(lifetime: ServiceLifetime) -> Self
    where
        D: GenericDefinition,
        I: GenericImplementation<Definition = D>,
    {
        Self {
            definition: std::any::type_name::<D>(),
            implementation: OpenImplementation::of::<I>(),
            lifetime,
            registered_at: Utc::now(),
        }
    }
}
