//! Service container and dependency injection runtime.
//!
//! Services are registered against a type key (a concrete type or a
//! `dyn Trait`) with a lifetime, and resolved with their dependencies wired
//! in by factories or by constructor injection of [`Injectable`] types.
//!
//! ```rust
//! use std::sync::Arc;
//! use chimera_core::{Constructor, Container, DependencyResolver, Injectable};
//!
//! struct Clock;
//! impl Injectable for Clock {
//!     fn constructors() -> Vec<Constructor<Self>> {
//!         vec![Constructor::new("new", |()| Ok(Clock))]
//!     }
//! }
//!
//! struct GrowRoom {
//!     clock: Arc<Clock>,
//! }
//! impl Injectable for GrowRoom {
//!     fn constructors() -> Vec<Constructor<Self>> {
//!         vec![Constructor::new("new", |(clock,): (Arc<Clock>,)| Ok(GrowRoom { clock }))]
//!     }
//! }
//!
//! let container = Container::new();
//! container.register_singleton::<Clock, Clock>().unwrap();
//! container.register_transient::<GrowRoom, GrowRoom>().unwrap();
//!
//! let room = container.resolve::<GrowRoom>().unwrap();
//! assert!(Arc::ptr_eq(&room.clock, &container.resolve::<Clock>().unwrap()));
//! ```

pub mod config;
pub mod container;
pub mod errors;
pub mod foundation;

pub use config::{ContainerConfig, ScopedResolutionPolicy, SingletonConstruction};
pub use container::{
    Autowired, CollectionBuilder, Constructor, Container, ContainerBuilder, Decorator,
    DependencyResolver, Implements, Injectable, Resolver, Scope, ServiceDescriptor, ServiceId,
    ServiceLifetime,
};
pub use errors::CoreError;
pub use foundation::{Disposable, LifecycleManager, LifecycleState, Service};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
