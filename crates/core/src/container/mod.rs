pub mod autowiring;
pub mod builder;
pub(crate) mod cache;
pub mod debug;
pub mod descriptor;
pub mod generics;
pub mod ioc_container;
pub(crate) mod registry;
pub mod resolver;
pub mod scope;
pub mod validation;

pub use autowiring::{
    Autowired, Constructor, ConstructorInjector, ConstructorParameter, ConstructorParameters,
    Decorator, Implements, Injectable, ParameterInfo,
};
pub use builder::ContainerBuilder;
pub use debug::{ContainerReport, PerformanceStats, RegistrationInfo};
pub use descriptor::{DescriptorId, ServiceDescriptor, ServiceDescriptorBuilder, ServiceId, ServiceLifetime};
pub use generics::{
    ClosedGeneric, GenericDefinition, GenericImplementation, OpenGenericRegistration, OpenImplementation,
};
pub use ioc_container::{CollectionBuilder, Container};
pub use resolver::{DependencyResolver, ResolutionPath, Resolver};
pub use scope::{Scope, ScopeId};
pub use validation::{VerificationFailure, VerificationReport, VerificationWarning};
