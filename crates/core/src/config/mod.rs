pub mod container_config;

pub use container_config::{
    ContainerConfig, ScopedResolutionPolicy, SingletonConstruction, ENV_PREFIX,
};
