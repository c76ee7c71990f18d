use crate::config::{ContainerConfig, ScopedResolutionPolicy, SingletonConstruction};
use crate::container::ioc_container::Container;
use crate::errors::CoreError;

/// Builder for constructing containers with a custom configuration
#[derive(Debug, Clone, Default)]
pub struct ContainerBuilder {
    config: ContainerConfig,
    parent: Option<Container>,
}

impl ContainerBuilder {
    /// Create a new container builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration
    pub fn with_config(mut self, config: ContainerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn max_resolution_depth(mut self, depth: usize) -> Self {
        self.config.max_resolution_depth = depth;
        self
    }

    pub fn scoped_resolution(mut self, policy: ScopedResolutionPolicy) -> Self {
        self.config.scoped_resolution = policy;
        self
    }

    pub fn singleton_construction(mut self, strategy: SingletonConstruction) -> Self {
        self.config.singleton_construction = strategy;
        self
    }

    pub fn track_performance(mut self, enabled: bool) -> Self {
        self.config.track_performance = enabled;
        self
    }

    pub fn stats_window(mut self, window: usize) -> Self {
        self.config.stats_window = window;
        self
    }

    /// Build a child of `parent` instead of a root container
    pub fn with_parent(mut self, parent: &Container) -> Self {
        self.parent = Some(parent.clone());
        self
    }

    /// Validate the configuration and build the container
    pub fn build(self) -> Result<Container, CoreError> {
        match self.parent {
            Some(parent) => parent.create_child_with_config(self.config),
            None => Container::with_config(self.config),
        }
    }
}
