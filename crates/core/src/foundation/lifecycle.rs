use std::sync::Arc;

use crate::errors::CoreError;
use crate::foundation::traits::Service;

/// Lifecycle states of a [`LifecycleManager`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Created,
    Initializing,
    Running,
    Stopping,
    Stopped,
    Failed,
}

/// Drives resolved services through `initialize` and `shutdown`.
///
/// Services are initialized in the order they were added, which the
/// composition root chooses to match dependency order, and shut down in
/// reverse.
pub struct LifecycleManager {
    services: Vec<Arc<dyn Service>>,
    state: LifecycleState,
}

impl std::fmt::Debug for LifecycleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleManager")
            .field("services_count", &self.services.len())
            .field("state", &self.state)
            .finish()
    }
}

impl LifecycleManager {
    /// Create an empty lifecycle manager
    pub fn new() -> Self {
        Self {
            services: Vec::new(),
            state: LifecycleState::Created,
        }
    }

    /// Add a service to be managed
    pub fn add(&mut self, service: Arc<dyn Service>) -> &mut Self {
        self.services.push(service);
        self
    }

    /// Current state
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Number of managed services
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Whether no services are managed
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Initialize every managed service in insertion order.
    ///
    /// Already-initialized services are skipped. The first failure stops
    /// the sequence and leaves the manager in [`LifecycleState::Failed`].
    pub fn initialize_all(&mut self) -> Result<(), CoreError> {
        if self.state != LifecycleState::Created {
            return Err(CoreError::InvalidServiceDescriptor {
                message: format!("Cannot initialize services in state: {:?}", self.state),
            });
        }

        self.state = LifecycleState::Initializing;

        for service in &self.services {
            if service.is_initialized() {
                continue;
            }
            tracing::debug!(service = service.service_name(), "initializing service");
            if let Err(error) = service.initialize() {
                self.state = LifecycleState::Failed;
                tracing::error!(service = service.service_name(), %error, "service initialization failed");
                return Err(CoreError::LifecycleError {
                    component: service.service_name().to_string(),
                    operation: "initialize".to_string(),
                    source: Box::new(error),
                });
            }
        }

        self.state = LifecycleState::Running;
        tracing::info!(services = self.services.len(), "all services initialized");
        Ok(())
    }

    /// Shut down every initialized service in reverse insertion order.
    ///
    /// Every service is attempted; failures are collected and returned
    /// together. Calling this twice is a no-op.
    pub fn shutdown_all(&mut self) -> Result<(), CoreError> {
        if matches!(self.state, LifecycleState::Stopping | LifecycleState::Stopped) {
            return Ok(());
        }

        self.state = LifecycleState::Stopping;
        let mut failures = Vec::new();

        for service in self.services.iter().rev() {
            if !service.is_initialized() {
                continue;
            }
            if let Err(error) = service.shutdown() {
                tracing::warn!(service = service.service_name(), %error, "service shutdown failed");
                failures.push(format!("{}: {}", service.service_name(), error));
            }
        }

        self.state = LifecycleState::Stopped;

        if failures.is_empty() {
            Ok(())
        } else {
            Err(CoreError::DisposalFailed { failures })
        }
    }
}

impl Default for LifecycleManager {
    fn default() -> Self {
        Self::new()
    }
}
