use crate::errors::CoreError;

/// Contract implemented by every long-lived game subsystem.
///
/// The container never calls these methods itself. A composition root
/// resolves its services and then drives them through a
/// [`LifecycleManager`](crate::foundation::LifecycleManager).
pub trait Service: Send + Sync + 'static {
    /// Whether [`initialize`](Service::initialize) has completed
    fn is_initialized(&self) -> bool;

    /// Bring the service into a usable state
    fn initialize(&self) -> Result<(), CoreError>;

    /// Release whatever `initialize` acquired
    fn shutdown(&self) -> Result<(), CoreError>;

    /// Name used in lifecycle logs and errors
    fn service_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Contract for instances that hold resources the container must release
/// when the cache owning them (container or scope) is disposed.
pub trait Disposable: Send + Sync {
    /// Release the resources held by this instance
    fn dispose(&self) -> Result<(), CoreError>;
}

impl std::fmt::Debug for dyn Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service")
            .field("service_name", &self.service_name())
            .field("is_initialized", &self.is_initialized())
            .finish()
    }
}
