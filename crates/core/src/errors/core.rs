use thiserror::Error;

use crate::container::validation::VerificationReport;

/// Core error type for the chimera service container
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Service not found: {service_type}")]
    ServiceNotFound { service_type: String },

    #[error("Invalid service lifetime: {lifetime}")]
    InvalidServiceLifetime { lifetime: String },

    #[error("Lock error on resource: {resource}")]
    LockError { resource: String },

    #[error("Circular dependency detected: {} (cycle at: {cycle_service})", chain.join(" -> "))]
    CircularDependency {
        chain: Vec<String>,
        cycle_service: String,
    },

    #[error("Maximum resolution depth of {max_depth} exceeded while resolving '{service_type}'")]
    ResolutionDepthExceeded {
        service_type: String,
        max_depth: usize,
    },

    #[error("Invalid service descriptor: {message}")]
    InvalidServiceDescriptor { message: String },

    #[error("Registration conflict: {message}")]
    RegistrationConflict { message: String },

    #[error("Dependency resolution failed for '{service_type}': {message}")]
    DependencyResolutionFailed {
        service_type: String,
        message: String,
    },

    #[error("Activation of '{service_type}' failed: {source}")]
    ActivationFailed {
        service_type: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Scoped service '{service_type}' was resolved outside of a scope")]
    ScopeRequired { service_type: String },

    #[error("Use of disposed {resource}")]
    Disposed { resource: String },

    #[error("Disposal failed for {} service(s): {}", failures.len(), failures.join("; "))]
    DisposalFailed { failures: Vec<String> },

    #[error("{} of {} registration(s) failed verification", report.failures.len(), report.checked)]
    VerificationFailed { report: VerificationReport },

    #[error("Lifecycle error in component '{component}' during '{operation}': {source}")]
    LifecycleError {
        component: String,
        operation: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl CoreError {
    /// Create a new configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a new service not found error
    pub fn service_not_found(service_type: impl Into<String>) -> Self {
        Self::ServiceNotFound {
            service_type: service_type.into(),
        }
    }

    /// Create a new registration conflict error
    pub fn registration_conflict(message: impl Into<String>) -> Self {
        Self::RegistrationConflict {
            message: message.into(),
        }
    }

    /// Create a new dependency resolution error
    pub fn resolution_failed(service_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DependencyResolutionFailed {
            service_type: service_type.into(),
            message: message.into(),
        }
    }

    /// Create a lock error for the named resource
    pub fn lock(resource: impl Into<String>) -> Self {
        Self::LockError {
            resource: resource.into(),
        }
    }

    /// Create a disposed-use error for the named resource
    pub fn disposed(resource: impl Into<String>) -> Self {
        Self::Disposed {
            resource: resource.into(),
        }
    }

    /// Wrap an error raised by a factory or constructor.
    ///
    /// Errors that already describe a resolution problem pass through
    /// unchanged so the caller sees the innermost cause.
    pub fn activation(service_type: &str, error: CoreError) -> Self {
        if error.is_resolution_error() {
            error
        } else {
            Self::ActivationFailed {
                service_type: service_type.to_string(),
                source: Box::new(error),
            }
        }
    }

    /// Check if the error is a service-not-found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ServiceNotFound { .. })
    }

    /// Check if the error is a circular dependency error
    pub fn is_circular(&self) -> bool {
        matches!(self, Self::CircularDependency { .. })
    }

    /// Check if the error was produced by the resolution engine itself
    pub fn is_resolution_error(&self) -> bool {
        matches!(
            self,
            Self::ServiceNotFound { .. }
                | Self::CircularDependency { .. }
                | Self::ResolutionDepthExceeded { .. }
                | Self::DependencyResolutionFailed { .. }
                | Self::ActivationFailed { .. }
                | Self::ScopeRequired { .. }
                | Self::Disposed { .. }
                | Self::LockError { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circular_dependency_display() {
        let error = CoreError::CircularDependency {
            chain: vec!["A".into(), "B".into(), "A".into()],
            cycle_service: "A".into(),
        };
        assert_eq!(
            error.to_string(),
            "Circular dependency detected: A -> B -> A (cycle at: A)"
        );
    }

    #[test]
    fn test_activation_passes_resolution_errors_through() {
        let inner = CoreError::service_not_found("Missing");
        let wrapped = CoreError::activation("Outer", inner);
        assert!(wrapped.is_not_found());

        let inner = CoreError::configuration("bad value");
        let wrapped = CoreError::activation("Outer", inner);
        match wrapped {
            CoreError::ActivationFailed { service_type, source } => {
                assert_eq!(service_type, "Outer");
                assert!(source.to_string().contains("bad value"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
