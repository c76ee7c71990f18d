use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use crate::container::descriptor::{ServiceDescriptor, ServiceId, ServiceLifetime};
use crate::errors::CoreError;

/// A registration that could not be resolved during verification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationFailure {
    pub service_type: String,
    pub name: Option<String>,
    pub message: String,
}

impl VerificationFailure {
    pub(crate) fn new(service_id: &ServiceId, error: &CoreError) -> Self {
        Self {
            service_type: service_id.type_name().to_string(),
            name: service_id.name.clone(),
            message: error.to_string(),
        }
    }
}

/// Suspicious but resolvable registrations
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VerificationWarning {
    /// A longer-lived service depends on a shorter-lived one and keeps it
    /// alive past its intended lifetime
    CaptiveDependency {
        service: String,
        service_lifetime: ServiceLifetime,
        dependency: String,
        dependency_lifetime: ServiceLifetime,
    },
}

impl std::fmt::Display for VerificationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerificationWarning::CaptiveDependency {
                service,
                service_lifetime,
                dependency,
                dependency_lifetime,
            } => write!(
                f,
                "{} service '{}' captures {} dependency '{}'",
                service_lifetime, service, dependency_lifetime, dependency
            ),
        }
    }
}

/// Outcome of a verification pass over every registration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerificationReport {
    /// Number of registrations that were resolved
    pub checked: usize,
    pub failures: Vec<VerificationFailure>,
    pub warnings: Vec<VerificationWarning>,
}

impl VerificationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Record the outcome of resolving one registration
    pub(crate) fn record(&mut self, service_id: &ServiceId, result: Result<(), CoreError>) {
        self.checked += 1;
        if let Err(error) = result {
            tracing::debug!(service = %service_id, %error, "verification failure");
            self.failures.push(VerificationFailure::new(service_id, &error));
        }
    }

    /// Convert a failed report into [`CoreError::VerificationFailed`]
    pub fn into_result(self) -> Result<Self, CoreError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(CoreError::VerificationFailed { report: self })
        }
    }

    pub fn to_json(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl std::fmt::Display for VerificationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Verified {} registration(s): {} failure(s), {} warning(s)",
            self.checked,
            self.failures.len(),
            self.warnings.len()
        )?;
        for failure in &self.failures {
            match &failure.name {
                Some(name) => writeln!(f, "  error: {}({}): {}", failure.service_type, name, failure.message)?,
                None => writeln!(f, "  error: {}: {}", failure.service_type, failure.message)?,
            }
        }
        for warning in &self.warnings {
            writeln!(f, "  warning: {}", warning)?;
        }
        Ok(())
    }
}

fn rank(lifetime: ServiceLifetime) -> u8 {
    match lifetime {
        ServiceLifetime::Transient => 0,
        ServiceLifetime::Scoped => 1,
        ServiceLifetime::Singleton => 2,
    }
}

/// Find singletons that depend on scoped services, using the parameter
/// metadata recorded on each descriptor.
///
/// `lifetimes` maps a service key to the lifetime its default registration
/// resolves with. Transient dependencies are never reported.
pub(crate) fn captive_dependencies(
    descriptors: &[Arc<ServiceDescriptor>],
    lifetimes: &HashMap<ServiceId, ServiceLifetime>,
) -> Vec<VerificationWarning> {
    let mut warnings = Vec::new();

    for descriptor in descriptors.iter().filter(|descriptor| !descriptor.is_decorator()) {
        let service_lifetime = descriptor.effective_lifetime();

        for dependency in &descriptor.dependencies {
            let Some(&dependency_lifetime) = lifetimes.get(&dependency.service_id) else {
                continue;
            };
            if dependency_lifetime.is_transient() || rank(dependency_lifetime) >= rank(service_lifetime) {
                continue;
            }
            warnings.push(VerificationWarning::CaptiveDependency {
                service: descriptor.service_id.display_name(),
                service_lifetime,
                dependency: dependency.service_id.display_name(),
                dependency_lifetime,
            });
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::autowiring::ParameterInfo;

    struct Ledger;
    struct Harvest;

    #[test]
    fn test_report_records_failures() {
        let mut report = VerificationReport::new();
        report.record(&ServiceId::of::<Ledger>(), Ok(()));
        report.record(
            &ServiceId::named::<Harvest>("autumn"),
            Err(CoreError::service_not_found("Harvest")),
        );

        assert_eq!(report.checked, 2);
        assert!(!report.is_success());
        assert_eq!(report.failures[0].name.as_deref(), Some("autumn"));

        let error = report.clone().into_result().unwrap_err();
        assert_eq!(error.to_string(), "1 of 2 registration(s) failed verification");
        assert!(report.to_string().contains("error:"));
    }

    #[test]
    fn test_report_serializes() {
        let mut report = VerificationReport::new();
        report.record(&ServiceId::of::<Ledger>(), Ok(()));

        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["checked"], 1);
        assert!(json["failures"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_singleton_capturing_scoped_is_reported() {
        let singleton = ServiceDescriptor::singleton::<Ledger>()
            .factory(|_| Ok(Arc::new(Ledger)))
            .depends_on(ParameterInfo::required::<Harvest>())
            .build()
            .unwrap();
        let scoped = ServiceDescriptor::scoped::<Harvest>()
            .factory(|_| Ok(Arc::new(Harvest)))
            .depends_on(ParameterInfo::required::<Ledger>())
            .build()
            .unwrap();

        let lifetimes: HashMap<ServiceId, ServiceLifetime> = [
            (ServiceId::of::<Ledger>(), ServiceLifetime::Singleton),
            (ServiceId::of::<Harvest>(), ServiceLifetime::Scoped),
        ]
        .into_iter()
        .collect();

        let warnings = captive_dependencies(&[Arc::new(singleton), Arc::new(scoped)], &lifetimes);
        assert_eq!(warnings.len(), 1);
        assert!(matches!(
            &warnings[0],
            VerificationWarning::CaptiveDependency { dependency_lifetime: ServiceLifetime::Scoped, .. }
        ));
    }
}
