use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::ContainerConfig;
use crate::container::descriptor::{ServiceDescriptor, ServiceLifetime};

/// Snapshot of one registration for diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrationInfo {
    pub service_type: String,
    pub implementation_type: Option<String>,
    pub lifetime: ServiceLifetime,
    pub name: Option<String>,
    pub has_factory: bool,
    pub has_instance: bool,
    pub is_decorator: bool,
    pub is_conditional: bool,
    pub is_disposable: bool,
    /// Constructor parameter types of the implementation
    pub dependencies: Vec<String>,
    pub registered_at: DateTime<Utc>,
}

impl From<&ServiceDescriptor> for RegistrationInfo {
    fn from(descriptor: &ServiceDescriptor) -> Self {
        Self {
            service_type: descriptor.service_id.type_name().to_string(),
            implementation_type: descriptor.implementation_type.map(str::to_string),
            lifetime: descriptor.effective_lifetime(),
            name: descriptor.service_id.name.clone(),
            has_factory: descriptor.has_factory(),
            has_instance: descriptor.has_instance(),
            is_decorator: descriptor.is_decorator(),
            is_conditional: descriptor.is_conditional(),
            is_disposable: descriptor.disposer.is_some(),
            dependencies: descriptor
                .dependencies
                .iter()
                .map(|parameter| parameter.type_name.to_string())
                .collect(),
            registered_at: descriptor.registered_at,
        }
    }
}

/// Resolution statistics of a container
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PerformanceStats {
    /// Top-level resolutions since the container was created
    pub total_resolutions: u64,
    pub failed_resolutions: u64,
    /// Mean latency over the most recent `window_size` resolutions
    pub average_resolution_time: Duration,
    pub window_size: usize,
    pub registered_services: usize,
    pub cached_singletons: usize,
    pub active_scopes: usize,
}

impl PerformanceStats {
    /// Fraction of successful resolutions, 1.0 when nothing was resolved yet
    pub fn success_rate(&self) -> f64 {
        if self.total_resolutions == 0 {
            return 1.0;
        }
        (self.total_resolutions - self.failed_resolutions) as f64 / self.total_resolutions as f64
    }

    pub fn average_resolution_time_ms(&self) -> f64 {
        self.average_resolution_time.as_secs_f64() * 1000.0
    }
}

/// Counters updated on every top-level resolution
#[derive(Debug)]
pub(crate) struct PerformanceCounters {
    enabled: bool,
    window: usize,
    total: AtomicU64,
    failed: AtomicU64,
    recent: Mutex<VecDeque<Duration>>,
}

impl PerformanceCounters {
    pub fn new(config: &ContainerConfig) -> Self {
        Self {
            enabled: config.track_performance,
            window: config.stats_window,
            total: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            recent: Mutex::new(VecDeque::with_capacity(config.stats_window)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn record(&self, elapsed: Duration, success: bool) {
        if !self.enabled {
            return;
        }

        self.total.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }

        // a poisoned window only loses latency samples
        if let Ok(mut recent) = self.recent.lock() {
            while recent.len() >= self.window.max(1) {
                recent.pop_front();
            }
            recent.push_back(elapsed);
        }
    }

    /// Fill the resolution fields of `stats`
    pub fn fill(&self, stats: &mut PerformanceStats) {
        stats.total_resolutions = self.total.load(Ordering::Relaxed);
        stats.failed_resolutions = self.failed.load(Ordering::Relaxed);

        if let Ok(recent) = self.recent.lock() {
            stats.window_size = recent.len();
            if !recent.is_empty() {
                let sum: Duration = recent.iter().sum();
                stats.average_resolution_time = sum / recent.len() as u32;
            }
        }
    }
}

/// Human readable dump of a container's state
#[derive(Debug, Clone, Serialize)]
pub struct ContainerReport {
    pub container_id: String,
    pub depth: usize,
    pub generated_at: DateTime<Utc>,
    pub registrations: Vec<RegistrationInfo>,
    /// Distinct service types with unnamed registrations
    pub service_types: usize,
    pub open_generics: usize,
    pub stats: PerformanceStats,
}

impl fmt::Display for ContainerReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Container Debug Report")?;
        writeln!(f, "======================")?;
        writeln!(f, "Container: {} (depth {})", self.container_id, self.depth)?;
        writeln!(f, "Generated at: {}", self.generated_at.to_rfc3339())?;
        writeln!(f)?;

        let count = |lifetime: ServiceLifetime| {
            self.registrations
                .iter()
                .filter(|info| !info.is_decorator && info.lifetime == lifetime)
                .count()
        };
        writeln!(
            f,
            "Registrations: {} ({} service types)",
            self.registrations.len(),
            self.service_types
        )?;
        writeln!(f, "  - Singletons: {}", count(ServiceLifetime::Singleton))?;
        writeln!(f, "  - Scoped: {}", count(ServiceLifetime::Scoped))?;
        writeln!(f, "  - Transient: {}", count(ServiceLifetime::Transient))?;
        writeln!(
            f,
            "  - Decorators: {}",
            self.registrations.iter().filter(|info| info.is_decorator).count()
        )?;
        writeln!(f, "  - Open generics: {}", self.open_generics)?;
        writeln!(f, "Cached singletons: {}", self.stats.cached_singletons)?;
        writeln!(f, "Active scopes: {}", self.stats.active_scopes)?;
        writeln!(f)?;

        writeln!(f, "Resolution Statistics:")?;
        writeln!(f, "----------------------")?;
        writeln!(f, "Total: {}", self.stats.total_resolutions)?;
        writeln!(f, "Failed: {}", self.stats.failed_resolutions)?;
        writeln!(
            f,
            "Average: {:.3}ms over {} call(s)",
            self.stats.average_resolution_time_ms(),
            self.stats.window_size
        )?;
        writeln!(f)?;

        writeln!(f, "Registered Services:")?;
        writeln!(f, "--------------------")?;
        for (index, info) in self.registrations.iter().enumerate() {
            write!(f, "{}. {}", index + 1, info.service_type)?;
            if let Some(name) = &info.name {
                write!(f, " ({})", name)?;
            }
            write!(f, " [{}]", info.lifetime)?;
            if let Some(implementation) = &info.implementation_type {
                write!(f, " => {}", implementation)?;
            }
            if info.is_decorator {
                write!(f, " decorator")?;
            }
            if info.is_conditional {
                write!(f, " conditional")?;
            }
            writeln!(f)?;
        }

        Ok(())
    }
}
