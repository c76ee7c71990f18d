//! Integration tests for verification, statistics, configuration loading
//! and service lifecycle management

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serial_test::serial;

use chimera_core::container::VerificationWarning;
use chimera_core::{
    Constructor, Container, ContainerConfig, CoreError, DependencyResolver, Injectable,
    LifecycleManager, LifecycleState, ScopedResolutionPolicy, Service, ServiceDescriptor,
    ServiceLifetime, SingletonConstruction,
};

struct NutrientStock;

impl Injectable for NutrientStock {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new("new", |()| Ok(NutrientStock))]
    }
}

/// Requires a service that is never registered
struct SupplyDepot {
    _stock: Arc<NutrientStock>,
}

impl Injectable for SupplyDepot {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new("new", |(stock,): (Arc<NutrientStock>,)| {
            Ok(SupplyDepot { _stock: stock })
        })]
    }
}

struct DryingRoom;

impl Injectable for DryingRoom {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new("new", |()| Ok(DryingRoom))]
    }
}

struct InspectionVisit;

impl Injectable for InspectionVisit {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new("new", |()| Ok(InspectionVisit))]
    }
}

/// Singleton holding on to a scoped inspection visit
struct FacilityManager {
    _visit: Arc<InspectionVisit>,
}

impl Injectable for FacilityManager {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new("new", |(visit,): (Arc<InspectionVisit>,)| {
            Ok(FacilityManager { _visit: visit })
        })]
    }
}

#[test]
fn test_verification_collects_every_failure() {
    let container = Container::new();
    container.register_singleton::<DryingRoom, DryingRoom>().unwrap();
    container.register_transient::<SupplyDepot, SupplyDepot>().unwrap();
    container
        .add_descriptor(
            ServiceDescriptor::transient::<NutrientStock>()
                .named("sealed")
                .factory(|_| Err(CoreError::configuration("greenhouse locked")))
                .build()
                .unwrap(),
        )
        .unwrap();

    let report = container.validate_services().unwrap();
    assert_eq!(report.checked, 3);
    assert_eq!(report.failures.len(), 2);
    assert!(report.failures[0].service_type.ends_with("::SupplyDepot"));
    assert_eq!(report.failures[1].name.as_deref(), Some("sealed"));
    assert!(!report.is_success());

    match container.verify() {
        Err(CoreError::VerificationFailed { report }) => assert_eq!(report.failures.len(), 2),
        other => panic!("unexpected result: {:?}", other.map(|report| report.checked)),
    }
}

#[test]
fn test_verification_succeeds_and_covers_scoped_services() {
    let container = Container::new();
    container.register_scoped::<InspectionVisit, InspectionVisit>().unwrap();
    container.register_transient::<DryingRoom, DryingRoom>().unwrap();

    let report = container.verify().unwrap();
    assert!(report.is_success());
    assert_eq!(report.checked, 2);
    // the temporary scope does not linger
    assert_eq!(container.active_scope_count(), 0);
    // verification is not counted as resolution traffic
    assert_eq!(container.performance_stats().total_resolutions, 0);
}

#[test]
fn test_captive_dependency_warning() {
    let container = Container::new();
    container.register_scoped::<InspectionVisit, InspectionVisit>().unwrap();
    container.register_singleton::<FacilityManager, FacilityManager>().unwrap();

    let report = container.validate_services().unwrap();
    assert!(report.is_success());
    assert_eq!(report.warnings.len(), 1);
    match &report.warnings[0] {
        VerificationWarning::CaptiveDependency {
            service,
            service_lifetime,
            dependency,
            dependency_lifetime,
        } => {
            assert!(service.ends_with("::FacilityManager"));
            assert_eq!(*service_lifetime, ServiceLifetime::Singleton);
            assert!(dependency.ends_with("::InspectionVisit"));
            assert_eq!(*dependency_lifetime, ServiceLifetime::Scoped);
        }
    }

    let json = report.to_json().unwrap();
    assert!(json.contains("\"kind\": \"captive_dependency\""));
}

#[test]
fn test_performance_stats() {
    let container = Container::new();
    container.register_singleton::<DryingRoom, DryingRoom>().unwrap();

    for _ in 0..3 {
        container.resolve::<DryingRoom>().unwrap();
    }
    assert!(container.resolve::<SupplyDepot>().is_err());

    let stats = container.performance_stats();
    assert_eq!(stats.total_resolutions, 4);
    assert_eq!(stats.failed_resolutions, 1);
    assert_eq!(stats.window_size, 4);
    assert_eq!(stats.registered_services, 1);
    assert_eq!(stats.cached_singletons, 1);
    assert!((stats.success_rate() - 0.75).abs() < f64::EPSILON);
}

#[test]
fn test_performance_tracking_can_be_disabled() {
    let container = Container::builder().track_performance(false).build().unwrap();
    container.register_transient::<DryingRoom, DryingRoom>().unwrap();
    container.resolve::<DryingRoom>().unwrap();

    let stats = container.performance_stats();
    assert_eq!(stats.total_resolutions, 0);
    assert_eq!(stats.success_rate(), 1.0);
}

#[test]
fn test_stats_window_is_bounded() {
    let container = Container::builder().stats_window(2).build().unwrap();
    container.register_transient::<DryingRoom, DryingRoom>().unwrap();
    for _ in 0..5 {
        container.resolve::<DryingRoom>().unwrap();
    }

    let stats = container.performance_stats();
    assert_eq!(stats.total_resolutions, 5);
    assert_eq!(stats.window_size, 2);
}

#[test]
fn test_registration_info_and_report() {
    let container = Container::new();
    container.register_singleton::<DryingRoom, DryingRoom>().unwrap();
    container.register_transient::<SupplyDepot, SupplyDepot>().unwrap();
    container.register_instance(Arc::new(NutrientStock)).unwrap();

    let info = container.registration_info().unwrap();
    assert_eq!(info.len(), 3);
    assert!(info[0].service_type.ends_with("::DryingRoom"));
    assert_eq!(info[1].lifetime, ServiceLifetime::Transient);
    assert_eq!(info[1].dependencies.len(), 1);
    assert!(info[1].dependencies[0].ends_with("::NutrientStock"));
    assert!(info[2].has_instance);

    let report = container.report().unwrap();
    assert_eq!(report.registrations.len(), 3);
    assert_eq!(report.service_types, 3);
    let text = report.to_string();
    assert!(text.contains("Registrations: 3 (3 service types)"));
    assert!(text.contains("Singletons: 2"));
    assert!(text.contains("Transient: 1"));
}

#[test]
fn test_registration_listener() {
    let container = Container::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    container
        .on_service_registered(move |info| {
            sink.lock().unwrap().push(info.service_type.clone());
        })
        .unwrap();

    container.register_singleton::<DryingRoom, DryingRoom>().unwrap();
    container.register_scoped::<InspectionVisit, InspectionVisit>().unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert!(seen[0].ends_with("::DryingRoom"));
    assert!(seen[1].ends_with("::InspectionVisit"));
}

#[test]
fn test_config_files() {
    let yaml = "max_resolution_depth: 8\nsingleton_construction: serialized\n";
    let config = ContainerConfig::from_yaml_str(yaml).unwrap();
    let container = Container::with_config(config).unwrap();
    assert_eq!(container.config().max_resolution_depth, 8);
    assert_eq!(container.config().singleton_construction, SingletonConstruction::Serialized);

    assert!(matches!(
        ContainerConfig::from_json_str("{\"stats_window\": \"many\"}"),
        Err(CoreError::Json(_))
    ));
}

#[test]
#[serial]
fn test_config_from_env() {
    std::env::set_var("CHIMERA_DI_MAX_RESOLUTION_DEPTH", "12");
    std::env::set_var("CHIMERA_DI_SCOPED_RESOLUTION", "singleton");
    std::env::set_var("CHIMERA_DI_TRACK_PERFORMANCE", "off");

    let config = ContainerConfig::from_env();

    std::env::remove_var("CHIMERA_DI_MAX_RESOLUTION_DEPTH");
    std::env::remove_var("CHIMERA_DI_SCOPED_RESOLUTION");
    std::env::remove_var("CHIMERA_DI_TRACK_PERFORMANCE");

    let config = config.unwrap();
    assert_eq!(config.max_resolution_depth, 12);
    assert_eq!(config.scoped_resolution, ScopedResolutionPolicy::Singleton);
    assert!(!config.track_performance);
}

#[test]
#[serial]
fn test_config_from_env_rejects_garbage() {
    std::env::set_var("CHIMERA_DI_STATS_WINDOW", "plenty");
    let result = ContainerConfig::from_env();
    std::env::remove_var("CHIMERA_DI_STATS_WINDOW");

    assert!(matches!(result, Err(CoreError::Configuration { .. })));
}

/// Service recording its lifecycle calls into a shared journal
struct Subsystem {
    name: &'static str,
    journal: Arc<Mutex<Vec<String>>>,
    initialized: AtomicBool,
    fail_init: bool,
}

impl Subsystem {
    fn new(name: &'static str, journal: &Arc<Mutex<Vec<String>>>, fail_init: bool) -> Arc<Self> {
        Arc::new(Self {
            name,
            journal: journal.clone(),
            initialized: AtomicBool::new(false),
            fail_init,
        })
    }
}

impl Service for Subsystem {
    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    fn initialize(&self) -> Result<(), CoreError> {
        self.journal.lock().unwrap().push(format!("init {}", self.name));
        if self.fail_init {
            return Err(CoreError::configuration("missing water supply"));
        }
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn shutdown(&self) -> Result<(), CoreError> {
        self.journal.lock().unwrap().push(format!("shutdown {}", self.name));
        self.initialized.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn service_name(&self) -> &'static str {
        self.name
    }
}

#[test]
fn test_lifecycle_manager_ordering() {
    let journal = Arc::new(Mutex::new(Vec::new()));
    let mut manager = LifecycleManager::new();
    manager
        .add(Subsystem::new("storage", &journal, false))
        .add(Subsystem::new("economy", &journal, false))
        .add(Subsystem::new("genetics", &journal, false));

    manager.initialize_all().unwrap();
    assert_eq!(manager.state(), LifecycleState::Running);
    manager.shutdown_all().unwrap();
    assert_eq!(manager.state(), LifecycleState::Stopped);

    assert_eq!(
        *journal.lock().unwrap(),
        [
            "init storage",
            "init economy",
            "init genetics",
            "shutdown genetics",
            "shutdown economy",
            "shutdown storage",
        ]
    );
}

#[test]
fn test_lifecycle_manager_stops_at_first_failure() {
    let journal = Arc::new(Mutex::new(Vec::new()));
    let mut manager = LifecycleManager::new();
    manager
        .add(Subsystem::new("storage", &journal, false))
        .add(Subsystem::new("economy", &journal, true))
        .add(Subsystem::new("genetics", &journal, false));

    let error = manager.initialize_all().unwrap_err();
    assert!(matches!(error, CoreError::LifecycleError { ref component, .. } if component == "economy"));
    assert_eq!(manager.state(), LifecycleState::Failed);

    // only services that finished initializing are shut down
    manager.shutdown_all().unwrap();
    let journal = journal.lock().unwrap();
    assert_eq!(journal.last().map(String::as_str), Some("shutdown storage"));
    assert!(!journal.iter().any(|entry| entry == "init genetics"));
}
