//! Integration tests for service lifetimes, scopes and disposal
//!
//! Covers singleton identity, transient distinctness, scoped isolation,
//! the scoped-outside-a-scope policy, and idempotent disposal of
//! containers and scopes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use chimera_core::{
    implements, Constructor, Container, CoreError, DependencyResolver, Disposable, Injectable,
    ScopedResolutionPolicy, ServiceDescriptor, SingletonConstruction,
};

fn same<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const u8, Arc::as_ptr(b) as *const u8)
}

/// Irrigation schedule shared by every facility
struct Schedule;

impl Injectable for Schedule {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new("new", |()| Ok(Schedule))]
    }
}

/// Per-harvest working set
struct HarvestSession;

impl Injectable for HarvestSession {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new("new", |()| Ok(HarvestSession))]
    }
}

/// Resource with a disposal contract
struct Pump {
    stopped: Arc<AtomicUsize>,
    fail: bool,
}

impl Disposable for Pump {
    fn dispose(&self) -> Result<(), CoreError> {
        self.stopped.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(CoreError::configuration("pump valve stuck"))
        } else {
            Ok(())
        }
    }
}

fn register_pump(container: &Container, stopped: &Arc<AtomicUsize>, fail: bool, scoped: bool, name: &str) {
    let stopped = stopped.clone();
    let builder = if scoped {
        ServiceDescriptor::scoped::<Pump>()
    } else {
        ServiceDescriptor::singleton::<Pump>()
    };
    let descriptor = builder
        .named(name)
        .factory(move |_| {
            Ok(Arc::new(Pump {
                stopped: stopped.clone(),
                fail,
            }))
        })
        .disposable()
        .build()
        .unwrap();
    container.add_descriptor(descriptor).unwrap();
}

/// Counts heater shutdowns; registered as a pre-built instance
#[derive(Default)]
struct ShutdownLog(AtomicUsize);

impl ShutdownLog {
    fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

trait Climate: Send + Sync {
    fn target_celsius(&self) -> u32;
}

/// Injectable resource that disposes itself through its own contract
struct Heater {
    log: Arc<ShutdownLog>,
}

impl Climate for Heater {
    fn target_celsius(&self) -> u32 {
        24
    }
}

impl Disposable for Heater {
    fn dispose(&self) -> Result<(), CoreError> {
        self.log.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Injectable for Heater {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new("new", |(log,): (Arc<ShutdownLog>,)| Ok(Heater { log }))]
    }

    fn as_disposable(self: Arc<Self>) -> Option<Arc<dyn Disposable>> {
        Some(self)
    }
}

implements!(Heater => dyn Climate);

fn container_with_log() -> (Container, Arc<ShutdownLog>) {
    let container = Container::new();
    let log = Arc::new(ShutdownLog::default());
    container.register_instance(log.clone()).unwrap();
    (container, log)
}

#[test]
fn test_type_registered_singleton_is_disposed_with_container() {
    let (container, log) = container_with_log();
    container.register_singleton::<Heater, Heater>().unwrap();
    container.resolve::<Heater>().unwrap();
    container.resolve::<Heater>().unwrap();

    container.dispose().unwrap();
    assert_eq!(log.count(), 1);
}

#[test]
fn test_disposal_survives_trait_object_registration() {
    let (container, log) = container_with_log();
    container.register_singleton::<dyn Climate, Heater>().unwrap();
    container.register_named::<dyn Climate, Heater>("nursery").unwrap();

    assert_eq!(container.resolve::<dyn Climate>().unwrap().target_celsius(), 24);
    container.resolve_named::<dyn Climate>("nursery").unwrap();

    container.dispose().unwrap();
    assert_eq!(log.count(), 2);
}

#[test]
fn test_type_registered_scoped_is_disposed_with_scope() {
    let (container, log) = container_with_log();
    container.register_scoped::<Heater, Heater>().unwrap();
    container.register_transient::<dyn Climate, Heater>().unwrap();

    let scope = container.create_scope().unwrap();
    scope.resolve::<Heater>().unwrap();
    // transient instances are not tracked
    scope.resolve::<dyn Climate>().unwrap();

    scope.dispose().unwrap();
    assert_eq!(log.count(), 1);
    container.dispose().unwrap();
    assert_eq!(log.count(), 1);
}

#[test]
fn test_singleton_identity() {
    let container = Container::new();
    container.register_singleton::<Schedule, Schedule>().unwrap();

    let first = container.resolve::<Schedule>().unwrap();
    let second = container.resolve::<Schedule>().unwrap();
    let third = container.resolve::<Schedule>().unwrap();

    assert!(same(&first, &second));
    assert!(same(&second, &third));
}

#[test]
fn test_transient_distinctness() {
    let container = Container::new();
    container.register_transient::<Schedule, Schedule>().unwrap();

    let first = container.resolve::<Schedule>().unwrap();
    let second = container.resolve::<Schedule>().unwrap();

    assert!(!same(&first, &second));
}

#[test]
fn test_scoped_isolation() {
    let container = Container::new();
    container.register_scoped::<HarvestSession, HarvestSession>().unwrap();

    let morning = container.create_scope().unwrap();
    let evening = container.create_scope().unwrap();

    let a1 = morning.resolve::<HarvestSession>().unwrap();
    let a2 = morning.resolve::<HarvestSession>().unwrap();
    let b1 = evening.resolve::<HarvestSession>().unwrap();

    assert!(same(&a1, &a2));
    assert!(!same(&a1, &b1));
    assert_eq!(container.active_scope_count(), 2);
}

#[test]
fn test_scoped_outside_scope_is_rejected_by_default() {
    let container = Container::new();
    container.register_scoped::<HarvestSession, HarvestSession>().unwrap();

    let error = container.resolve::<HarvestSession>().err().unwrap();
    assert!(matches!(error, CoreError::ScopeRequired { .. }));
}

#[test]
fn test_scoped_outside_scope_can_collapse_to_singleton() {
    let container = Container::builder()
        .scoped_resolution(ScopedResolutionPolicy::Singleton)
        .build()
        .unwrap();
    container.register_scoped::<HarvestSession, HarvestSession>().unwrap();

    let first = container.resolve::<HarvestSession>().unwrap();
    let second = container.resolve::<HarvestSession>().unwrap();
    assert!(same(&first, &second));

    // a real scope still gets its own instance
    let scope = container.create_scope().unwrap();
    assert!(!same(&first, &scope.resolve::<HarvestSession>().unwrap()));
}

#[test]
fn test_scope_sees_singletons_of_its_container() {
    let container = Container::new();
    container.register_singleton::<Schedule, Schedule>().unwrap();

    let scope = container.create_scope().unwrap();
    assert!(same(
        &scope.resolve::<Schedule>().unwrap(),
        &container.resolve::<Schedule>().unwrap()
    ));
    assert_eq!(scope.instance_count(), 0);
}

#[test]
fn test_disposing_scope_leaves_singletons_intact() {
    let container = Container::new();
    let singleton_stops = Arc::new(AtomicUsize::new(0));
    let scoped_stops = Arc::new(AtomicUsize::new(0));
    register_pump(&container, &singleton_stops, false, false, "main");
    register_pump(&container, &scoped_stops, false, true, "nursery");

    let main = container.resolve_named::<Pump>("main").unwrap();

    let scope = container.create_scope().unwrap();
    scope.resolve_named::<Pump>("nursery").unwrap();
    scope.resolve_named::<Pump>("main").unwrap();
    scope.dispose().unwrap();

    assert_eq!(scoped_stops.load(Ordering::SeqCst), 1);
    assert_eq!(singleton_stops.load(Ordering::SeqCst), 0);
    assert_eq!(container.active_scope_count(), 0);

    let again = container.resolve_named::<Pump>("main").unwrap();
    assert!(same(&main, &again));
}

#[test]
fn test_container_dispose_is_idempotent() {
    let container = Container::new();
    let stops = Arc::new(AtomicUsize::new(0));
    register_pump(&container, &stops, false, false, "main");
    container.resolve_named::<Pump>("main").unwrap();

    container.dispose().unwrap();
    container.dispose().unwrap();

    assert_eq!(stops.load(Ordering::SeqCst), 1);
    assert!(container.is_disposed());
}

#[test]
fn test_container_dispose_reaches_active_scopes() {
    let container = Container::new();
    let stops = Arc::new(AtomicUsize::new(0));
    register_pump(&container, &stops, false, true, "nursery");

    let scope = container.create_scope().unwrap();
    scope.resolve_named::<Pump>("nursery").unwrap();

    container.dispose().unwrap();
    assert!(scope.is_disposed());
    assert_eq!(stops.load(Ordering::SeqCst), 1);

    scope.dispose().unwrap();
    assert_eq!(stops.load(Ordering::SeqCst), 1);
}

#[test]
fn test_disposal_attempts_every_instance() {
    let container = Container::new();
    let stops = Arc::new(AtomicUsize::new(0));
    register_pump(&container, &stops, true, false, "a");
    register_pump(&container, &stops, false, false, "b");
    register_pump(&container, &stops, true, false, "c");
    for name in ["a", "b", "c"] {
        container.resolve_named::<Pump>(name).unwrap();
    }

    let error = container.dispose().unwrap_err();
    assert_eq!(stops.load(Ordering::SeqCst), 3);
    match error {
        CoreError::DisposalFailed { failures } => assert_eq!(failures.len(), 2),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_unregister_disposes_cached_singleton() {
    let container = Container::new();
    let stops = Arc::new(AtomicUsize::new(0));
    register_pump(&container, &stops, false, false, "main");
    container.resolve_named::<Pump>("main").unwrap();

    assert!(container.unregister::<Pump>().unwrap());
    assert_eq!(stops.load(Ordering::SeqCst), 1);
    assert!(container.resolve_named::<Pump>("main").err().unwrap().is_not_found());
}

#[test]
fn test_replace_drops_without_disposing() {
    let container = Container::new();
    container.register_singleton::<Schedule, Schedule>().unwrap();
    let old = container.resolve::<Schedule>().unwrap();

    container.replace::<Schedule, Schedule>().unwrap();

    let first = container.resolve::<Schedule>().unwrap();
    let second = container.resolve::<Schedule>().unwrap();
    assert!(!same(&old, &first));
    // replacements are transient
    assert!(!same(&first, &second));
    assert_eq!(container.registration_info().unwrap().len(), 1);
}

fn concurrent_singleton(strategy: SingletonConstruction) -> (usize, bool) {
    let container = Container::builder()
        .singleton_construction(strategy)
        .build()
        .unwrap();
    let constructed = Arc::new(AtomicUsize::new(0));
    let counter = constructed.clone();
    container
        .register_singleton_factory::<Schedule, _>(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            thread::yield_now();
            Ok(Arc::new(Schedule))
        })
        .unwrap();

    let barrier = Arc::new(Barrier::new(8));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let container = container.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                container.resolve::<Schedule>().unwrap()
            })
        })
        .collect();

    let instances: Vec<Arc<Schedule>> = handles.into_iter().map(|handle| handle.join().unwrap()).collect();
    let identical = instances.iter().all(|instance| same(instance, &instances[0]));
    (constructed.load(Ordering::SeqCst), identical)
}

#[test]
fn test_concurrent_singleton_resolution_stores_one_instance() {
    let (constructed, identical) = concurrent_singleton(SingletonConstruction::Optimistic);
    assert!(identical);
    assert!(constructed >= 1);
}

#[test]
fn test_serialized_singleton_construction_runs_once() {
    let (constructed, identical) = concurrent_singleton(SingletonConstruction::Serialized);
    assert!(identical);
    assert_eq!(constructed, 1);
}
