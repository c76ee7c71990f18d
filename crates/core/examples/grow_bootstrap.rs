//! Example: composition root of a small grow-op simulation
//!
//! Registers game subsystems, verifies the registrations, drives the
//! long-lived services through their lifecycle and serves one scoped
//! growth day before shutting everything down.
//!
//! Run with `RUST_LOG=chimera_core=debug` to see the container's own
//! events, and `CHIMERA_LOG_JSON=1` for JSON output.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing_subscriber::{fmt::Layer, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use chimera_core::{
    implements, Constructor, Container, ContainerConfig, CoreError, Decorator, DependencyResolver,
    Disposable, Injectable, LifecycleManager, Resolver, Service, ServiceDescriptor,
};

fn init_logging() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;

    if std::env::var("CHIMERA_LOG_JSON").is_ok() {
        tracing_subscriber::registry()
            .with(filter)
            .with(Layer::new().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(Layer::new())
            .init();
    }
    Ok(())
}

// Storage

trait Storage: Send + Sync {
    fn load(&self, key: &str) -> Option<u64>;
    fn save(&self, key: &str, value: u64);
}

#[derive(Default)]
struct MemoryStorage {
    values: Mutex<HashMap<String, u64>>,
    ready: AtomicBool,
}

impl Storage for MemoryStorage {
    fn load(&self, key: &str) -> Option<u64> {
        self.values.lock().ok()?.get(key).copied()
    }

    fn save(&self, key: &str, value: u64) {
        if let Ok(mut values) = self.values.lock() {
            values.insert(key.to_string(), value);
        }
    }
}

impl Service for MemoryStorage {
    fn is_initialized(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn initialize(&self) -> Result<(), CoreError> {
        self.save("credits", 100);
        self.ready.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn shutdown(&self) -> Result<(), CoreError> {
        self.ready.store(false, Ordering::SeqCst);
        Ok(())
    }
}

impl Injectable for MemoryStorage {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new("new", |()| Ok(MemoryStorage::default()))]
    }
}

implements!(MemoryStorage => dyn Storage);

/// Logs every write before delegating
struct AuditedStorage {
    inner: Arc<dyn Storage>,
}

impl Storage for AuditedStorage {
    fn load(&self, key: &str) -> Option<u64> {
        self.inner.load(key)
    }

    fn save(&self, key: &str, value: u64) {
        tracing::info!(key, value, "storage write");
        self.inner.save(key, value);
    }
}

impl Decorator<dyn Storage> for AuditedStorage {
    fn decorate(inner: Arc<dyn Storage>, _resolver: &Resolver<'_>) -> Result<Self, CoreError> {
        Ok(AuditedStorage { inner })
    }
}

implements!(AuditedStorage => dyn Storage);

// Economy

struct Economy {
    storage: Arc<dyn Storage>,
}

impl Economy {
    fn pay(&self, amount: u64) -> Result<u64, CoreError> {
        let balance = self.storage.load("credits").unwrap_or(0);
        let remaining = balance
            .checked_sub(amount)
            .ok_or_else(|| CoreError::configuration("not enough credits"))?;
        self.storage.save("credits", remaining);
        Ok(remaining)
    }
}

impl Injectable for Economy {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new("new", |(storage,): (Arc<dyn Storage>,)| Ok(Economy { storage }))]
    }
}

// One growth day

struct Day {
    number: u64,
    economy: Arc<Economy>,
}

impl Disposable for Day {
    fn dispose(&self) -> Result<(), CoreError> {
        tracing::info!(day = self.number, "day closed");
        Ok(())
    }
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_logging()?;

    let container = Container::with_config(ContainerConfig::from_env()?)?;

    let storage = Arc::new(MemoryStorage::default());
    container
        .register_instance::<dyn Storage>(storage.clone())?
        .register_decorator::<dyn Storage, AuditedStorage>()?
        .register_singleton::<Economy, Economy>()?;

    let days = Arc::new(AtomicU64::new(0));
    container.add_descriptor(
        ServiceDescriptor::scoped::<Day>()
            .factory(move |resolver| {
                Ok(Arc::new(Day {
                    number: days.fetch_add(1, Ordering::SeqCst) + 1,
                    economy: resolver.resolve::<Economy>()?,
                }))
            })
            .disposable()
            .build()?,
    )?;

    let report = container.verify()?;
    print!("{}", report);

    let mut lifecycle = LifecycleManager::new();
    lifecycle.add(storage);
    lifecycle.initialize_all()?;

    for _ in 0..2 {
        let scope = container.create_scope()?;
        let day = scope.resolve::<Day>()?;
        let remaining = day.economy.pay(30)?;
        tracing::info!(day = day.number, remaining, "day played");
        scope.dispose()?;
    }

    println!("{}", container.debug_report()?);

    lifecycle.shutdown_all()?;
    container.dispose()?;
    Ok(())
}
