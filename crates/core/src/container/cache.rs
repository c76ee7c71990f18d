use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use crate::container::descriptor::{DescriptorId, Disposer, Instance};
use crate::errors::CoreError;

/// Cache slot of one materialized descriptor.
///
/// `target` is the primary descriptor a decorator wrapped; for primaries it
/// equals `descriptor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct CacheKey {
    pub descriptor: DescriptorId,
    pub target: DescriptorId,
}

impl CacheKey {
    pub fn primary(descriptor: DescriptorId) -> Self {
        Self {
            descriptor,
            target: descriptor,
        }
    }

    pub fn decorated(decorator: DescriptorId, target: DescriptorId) -> Self {
        Self {
            descriptor: decorator,
            target,
        }
    }

    /// Whether this slot was produced from `descriptor`, directly or by decoration
    pub fn involves(&self, descriptor: DescriptorId) -> bool {
        self.descriptor == descriptor || self.target == descriptor
    }
}

pub(crate) struct CachedInstance {
    pub service_type: &'static str,
    pub instance: Instance,
    pub disposer: Option<Disposer>,
}

impl CachedInstance {
    fn dispose(&self) -> Result<(), CoreError> {
        match (&self.disposer, self.instance.disposable()) {
            (Some(dispose), _) => dispose(&self.instance),
            (None, Some(disposable)) => disposable.dispose(),
            (None, None) => Ok(()),
        }
    }
}

/// Instance table backing singleton and scoped lifetimes
pub(crate) struct InstanceCache {
    resource: &'static str,
    entries: RwLock<HashMap<CacheKey, CachedInstance>>,
    construction_locks: Mutex<HashMap<CacheKey, Arc<Mutex<()>>>>,
}

impl InstanceCache {
    pub fn new(resource: &'static str) -> Self {
        Self {
            resource,
            entries: RwLock::new(HashMap::new()),
            construction_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Result<Option<Instance>, CoreError> {
        let entries = self.entries.read().map_err(|_| CoreError::lock(self.resource))?;
        Ok(entries.get(key).map(|cached| cached.instance.clone()))
    }

    /// Store `instance` unless another thread stored one first, and return
    /// whichever instance ended up in the cache.
    pub fn get_or_insert(
        &self,
        key: CacheKey,
        service_type: &'static str,
        instance: Instance,
        disposer: Option<Disposer>,
    ) -> Result<Instance, CoreError> {
        let mut entries = self.entries.write().map_err(|_| CoreError::lock(self.resource))?;
        if let Some(existing) = entries.get(&key) {
            tracing::trace!(service = service_type, "discarding duplicate instance built by a racing resolution");
            return Ok(existing.instance.clone());
        }
        entries.insert(
            key,
            CachedInstance {
                service_type,
                instance: instance.clone(),
                disposer,
            },
        );
        Ok(instance)
    }

    /// Lock serializing construction of one cache slot
    pub fn construction_lock(&self, key: CacheKey) -> Result<Arc<Mutex<()>>, CoreError> {
        let mut locks = self
            .construction_locks
            .lock()
            .map_err(|_| CoreError::lock(self.resource))?;
        Ok(locks.entry(key).or_default().clone())
    }

    /// Remove every slot matching `predicate`
    pub fn remove_where<P>(&self, predicate: P) -> Result<Vec<CachedInstance>, CoreError>
    where
        P: Fn(&CacheKey) -> bool,
    {
        let mut entries = self.entries.write().map_err(|_| CoreError::lock(self.resource))?;
        let keys: Vec<CacheKey> = entries.keys().filter(|key| predicate(key)).copied().collect();
        Ok(keys.iter().filter_map(|key| entries.remove(key)).collect())
    }

    /// Remove every slot
    pub fn drain(&self) -> Result<Vec<CachedInstance>, CoreError> {
        let mut entries = self.entries.write().map_err(|_| CoreError::lock(self.resource))?;
        if let Ok(mut locks) = self.construction_locks.lock() {
            locks.clear();
        }
        Ok(entries.drain().map(|(_, cached)| cached).collect())
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }
}

/// Dispose every entry, attempting all of them even when some fail
pub(crate) fn dispose_all(entries: Vec<CachedInstance>) -> Result<(), CoreError> {
    let mut failures = Vec::new();

    for cached in entries {
        if let Err(error) = cached.dispose() {
            tracing::warn!(service = cached.service_type, %error, "failed to dispose cached instance");
            failures.push(format!("{}: {}", cached.service_type, error));
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(CoreError::DisposalFailed { failures })
    }
}
