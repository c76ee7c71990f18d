use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::container::cache::{dispose_all, InstanceCache};
use crate::container::ioc_container::Container;
use crate::container::resolver::{DependencyResolver, Resolver};
use crate::errors::CoreError;

/// Scope identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScopeId(Uuid);

impl ScopeId {
    /// Create a new unique scope ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ScopeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ScopeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub(crate) struct ScopeState {
    id: ScopeId,
    container: Container,
    cache: InstanceCache,
    disposed: AtomicBool,
    created_at: DateTime<Utc>,
}

impl ScopeState {
    pub(crate) fn id(&self) -> ScopeId {
        self.id
    }

    /// Dispose scoped instances; only the first call does any work
    pub(crate) fn dispose(&self) -> Result<(), CoreError> {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let entries = self.cache.drain()?;
        tracing::debug!(scope = %self.id, instances = entries.len(), "disposing scope");
        dispose_all(entries)
    }
}

impl Drop for ScopeState {
    fn drop(&mut self) {
        if let Err(error) = self.dispose() {
            tracing::warn!(scope = %self.id, %error, "scope dropped with failing disposal");
        }
        self.container.forget_scope(self.id);
    }
}

/// A lifetime boundary for `Scoped` services.
///
/// Cloning a scope yields another handle to the same instances. The scope is
/// disposed by [`Scope::dispose`], by disposing its container, or when the
/// last handle is dropped.
#[derive(Clone)]
pub struct Scope {
    state: Arc<ScopeState>,
}

impl Scope {
    pub(crate) fn new(container: Container) -> Self {
        Self {
            state: Arc::new(ScopeState {
                id: ScopeId::new(),
                container,
                cache: InstanceCache::new("scope instances"),
                disposed: AtomicBool::new(false),
                created_at: Utc::now(),
            }),
        }
    }

    pub(crate) fn state(&self) -> &Arc<ScopeState> {
        &self.state
    }

    pub(crate) fn cache(&self) -> &InstanceCache {
        &self.state.cache
    }

    pub fn id(&self) -> ScopeId {
        self.state.id
    }

    /// Container that created this scope
    pub fn container(&self) -> &Container {
        &self.state.container
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.state.created_at
    }

    pub fn is_disposed(&self) -> bool {
        self.state.disposed.load(Ordering::SeqCst)
    }

    /// Number of scoped instances created so far
    pub fn instance_count(&self) -> usize {
        self.state.cache.len()
    }

    /// Dispose every scoped instance and detach from the container.
    ///
    /// Singletons are left alone. Calling this more than once is a no-op.
    pub fn dispose(&self) -> Result<(), CoreError> {
        let result = self.state.dispose();
        self.state.container.forget_scope(self.state.id);
        result
    }
}

impl DependencyResolver for Scope {
    fn with_resolver<R, F>(&self, f: F) -> Result<R, CoreError>
    where
        F: FnOnce(&Resolver<'_>) -> Result<R, CoreError>,
    {
        if self.is_disposed() {
            return Err(CoreError::disposed(format!("scope {}", self.id())));
        }
        self.state.container.run_resolution(Some(self), f)
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.state.id)
            .field("container", &self.state.container.id())
            .field("instances", &self.instance_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
