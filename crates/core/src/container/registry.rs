use std::any::TypeId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::container::descriptor::{DescriptorId, ServiceDescriptor, ServiceId};
use crate::container::generics::OpenGenericRegistration;
use crate::errors::CoreError;

/// Descriptor ids are unique across every container of the process, so a
/// scope can cache instances of descriptors owned by ancestor containers.
static NEXT_DESCRIPTOR_ID: AtomicU64 = AtomicU64::new(1);

fn next_descriptor_id() -> DescriptorId {
    NEXT_DESCRIPTOR_ID.fetch_add(1, Ordering::Relaxed)
}

/// Unnamed registrations of one service type
#[derive(Debug, Default)]
struct TypeEntry {
    primaries: Vec<Arc<ServiceDescriptor>>,
    decorators: Vec<Arc<ServiceDescriptor>>,
}

impl TypeEntry {
    fn is_empty(&self) -> bool {
        self.primaries.is_empty() && self.decorators.is_empty()
    }
}

/// Descriptor store of one container
#[derive(Debug, Default)]
pub(crate) struct ServiceRegistry {
    types: HashMap<TypeId, TypeEntry>,
    named: HashMap<ServiceId, Arc<ServiceDescriptor>>,
    open_generics: HashMap<TypeId, OpenGenericRegistration>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a descriptor, assigning its id
    pub fn add(&mut self, mut descriptor: ServiceDescriptor) -> Result<Arc<ServiceDescriptor>, CoreError> {
        let service_id = descriptor.service_id.clone();

        if service_id.name.is_some() {
            if descriptor.is_decorator() {
                return Err(CoreError::registration_conflict(format!(
                    "decorator for {} cannot be named",
                    service_id
                )));
            }
            if self.named.contains_key(&service_id) {
                return Err(CoreError::registration_conflict(format!(
                    "a service named '{}' is already registered for {}",
                    service_id.name.as_deref().unwrap_or_default(),
                    service_id.type_name()
                )));
            }

            descriptor.id = next_descriptor_id();
            let descriptor = Arc::new(descriptor);
            self.named.insert(service_id, descriptor.clone());
            return Ok(descriptor);
        }

        if descriptor.is_decorator() {
            let target = self
                .types
                .get(&service_id.type_id)
                .and_then(|entry| entry.primaries.last())
                .ok_or_else(|| {
                    CoreError::registration_conflict(format!(
                        "cannot decorate {}: it has no registration to wrap",
                        service_id.type_name()
                    ))
                })?;
            descriptor.lifetime = target.effective_lifetime();
        }

        descriptor.id = next_descriptor_id();
        let descriptor = Arc::new(descriptor);
        let entry = self.types.entry(service_id.type_id).or_default();
        if descriptor.is_decorator() {
            entry.decorators.push(descriptor.clone());
        } else {
            entry.primaries.push(descriptor.clone());
        }
        Ok(descriptor)
    }

    /// Non-decorator unnamed descriptors in registration order
    pub fn primaries(&self, type_id: TypeId) -> Vec<Arc<ServiceDescriptor>> {
        self.types
            .get(&type_id)
            .map(|entry| entry.primaries.clone())
            .unwrap_or_default()
    }

    /// Decorators in registration order
    pub fn decorators(&self, type_id: TypeId) -> Vec<Arc<ServiceDescriptor>> {
        self.types
            .get(&type_id)
            .map(|entry| entry.decorators.clone())
            .unwrap_or_default()
    }

    pub fn named(&self, service_id: &ServiceId) -> Option<Arc<ServiceDescriptor>> {
        self.named.get(service_id).cloned()
    }

    /// Whether this registry alone can satisfy `service_id`
    pub fn contains(&self, service_id: &ServiceId) -> bool {
        match service_id.name {
            Some(_) => self.named.contains_key(service_id),
            None => self
                .types
                .get(&service_id.type_id)
                .map_or(false, |entry| !entry.primaries.is_empty()),
        }
    }

    /// Remove every descriptor of a type, named ones included
    pub fn remove_type(&mut self, type_id: TypeId) -> Vec<Arc<ServiceDescriptor>> {
        let mut removed = Vec::new();

        if let Some(entry) = self.types.remove(&type_id) {
            removed.extend(entry.primaries);
            removed.extend(entry.decorators);
        }

        let named: Vec<ServiceId> = self
            .named
            .keys()
            .filter(|service_id| service_id.type_id == type_id)
            .cloned()
            .collect();
        removed.extend(named.iter().filter_map(|service_id| self.named.remove(service_id)));

        removed
    }

    /// Remove every descriptor and open generic registration
    pub fn clear(&mut self) -> Vec<Arc<ServiceDescriptor>> {
        let removed = self.all();
        self.types.clear();
        self.named.clear();
        self.open_generics.clear();
        removed
    }

    /// Every descriptor in registration order
    pub fn all(&self) -> Vec<Arc<ServiceDescriptor>> {
        let mut all: Vec<Arc<ServiceDescriptor>> = self
            .types
            .values()
            .flat_map(|entry| entry.primaries.iter().chain(entry.decorators.iter()))
            .chain(self.named.values())
            .cloned()
            .collect();
        all.sort_by_key(|descriptor| descriptor.id);
        all
    }

    /// Keys a verification pass has to resolve, in registration order
    pub fn verification_targets(&self) -> Vec<ServiceId> {
        let mut targets: Vec<(DescriptorId, ServiceId)> = self
            .types
            .values()
            .filter_map(|entry| entry.primaries.first())
            .map(|descriptor| (descriptor.id, descriptor.service_id.unnamed()))
            .chain(
                self.named
                    .values()
                    .map(|descriptor| (descriptor.id, descriptor.service_id.clone())),
            )
            .collect();
        targets.sort_by_key(|(id, _)| *id);
        targets.into_iter().map(|(_, service_id)| service_id).collect()
    }

    pub fn add_open_generic(&mut self, definition: TypeId, registration: OpenGenericRegistration) {
        self.open_generics.insert(definition, registration);
    }

    pub fn open_generic(&self, definition: TypeId) -> Option<OpenGenericRegistration> {
        self.open_generics.get(&definition).cloned()
    }

    pub fn open_generic_count(&self) -> usize {
        self.open_generics.len()
    }

    /// Number of stored descriptors
    pub fn len(&self) -> usize {
        self.types
            .values()
            .map(|entry| entry.primaries.len() + entry.decorators.len())
            .sum::<usize>()
            + self.named.len()
    }

    /// Number of distinct unnamed service types
    pub fn type_count(&self) -> usize {
        self.types.values().filter(|entry| !entry.is_empty()).count()
    }
}
