//! In-memory service registry.
//!
//! This module provides an in-memory implementation of the service
//! registry with the same id, validation and not-found semantics as the
//! JSON file registry.

use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use warden_core::error::{RegistryError, Result};
use warden_core::id::ServiceId;
use warden_policy::model::RegisteredService;

use super::{LoadReport, ServiceRegistry};
use crate::key::validate_name;

/// An in-memory service registry.
#[derive(Clone)]
pub struct InMemoryServiceRegistry {
    /// The services, indexed by id.
    services: Arc<DashMap<ServiceId, RegisteredService>>,

    /// The highest id allocated or observed.
    high_water: Arc<AtomicI64>,
}

impl InMemoryServiceRegistry {
    /// Create a new in-memory service registry.
    pub fn new() -> Self {
        Self {
            services: Arc::new(DashMap::new()),
            high_water: Arc::new(AtomicI64::new(0)),
        }
    }

    fn next_id(&self) -> Result<ServiceId> {
        let previous = self
            .high_water
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| v.checked_add(1))
            .map_err(|v| RegistryError::SequenceExhausted(ServiceId::new(v)))?;
        Ok(ServiceId::new(previous + 1))
    }
}

impl Default for InMemoryServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryServiceRegistry")
            .field("services", &self.services.len())
            .field("high_water", &self.high_water.load(Ordering::SeqCst))
            .finish()
    }
}

impl ServiceRegistry for InMemoryServiceRegistry {
    fn save(&self, mut service: RegisteredService) -> Result<RegisteredService> {
        // Validate before touching the sequence
        validate_name(&service.name)?;
        service.validate()?;

        if service.id.is_assigned() {
            self.high_water
                .fetch_max(service.id.value(), Ordering::SeqCst);
        } else {
            service.id = self.next_id()?;
        }

        self.services.insert(service.id, service.clone());
        tracing::debug!(id = %service.id, name = %service.name, "saved service in memory");

        Ok(service)
    }

    fn find_service_by_id(&self, id: ServiceId) -> Result<Option<RegisteredService>> {
        Ok(self.services.get(&id).map(|s| s.value().clone()))
    }

    fn load(&self) -> Result<LoadReport> {
        let mut services: Vec<RegisteredService> =
            self.services.iter().map(|s| s.value().clone()).collect();
        services.sort_by_key(|s| s.id);

        Ok(LoadReport {
            services,
            failures: Vec::new(),
        })
    }

    fn delete(&self, service: &RegisteredService) -> Result<()> {
        self.services.remove(&service.id);
        Ok(())
    }

    fn size(&self) -> Result<usize> {
        Ok(self.services.len())
    }
}
