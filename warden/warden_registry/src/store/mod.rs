//! Service registry storage.
//!
//! This module provides durable and in-memory storage for registered
//! services.

mod in_memory;
mod json_file;

pub use in_memory::InMemoryServiceRegistry;
pub use json_file::JsonServiceRegistry;

use std::path::PathBuf;
use warden_core::error::Result;
use warden_core::id::ServiceId;
use warden_policy::engine::ServiceLookup;
use warden_policy::model::RegisteredService;

/// Trait for service registry storage.
///
/// A registry is responsible for persisting, retrieving, enumerating and
/// deleting registered services. Implementations are safe to share between
/// threads; saves and deletes of the same id are serialized.
pub trait ServiceRegistry: Send + Sync {
    /// Save a service, replacing any entry with the same id.
    ///
    /// # Arguments
    ///
    /// * `service` - The service to save. An unassigned id is allocated.
    ///
    /// # Returns
    ///
    /// * `Ok(RegisteredService)` - The service as persisted, id populated.
    /// * `Err` - If validation failed (nothing was written) or the write failed.
    fn save(&self, service: RegisteredService) -> Result<RegisteredService>;

    /// Find a service by id.
    ///
    /// # Arguments
    ///
    /// * `id` - The id of the service to find.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(RegisteredService))` - The service.
    /// * `Ok(None)` - If no service has this id.
    /// * `Err` - If the entry exists but could not be read.
    fn find_service_by_id(&self, id: ServiceId) -> Result<Option<RegisteredService>>;

    /// Load every persisted service.
    ///
    /// # Returns
    ///
    /// * `Ok(LoadReport)` - The readable services, plus one failure per
    ///   entry that could not be read.
    /// * `Err` - If the registry itself could not be enumerated.
    fn load(&self) -> Result<LoadReport>;

    /// Delete a service.
    ///
    /// # Arguments
    ///
    /// * `service` - The service to delete, identified by its id.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the service was deleted or did not exist.
    /// * `Err` - If the entry could not be removed.
    fn delete(&self, service: &RegisteredService) -> Result<()>;

    /// Number of loadable services.
    fn size(&self) -> Result<usize> {
        Ok(self.load()?.services.len())
    }

    /// Find the service responsible for `service_url`.
    ///
    /// # Arguments
    ///
    /// * `service_url` - The URL presented by a client.
    /// * `lookup` - The ordering applied when several services match.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(RegisteredService))` - The first matching service.
    /// * `Ok(None)` - If no loadable service matches.
    /// * `Err` - If the registry could not be enumerated.
    fn find_service(
        &self,
        service_url: &str,
        lookup: &ServiceLookup,
    ) -> Result<Option<RegisteredService>> {
        let report = self.load()?;
        Ok(lookup.find(&report.services, service_url).cloned())
    }
}

/// An entry that could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadFailure {
    /// The unreadable artifact.
    pub path: PathBuf,

    /// The read or decoding error.
    pub reason: String,
}

/// The outcome of loading a registry.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    /// Every readable service, ordered by id.
    pub services: Vec<RegisteredService>,

    /// Every entry that was skipped.
    pub failures: Vec<LoadFailure>,
}

impl LoadReport {
    /// Whether every entry was loaded.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Consume the report, keeping the services.
    pub fn into_services(self) -> Vec<RegisteredService> {
        self.services
    }
}
