//! JSON file registry.
//!
//! One human-readable JSON document per service, named from its storage
//! key, inside a single directory. Writes go through a temporary file and
//! an atomic rename; readers never observe a partial document.
//!
//! Deserialized services are kept in an index, so lookups hand out the same
//! policy graphs (and the attribute caches inside them) until a service is
//! written again. `load` rescans the directory and refreshes the index,
//! keeping graphs whose documents did not change.

use dashmap::DashMap;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;
use tracing::{debug, info, warn};
use warden_core::error::{RegistryError, Result};
use warden_core::id::ServiceId;
use warden_core::utils::config::RegistryConfig;
use warden_policy::model::RegisteredService;

use super::{LoadFailure, LoadReport, ServiceRegistry};
use crate::atomic::{is_temporary, remove_if_exists, write_atomic};
use crate::key::{validate_name, StorageKey};
use crate::locks::LockTable;
use crate::sequence::IdSequence;

/// A registry persisting each service as a JSON document.
#[derive(Debug)]
pub struct JsonServiceRegistry {
    /// The directory holding the documents.
    location: PathBuf,

    /// Whether documents are pretty-printed.
    pretty: bool,

    /// Allocates ids for new services.
    sequence: IdSequence,

    /// Serializes writes per id.
    locks: LockTable,

    /// Deserialized services by id.
    index: DashMap<ServiceId, Indexed>,

    /// Counts index writes made by saves.
    generation: AtomicU64,
}

/// An indexed service and the index generation it was stored at.
#[derive(Debug)]
struct Indexed {
    service: RegisteredService,
    generation: u64,
}

/// A document found in the registry directory.
#[derive(Debug)]
struct Entry {
    key: StorageKey,
    path: PathBuf,
    modified: Option<SystemTime>,
}

impl JsonServiceRegistry {
    /// Open the registry stored in `location`, creating the directory if needed.
    pub fn open(location: impl Into<PathBuf>) -> Result<Self> {
        let location = location.into();
        if location.exists() && !location.is_dir() {
            return Err(RegistryError::InvalidLocation(location).into());
        }
        fs::create_dir_all(&location)?;

        let entries = scan(&location)?;
        let observed = entries
            .iter()
            .map(|e| e.key.id())
            .max()
            .unwrap_or(ServiceId::new(0));
        let sequence = IdSequence::open(&location, observed)?;

        info!(
            location = %location.display(),
            documents = entries.len(),
            next_id = sequence.current().value().saturating_add(1),
            "opened service registry"
        );

        let registry = Self {
            location,
            pretty: true,
            sequence,
            locks: LockTable::new(),
            index: DashMap::new(),
            generation: AtomicU64::new(0),
        };
        registry.load()?;
        Ok(registry)
    }

    /// Open the registry described by `config`.
    pub fn from_config(config: &RegistryConfig) -> Result<Self> {
        Ok(Self::open(config.location.clone())?.with_pretty(config.pretty))
    }

    /// Choose between pretty-printed and compact documents.
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// The directory holding the documents.
    pub fn location(&self) -> &Path {
        &self.location
    }

    fn encode(&self, service: &RegisteredService) -> Result<Vec<u8>> {
        let data = if self.pretty {
            serde_json::to_vec_pretty(service)?
        } else {
            serde_json::to_vec(service)?
        };
        Ok(data)
    }

    /// Documents of `id`, most recently written first.
    fn entries_for(&self, id: ServiceId) -> Result<Vec<Entry>> {
        let mut entries: Vec<Entry> = scan(&self.location)?
            .into_iter()
            .filter(|e| e.key.id() == id)
            .collect();
        entries.sort_by(|a, b| b.modified.cmp(&a.modified));
        Ok(entries)
    }

    fn indexed(&self, id: ServiceId) -> Option<RegisteredService> {
        self.index.get(&id).map(|indexed| indexed.service.clone())
    }

    /// Bring the index in line with a scan that began at generation `started`.
    ///
    /// Entries written after the scan began are left alone. An unchanged
    /// service keeps its indexed graph. Returns the indexed services.
    fn refresh_index(
        &self,
        loaded: Vec<(RegisteredService, PathBuf)>,
        failed: &[ServiceId],
        started: u64,
    ) -> Vec<RegisteredService> {
        let is_stale = |id: &ServiceId| {
            self.index
                .get(id)
                .map_or(true, |indexed| indexed.generation <= started)
        };

        let mut services = Vec::with_capacity(loaded.len());
        for (service, path) in loaded {
            let id = service.id;
            let lock = self.locks.get(id);
            let _guard = lock.lock();

            if is_stale(&id) && path.exists() {
                let unchanged = self
                    .index
                    .get(&id)
                    .is_some_and(|indexed| indexed.service == service);
                if !unchanged {
                    self.index.insert(
                        id,
                        Indexed {
                            service,
                            generation: started,
                        },
                    );
                }
            }
            if let Some(service) = self.indexed(id) {
                services.push(service);
            }
        }

        let present: HashSet<ServiceId> = services.iter().map(|s| s.id).collect();
        let vanished: Vec<ServiceId> = self
            .index
            .iter()
            .map(|indexed| *indexed.key())
            .filter(|id| !present.contains(id) || failed.contains(id))
            .collect();
        for id in vanished {
            let lock = self.locks.get(id);
            let _guard = lock.lock();
            self.index
                .remove_if(&id, |_, indexed| indexed.generation <= started);
        }

        services
    }
}

impl ServiceRegistry for JsonServiceRegistry {
    fn save(&self, mut service: RegisteredService) -> Result<RegisteredService> {
        validate_name(&service.name)?;
        service.validate()?;

        if service.id.is_assigned() {
            self.sequence.observe(service.id)?;
        } else {
            service.id = self.sequence.next()?;
        }

        let key = StorageKey::new(&service.name, service.id)?;
        let data = self.encode(&service)?;

        let lock = self.locks.get(service.id);
        let _guard = lock.lock();

        write_atomic(&self.location, &key.file_name(), &data)?;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.index.insert(
            service.id,
            Indexed {
                service: service.clone(),
                generation,
            },
        );

        // A renamed service leaves its previous document behind.
        for stale in self.entries_for(service.id)? {
            if stale.key != key && remove_if_exists(&stale.path)? {
                debug!(path = %stale.path.display(), "removed stale service document");
            }
        }

        debug!(id = %service.id, name = %service.name, "saved service");
        Ok(service)
    }

    fn find_service_by_id(&self, id: ServiceId) -> Result<Option<RegisteredService>> {
        if !id.is_assigned() {
            return Ok(None);
        }

        if let Some(service) = self.indexed(id) {
            return Ok(Some(service));
        }

        let lock = self.locks.get(id);
        let _guard = lock.lock();
        if let Some(service) = self.indexed(id) {
            return Ok(Some(service));
        }

        for entry in self.entries_for(id)? {
            match read_entry(&entry) {
                Ok(Some(service)) => {
                    self.index.insert(
                        id,
                        Indexed {
                            service: service.clone(),
                            generation: self.generation.load(Ordering::SeqCst),
                        },
                    );
                    return Ok(Some(service));
                }
                Ok(None) => continue,
                Err(failure) => {
                    return Err(RegistryError::Corrupt {
                        path: failure.path,
                        reason: failure.reason,
                    }
                    .into())
                }
            }
        }

        Ok(None)
    }

    fn load(&self) -> Result<LoadReport> {
        let started = self.generation.load(Ordering::SeqCst);
        let mut entries = scan(&self.location)?;
        entries.sort_by(|a, b| {
            a.key
                .id()
                .cmp(&b.key.id())
                .then_with(|| b.modified.cmp(&a.modified))
        });

        let mut report = LoadReport::default();
        let mut loaded = Vec::new();
        let mut failed = Vec::new();
        let mut settled: Option<ServiceId> = None;

        for entry in entries {
            if settled == Some(entry.key.id()) {
                continue;
            }

            match read_entry(&entry) {
                Ok(Some(service)) => {
                    settled = Some(entry.key.id());
                    loaded.push((service, entry.path));
                }
                Ok(None) => {}
                Err(failure) => {
                    settled = Some(entry.key.id());
                    failed.push(entry.key.id());
                    warn!(
                        path = %failure.path.display(),
                        reason = %failure.reason,
                        "skipping unreadable service document"
                    );
                    report.failures.push(failure);
                }
            }
        }

        report.services = self.refresh_index(loaded, &failed, started);

        info!(
            loaded = report.services.len(),
            failed = report.failures.len(),
            "loaded service registry"
        );
        Ok(report)
    }

    fn delete(&self, service: &RegisteredService) -> Result<()> {
        if !service.id.is_assigned() {
            return Ok(());
        }

        let lock = self.locks.get(service.id);
        let _guard = lock.lock();

        let mut removed = 0;
        for entry in self.entries_for(service.id)? {
            if remove_if_exists(&entry.path)? {
                removed += 1;
            }
        }
        self.index.remove(&service.id);

        debug!(id = %service.id, removed, "deleted service");
        Ok(())
    }
}

/// Every service document in `dir`.
fn scan(dir: &Path) -> Result<Vec<Entry>> {
    let mut entries = Vec::new();

    for dir_entry in fs::read_dir(dir)? {
        let dir_entry = dir_entry?;
        let Some(file_name) = dir_entry.file_name().to_str().map(str::to_owned) else {
            continue;
        };

        let Some(key) = StorageKey::parse(&file_name) else {
            if is_temporary(&file_name) {
                debug!(file = %file_name, "ignoring interrupted write");
            }
            continue;
        };

        let metadata = match dir_entry.metadata() {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        };
        if !metadata.is_file() {
            continue;
        }

        entries.push(Entry {
            key,
            path: dir_entry.path(),
            modified: metadata.modified().ok(),
        });
    }

    Ok(entries)
}

/// Read one document; `Ok(None)` if it vanished since the scan.
fn read_entry(entry: &Entry) -> std::result::Result<Option<RegisteredService>, LoadFailure> {
    let failure = |reason: String| LoadFailure {
        path: entry.path.clone(),
        reason,
    };

    let data = match fs::read(&entry.path) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(failure(e.to_string())),
    };

    let service: RegisteredService =
        serde_json::from_slice(&data).map_err(|e| failure(e.to_string()))?;

    if service.id != entry.key.id() {
        return Err(failure(format!(
            "document id {} does not match file name id {}",
            service.id,
            entry.key.id()
        )));
    }

    Ok(Some(service))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use warden_core::Error;

    #[test]
    fn test_document_named_from_storage_key() {
        let dir = tempdir().unwrap();
        let registry = JsonServiceRegistry::open(dir.path()).unwrap();

        let saved = registry
            .save(RegisteredService::literal("My App", "https://app"))
            .unwrap();

        let path = dir.path().join(format!("My App-{}.json", saved.id));
        assert!(path.is_file());

        let json: serde_json::Value = serde_json::from_slice(&fs::read(path).unwrap()).unwrap();
        assert_eq!(json["@type"], "LiteralRegisteredService");
        assert_eq!(json["name"], "My App");
    }

    #[test]
    fn test_compact_documents() {
        let dir = tempdir().unwrap();
        let mut config = RegistryConfig::default().with_location(dir.path());
        config.pretty = false;

        let registry = JsonServiceRegistry::from_config(&config).unwrap();
        let saved = registry
            .save(RegisteredService::literal("app", "https://app"))
            .unwrap();

        let text = fs::read_to_string(dir.path().join(format!("app-{}.json", saved.id))).unwrap();
        assert!(!text.contains('\n'));
    }

    #[test]
    fn test_file_location_rejected() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("not-a-dir");
        fs::write(&file, b"").unwrap();

        assert!(matches!(
            JsonServiceRegistry::open(&file),
            Err(Error::Registry(RegistryError::InvalidLocation(_)))
        ));
    }

    #[test]
    fn test_mismatched_document_id_is_a_failure() {
        let dir = tempdir().unwrap();
        let registry = JsonServiceRegistry::open(dir.path()).unwrap();

        let saved = registry
            .save(RegisteredService::literal("app", "https://app").with_id(5))
            .unwrap();
        fs::rename(
            dir.path().join("app-5.json"),
            dir.path().join("app-6.json"),
        )
        .unwrap();

        let report = registry.load().unwrap();
        assert!(report.services.is_empty());
        assert_eq!(report.failures.len(), 1);
        assert!(registry.find_service_by_id(saved.id).unwrap().is_none());
        assert!(registry.find_service_by_id(ServiceId::new(6)).is_err());
    }
}
