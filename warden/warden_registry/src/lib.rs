//! # Warden Registry
//!
//! `warden_registry` persists registered services. The main store keeps one
//! JSON document per service in a directory, and guarantees that:
//!
//! 1. **Validation precedes I/O**: a service whose name cannot form a safe
//!    storage key is rejected before anything is written.
//!
//! 2. **Ids are never reused**: allocated ids come from a persisted
//!    sequence that survives restarts and deletions.
//!
//! 3. **Writes are atomic**: documents are replaced by rename, so readers
//!    see either the previous or the new version.
//!
//! 4. **Writers to one id are serialized**: saves and deletes of different
//!    ids proceed independently.
//!
//! 5. **Loading is available**: an unreadable document is reported and
//!    skipped, and the remaining services still load.

pub mod atomic;
pub mod key;
pub mod locks;
pub mod sequence;
pub mod store;

// Re-export key types for convenience
pub use key::StorageKey;
pub use store::{
    InMemoryServiceRegistry, JsonServiceRegistry, LoadFailure, LoadReport, ServiceRegistry,
};
