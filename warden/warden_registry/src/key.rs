//! Storage keys.
//!
//! Every persisted service lives in one document named `{name}-{id}.json`.
//! The id follows the last `-`, so names may themselves contain dashes and
//! the mapping from `(name, id)` to file name stays injective.
//!
//! Names are validated before any I/O. Rejected are empty names, `.` and
//! `..`, names starting with `.` (reserved for temporary and bookkeeping
//! artifacts), path separators, characters that are unsafe on common
//! filesystems, and control characters.

use std::fmt;
use warden_core::error::RegistryError;
use warden_core::id::ServiceId;

use crate::atomic::TEMPORARY_OVERHEAD;

/// File extension of service documents.
pub const EXTENSION: &str = "json";

/// Longest file name accepted by common filesystems, in bytes.
pub const MAX_FILE_NAME_LEN: usize = 255;

/// Digits of the largest id.
const MAX_ID_DIGITS: usize = 19;

/// Longest accepted service name, in bytes.
///
/// The temporary sibling of a document with the largest id still fits in
/// [`MAX_FILE_NAME_LEN`], so a valid name never fails at write time.
pub const MAX_NAME_LEN: usize =
    MAX_FILE_NAME_LEN - TEMPORARY_OVERHEAD - "-".len() - MAX_ID_DIGITS - ".json".len();

const FORBIDDEN: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// The storage key of one persisted service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageKey {
    name: String,
    id: ServiceId,
}

impl StorageKey {
    /// Build the key of a service with an assigned id.
    pub fn new(name: &str, id: ServiceId) -> Result<Self, RegistryError> {
        validate_name(name)?;
        if !id.is_assigned() {
            return Err(RegistryError::InvalidStorageKey(format!(
                "{}-{}: id is not assigned",
                name, id
            )));
        }

        let key = Self {
            name: name.to_string(),
            id,
        };
        let longest = key.file_name().len() + TEMPORARY_OVERHEAD;
        if longest > MAX_FILE_NAME_LEN {
            return Err(RegistryError::InvalidName {
                name: name.to_string(),
                reason: format!("file name would exceed {} bytes", MAX_FILE_NAME_LEN),
            });
        }

        Ok(key)
    }

    /// Recover the key from a document file name.
    ///
    /// Returns `None` for anything that is not a service document, including
    /// temporary and bookkeeping artifacts.
    pub fn parse(file_name: &str) -> Option<Self> {
        if file_name.starts_with('.') {
            return None;
        }

        let stem = file_name.strip_suffix(EXTENSION)?.strip_suffix('.')?;
        let (name, id) = stem.rsplit_once('-')?;
        let id: ServiceId = id.parse().ok()?;

        Self::new(name, id).ok()
    }

    /// The service name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The service id.
    pub fn id(&self) -> ServiceId {
        self.id
    }

    /// The document file name.
    pub fn file_name(&self) -> String {
        format!("{}.{}", self, EXTENSION)
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.name, self.id)
    }
}

/// Check that `name` can be part of a storage key.
pub fn validate_name(name: &str) -> Result<(), RegistryError> {
    let reject = |reason: String| RegistryError::InvalidName {
        name: name.to_string(),
        reason,
    };

    if name.trim().is_empty() {
        return Err(reject("name must not be empty".to_string()));
    }
    if name.starts_with('.') {
        return Err(reject("name must not start with '.'".to_string()));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(reject(format!(
            "name is longer than {} bytes",
            MAX_NAME_LEN
        )));
    }
    if let Some(c) = name.chars().find(|c| FORBIDDEN.contains(c)) {
        return Err(reject(format!("contains {:?}", c)));
    }
    if name.chars().any(char::is_control) {
        return Err(reject("contains a control character".to_string()));
    }

    Ok(())
}
