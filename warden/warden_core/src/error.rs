//! Error types for the Warden service registry.
//!
//! This module defines the error hierarchy used throughout the registry.
//! The errors are organized by subsystem, with each subsystem having its
//! own error type.
//!
//! The root error type, `Error`, can wrap any of the subsystem-specific
//! errors, allowing for uniform error handling at the top level.
//!
//! Absence is never an error here: lookups return `Option` and deleting a
//! missing entry succeeds.

use crate::id::ServiceId;
use std::path::PathBuf;
use thiserror::Error;

/// Root error type for the Warden registry.
#[derive(Debug, Error)]
pub enum Error {
    /// Registry store errors
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Policy construction and evaluation errors
    #[error("Policy error: {0}")]
    Policy(#[from] PolicyError),

    /// Attribute resolution errors
    #[error("Attribute error: {0}")]
    Attribute(#[from] AttributeError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Errors raised by the registry store.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The service name is empty or cannot be part of a storage key
    #[error("Invalid service name {name:?}: {reason}")]
    InvalidName {
        /// The rejected name
        name: String,

        /// Why it was rejected
        reason: String,
    },

    /// The storage key derived from the service is not filesystem-safe
    #[error("Invalid storage key: {0}")]
    InvalidStorageKey(String),

    /// A persisted artifact could not be read back
    #[error("Corrupt service document {path}: {reason}")]
    Corrupt {
        /// The artifact that failed
        path: PathBuf,

        /// The decoding or read failure
        reason: String,
    },

    /// No further ids can be allocated
    #[error("Service id sequence exhausted after {0}")]
    SequenceExhausted(ServiceId),

    /// The store location is not a usable directory
    #[error("Invalid registry location: {0}")]
    InvalidLocation(PathBuf),
}

/// Errors related to policy construction and evaluation.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// A regular expression could not be compiled
    #[error("Invalid pattern {pattern:?}: {reason}")]
    InvalidPattern {
        /// The offending pattern
        pattern: String,

        /// The compiler's message
        reason: String,
    },

    /// The principal does not carry the configured username attribute
    #[error("Principal {principal} has no value for username attribute {attribute}")]
    MissingUsernameAttribute {
        /// The principal identifier
        principal: String,

        /// The configured attribute name
        attribute: String,
    },

    /// The pseudonym salt is unusable
    #[error("Invalid pseudonym salt: {0}")]
    InvalidSalt(String),

    /// A pseudonym was requested but no salt is configured
    #[error("No pseudonym salt configured")]
    MissingSalt,
}

/// Errors related to attribute resolution.
///
/// These are distinct from a principal simply having no attributes, which
/// resolves to an empty mapping.
#[derive(Debug, Error)]
pub enum AttributeError {
    /// The upstream source does not know this principal
    #[error("Principal not found in attribute source: {0}")]
    PrincipalNotFound(String),

    /// The upstream source failed
    #[error("Attribute source failure: {0}")]
    Upstream(String),

    /// A persisted repository references a source that was never registered
    #[error("Attribute source not registered: {0}")]
    SourceNotRegistered(String),
}

/// Result type used throughout the Warden registry.
pub type Result<T> = std::result::Result<T, Error>;
