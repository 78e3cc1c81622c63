//! # Warden Core
//!
//! `warden_core` provides the building blocks shared by the Warden service
//! registry crates: the error hierarchy, service identifiers, principal and
//! attribute types, configuration and logging.
//!
//! ## Crate Structure
//!
//! - **error**: Error types for all registry components
//! - **id**: The registered service identifier
//! - **types**: Principals and attribute mappings
//! - **utils**: Configuration and logging helpers

pub mod error;
pub mod id;
pub mod types;
pub mod utils;

// Re-export key types for convenience
pub use error::{Error, Result};
pub use id::ServiceId;
pub use types::{Attributes, Principal};
pub use utils::{LogLevel, RegistryConfig, TieBreak};
