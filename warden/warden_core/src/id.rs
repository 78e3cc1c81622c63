//! Registered service identifiers.
//!
//! A service id is a 64-bit integer. Any value that is not strictly
//! positive means "not yet assigned"; the registry store allocates a fresh
//! id for such services on save.
//!
//! # Examples
//!
//! ```
//! use warden_core::id::ServiceId;
//!
//! let id = ServiceId::UNASSIGNED;
//! assert!(!id.is_assigned());
//!
//! let id = ServiceId::new(42);
//! assert!(id.is_assigned());
//! assert_eq!(id.to_string(), "42");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a registered service.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ServiceId(i64);

impl ServiceId {
    /// The id carried by services that have never been saved.
    pub const UNASSIGNED: Self = Self(-1);

    /// Wrap a raw id value.
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// The raw id value.
    pub const fn value(&self) -> i64 {
        self.0
    }

    /// Whether this id was assigned by a store (strictly positive).
    pub const fn is_assigned(&self) -> bool {
        self.0 > 0
    }
}

impl Default for ServiceId {
    fn default() -> Self {
        Self::UNASSIGNED
    }
}

impl From<i64> for ServiceId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<i32> for ServiceId {
    fn from(value: i32) -> Self {
        Self(i64::from(value))
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ServiceId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<i64>().map(Self)
    }
}
