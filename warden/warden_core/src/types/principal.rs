//! Principals and their attributes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A principal's attribute mapping: attribute name to its values.
///
/// A `BTreeMap` keeps equality and serialization independent of insertion
/// order.
pub type Attributes = BTreeMap<String, Vec<String>>;

/// An authenticated end-user identity and the attributes it carries.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Principal {
    /// The primary identifier.
    pub id: String,

    /// Attributes supplied with the principal.
    #[serde(default)]
    pub attributes: Attributes,
}

impl Principal {
    /// Create a principal with no attributes.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: Attributes::new(),
        }
    }

    /// Create a principal carrying the given attributes.
    pub fn with_attributes(id: impl Into<String>, attributes: Attributes) -> Self {
        Self {
            id: id.into(),
            attributes,
        }
    }

    /// Add a single attribute value, appending to any existing values.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes
            .entry(name.into())
            .or_default()
            .push(value.into());
        self
    }

    /// The values of one attribute, empty if absent.
    pub fn attribute(&self, name: &str) -> &[String] {
        self.attributes.get(name).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Build an attribute mapping from name/value-list pairs.
///
/// ```
/// use warden_core::types::attributes;
///
/// let attrs = attributes([("cn", vec!["casuser"]), ("mail", vec!["a@b.c"])]);
/// assert_eq!(attrs["cn"], vec!["casuser".to_string()]);
/// ```
pub fn attributes<I, K, V>(pairs: I) -> Attributes
where
    I: IntoIterator<Item = (K, Vec<V>)>,
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, vs)| (k.into(), vs.into_iter().map(Into::into).collect()))
        .collect()
}
