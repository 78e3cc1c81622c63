//! Upstream attribute sources.
//!
//! A source answers "which attributes does this principal have". Sources
//! that can be described by data (`StaticAttributeSource`) are persisted
//! inline with the policy; anything else is registered at runtime under a
//! name and referenced from the persisted document by that name.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use warden_core::error::AttributeError;
use warden_core::types::Attributes;

/// An upstream source of principal attributes.
pub trait AttributeSource: Send + Sync {
    /// Resolve the attributes of `principal_id`.
    ///
    /// Unknown principals fail with [`AttributeError::PrincipalNotFound`];
    /// a known principal without attributes resolves to an empty mapping.
    fn resolve(&self, principal_id: &str) -> Result<Attributes, AttributeError>;
}

/// A source returning the same attributes for every principal.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StaticAttributeSource {
    /// The attributes released for any principal.
    #[serde(default)]
    pub attributes: Attributes,
}

impl StaticAttributeSource {
    /// Create a source returning `attributes`.
    pub fn new(attributes: Attributes) -> Self {
        Self { attributes }
    }
}

impl AttributeSource for StaticAttributeSource {
    fn resolve(&self, _principal_id: &str) -> Result<Attributes, AttributeError> {
        Ok(self.attributes.clone())
    }
}

/// The persisted description of where a caching repository fetches from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "@type")]
pub enum AttributeSourceDefinition {
    /// Inline, fixed attributes.
    #[serde(rename = "StaticAttributeSource")]
    Static(StaticAttributeSource),

    /// A source registered at runtime in [`AttributeSources`].
    #[serde(rename = "NamedAttributeSource")]
    Named {
        /// The registration name.
        name: String,
    },
}

impl AttributeSourceDefinition {
    /// Reference a runtime-registered source.
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named { name: name.into() }
    }

    /// Fetch the attributes of `principal_id` from the described source.
    pub fn fetch(
        &self,
        principal_id: &str,
        sources: &AttributeSources,
    ) -> Result<Attributes, AttributeError> {
        match self {
            Self::Static(source) => source.resolve(principal_id),
            Self::Named { name } => sources
                .get(name)
                .ok_or_else(|| AttributeError::SourceNotRegistered(name.clone()))?
                .resolve(principal_id),
        }
    }
}

impl From<StaticAttributeSource> for AttributeSourceDefinition {
    fn from(source: StaticAttributeSource) -> Self {
        Self::Static(source)
    }
}

/// Runtime registry of named attribute sources.
#[derive(Clone, Default)]
pub struct AttributeSources {
    sources: Arc<DashMap<String, Arc<dyn AttributeSource>>>,
}

impl AttributeSources {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `source` under `name`, replacing any previous registration.
    pub fn register(&self, name: impl Into<String>, source: Arc<dyn AttributeSource>) {
        let name = name.into();
        tracing::debug!(source = %name, "registered attribute source");
        self.sources.insert(name, source);
    }

    /// Look up a source by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn AttributeSource>> {
        self.sources.get(name).map(|s| Arc::clone(s.value()))
    }

    /// Number of registered sources.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether no source is registered.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl fmt::Debug for AttributeSources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.sources.iter().map(|e| e.key().clone()).collect();
        f.debug_struct("AttributeSources")
            .field("sources", &names)
            .finish()
    }
}
