//! Principal attribute repositories.
//!
//! An attribute release policy may name a repository to source principal
//! attributes from. Without one, the attributes supplied with the principal
//! are used as they are.

pub mod caching;
pub mod merge;
pub mod source;

pub use caching::{CachingAttributeRepository, TimeUnit};
pub use merge::MergeStrategy;
pub use source::{
    AttributeSource, AttributeSourceDefinition, AttributeSources, StaticAttributeSource,
};

use serde::{Deserialize, Serialize};
use warden_core::error::Result;
use warden_core::types::{Attributes, Principal};

/// Where an attribute release policy obtains principal attributes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "@type")]
pub enum PrincipalAttributesRepository {
    /// The attributes carried by the principal, unchanged.
    #[default]
    #[serde(rename = "DefaultPrincipalAttributesRepository")]
    Direct,

    /// Upstream attributes with time-bounded caching.
    #[serde(rename = "CachingPrincipalAttributesRepository")]
    Caching(CachingAttributeRepository),
}

impl PrincipalAttributesRepository {
    /// Resolve the attributes of `principal`.
    pub fn attributes(&self, principal: &Principal, sources: &AttributeSources) -> Result<Attributes> {
        match self {
            Self::Direct => Ok(principal.attributes.clone()),
            Self::Caching(repository) => repository.attributes(principal, sources),
        }
    }
}

impl From<CachingAttributeRepository> for PrincipalAttributesRepository {
    fn from(repository: CachingAttributeRepository) -> Self {
        Self::Caching(repository)
    }
}
