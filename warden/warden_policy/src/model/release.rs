//! Attribute release policies.
//!
//! A release policy decides which principal attributes a service receives
//! and under which names. Evaluation runs in three steps:
//!
//! 1. resolve the attribute source (a configured repository, or the
//!    attributes supplied with the principal),
//! 2. apply the release rule (all, allowed names, or renamed names),
//! 3. apply the optional value filter.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;
use warden_core::error::Result;
use warden_core::types::{Attributes, Principal};

use super::filter::AttributeFilter;
use crate::attributes::{AttributeSources, PrincipalAttributesRepository};

/// Governs which attributes are disclosed to a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeReleasePolicy {
    /// The selection and renaming rule, carrying the type discriminator.
    #[serde(flatten)]
    pub rule: ReleaseRule,

    /// Filter applied to every released value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute_filter: Option<AttributeFilter>,

    /// Source of principal attributes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal_attributes_repository: Option<PrincipalAttributesRepository>,
}

/// Selection and renaming rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "@type")]
pub enum ReleaseRule {
    /// Release every attribute.
    #[serde(rename = "ReturnAllAttributeReleasePolicy")]
    ReturnAll,

    /// Release attributes whose name is allowed.
    #[serde(rename = "ReturnAllowedAttributeReleasePolicy")]
    ReturnAllowed {
        /// The allowed attribute names.
        #[serde(rename = "allowedAttributes", default)]
        allowed_attributes: BTreeSet<String>,
    },

    /// Release mapped attributes under their new names.
    #[serde(rename = "ReturnMappedAttributeReleasePolicy")]
    ReturnMapped {
        /// Source attribute name to released name.
        #[serde(rename = "allowedAttributes", default)]
        allowed_attributes: BTreeMap<String, String>,
    },
}

impl AttributeReleasePolicy {
    /// Create a policy around `rule` with no filter or repository.
    pub fn new(rule: ReleaseRule) -> Self {
        Self {
            rule,
            attribute_filter: None,
            principal_attributes_repository: None,
        }
    }

    /// Release every attribute.
    pub fn return_all() -> Self {
        Self::new(ReleaseRule::ReturnAll)
    }

    /// Release the named attributes.
    pub fn return_allowed<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(ReleaseRule::ReturnAllowed {
            allowed_attributes: names.into_iter().map(Into::into).collect(),
        })
    }

    /// Release mapped attributes under new names.
    ///
    /// Later pairs win when a source name repeats.
    pub fn return_mapped<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::new(ReleaseRule::ReturnMapped {
            allowed_attributes: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        })
    }

    /// Attach a value filter.
    pub fn with_attribute_filter(mut self, filter: AttributeFilter) -> Self {
        self.attribute_filter = Some(filter);
        self
    }

    /// Attach an attribute repository.
    pub fn with_principal_attributes_repository(
        mut self,
        repository: impl Into<PrincipalAttributesRepository>,
    ) -> Self {
        self.principal_attributes_repository = Some(repository.into());
        self
    }

    /// Compute the attributes released for `principal`.
    pub fn release(&self, principal: &Principal, sources: &AttributeSources) -> Result<Attributes> {
        let available = match &self.principal_attributes_repository {
            Some(repository) => repository.attributes(principal, sources)?,
            None => principal.attributes.clone(),
        };

        let selected = self.rule.apply(available);
        let released = match &self.attribute_filter {
            Some(filter) => filter.filter(selected),
            None => selected,
        };

        debug!(
            principal = %principal.id,
            released = released.len(),
            "computed released attributes"
        );
        Ok(released)
    }
}

impl ReleaseRule {
    /// Select and rename attributes.
    pub fn apply(&self, attributes: Attributes) -> Attributes {
        match self {
            Self::ReturnAll => attributes,
            Self::ReturnAllowed { allowed_attributes } => attributes
                .into_iter()
                .filter(|(name, _)| allowed_attributes.contains(name))
                .collect(),
            Self::ReturnMapped { allowed_attributes } => {
                let mut released = Attributes::new();
                for (name, values) in attributes {
                    if let Some(mapped) = allowed_attributes.get(&name) {
                        released.entry(mapped.clone()).or_default().extend(values);
                    }
                }
                released
            }
        }
    }
}
