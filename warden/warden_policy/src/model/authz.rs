//! Service authorization strategies.
//!
//! An authorization strategy decides whether a principal may use a service
//! at all, based on the service's enabled flag and on attribute values the
//! principal must carry.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use warden_core::types::Attributes;

/// How a service authorizes principals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "@type")]
pub enum AuthorizationStrategy {
    /// Flag and required-attribute based authorization.
    #[serde(rename = "DefaultAuthorizationStrategy")]
    Default(DefaultAuthorizationStrategy),
}

impl AuthorizationStrategy {
    /// Create the default strategy with the given flags and no required attributes.
    pub fn new(enabled: bool, sso_enabled: bool) -> Self {
        Self::Default(DefaultAuthorizationStrategy::new(enabled, sso_enabled))
    }

    /// Whether the service accepts requests at all.
    pub fn is_service_access_allowed(&self) -> bool {
        match self {
            Self::Default(s) => s.enabled,
        }
    }

    /// Whether the service participates in single sign-on.
    pub fn is_sso_participant(&self) -> bool {
        match self {
            Self::Default(s) => s.enabled && s.sso_enabled,
        }
    }

    /// Decide whether a principal with `attributes` may use the service.
    pub fn is_authorized(&self, attributes: &Attributes) -> bool {
        match self {
            Self::Default(s) => s.is_authorized(attributes),
        }
    }
}

impl Default for AuthorizationStrategy {
    fn default() -> Self {
        Self::Default(DefaultAuthorizationStrategy::default())
    }
}

impl From<DefaultAuthorizationStrategy> for AuthorizationStrategy {
    fn from(strategy: DefaultAuthorizationStrategy) -> Self {
        Self::Default(strategy)
    }
}

/// Flag and required-attribute based authorization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultAuthorizationStrategy {
    /// Whether the service accepts requests at all.
    pub enabled: bool,

    /// Whether the service participates in single sign-on.
    pub sso_enabled: bool,

    /// `true` requires every required attribute to be satisfied, `false` any one.
    #[serde(default = "default_require_all")]
    pub require_all_attributes: bool,

    /// Attribute name to the set of acceptable values.
    #[serde(default)]
    pub required_attributes: BTreeMap<String, BTreeSet<String>>,
}

fn default_require_all() -> bool {
    true
}

impl DefaultAuthorizationStrategy {
    /// Create a strategy with the given flags and no required attributes.
    pub fn new(enabled: bool, sso_enabled: bool) -> Self {
        Self {
            enabled,
            sso_enabled,
            require_all_attributes: default_require_all(),
            required_attributes: BTreeMap::new(),
        }
    }

    /// Set whether all required attributes must be satisfied.
    pub fn with_require_all_attributes(mut self, require_all: bool) -> Self {
        self.require_all_attributes = require_all;
        self
    }

    /// Require `name` to carry at least one of `values`.
    pub fn with_required_attribute<I, V>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.required_attributes
            .insert(name.into(), values.into_iter().map(Into::into).collect());
        self
    }

    /// Evaluate the strategy against a principal's attributes.
    pub fn is_authorized(&self, attributes: &Attributes) -> bool {
        if !self.enabled {
            tracing::debug!("service access disabled");
            return false;
        }

        if self.required_attributes.is_empty() {
            return true;
        }

        let mut satisfied = self
            .required_attributes
            .iter()
            .map(|(name, accepted)| {
                attributes
                    .get(name)
                    .is_some_and(|values| values.iter().any(|v| accepted.contains(v)))
            });

        let authorized = if self.require_all_attributes {
            satisfied.all(|ok| ok)
        } else {
            satisfied.any(|ok| ok)
        };

        tracing::debug!(
            authorized,
            require_all = self.require_all_attributes,
            "evaluated required attributes"
        );
        authorized
    }
}

impl Default for DefaultAuthorizationStrategy {
    fn default() -> Self {
        Self::new(true, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::types::attributes;

    fn strategy(require_all: bool) -> DefaultAuthorizationStrategy {
        DefaultAuthorizationStrategy::new(true, false)
            .with_require_all_attributes(require_all)
            .with_required_attribute("cn", ["v1"])
            .with_required_attribute("memberOf", ["v4"])
    }

    #[test]
    fn test_disabled_denies() {
        let s = DefaultAuthorizationStrategy::new(false, true);
        assert!(!s.is_authorized(&Attributes::new()));
    }

    #[test]
    fn test_no_requirements_allows() {
        let s = DefaultAuthorizationStrategy::new(true, true);
        assert!(s.is_authorized(&Attributes::new()));
    }

    #[test]
    fn test_require_all() {
        let s = strategy(true);
        let both = attributes([("cn", vec!["v1", "v2"]), ("memberOf", vec!["v4"])]);
        let one = attributes([("cn", vec!["v1"]), ("memberOf", vec!["v5"])]);

        assert!(s.is_authorized(&both));
        assert!(!s.is_authorized(&one));
    }

    #[test]
    fn test_require_any() {
        let s = strategy(false);
        let one = attributes([("cn", vec!["v1"]), ("memberOf", vec!["v5"])]);
        let none = attributes([("cn", vec!["v9"])]);

        assert!(s.is_authorized(&one));
        assert!(!s.is_authorized(&none));
    }

    #[test]
    fn test_flags() {
        let s = AuthorizationStrategy::new(true, false);
        assert!(s.is_service_access_allowed());
        assert!(!s.is_sso_participant());
        assert!(!AuthorizationStrategy::new(false, true).is_sso_participant());
    }
}
