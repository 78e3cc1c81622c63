//! Registered services.
//!
//! A registered service is a client application permitted to request
//! authentication, together with the policies that govern it. It comes in
//! two kinds that differ only in how `service_id` is matched against an
//! incoming service URL.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use warden_core::error::{PolicyError, RegistryError, Result};
use warden_core::id::ServiceId;

use super::authz::AuthorizationStrategy;
use super::pattern::{MatchSyntax, MatcherCache, Pattern};
use super::proxy::{proxy_allowed, ProxyPolicy};
use super::release::AttributeReleasePolicy;
use super::username::UsernameAttributeProvider;

/// How a service's `service_id` is matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceKind {
    /// Exact or glob match.
    #[serde(rename = "LiteralRegisteredService")]
    Literal,

    /// Full regular expression match.
    #[serde(rename = "RegexRegisteredService")]
    Regex,
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal => write!(f, "literal"),
            Self::Regex => write!(f, "regex"),
        }
    }
}

/// A client application and its policy bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredService {
    /// The matching kind, persisted as the type discriminator.
    #[serde(rename = "@type")]
    pub kind: ServiceKind,

    /// Unique id; unassigned until first saved.
    #[serde(default)]
    pub id: ServiceId,

    /// Display name, also part of the storage key.
    pub name: String,

    /// Pattern incoming service URLs are matched against.
    pub service_id: String,

    /// Display theme.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,

    /// Display description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Lower values are tried first when several services match.
    #[serde(default)]
    pub evaluation_order: i32,

    /// Authentication handlers that must have been used.
    #[serde(default)]
    pub required_handlers: BTreeSet<String>,

    /// Whether and for whom the service is usable.
    #[serde(default)]
    pub authorization_strategy: AuthorizationStrategy,

    /// Which attributes the service receives.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute_release_policy: Option<AttributeReleasePolicy>,

    /// Which username the service receives.
    #[serde(default)]
    pub username_attribute_provider: UsernameAttributeProvider,

    /// Which proxy callbacks the service may use; absent denies all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_policy: Option<ProxyPolicy>,

    #[serde(skip)]
    matcher: MatcherCache,
}

impl RegisteredService {
    /// Create a service of the given kind with default policies.
    pub fn new(kind: ServiceKind, name: impl Into<String>, service_id: impl Into<String>) -> Self {
        Self {
            kind,
            id: ServiceId::UNASSIGNED,
            name: name.into(),
            service_id: service_id.into(),
            theme: None,
            description: None,
            evaluation_order: 0,
            required_handlers: BTreeSet::new(),
            authorization_strategy: AuthorizationStrategy::default(),
            attribute_release_policy: None,
            username_attribute_provider: UsernameAttributeProvider::default(),
            proxy_policy: None,
            matcher: MatcherCache::default(),
        }
    }

    /// Create a literal (exact or glob) matched service.
    pub fn literal(name: impl Into<String>, service_id: impl Into<String>) -> Self {
        Self::new(ServiceKind::Literal, name, service_id)
    }

    /// Create a regular expression matched service.
    pub fn regex(name: impl Into<String>, service_id: impl Into<String>) -> Self {
        Self::new(ServiceKind::Regex, name, service_id)
    }

    /// Set the id.
    pub fn with_id(mut self, id: impl Into<ServiceId>) -> Self {
        self.id = id.into();
        self
    }

    /// Set the theme.
    pub fn with_theme(mut self, theme: impl Into<String>) -> Self {
        self.theme = Some(theme.into());
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the evaluation order.
    pub fn with_evaluation_order(mut self, order: i32) -> Self {
        self.evaluation_order = order;
        self
    }

    /// Set the required authentication handlers.
    pub fn with_required_handlers<I, S>(mut self, handlers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_handlers = handlers.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the authorization strategy.
    pub fn with_authorization_strategy(mut self, strategy: impl Into<AuthorizationStrategy>) -> Self {
        self.authorization_strategy = strategy.into();
        self
    }

    /// Replace the attribute release policy.
    pub fn with_attribute_release_policy(mut self, policy: AttributeReleasePolicy) -> Self {
        self.attribute_release_policy = Some(policy);
        self
    }

    /// Replace the username attribute provider.
    pub fn with_username_attribute_provider(mut self, provider: UsernameAttributeProvider) -> Self {
        self.username_attribute_provider = provider;
        self
    }

    /// Replace the proxy policy.
    pub fn with_proxy_policy(mut self, policy: ProxyPolicy) -> Self {
        self.proxy_policy = Some(policy);
        self
    }

    /// Check the invariants that hold independently of any store.
    ///
    /// The name must be non-empty, and a regex service's `service_id` must
    /// compile.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(RegistryError::InvalidName {
                name: self.name.clone(),
                reason: "name must not be empty".to_string(),
            }
            .into());
        }

        if self.kind == ServiceKind::Regex {
            Pattern::new(self.service_id.as_str())?;
        }

        Ok(())
    }

    /// Whether `service_url` is handled by this service.
    ///
    /// The compiled matcher is kept until `kind` or `service_id` changes.
    pub fn matches(&self, service_url: &str) -> bool {
        let syntax = match self.kind {
            ServiceKind::Literal => MatchSyntax::Glob,
            ServiceKind::Regex => MatchSyntax::Regex,
        };
        let matcher = self.matcher.get(syntax, &self.service_id, |compiled| {
            if let Some(PolicyError::InvalidPattern { reason, .. }) = compiled.error() {
                tracing::warn!(
                    service = %self.name,
                    id = %self.id,
                    %reason,
                    "service id is not a valid pattern"
                );
            }
        });
        matcher.is_match(service_url)
    }

    /// Whether this service may request proxy authentication toward `callback_url`.
    pub fn allows_proxy_to(&self, callback_url: &str) -> bool {
        proxy_allowed(self.proxy_policy.as_ref(), callback_url)
    }
}

impl fmt::Display for RegisteredService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} service {} ({}) for {}",
            self.kind, self.id, self.name, self.service_id
        )
    }
}
