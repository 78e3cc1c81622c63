//! Proxy callback policies.
//!
//! A service without a proxy policy may not obtain proxied authentication.

use serde::{Deserialize, Serialize};
use warden_core::error::PolicyError;

use super::pattern::Pattern;

/// Which callback URLs a service may request proxy authentication toward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "@type")]
pub enum ProxyPolicy {
    /// Callback URLs must contain a match of the pattern.
    #[serde(rename = "RegexMatchingProxyPolicy")]
    RegexMatching(RegexMatchingProxyPolicy),

    /// No callback URL is allowed.
    #[serde(rename = "RefuseProxyPolicy")]
    Refuse,
}

impl ProxyPolicy {
    /// Allow callbacks matching `pattern`.
    pub fn regex(pattern: &str) -> Result<Self, PolicyError> {
        Ok(Self::RegexMatching(RegexMatchingProxyPolicy {
            pattern: Pattern::new(pattern)?,
        }))
    }

    /// Whether a proxy callback to `callback_url` is allowed.
    pub fn allows(&self, callback_url: &str) -> bool {
        match self {
            Self::RegexMatching(policy) => policy.pattern.is_match(callback_url),
            Self::Refuse => false,
        }
    }
}

/// Allows callback URLs matching a regular expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegexMatchingProxyPolicy {
    /// The pattern callback URLs must match.
    pub pattern: Pattern,
}

/// Evaluate an optional proxy policy; absence denies.
pub fn proxy_allowed(policy: Option<&ProxyPolicy>, callback_url: &str) -> bool {
    policy.is_some_and(|p| p.allows(callback_url))
}
