//! Username attribute providers.
//!
//! A provider decides which identifier a service receives for the
//! authenticated principal: the real id, the value of one attribute, or a
//! per-service pseudonym.
//!
//! Pseudonyms are keyed with a process-wide salt. The salt is never part of
//! a persisted policy; it is handed to the resolution by whoever owns the
//! configuration.

use base64::prelude::*;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::warn;
use warden_core::error::{PolicyError, Result};
use warden_core::types::Principal;

type HmacSha256 = Hmac<Sha256>;

/// Derives the username released to a service.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "@type")]
pub enum UsernameAttributeProvider {
    /// The principal's primary identifier, unchanged.
    #[default]
    #[serde(rename = "DefaultUsernameAttributeProvider")]
    Default,

    /// The value of a named principal attribute.
    #[serde(rename = "PrincipalAttributeUsernameAttributeProvider")]
    PrincipalAttribute(PrincipalAttributeUsername),

    /// A salted, keyed-hash pseudonym stable per (principal, service).
    #[serde(rename = "AnonymousUsernameAttributeProvider")]
    AnonymousPersistent,
}

impl UsernameAttributeProvider {
    /// Use the value of `attribute`, falling back to the principal id.
    pub fn principal_attribute(attribute: impl Into<String>) -> Self {
        Self::PrincipalAttribute(PrincipalAttributeUsername::new(attribute))
    }

    /// Use a pseudonym.
    pub fn anonymous() -> Self {
        Self::AnonymousPersistent
    }

    /// Resolve the username `principal` is known by at `service`.
    ///
    /// `service` is the URL the client presented, not the pattern of the
    /// registered service, so under a glob or regex service the pseudonym
    /// differs per matched URL. Pseudonyms need `generator`; without one an
    /// anonymous provider fails with [`PolicyError::MissingSalt`].
    pub fn resolve_username(
        &self,
        principal: &Principal,
        service: &str,
        generator: Option<&PersistentIdGenerator>,
    ) -> Result<String> {
        match self {
            Self::Default => Ok(principal.id.clone()),
            Self::PrincipalAttribute(provider) => provider.resolve(principal),
            Self::AnonymousPersistent => generator
                .ok_or(PolicyError::MissingSalt)?
                .generate(&principal.id, service),
        }
    }
}

/// What to do when the username attribute is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MissingAttributeBehavior {
    /// Release the principal id instead.
    #[default]
    UsePrincipalId,

    /// Fail the resolution.
    Fail,
}

/// Releases the first value of a named attribute as the username.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrincipalAttributeUsername {
    /// The attribute holding the username.
    pub username_attribute: String,

    /// Behavior when the attribute is absent or empty.
    #[serde(default)]
    pub on_missing: MissingAttributeBehavior,
}

impl PrincipalAttributeUsername {
    /// Create a provider that falls back to the principal id.
    pub fn new(attribute: impl Into<String>) -> Self {
        Self {
            username_attribute: attribute.into(),
            on_missing: MissingAttributeBehavior::default(),
        }
    }

    /// Change the fallback behavior.
    pub fn with_on_missing(mut self, on_missing: MissingAttributeBehavior) -> Self {
        self.on_missing = on_missing;
        self
    }

    fn resolve(&self, principal: &Principal) -> Result<String> {
        if let Some(value) = principal.attribute(&self.username_attribute).first() {
            return Ok(value.clone());
        }

        match self.on_missing {
            MissingAttributeBehavior::UsePrincipalId => {
                warn!(
                    principal = %principal.id,
                    attribute = %self.username_attribute,
                    "username attribute missing, releasing principal id"
                );
                Ok(principal.id.clone())
            }
            MissingAttributeBehavior::Fail => Err(PolicyError::MissingUsernameAttribute {
                principal: principal.id.clone(),
                attribute: self.username_attribute.clone(),
            }
            .into()),
        }
    }
}

/// Generates persistent pseudonymous identifiers.
///
/// The identifier is `base64(HMAC-SHA256(salt, service "!" principal))`:
/// deterministic for a (principal, service) pair and unlinkable across
/// services without the salt.
#[derive(Clone)]
pub struct PersistentIdGenerator {
    salt: String,
}

impl PersistentIdGenerator {
    /// Create a generator. The salt must not be empty.
    pub fn new(salt: impl Into<String>) -> Result<Self> {
        let salt = salt.into();
        if salt.is_empty() {
            return Err(PolicyError::InvalidSalt("salt must not be empty".to_string()).into());
        }
        Ok(Self { salt })
    }

    /// Derive the pseudonym of `principal_id` at `service`.
    pub fn generate(&self, principal_id: &str, service: &str) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(self.salt.as_bytes())
            .map_err(|e| PolicyError::InvalidSalt(e.to_string()))?;
        mac.update(service.as_bytes());
        mac.update(b"!");
        mac.update(principal_id.as_bytes());

        Ok(BASE64_STANDARD.encode(mac.finalize().into_bytes()))
    }
}

impl std::fmt::Debug for PersistentIdGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentIdGenerator")
            .field("salt", &"<redacted>")
            .finish()
    }
}
