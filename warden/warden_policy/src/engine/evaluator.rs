//! Service access evaluation.
//!
//! Combines a service's authorization strategy, required handlers,
//! username provider and attribute release policy into one decision for
//! one principal.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;
use warden_core::error::Result;
use warden_core::id::ServiceId;
use warden_core::types::{Attributes, Principal};
use warden_core::utils::config::RegistryConfig;

use crate::attributes::AttributeSources;
use crate::model::{PersistentIdGenerator, RegisteredService};

/// A principal asking to use a service.
#[derive(Debug, Clone)]
pub struct AccessRequest {
    /// The authenticated principal.
    pub principal: Principal,

    /// The service URL presented by the client.
    pub service_url: String,

    /// Authentication handlers that succeeded for this principal.
    pub authentication_handlers: BTreeSet<String>,
}

impl AccessRequest {
    /// Create a request with no recorded authentication handlers.
    pub fn new(principal: Principal, service_url: impl Into<String>) -> Self {
        Self {
            principal,
            service_url: service_url.into(),
            authentication_handlers: BTreeSet::new(),
        }
    }

    /// Record the handlers that authenticated the principal.
    pub fn with_authentication_handlers<I, S>(mut self, handlers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.authentication_handlers = handlers.into_iter().map(Into::into).collect();
        self
    }
}

/// Why access was denied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DenyReason {
    /// The service does not accept requests.
    ServiceDisabled,

    /// These required handlers were not used.
    MissingHandlers(BTreeSet<String>),

    /// The principal's attributes do not satisfy the strategy.
    Unauthorized,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ServiceDisabled => write!(f, "service disabled"),
            Self::MissingHandlers(handlers) => {
                let names: Vec<&str> = handlers.iter().map(String::as_str).collect();
                write!(f, "missing handlers [{}]", names.join(", "))
            }
            Self::Unauthorized => write!(f, "unauthorized"),
        }
    }
}

/// The outcome of an evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvaluationResult {
    /// The principal may use the service.
    Allow {
        /// The username released to the service.
        username: String,

        /// The attributes released to the service.
        attributes: Attributes,
    },

    /// The principal may not use the service.
    Deny(DenyReason),
}

impl EvaluationResult {
    /// Whether access was granted.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow { .. })
    }
}

/// A service access evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    /// The evaluated service.
    pub service_id: ServiceId,

    /// The evaluated principal.
    pub principal_id: String,

    /// The result.
    pub result: EvaluationResult,
}

/// Evaluates access requests against registered services.
#[derive(Debug, Clone, Default)]
pub struct ServiceEvaluator {
    sources: AttributeSources,
    pseudonyms: Option<PersistentIdGenerator>,
}

impl ServiceEvaluator {
    /// Create an evaluator resolving named attribute sources from `sources`.
    pub fn new(sources: AttributeSources) -> Self {
        Self {
            sources,
            pseudonyms: None,
        }
    }

    /// Create an evaluator keyed with the pseudonym salt of `config`, if any.
    pub fn from_config(config: &RegistryConfig, sources: AttributeSources) -> Result<Self> {
        let evaluator = Self::new(sources);
        match &config.pseudonym_salt {
            Some(salt) => evaluator.with_pseudonym_salt(salt.as_str()),
            None => Ok(evaluator),
        }
    }

    /// Key anonymous usernames with `salt`.
    pub fn with_pseudonym_salt(mut self, salt: impl Into<String>) -> Result<Self> {
        self.pseudonyms = Some(PersistentIdGenerator::new(salt)?);
        Ok(self)
    }

    /// The attribute sources in use.
    pub fn sources(&self) -> &AttributeSources {
        &self.sources
    }

    /// Evaluate `request` against `service`.
    ///
    /// Denials are results, not errors; errors mean a policy could not be
    /// evaluated at all (for example an upstream attribute failure).
    pub fn evaluate(&self, service: &RegisteredService, request: &AccessRequest) -> Result<Evaluation> {
        let principal = &request.principal;
        let result = self.decide(service, request)?;

        debug!(
            service = %service.id,
            principal = %principal.id,
            allowed = result.is_allowed(),
            "evaluated service access"
        );

        Ok(Evaluation {
            service_id: service.id,
            principal_id: principal.id.clone(),
            result,
        })
    }

    fn decide(&self, service: &RegisteredService, request: &AccessRequest) -> Result<EvaluationResult> {
        let strategy = &service.authorization_strategy;
        if !strategy.is_service_access_allowed() {
            return Ok(EvaluationResult::Deny(DenyReason::ServiceDisabled));
        }

        let missing: BTreeSet<String> = service
            .required_handlers
            .difference(&request.authentication_handlers)
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Ok(EvaluationResult::Deny(DenyReason::MissingHandlers(missing)));
        }

        if !strategy.is_authorized(&request.principal.attributes) {
            return Ok(EvaluationResult::Deny(DenyReason::Unauthorized));
        }

        let username = service
            .username_attribute_provider
            .resolve_username(
                &request.principal,
                &request.service_url,
                self.pseudonyms.as_ref(),
            )?;

        let attributes = match &service.attribute_release_policy {
            Some(policy) => policy.release(&request.principal, &self.sources)?,
            None => Attributes::new(),
        };

        Ok(EvaluationResult::Allow {
            username,
            attributes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        AttributeReleasePolicy, AuthorizationStrategy, DefaultAuthorizationStrategy,
        UsernameAttributeProvider,
    };

    fn service() -> RegisteredService {
        RegisteredService::regex("app", "^https://app\\..+")
            .with_id(1)
            .with_authorization_strategy(
                DefaultAuthorizationStrategy::new(true, true)
                    .with_required_attribute("memberOf", ["staff"]),
            )
            .with_username_attribute_provider(UsernameAttributeProvider::principal_attribute("uid"))
            .with_attribute_release_policy(AttributeReleasePolicy::return_allowed(["mail"]))
    }

    fn staff() -> Principal {
        Principal::new("casuser")
            .with_attribute("memberOf", "staff")
            .with_attribute("uid", "cuser")
            .with_attribute("mail", "c@example.org")
    }

    #[test]
    fn test_allow() {
        let evaluation = ServiceEvaluator::default()
            .evaluate(&service(), &AccessRequest::new(staff(), "https://app.example.org"))
            .unwrap();

        match evaluation.result {
            EvaluationResult::Allow {
                username,
                attributes,
            } => {
                assert_eq!(username, "cuser");
                assert_eq!(attributes.keys().collect::<Vec<_>>(), vec!["mail"]);
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_denials() {
        let evaluator = ServiceEvaluator::default();

        let outsider = Principal::new("outsider").with_attribute("memberOf", "guests");
        let result = evaluator
            .evaluate(&service(), &AccessRequest::new(outsider, "https://app.x"))
            .unwrap()
            .result;
        assert_eq!(result, EvaluationResult::Deny(DenyReason::Unauthorized));

        let disabled = service().with_authorization_strategy(AuthorizationStrategy::new(false, true));
        let result = evaluator
            .evaluate(&disabled, &AccessRequest::new(staff(), "https://app.x"))
            .unwrap()
            .result;
        assert_eq!(result, EvaluationResult::Deny(DenyReason::ServiceDisabled));

        let strict = service().with_required_handlers(["ldap", "mfa"]);
        let request = AccessRequest::new(staff(), "https://app.x").with_authentication_handlers(["ldap"]);
        let result = evaluator.evaluate(&strict, &request).unwrap().result;
        assert_eq!(
            result,
            EvaluationResult::Deny(DenyReason::MissingHandlers(["mfa".to_string()].into()))
        );
    }

    #[test]
    fn test_pseudonym_keyed_by_configured_salt() {
        let anonymous = service().with_username_attribute_provider(UsernameAttributeProvider::anonymous());
        let request = AccessRequest::new(staff(), "https://app.x");
        let username = |evaluator: &ServiceEvaluator| match evaluator
            .evaluate(&anonymous, &request)
            .unwrap()
            .result
        {
            EvaluationResult::Allow { username, .. } => username,
            other => panic!("unexpected result {:?}", other),
        };

        let config = RegistryConfig {
            pseudonym_salt: Some("process-salt".to_string()),
            ..RegistryConfig::default()
        };
        let configured = ServiceEvaluator::from_config(&config, AttributeSources::new()).unwrap();
        let same = ServiceEvaluator::default().with_pseudonym_salt("process-salt").unwrap();
        let other = ServiceEvaluator::default().with_pseudonym_salt("other-salt").unwrap();

        assert_eq!(username(&configured), username(&same));
        assert_ne!(username(&configured), username(&other));
        assert_ne!(username(&configured), "casuser");

        let unsalted = ServiceEvaluator::default().evaluate(&anonymous, &request);
        assert!(matches!(
            unsalted,
            Err(warden_core::Error::Policy(warden_core::error::PolicyError::MissingSalt))
        ));
    }

    #[test]
    fn test_no_release_policy_releases_nothing() {
        let mut bare = service();
        bare.attribute_release_policy = None;

        let result = ServiceEvaluator::default()
            .evaluate(&bare, &AccessRequest::new(staff(), "https://app.x"))
            .unwrap()
            .result;
        assert!(matches!(
            result,
            EvaluationResult::Allow { ref attributes, .. } if attributes.is_empty()
        ));
    }
}
