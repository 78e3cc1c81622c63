//! # Warden Policy
//!
//! `warden_policy` provides the policy model attached to each registered
//! service, and the evaluation of those policies against a principal.
//!
//! Key concepts:
//!
//! 1. **Registered Service**: A client application and its policy bundle,
//!    matched against incoming service URLs literally or by pattern.
//!
//! 2. **Authorization Strategy**: Whether a principal may use the service.
//!
//! 3. **Attribute Release Policy**: Which attributes the service receives,
//!    and under which names.
//!
//! 4. **Username Attribute Provider**: Which identifier the service receives.
//!
//! 5. **Proxy Policy**: Which callback URLs may receive proxied authentication.
//!
//! 6. **Principal Attributes Repository**: Where release policies source
//!    attributes from, optionally through a time-bounded cache.
//!
//! All model types compare structurally and persist with an `@type`
//! discriminator on every polymorphic field.

pub mod attributes;
pub mod engine;
pub mod model;

// Re-export key types for convenience
pub use attributes::{
    AttributeSource, AttributeSourceDefinition, AttributeSources, CachingAttributeRepository,
    MergeStrategy, PrincipalAttributesRepository, StaticAttributeSource, TimeUnit,
};
pub use engine::{AccessRequest, Evaluation, EvaluationResult, ServiceEvaluator, ServiceLookup};
pub use model::{
    AttributeFilter, AttributeReleasePolicy, AuthorizationStrategy, DefaultAuthorizationStrategy,
    ProxyPolicy, RegisteredService, ReleaseRule, ServiceKind, UsernameAttributeProvider,
};
