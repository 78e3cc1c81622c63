//! Policy models.
//!
//! This module defines the registered service entity and the polymorphic
//! policies it owns. Every polymorphic type carries an `@type`
//! discriminator when persisted.

pub mod authz;
pub mod filter;
pub mod pattern;
pub mod proxy;
pub mod release;
pub mod service;
pub mod username;

pub use authz::{AuthorizationStrategy, DefaultAuthorizationStrategy};
pub use filter::{AttributeFilter, RegexAttributeFilter};
pub use pattern::Pattern;
pub use proxy::{ProxyPolicy, RegexMatchingProxyPolicy};
pub use release::{AttributeReleasePolicy, ReleaseRule};
pub use service::{RegisteredService, ServiceKind};
pub use username::{
    MissingAttributeBehavior, PersistentIdGenerator, PrincipalAttributeUsername,
    UsernameAttributeProvider,
};
