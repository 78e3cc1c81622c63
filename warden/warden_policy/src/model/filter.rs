//! Attribute value filters.
//!
//! A filter runs after an attribute release policy has selected and renamed
//! attributes. Values it rejects are dropped, and an attribute left with no
//! values is removed entirely.

use serde::{Deserialize, Serialize};
use warden_core::error::PolicyError;
use warden_core::types::Attributes;

use super::pattern::Pattern;

/// A filter applied to released attribute values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "@type")]
pub enum AttributeFilter {
    /// Keeps values fully matching a regular expression.
    #[serde(rename = "RegexAttributeFilter")]
    Regex(RegexAttributeFilter),
}

impl AttributeFilter {
    /// Create a regular expression filter.
    pub fn regex(pattern: &str) -> Result<Self, PolicyError> {
        Ok(Self::Regex(RegexAttributeFilter::new(pattern)?))
    }

    /// Filter every value of every attribute.
    pub fn filter(&self, attributes: Attributes) -> Attributes {
        attributes
            .into_iter()
            .filter_map(|(name, values)| {
                let kept: Vec<String> = values.into_iter().filter(|v| self.accepts(v)).collect();
                if kept.is_empty() {
                    tracing::trace!(attribute = %name, "attribute removed by filter");
                    None
                } else {
                    Some((name, kept))
                }
            })
            .collect()
    }

    /// Whether a single value survives this filter.
    pub fn accepts(&self, value: &str) -> bool {
        match self {
            Self::Regex(filter) => filter.pattern.matches_fully(value),
        }
    }
}

/// Keeps attribute values that fully match `pattern`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegexAttributeFilter {
    /// The pattern values must match.
    pub pattern: Pattern,
}

impl RegexAttributeFilter {
    /// Create a filter from a pattern source.
    pub fn new(pattern: &str) -> Result<Self, PolicyError> {
        Ok(Self {
            pattern: Pattern::new(pattern)?,
        })
    }
}
