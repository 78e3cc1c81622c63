//! Attribute merge strategies.

use serde::{Deserialize, Serialize};
use warden_core::types::Attributes;

/// How freshly fetched attributes combine with attributes already known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "@type")]
pub enum MergeStrategy {
    /// Fresh values replace existing values of the same attribute.
    #[default]
    #[serde(rename = "ReplacingMergeStrategy")]
    Replace,

    /// Values of the same attribute are unioned, existing values first.
    #[serde(rename = "AdditiveMergeStrategy")]
    Additive,
}

impl MergeStrategy {
    /// Merge `fresh` onto `existing`.
    pub fn merge(&self, existing: &Attributes, fresh: Attributes) -> Attributes {
        let mut merged = existing.clone();

        match self {
            Self::Replace => merged.extend(fresh),
            Self::Additive => {
                for (name, values) in fresh {
                    let slot = merged.entry(name).or_default();
                    for value in values {
                        if !slot.contains(&value) {
                            slot.push(value);
                        }
                    }
                }
            }
        }

        merged
    }
}
