//! Service lookup.
//!
//! Finds the registered service responsible for an incoming service URL.
//! Services are tried in ascending evaluation order; services sharing an
//! evaluation order are ordered by the configured [`TieBreak`].

use std::cmp::Ordering;
use warden_core::utils::config::TieBreak;

use crate::model::RegisteredService;

/// Orders services and finds the one matching a URL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceLookup {
    tie_break: TieBreak,
}

impl ServiceLookup {
    /// Create a lookup with the given tie-break policy.
    pub fn new(tie_break: TieBreak) -> Self {
        Self { tie_break }
    }

    /// The tie-break policy in use.
    pub fn tie_break(&self) -> TieBreak {
        self.tie_break
    }

    /// Order two services for evaluation.
    pub fn compare(&self, a: &RegisteredService, b: &RegisteredService) -> Ordering {
        a.evaluation_order
            .cmp(&b.evaluation_order)
            .then_with(|| match self.tie_break {
                TieBreak::LowestId => a.id.cmp(&b.id),
                TieBreak::HighestId => b.id.cmp(&a.id),
                TieBreak::Name => a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)),
            })
    }

    /// Services in the order they are tried.
    pub fn sorted<'a, I>(&self, services: I) -> Vec<&'a RegisteredService>
    where
        I: IntoIterator<Item = &'a RegisteredService>,
    {
        let mut sorted: Vec<&RegisteredService> = services.into_iter().collect();
        sorted.sort_by(|a, b| self.compare(a, b));
        sorted
    }

    /// The first service, in evaluation order, matching `service_url`.
    pub fn find<'a, I>(&self, services: I, service_url: &str) -> Option<&'a RegisteredService>
    where
        I: IntoIterator<Item = &'a RegisteredService>,
    {
        let found = services
            .into_iter()
            .filter(|s| s.matches(service_url))
            .min_by(|a, b| self.compare(a, b));

        match found {
            Some(service) => {
                tracing::debug!(url = service_url, service = %service.id, "matched service")
            }
            None => tracing::debug!(url = service_url, "no service matched"),
        }
        found
    }
}
