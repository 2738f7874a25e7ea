//! Location resolver: fans out to every registered provider and ranks the results.
//!
//! Providers run concurrently, each under its own budget. Results are read back
//! in registry order, so the first successful provider always wins the primary
//! slot regardless of which one answered first.

use super::registry::ProviderRegistry;
use super::types::{LocationCandidate, LocationReport, LocationResolution, ProviderError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// What one provider produced during a resolution pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderOutcome {
    pub provider: String,
    pub elapsed: Duration,
    pub result: Result<LocationCandidate, ProviderError>,
}

/// Runs resolution passes over a fixed registry.
pub struct LocationResolver {
    registry: ProviderRegistry,
}

impl LocationResolver {
    pub fn new(registry: ProviderRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// One outcome per registered provider, in registry order.
    pub async fn resolve_outcomes(&self) -> Vec<ProviderOutcome> {
        let pass_started = Instant::now();

        let pending: Vec<_> = self
            .registry
            .specs()
            .iter()
            .map(|spec| {
                let adapter = Arc::clone(&spec.adapter);
                let budget = spec.timeout;
                let deadline = tokio::time::Instant::now() + budget;
                debug!(provider = %spec.identifier(), timeout_ms = budget.as_millis() as u64, "invoking provider");
                let handle = tokio::task::spawn_blocking(move || {
                    let started = Instant::now();
                    let result = adapter.locate(budget);
                    (result, started.elapsed())
                });
                (spec, deadline, handle)
            })
            .collect();

        let mut outcomes = Vec::with_capacity(pending.len());
        for (spec, deadline, handle) in pending {
            let (result, elapsed) = match tokio::time::timeout_at(deadline, handle).await {
                Ok(Ok(done)) => done,
                Ok(Err(_)) => (Err(ProviderError::Panicked), pass_started.elapsed()),
                // The detached call still ends on its own within the same budget.
                Err(_) => (Err(ProviderError::Timeout(spec.timeout)), spec.timeout),
            };

            match &result {
                Ok(c) => debug!(provider = %spec.identifier(), elapsed_ms = elapsed.as_millis() as u64, has_coords = c.coords().is_some(), "provider succeeded"),
                Err(e) => debug!(provider = %spec.identifier(), elapsed_ms = elapsed.as_millis() as u64, error = %e, "provider unavailable"),
            }

            outcomes.push(ProviderOutcome {
                provider: spec.identifier().to_string(),
                elapsed,
                result,
            });
        }
        outcomes
    }

    /// All successful candidates, in registry order.
    pub async fn resolve(&self) -> Vec<LocationCandidate> {
        self.resolve_outcomes()
            .await
            .into_iter()
            .filter_map(|o| o.result.ok())
            .collect()
    }

    /// A full resolution pass ending in a report or the no-location sentinel.
    pub async fn resolve_report(&self) -> LocationResolution {
        let successes = self.resolve().await;
        let resolution = aggregate(successes);
        info!(providers = self.registry.len(), result = %resolution, "location resolution finished");
        resolution
    }
}

/// First success is primary, the rest are alternatives. No re-ranking.
pub fn aggregate(successes: Vec<LocationCandidate>) -> LocationResolution {
    let mut iter = successes.into_iter();
    match iter.next() {
        Some(primary) => LocationResolution::Located(LocationReport::new(primary, iter.collect())),
        None => LocationResolution::NoLocationAvailable,
    }
}
