pub mod simulated;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::Config;
use crate::error::SourceResult;
use crate::types::{RootCause, ShiftSummary, Snapshot, TimeWindow};

/// Source of production metrics for the dashboard.
///
/// This is the whole surface the presentation shell may depend on. The
/// bundled implementation synthesizes records; a telemetry-backed source
/// implements the same trait and reports outages as recoverable
/// [`SourceError`](crate::error::SourceError)s.
#[async_trait]
pub trait MetricsProvider: Send + Sync {
    /// Human-readable name for this provider (e.g., "simulated")
    fn name(&self) -> &str;

    /// Known machine ids in display order. Never empty.
    fn machine_list(&self) -> Vec<String>;

    /// Records for `machine_ids` over `window`.
    ///
    /// An empty or unknown selection fails with a selection error instead of
    /// returning an empty snapshot.
    async fn snapshot(&self, machine_ids: &[String], window: TimeWindow) -> SourceResult<Snapshot>;

    /// Scrap counts by root cause. Never empty.
    async fn root_causes(&self) -> SourceResult<Vec<RootCause>>;

    /// One entry per configured shift, rates within 0..=100
    async fn shift_summary(&self) -> SourceResult<Vec<ShiftSummary>>;
}

/// Create the configured metrics provider
pub fn create_provider(config: &Config) -> Result<Box<dyn MetricsProvider>> {
    let provider = simulated::SimulatedProvider::new(config)?;
    tracing::info!(
        provider = provider.name(),
        machines = provider.machine_list().len(),
        seeded = config.generator.seed.is_some(),
        "Initialized metrics provider"
    );
    Ok(Box::new(provider))
}
