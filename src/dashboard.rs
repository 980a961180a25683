//! One refresh cycle: fetch, evaluate, aggregate, dispatch.
//!
//! The shell owns a [`Dashboard`] and calls [`Dashboard::refresh`] from its
//! own timer. Every panel of a cycle reads the same snapshot instance.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::aggregation::{self, KpiSummary, MachineAggregate, ShiftStatus};
use crate::alerter::AlertManager;
use crate::config::{BaselineConfig, Config, ShiftBandConfig, ShiftConfig};
use crate::error::{SelectionError, SourceError};
use crate::evaluator::AlertEvaluator;
use crate::provider::{self, MetricsProvider};
use crate::storage::SnapshotStore;
use crate::types::{Alert, RootCause, ShiftSummary, Snapshot, TimeWindow};

/// What the user asked to see
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub machines: Vec<String>,
    pub window: TimeWindow,
}

impl Selection {
    pub fn new(machines: Vec<String>, window: TimeWindow) -> Self {
        Self { machines, window }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ShiftPanel {
    pub shift: String,
    pub scrap_rate: f64,
    pub status: ShiftStatus,
}

/// Everything the shell renders for one cycle
#[derive(Debug, Clone, Serialize)]
pub struct RefreshReport {
    pub refreshed_at: DateTime<Utc>,
    pub selection: Selection,
    /// The snapshot is a fallback from an earlier cycle
    pub stale: bool,
    /// Why fresh data is missing, when it is
    pub source_error: Option<String>,
    pub snapshot: Option<Arc<Snapshot>>,
    pub alerts: Vec<Alert>,
    pub kpis: Option<KpiSummary>,
    pub machines: Vec<MachineAggregate>,
    pub root_causes: Vec<RootCause>,
    pub shifts: Vec<ShiftPanel>,
    /// Shift rates recomputed from the snapshot's own records
    pub observed_shifts: Vec<ShiftSummary>,
}

impl RefreshReport {
    /// No data at all, fresh or stale
    pub fn is_unavailable(&self) -> bool {
        self.snapshot.is_none()
    }
}

pub struct Dashboard {
    provider: Box<dyn MetricsProvider>,
    evaluator: AlertEvaluator,
    alerter: AlertManager,
    store: SnapshotStore,
    baselines: BaselineConfig,
    shifts: Vec<ShiftConfig>,
    bands: ShiftBandConfig,
    snapshot_timeout: Duration,
}

impl Dashboard {
    /// Build every collaborator from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let provider = provider::create_provider(config)?;
        let evaluator = AlertEvaluator::new(config);
        let alerter = AlertManager::new(&config.alerting, &config.dashboard.site)?;
        Ok(Self::new(provider, evaluator, alerter, config))
    }

    pub fn new(
        provider: Box<dyn MetricsProvider>,
        evaluator: AlertEvaluator,
        alerter: AlertManager,
        config: &Config,
    ) -> Self {
        Self {
            provider,
            evaluator,
            alerter,
            store: SnapshotStore::new(config.dashboard.last_known_capacity),
            baselines: config.baselines.clone(),
            shifts: config.shifts.clone(),
            bands: config.shift_bands.clone(),
            snapshot_timeout: Duration::from_secs(config.dashboard.snapshot_timeout_secs),
        }
    }

    pub fn with_snapshot_timeout(mut self, timeout: Duration) -> Self {
        self.snapshot_timeout = timeout;
        self
    }

    pub fn machine_list(&self) -> Vec<String> {
        self.provider.machine_list()
    }

    /// Selection of the first `count` machines over `window`
    pub fn default_selection(&self, count: usize, window: TimeWindow) -> Selection {
        let machines = self.provider.machine_list().into_iter().take(count.max(1)).collect();
        Selection::new(machines, window)
    }

    /// Run one cycle.
    ///
    /// Selection errors are returned to the caller. Source failures and
    /// timeouts fall back to the last good snapshot for the same selection,
    /// or to a report without data.
    pub async fn refresh(&self, selection: &Selection) -> Result<RefreshReport, SelectionError> {
        let (snapshot, stale, source_error) = match self.fetch(selection).await {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                self.store.remember(snapshot.clone());
                (Some(snapshot), false, None)
            }
            Err(SourceError::Selection(e)) => return Err(e),
            Err(e) => {
                let fallback = self.store.last_known(&selection.machines, selection.window);
                tracing::warn!(
                    error = %e,
                    window = %selection.window,
                    fallback = fallback.is_some(),
                    "Snapshot fetch failed"
                );
                (fallback.clone(), fallback.is_some(), Some(e.to_string()))
            }
        };

        let (alerts, kpis, machines, observed_shifts) = match snapshot.as_deref() {
            Some(snap) => (
                self.evaluator.evaluate(snap),
                Some(aggregation::summarize(snap, &self.baselines)),
                aggregation::group_by_machine(snap),
                aggregation::shift_breakdown(snap, &self.shifts),
            ),
            None => (Vec::new(), None, Vec::new(), Vec::new()),
        };

        let root_causes = self.provider.root_causes().await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Root cause breakdown unavailable");
            Vec::new()
        });
        let shifts = match self.provider.shift_summary().await {
            Ok(summary) => summary
                .into_iter()
                .map(|s| ShiftPanel {
                    status: ShiftStatus::classify(s.scrap_rate, &self.bands),
                    shift: s.shift,
                    scrap_rate: s.scrap_rate,
                })
                .collect(),
            Err(e) => {
                tracing::warn!(error = %e, "Shift summary unavailable");
                Vec::new()
            }
        };

        let delivered = self.alerter.dispatch(&alerts).await;

        tracing::info!(
            window = %selection.window,
            machines = selection.machines.len(),
            records = snapshot.as_ref().map(|s| s.len()).unwrap_or(0),
            alerts = alerts.len(),
            delivered,
            stale,
            "Refresh cycle complete"
        );

        Ok(RefreshReport {
            refreshed_at: Utc::now(),
            selection: selection.clone(),
            stale,
            source_error,
            snapshot,
            alerts,
            kpis,
            machines,
            root_causes,
            shifts,
            observed_shifts,
        })
    }

    async fn fetch(&self, selection: &Selection) -> Result<Snapshot, SourceError> {
        match tokio::time::timeout(
            self.snapshot_timeout,
            self.provider.snapshot(&selection.machines, selection.window),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(SourceError::Timeout(self.snapshot_timeout)),
        }
    }
}
