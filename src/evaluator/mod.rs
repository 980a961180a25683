pub mod cost;
pub mod deviation;
pub mod downtime;
pub mod scrap_rate;
pub mod stats;

use crate::config::Config;
use crate::types::{Alert, Snapshot};

pub use stats::SnapshotStats;

/// A single alerting rule.
///
/// Rules are independent: each looks at the snapshot statistics and raises at
/// most one alert. No rule sees another rule's output.
pub trait AlertRule: Send + Sync {
    /// Stable rule name, carried on every alert the rule raises
    fn name(&self) -> &'static str;

    fn check(&self, stats: &SnapshotStats<'_>) -> Option<Alert>;
}

/// Runs the configured rules over a snapshot.
///
/// Holds only read-only thresholds, so evaluation is a pure function of the
/// snapshot. Alerts come back in rule order, not sorted by level.
pub struct AlertEvaluator {
    rules: Vec<Box<dyn AlertRule>>,
}

impl AlertEvaluator {
    /// The standard rule set, in evaluation order
    pub fn new(config: &Config) -> Self {
        let rules: Vec<Box<dyn AlertRule>> = vec![
            Box::new(scrap_rate::OverallScrapRateRule::new(&config.thresholds)),
            Box::new(deviation::MachineDeviationRule::new(&config.thresholds)),
            Box::new(downtime::DowntimeCorrelationRule::new(&config.thresholds)),
            Box::new(cost::ScrapCostRule::new(&config.baselines)),
        ];
        tracing::info!(count = rules.len(), "Initialized alert rules");
        Self { rules }
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    pub fn evaluate(&self, snapshot: &Snapshot) -> Vec<Alert> {
        if snapshot.is_empty() {
            return Vec::new();
        }
        let stats = SnapshotStats::from_snapshot(snapshot);
        let alerts: Vec<Alert> = self.rules.iter().filter_map(|rule| rule.check(&stats)).collect();
        tracing::debug!(
            records = snapshot.len(),
            overall_scrap_rate = stats.overall_scrap_rate,
            alerts = alerts.len(),
            "Evaluated snapshot"
        );
        alerts
    }
}
