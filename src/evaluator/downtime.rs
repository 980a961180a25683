use crate::config::ThresholdConfig;
use crate::types::{Alert, AlertLevel};
use super::{AlertRule, SnapshotStats};

/// Heuristic link between stoppages and scrap.
///
/// Compares the mean scrap rate of stoppage intervals against the rest. What
/// counts as a stoppage scales with the snapshot cadence, see
/// [`ThresholdConfig::stoppage_minutes`]. Intervals without production carry
/// no rate and are ignored.
pub struct DowntimeCorrelationRule {
    thresholds: ThresholdConfig,
}

impl DowntimeCorrelationRule {
    pub fn new(config: &ThresholdConfig) -> Self {
        Self { thresholds: config.clone() }
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

impl AlertRule for DowntimeCorrelationRule {
    fn name(&self) -> &'static str { "downtime_correlation" }

    fn check(&self, stats: &SnapshotStats<'_>) -> Option<Alert> {
        let stoppage_minutes = self.thresholds.stoppage_minutes(stats.interval_minutes);
        let ratio = self.thresholds.downtime_scrap_ratio;
        let (after_stoppage, normal): (Vec<_>, Vec<_>) = stats
            .records
            .iter()
            .filter(|r| r.total_production > 0)
            .partition(|r| r.downtime_minutes >= stoppage_minutes);

        let stoppage_rates: Vec<f64> = after_stoppage.iter().map(|r| r.scrap_rate).collect();
        let normal_rates: Vec<f64> = normal.iter().map(|r| r.scrap_rate).collect();
        let stoppage_mean = mean(&stoppage_rates)?;
        let normal_mean = mean(&normal_rates)?;
        if normal_mean <= 0.0 {
            return None;
        }

        let observed = stoppage_mean / normal_mean;
        if observed < ratio {
            return None;
        }

        Some(
            Alert::new(
                self.name(),
                AlertLevel::Warning,
                observed,
                format!(
                    "Scrap runs {:.1}x higher after {:.0}+ minutes of downtime ({:.2}% vs {:.2}% across {} intervals)",
                    observed,
                    stoppage_minutes,
                    stoppage_mean,
                    normal_mean,
                    stoppage_rates.len()
                ),
            )
            .with_threshold(ratio)
            .at(stats.as_of),
        )
    }
}
