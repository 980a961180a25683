use crate::config::ThresholdConfig;
use crate::types::{Alert, AlertLevel};
use super::{AlertRule, SnapshotStats};

/// Pooled scrap rate across every record against fixed warn/critical lines.
pub struct OverallScrapRateRule {
    warning: f64,
    critical: f64,
}

impl OverallScrapRateRule {
    pub fn new(config: &ThresholdConfig) -> Self {
        Self {
            warning: config.scrap_warning_percent,
            critical: config.scrap_critical_percent,
        }
    }
}

impl AlertRule for OverallScrapRateRule {
    fn name(&self) -> &'static str { "overall_scrap_rate" }

    fn check(&self, stats: &SnapshotStats<'_>) -> Option<Alert> {
        if stats.total_production == 0 {
            return None;
        }
        let rate = stats.overall_scrap_rate;

        let (level, threshold) = if rate > self.critical {
            (AlertLevel::Critical, self.critical)
        } else if rate > self.warning {
            (AlertLevel::Warning, self.warning)
        } else {
            return None;
        };

        Some(
            Alert::new(
                self.name(),
                level,
                rate,
                format!("Overall scrap rate is {:.2}% (threshold: {:.1}%)", rate, threshold),
            )
            .with_threshold(threshold)
            .at(stats.as_of),
        )
    }
}
