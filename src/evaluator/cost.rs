use crate::config::BaselineConfig;
use crate::types::{format_usd, Alert, AlertLevel};
use super::{AlertRule, SnapshotStats};

/// Informational notice when scrap cost passes the cost baseline
pub struct ScrapCostRule {
    baseline: f64,
}

impl ScrapCostRule {
    pub fn new(config: &BaselineConfig) -> Self {
        Self { baseline: config.scrap_cost }
    }
}

impl AlertRule for ScrapCostRule {
    fn name(&self) -> &'static str { "scrap_cost" }

    fn check(&self, stats: &SnapshotStats<'_>) -> Option<Alert> {
        if stats.scrap_cost <= self.baseline {
            return None;
        }
        Some(
            Alert::new(
                self.name(),
                AlertLevel::Info,
                stats.scrap_cost,
                format!(
                    "Scrap cost {} exceeds baseline {} by {}",
                    format_usd(stats.scrap_cost),
                    format_usd(self.baseline),
                    format_usd(stats.scrap_cost - self.baseline)
                ),
            )
            .with_threshold(self.baseline)
            .at(stats.as_of),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ProductionRecord, Snapshot, TimeWindow};
    use chrono::Utc;

    #[test]
    fn info_above_baseline_only() {
        let rule = ScrapCostRule::new(&BaselineConfig::default());
        let snap = |scrap: u32| {
            Snapshot::new(
                TimeWindow::LastWeek,
                vec!["M001".into()],
                vec![ProductionRecord::new(Utc::now(), "M001", 10_000, scrap, 20.0, 0.0)],
            )
        };

        let under = snap(700);
        assert!(rule.check(&SnapshotStats::from_snapshot(&under)).is_none());

        let over = snap(800);
        let alert = rule.check(&SnapshotStats::from_snapshot(&over)).unwrap();
        assert_eq!(alert.level, AlertLevel::Info);
        assert_eq!(alert.message, "Scrap cost $16,000 exceeds baseline $15,000 by $1,000");
    }
}
