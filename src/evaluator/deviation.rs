use crate::config::ThresholdConfig;
use crate::types::{Alert, AlertLevel};
use super::{AlertRule, SnapshotStats};

/// Flags the machine whose scrap rate runs furthest above the fleet.
///
/// The baseline is the pooled rate of the snapshot itself, so it rolls with
/// the selected window. Only the worst machine is reported, and only when its
/// own rate is above the scrap warning line.
pub struct MachineDeviationRule {
    warning_percent: f64,
    critical_percent: f64,
    floor_percent: f64,
}

impl MachineDeviationRule {
    pub fn new(config: &ThresholdConfig) -> Self {
        Self {
            warning_percent: config.machine_deviation_warning_percent,
            critical_percent: config.machine_deviation_critical_percent,
            floor_percent: config.scrap_warning_percent,
        }
    }
}

impl AlertRule for MachineDeviationRule {
    fn name(&self) -> &'static str { "machine_deviation" }

    fn check(&self, stats: &SnapshotStats<'_>) -> Option<Alert> {
        let baseline = stats.overall_scrap_rate;
        if baseline <= 0.0 || stats.producing_machines().count() < 2 {
            return None;
        }

        let (worst, excess) = stats
            .producing_machines()
            .map(|m| (m, 100.0 * (m.scrap_rate - baseline) / baseline))
            .max_by(|a, b| a.1.total_cmp(&b.1))?;
        if worst.scrap_rate <= self.floor_percent {
            return None;
        }

        let level = if excess >= self.critical_percent {
            AlertLevel::Critical
        } else if excess >= self.warning_percent {
            AlertLevel::Warning
        } else {
            return None;
        };

        Some(
            Alert::new(
                self.name(),
                level,
                worst.scrap_rate,
                format!(
                    "Machine {} scrap rate {:.2}% is {:.0}% above fleet baseline {:.2}%",
                    worst.machine_id, worst.scrap_rate, excess, baseline
                ),
            )
            .with_threshold(baseline)
            .with_label("machine", worst.machine_id.clone())
            .at(stats.as_of),
        )
    }
}
