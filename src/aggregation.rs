//! Pure transforms over a [`Snapshot`] for the comparison, KPI and shift panels.
//!
//! Nothing here holds state; the same snapshot always yields the same output.

use std::collections::HashMap;

use chrono::Timelike;
use serde::Serialize;

use crate::config::{BaselineConfig, ShiftBandConfig, ShiftConfig};
use crate::types::{scrap_rate, ShiftSummary, Snapshot};

/// Totals for one machine across a snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MachineAggregate {
    pub machine_id: String,
    pub scrap_quantity: u64,
    pub total_production: u64,
    /// Unweighted mean of the per-record rates
    pub mean_scrap_rate: f64,
    /// Pooled rate: summed scrap over summed production
    pub scrap_rate: f64,
    pub records: usize,
}

/// Per-machine sums and mean rate, in order of first appearance.
pub fn group_by_machine(snapshot: &Snapshot) -> Vec<MachineAggregate> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<(MachineAggregate, f64)> = Vec::new();

    for r in &snapshot.records {
        let slot = *index.entry(r.machine_id.as_str()).or_insert_with(|| {
            groups.push((
                MachineAggregate {
                    machine_id: r.machine_id.clone(),
                    scrap_quantity: 0,
                    total_production: 0,
                    mean_scrap_rate: 0.0,
                    scrap_rate: 0.0,
                    records: 0,
                },
                0.0,
            ));
            groups.len() - 1
        });
        let (agg, rate_sum) = &mut groups[slot];
        agg.scrap_quantity += r.scrap_quantity as u64;
        agg.total_production += r.total_production as u64;
        agg.records += 1;
        *rate_sum += r.scrap_rate;
    }

    groups
        .into_iter()
        .map(|(mut agg, rate_sum)| {
            agg.mean_scrap_rate = rate_sum / agg.records as f64;
            agg.scrap_rate = scrap_rate(agg.scrap_quantity, agg.total_production);
            agg
        })
        .collect()
}

/// A metric with its delta against a baseline
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Kpi {
    pub value: f64,
    pub baseline: f64,
    pub delta: f64,
}

impl Kpi {
    fn new(value: f64, baseline: f64) -> Self {
        Self { value, baseline, delta: value - baseline }
    }
}

/// The headline metric row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiSummary {
    pub overall_scrap_rate: Kpi,
    pub scrap_cost: Kpi,
    pub oee_impact: Kpi,
    pub avg_downtime_minutes: Kpi,
    pub total_production: Kpi,
}

pub fn summarize(snapshot: &Snapshot, baselines: &BaselineConfig) -> KpiSummary {
    let overall = snapshot.overall_scrap_rate();
    // OEE is approximated from scrap alone
    let oee = (100.0 - overall * baselines.oee_scrap_weight).clamp(0.0, 100.0);
    let avg_downtime = if snapshot.is_empty() {
        0.0
    } else {
        snapshot.records.iter().map(|r| r.downtime_minutes).sum::<f64>() / snapshot.len() as f64
    };

    KpiSummary {
        overall_scrap_rate: Kpi::new(overall, baselines.target_scrap_rate_percent),
        scrap_cost: Kpi::new(snapshot.scrap_cost(), baselines.scrap_cost),
        oee_impact: Kpi::new(oee, baselines.oee_percent),
        avg_downtime_minutes: Kpi::new(avg_downtime, baselines.downtime_minutes),
        total_production: Kpi::new(snapshot.total_production() as f64, baselines.total_production),
    }
}

/// Pooled scrap rate of the records falling in each shift, by UTC hour.
pub fn shift_breakdown(snapshot: &Snapshot, shifts: &[ShiftConfig]) -> Vec<ShiftSummary> {
    shifts
        .iter()
        .map(|shift| {
            let (scrap, total) = snapshot
                .records
                .iter()
                .filter(|r| shift.contains_hour(r.timestamp.hour()))
                .fold((0u64, 0u64), |(s, t), r| {
                    (s + r.scrap_quantity as u64, t + r.total_production as u64)
                });
            ShiftSummary {
                shift: shift.name.clone(),
                scrap_rate: scrap_rate(scrap, total),
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ShiftStatus {
    Ok,
    Watch,
    Alert,
}

impl ShiftStatus {
    pub fn classify(scrap_rate: f64, bands: &ShiftBandConfig) -> Self {
        if scrap_rate > bands.alert_percent {
            ShiftStatus::Alert
        } else if scrap_rate > bands.watch_percent {
            ShiftStatus::Watch
        } else {
            ShiftStatus::Ok
        }
    }
}
