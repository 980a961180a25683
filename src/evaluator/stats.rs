use chrono::{DateTime, Utc};

use crate::aggregation::{group_by_machine, MachineAggregate};
use crate::types::{ProductionRecord, Snapshot};

/// Aggregates computed once per evaluation and shared by every rule
#[derive(Debug, Clone)]
pub struct SnapshotStats<'a> {
    /// Timestamp of the newest record, or the generation time when empty
    pub as_of: DateTime<Utc>,
    pub total_production: u64,
    pub total_scrap: u64,
    pub overall_scrap_rate: f64,
    pub scrap_cost: f64,
    /// Sampling cadence of the records
    pub interval_minutes: u32,
    pub machines: Vec<MachineAggregate>,
    pub records: &'a [ProductionRecord],
}

impl<'a> SnapshotStats<'a> {
    pub fn from_snapshot(snapshot: &'a Snapshot) -> Self {
        let as_of = snapshot
            .records
            .iter()
            .map(|r| r.timestamp)
            .max()
            .unwrap_or(snapshot.generated_at);

        Self {
            as_of,
            total_production: snapshot.total_production(),
            total_scrap: snapshot.total_scrap(),
            overall_scrap_rate: snapshot.overall_scrap_rate(),
            scrap_cost: snapshot.scrap_cost(),
            interval_minutes: snapshot.interval_minutes,
            machines: group_by_machine(snapshot),
            records: snapshot.records.as_slice(),
        }
    }

    /// Machines that produced anything; idle machines carry no rate
    pub fn producing_machines(&self) -> impl Iterator<Item = &MachineAggregate> {
        self.machines.iter().filter(|m| m.total_production > 0)
    }
}
