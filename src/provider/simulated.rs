use std::sync::{Mutex, PoisonError};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{Config, GeneratorConfig, MachineProfile, RootCauseConfig, ShiftConfig, ThresholdConfig};
use crate::error::{SelectionError, SourceResult};
use crate::registry::MachineRegistry;
use crate::types::{ProductionRecord, RootCause, ShiftSummary, Snapshot, TimeWindow};
use super::MetricsProvider;

/// Synthesizes live-looking production telemetry around per-machine baselines.
///
/// Each interval draws a downtime (usually micro-stops, occasionally a real
/// stoppage), scales production by the remaining uptime and draws a scrap
/// rate around the machine baseline. Intervals that count as stoppages under
/// the configured thresholds multiply the scrap rate, mimicking restart losses.
pub struct SimulatedProvider {
    registry: MachineRegistry,
    generator: GeneratorConfig,
    thresholds: ThresholdConfig,
    shifts: Vec<ShiftConfig>,
    root_causes: Vec<RootCauseConfig>,
    rng: Mutex<StdRng>,
}

impl SimulatedProvider {
    pub fn new(config: &Config) -> Result<Self> {
        let registry = MachineRegistry::new(config.machines.clone())?;
        let rng = match config.generator.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            registry,
            generator: config.generator.clone(),
            thresholds: config.thresholds.clone(),
            shifts: config.shifts.clone(),
            root_causes: config.root_causes.clone(),
            rng: Mutex::new(rng),
        })
    }

    /// Generate a snapshot whose last sample lands on `end`
    pub fn generate<S: AsRef<str>>(
        &self,
        machine_ids: &[S],
        window: TimeWindow,
        end: DateTime<Utc>,
    ) -> Result<Snapshot, SelectionError> {
        let profiles = self.registry.resolve(machine_ids)?;
        let interval = window.interval_minutes();
        let samples = window.samples_per_machine();
        let start = end - Duration::minutes(window.span_minutes() as i64);

        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        let mut records = Vec::with_capacity(samples * profiles.len());
        for i in 1..=samples {
            let timestamp = start + Duration::minutes(i as i64 * interval as i64);
            for profile in &profiles {
                records.push(self.sample(&mut *rng, profile, timestamp, interval));
            }
        }

        let machines = profiles.iter().map(|p| p.id.clone()).collect();
        let mut snapshot = Snapshot::new(window, machines, records);
        snapshot.generated_at = end;
        Ok(snapshot)
    }

    fn sample<R: Rng>(
        &self,
        rng: &mut R,
        profile: &MachineProfile,
        timestamp: DateTime<Utc>,
        interval_minutes: u32,
    ) -> ProductionRecord {
        let g = &self.generator;
        let interval = interval_minutes as f64;

        // NaN compares false: no stoppages rather than a panic
        let stoppage = rng.gen::<f64>() < g.downtime_probability;
        let downtime = if stoppage {
            interval * rng.gen_range(0.1..=1.0)
        } else {
            interval * rng.gen_range(0.0..0.1)
        };
        let downtime = ((downtime * 10.0).round() / 10.0).min(interval);

        let uptime = (1.0 - downtime / interval).clamp(0.0, 1.0);
        let expected = profile.base_production_per_hour * interval / 60.0 * uptime;
        let production = (expected * jitter(rng, g.production_variation)).round().max(0.0) as u32;

        let mut rate = profile.base_scrap_rate * jitter(rng, g.scrap_rate_variation);
        if downtime >= self.thresholds.stoppage_minutes(interval_minutes) {
            rate *= g.spike_scrap_multiplier;
        }
        let rate = rate.clamp(0.0, 100.0);
        let scrap = (production as f64 * rate / 100.0).round() as u32;

        ProductionRecord::new(timestamp, profile.id.clone(), production, scrap, profile.unit_cost, downtime)
    }
}

/// Multiplicative noise in `[1 - spread, 1 + spread]`
fn jitter<R: Rng>(rng: &mut R, spread: f64) -> f64 {
    let spread = spread.abs().min(1.0);
    if spread == 0.0 {
        return 1.0;
    }
    1.0 + rng.gen_range(-spread..=spread)
}

#[async_trait]
impl MetricsProvider for SimulatedProvider {
    fn name(&self) -> &str { "simulated" }

    fn machine_list(&self) -> Vec<String> {
        self.registry.ids()
    }

    async fn snapshot(&self, machine_ids: &[String], window: TimeWindow) -> SourceResult<Snapshot> {
        let snapshot = self.generate(machine_ids, window, Utc::now())?;
        tracing::debug!(
            window = %window,
            machines = snapshot.machines.len(),
            records = snapshot.len(),
            "Generated snapshot"
        );
        Ok(snapshot)
    }

    async fn root_causes(&self) -> SourceResult<Vec<RootCause>> {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        let causes = self
            .root_causes
            .iter()
            .map(|rc| RootCause {
                cause: rc.cause.clone(),
                count: (rc.typical_count as f64 * jitter(&mut *rng, self.generator.root_cause_variation))
                    .round()
                    .max(0.0) as u32,
            })
            .collect();
        Ok(causes)
    }

    async fn shift_summary(&self) -> SourceResult<Vec<ShiftSummary>> {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        let spread = self.generator.shift_variation.abs();
        let shifts = self
            .shifts
            .iter()
            .map(|s| {
                let noise = if spread > 0.0 { rng.gen_range(-spread..=spread) } else { 0.0 };
                let rate = (s.base_scrap_rate + noise).clamp(0.0, 100.0);
                ShiftSummary {
                    shift: s.name.clone(),
                    scrap_rate: (rate * 100.0).round() / 100.0,
                }
            })
            .collect();
        Ok(shifts)
    }
}
