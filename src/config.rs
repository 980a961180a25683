use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;

/// Top-level configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub dashboard: DashboardConfig,
    #[serde(default = "default_machines")]
    pub machines: Vec<MachineProfile>,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub thresholds: ThresholdConfig,
    #[serde(default)]
    pub baselines: BaselineConfig,
    #[serde(default = "default_shifts")]
    pub shifts: Vec<ShiftConfig>,
    #[serde(default)]
    pub shift_bands: ShiftBandConfig,
    #[serde(default = "default_root_causes")]
    pub root_causes: Vec<RootCauseConfig>,
    #[serde(default)]
    pub alerting: AlertingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dashboard: DashboardConfig::default(),
            machines: default_machines(),
            generator: GeneratorConfig::default(),
            thresholds: ThresholdConfig::default(),
            baselines: BaselineConfig::default(),
            shifts: default_shifts(),
            shift_bands: ShiftBandConfig::default(),
            root_causes: default_root_causes(),
            alerting: AlertingConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardConfig {
    /// Plant or line name attached to outgoing alerts
    #[serde(default = "default_site")]
    pub site: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
    #[serde(default = "default_snapshot_timeout")]
    pub snapshot_timeout_secs: u64,
    #[serde(default = "default_window")]
    pub default_window: String,
    /// How many machines (from the top of the registry) are selected when none are given
    #[serde(default = "default_machine_count")]
    pub default_machine_count: usize,
    /// Selections whose last good snapshot is kept for stale fallback
    #[serde(default = "default_last_known_capacity")]
    pub last_known_capacity: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            site: default_site(),
            log_level: default_log_level(),
            refresh_interval_secs: 30,
            snapshot_timeout_secs: 5,
            default_window: default_window(),
            default_machine_count: 3,
            last_known_capacity: 16,
        }
    }
}

/// A machine in the registry and the baselines the generator varies around
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct MachineProfile {
    pub id: String,
    pub base_production_per_hour: f64,
    /// Percent
    pub base_scrap_rate: f64,
    /// USD per unit
    pub unit_cost: f64,
}

impl MachineProfile {
    pub fn new(id: &str, base_production_per_hour: f64, base_scrap_rate: f64, unit_cost: f64) -> Self {
        Self {
            id: id.to_string(),
            base_production_per_hour,
            base_scrap_rate,
            unit_cost,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeneratorConfig {
    /// Fixed seed for reproducible output; entropy-seeded when absent
    #[serde(default)]
    pub seed: Option<u64>,
    /// Relative spread of production around the machine baseline
    #[serde(default = "default_production_variation")]
    pub production_variation: f64,
    /// Relative spread of scrap rate around the machine baseline
    #[serde(default = "default_scrap_variation")]
    pub scrap_rate_variation: f64,
    /// Chance that an interval sees a real stoppage rather than micro-stops
    #[serde(default = "default_downtime_probability")]
    pub downtime_probability: f64,
    /// Scrap multiplier for intervals that count as stoppages
    #[serde(default = "default_spike_multiplier")]
    pub spike_scrap_multiplier: f64,
    /// Relative spread of root-cause counts around their typical values
    #[serde(default = "default_root_cause_variation")]
    pub root_cause_variation: f64,
    /// Absolute spread, in percentage points, of shift scrap rates
    #[serde(default = "default_shift_variation")]
    pub shift_variation: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            seed: None,
            production_variation: 0.15,
            scrap_rate_variation: 0.35,
            downtime_probability: 0.2,
            spike_scrap_multiplier: 2.0,
            root_cause_variation: 0.3,
            shift_variation: 0.8,
        }
    }
}

/// Alert thresholds, one group per evaluator rule
#[derive(Debug, Deserialize, Clone)]
pub struct ThresholdConfig {
    #[serde(default = "default_3")]
    pub scrap_warning_percent: f64,
    #[serde(default = "default_5")]
    pub scrap_critical_percent: f64,
    /// Relative excess of one machine over the fleet-wide rate
    #[serde(default = "default_15")]
    pub machine_deviation_warning_percent: f64,
    #[serde(default = "default_50")]
    pub machine_deviation_critical_percent: f64,
    /// Intervals with at least this much downtime count as stoppages
    #[serde(default = "default_45")]
    pub downtime_spike_minutes: f64,
    /// Share of the sampling interval that counts as a stoppage when the
    /// interval is too short to hold `downtime_spike_minutes`
    #[serde(default = "default_spike_fraction")]
    pub downtime_spike_fraction: f64,
    /// Stoppage scrap rate over normal scrap rate that raises a warning
    #[serde(default = "default_downtime_ratio")]
    pub downtime_scrap_ratio: f64,
}

impl ThresholdConfig {
    /// Downtime, in minutes, at which an interval of `interval_minutes` counts
    /// as a stoppage. Shared by the generator and the correlation rule.
    pub fn stoppage_minutes(&self, interval_minutes: u32) -> f64 {
        self.downtime_spike_minutes
            .min(interval_minutes as f64 * self.downtime_spike_fraction)
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            scrap_warning_percent: 3.0,
            scrap_critical_percent: 5.0,
            machine_deviation_warning_percent: 15.0,
            machine_deviation_critical_percent: 50.0,
            downtime_spike_minutes: 45.0,
            downtime_spike_fraction: 0.5,
            downtime_scrap_ratio: 1.5,
        }
    }
}

/// Reference values the KPI deltas are computed against
#[derive(Debug, Deserialize, Clone)]
pub struct BaselineConfig {
    #[serde(default = "default_target_scrap")]
    pub target_scrap_rate_percent: f64,
    #[serde(default = "default_scrap_cost")]
    pub scrap_cost: f64,
    #[serde(default = "default_oee")]
    pub oee_percent: f64,
    #[serde(default = "default_downtime_minutes")]
    pub downtime_minutes: f64,
    #[serde(default = "default_total_production")]
    pub total_production: f64,
    /// OEE points lost per point of scrap rate
    #[serde(default = "default_oee_weight")]
    pub oee_scrap_weight: f64,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            target_scrap_rate_percent: 2.5,
            scrap_cost: 15_000.0,
            oee_percent: 95.0,
            downtime_minutes: 25.0,
            total_production: 50_000.0,
            oee_scrap_weight: 2.5,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ShiftConfig {
    pub name: String,
    /// Hour of day (UTC), inclusive
    pub start_hour: u32,
    /// Hour of day (UTC), exclusive; may be less than `start_hour` for night shifts
    pub end_hour: u32,
    #[serde(default = "default_target_scrap")]
    pub base_scrap_rate: f64,
}

impl ShiftConfig {
    pub fn contains_hour(&self, hour: u32) -> bool {
        if self.start_hour < self.end_hour {
            (self.start_hour..self.end_hour).contains(&hour)
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}

/// Colour bands for shift scrap rates
#[derive(Debug, Deserialize, Clone)]
pub struct ShiftBandConfig {
    #[serde(default = "default_target_scrap")]
    pub watch_percent: f64,
    #[serde(default = "default_4")]
    pub alert_percent: f64,
}

impl Default for ShiftBandConfig {
    fn default() -> Self {
        Self { watch_percent: 2.5, alert_percent: 4.0 }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RootCauseConfig {
    pub cause: String,
    pub typical_count: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AlertingConfig {
    /// Emit every alert as a log banner
    #[serde(default = "default_true")]
    pub log_banners: bool,
    #[serde(default)]
    pub webhook: Option<WebhookConfig>,
}

impl Default for AlertingConfig {
    fn default() -> Self {
        Self { log_banners: true, webhook: None }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebhookConfig {
    #[serde(default)]
    pub enabled: bool,
    pub url: String,
    #[serde(default)]
    pub headers: std::collections::HashMap<String, String>,
    #[serde(default)]
    pub level_filter: Vec<String>,
    #[serde(default = "default_webhook_timeout")]
    pub timeout_secs: u64,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        // Expand environment variables
        let expanded = expand_env_vars(content);

        let config: Config = toml::from_str(&expanded)
            .with_context(|| "Failed to parse configuration")?;
        config.validate()?;

        Ok(config)
    }

    /// Reject configurations the dashboard cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.machines.is_empty() {
            bail!("machine registry is empty");
        }
        let mut seen = HashSet::new();
        for m in &self.machines {
            if m.id.trim().is_empty() {
                bail!("machine id must not be blank");
            }
            if !seen.insert(m.id.as_str()) {
                bail!("duplicate machine id: {}", m.id);
            }
            if m.base_production_per_hour < 0.0 || !(0.0..=100.0).contains(&m.base_scrap_rate) {
                bail!("machine {}: production must be >= 0 and scrap rate within 0..=100", m.id);
            }
            if m.unit_cost <= 0.0 {
                bail!("machine {}: unit_cost must be positive", m.id);
            }
        }

        let t = &self.thresholds;
        if t.scrap_warning_percent >= t.scrap_critical_percent {
            bail!(
                "scrap_warning_percent ({}) must be below scrap_critical_percent ({})",
                t.scrap_warning_percent, t.scrap_critical_percent
            );
        }
        if t.machine_deviation_warning_percent >= t.machine_deviation_critical_percent {
            bail!("machine deviation warning must be below its critical level");
        }
        if !(t.downtime_spike_fraction > 0.0 && t.downtime_spike_fraction <= 1.0) {
            bail!("downtime_spike_fraction must be within (0, 1], got {}", t.downtime_spike_fraction);
        }

        let g = &self.generator;
        if !(0.0..=1.0).contains(&g.downtime_probability) {
            bail!("downtime_probability must be within 0..=1, got {}", g.downtime_probability);
        }
        for (name, value) in [
            ("production_variation", g.production_variation),
            ("scrap_rate_variation", g.scrap_rate_variation),
            ("spike_scrap_multiplier", g.spike_scrap_multiplier),
            ("root_cause_variation", g.root_cause_variation),
            ("shift_variation", g.shift_variation),
        ] {
            if !value.is_finite() || value < 0.0 {
                bail!("generator {} must be a finite, non-negative number, got {}", name, value);
            }
        }

        if self.shifts.is_empty() {
            bail!("at least one shift must be configured");
        }
        let mut shift_names = HashSet::new();
        for s in &self.shifts {
            if !shift_names.insert(s.name.as_str()) {
                bail!("duplicate shift name: {}", s.name);
            }
            if s.start_hour > 23 || s.end_hour > 23 || s.start_hour == s.end_hour {
                bail!("shift '{}' has an invalid hour range {}..{}", s.name, s.start_hour, s.end_hour);
            }
        }
        if self.root_causes.is_empty() {
            bail!("at least one root cause must be configured");
        }
        let mut causes = HashSet::new();
        for rc in &self.root_causes {
            if !causes.insert(rc.cause.as_str()) {
                bail!("duplicate root cause: {}", rc.cause);
            }
        }
        if self.dashboard.refresh_interval_secs == 0 || self.dashboard.snapshot_timeout_secs == 0 {
            bail!("refresh and snapshot timeout intervals must be positive");
        }

        Ok(())
    }
}

/// Expand ${ENV_VAR} references in config string
fn expand_env_vars(input: &str) -> String {
    let re = match regex::Regex::new(r"\$\{([^}]+)\}") {
        Ok(re) => re,
        Err(_) => return input.to_string(),
    };
    re.replace_all(input, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_default()
    })
    .to_string()
}

// Default value functions
fn default_site() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}
fn default_log_level() -> String { "info".to_string() }
fn default_refresh_interval() -> u64 { 30 }
fn default_snapshot_timeout() -> u64 { 5 }
fn default_window() -> String { "24h".to_string() }
fn default_machine_count() -> usize { 3 }
fn default_last_known_capacity() -> usize { 16 }
fn default_true() -> bool { true }
fn default_production_variation() -> f64 { 0.15 }
fn default_scrap_variation() -> f64 { 0.35 }
fn default_downtime_probability() -> f64 { 0.2 }
fn default_spike_fraction() -> f64 { 0.5 }
fn default_spike_multiplier() -> f64 { 2.0 }
fn default_root_cause_variation() -> f64 { 0.3 }
fn default_shift_variation() -> f64 { 0.8 }
fn default_3() -> f64 { 3.0 }
fn default_4() -> f64 { 4.0 }
fn default_5() -> f64 { 5.0 }
fn default_15() -> f64 { 15.0 }
fn default_45() -> f64 { 45.0 }
fn default_50() -> f64 { 50.0 }
fn default_downtime_ratio() -> f64 { 1.5 }
fn default_target_scrap() -> f64 { 2.5 }
fn default_scrap_cost() -> f64 { 15_000.0 }
fn default_oee() -> f64 { 95.0 }
fn default_downtime_minutes() -> f64 { 25.0 }
fn default_total_production() -> f64 { 50_000.0 }
fn default_oee_weight() -> f64 { 2.5 }
fn default_webhook_timeout() -> u64 { 10 }

fn default_machines() -> Vec<MachineProfile> {
    vec![
        MachineProfile::new("M001", 120.0, 2.2, 12.5),
        MachineProfile::new("M002", 95.0, 1.8, 18.0),
        MachineProfile::new("M003", 110.0, 3.1, 15.0),
        MachineProfile::new("M004", 140.0, 2.0, 9.75),
        MachineProfile::new("M005", 80.0, 2.6, 22.0),
        MachineProfile::new("M006", 130.0, 1.5, 11.0),
    ]
}

fn default_shifts() -> Vec<ShiftConfig> {
    let shift = |name: &str, start_hour, end_hour, base_scrap_rate| ShiftConfig {
        name: name.to_string(),
        start_hour,
        end_hour,
        base_scrap_rate,
    };
    vec![
        shift("Morning (06:00-14:00)", 6, 14, 2.1),
        shift("Afternoon (14:00-22:00)", 14, 22, 2.8),
        shift("Night (22:00-06:00)", 22, 6, 3.6),
    ]
}

fn default_root_causes() -> Vec<RootCauseConfig> {
    [
        ("Material Defects", 45),
        ("Machine Calibration", 32),
        ("Operator Error", 21),
        ("Temperature Variation", 18),
        ("Tool Wear", 15),
        ("Setup Issues", 9),
    ]
    .into_iter()
    .map(|(cause, typical_count)| RootCauseConfig { cause: cause.to_string(), typical_count })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.machines.len(), 6);
        assert_eq!(config.shifts.len(), 3);
        assert_eq!(config.thresholds.scrap_warning_percent, 3.0);
        assert_eq!(config.thresholds.scrap_critical_percent, 5.0);
        assert_eq!(config.baselines.scrap_cost, 15_000.0);
    }

    #[test]
    fn empty_document_uses_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.dashboard.refresh_interval_secs, 30);
        assert_eq!(config.dashboard.default_window, "24h");
        assert_eq!(config.baselines.target_scrap_rate_percent, 2.5);
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config = Config::from_toml_str(
            r#"
            [thresholds]
            scrap_critical_percent = 7.5

            [[machines]]
            id = "PRESS-1"
            base_production_per_hour = 60.0
            base_scrap_rate = 4.0
            unit_cost = 30.0
            "#,
        )
        .unwrap();
        assert_eq!(config.thresholds.scrap_critical_percent, 7.5);
        assert_eq!(config.thresholds.scrap_warning_percent, 3.0);
        assert_eq!(config.machines.len(), 1);
        assert_eq!(config.machines[0].id, "PRESS-1");
    }

    #[test]
    fn env_vars_are_expanded() {
        std::env::set_var("SCRAP_MONITOR_TEST_SITE", "plant-7");
        let config = Config::from_toml_str(
            "[dashboard]\nsite = \"${SCRAP_MONITOR_TEST_SITE}\"\n",
        )
        .unwrap();
        assert_eq!(config.dashboard.site, "plant-7");
    }

    #[test]
    fn rejects_inverted_thresholds() {
        let err = Config::from_toml_str(
            "[thresholds]\nscrap_warning_percent = 6.0\nscrap_critical_percent = 5.0\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("scrap_warning_percent"));
    }

    #[test]
    fn rejects_duplicate_machines() {
        let mut config = Config::default();
        config.machines.push(MachineProfile::new("M001", 10.0, 1.0, 1.0));
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_duplicate_root_causes() {
        let mut config = Config::default();
        let first = config.root_causes[0].clone();
        config.root_causes.push(first);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate root cause"));
    }

    #[test]
    fn rejects_duplicate_shift_names() {
        let err = Config::from_toml_str(
            r#"
            [[shifts]]
            name = "Day"
            start_hour = 6
            end_hour = 18

            [[shifts]]
            name = "Day"
            start_hour = 18
            end_hour = 6
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate shift name"));
    }

    #[test]
    fn rejects_out_of_range_downtime_probability() {
        let err = Config::from_toml_str("[generator]\ndowntime_probability = nan\n").unwrap_err();
        assert!(err.to_string().contains("downtime_probability"));

        let err = Config::from_toml_str("[generator]\ndowntime_probability = 1.5\n").unwrap_err();
        assert!(err.to_string().contains("downtime_probability"));

        Config::from_toml_str("[generator]\ndowntime_probability = 1.0\n").unwrap();
    }

    #[test]
    fn stoppage_threshold_fits_every_cadence() {
        let t = ThresholdConfig::default();
        assert_eq!(t.stoppage_minutes(5), 2.5);
        assert_eq!(t.stoppage_minutes(30), 15.0);
        assert_eq!(t.stoppage_minutes(120), 45.0);
    }

    #[test]
    fn night_shift_wraps_midnight() {
        let night = &default_shifts()[2];
        assert!(night.contains_hour(23));
        assert!(night.contains_hour(0));
        assert!(night.contains_hour(5));
        assert!(!night.contains_hour(6));
        assert!(!night.contains_hour(12));
    }
}
