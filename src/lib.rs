pub mod aggregation;
pub mod alerter;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod evaluator;
pub mod provider;
pub mod registry;
pub mod storage;

/// Common types used across modules
pub mod types {
    use std::fmt;
    use std::str::FromStr;

    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Serialize};
    use smallvec::SmallVec;

    use crate::error::SelectionError;

    /// One machine's output over one sampling interval
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct ProductionRecord {
        pub timestamp: DateTime<Utc>,
        pub machine_id: String,
        pub total_production: u32,
        pub scrap_quantity: u32,
        /// Percentage in [0, 100], derived from the two counts
        pub scrap_rate: f64,
        /// USD per unit
        pub unit_cost: f64,
        pub downtime_minutes: f64,
    }

    impl ProductionRecord {
        /// Build a record whose derived fields agree with its counts.
        ///
        /// Scrap is clamped to production and negative downtime to zero, so
        /// every record satisfies the record invariants by construction.
        pub fn new(
            timestamp: DateTime<Utc>,
            machine_id: impl Into<String>,
            total_production: u32,
            scrap_quantity: u32,
            unit_cost: f64,
            downtime_minutes: f64,
        ) -> Self {
            let scrap_quantity = scrap_quantity.min(total_production);
            Self {
                timestamp,
                machine_id: machine_id.into(),
                total_production,
                scrap_quantity,
                scrap_rate: scrap_rate(scrap_quantity as u64, total_production as u64),
                unit_cost,
                downtime_minutes: downtime_minutes.max(0.0),
            }
        }

        pub fn scrap_cost(&self) -> f64 {
            self.scrap_quantity as f64 * self.unit_cost
        }
    }

    /// Scrap as a percentage of production; zero when nothing was produced.
    pub fn scrap_rate(scrap: u64, total: u64) -> f64 {
        if total == 0 {
            0.0
        } else {
            100.0 * scrap as f64 / total as f64
        }
    }

    /// Requested time span of a snapshot
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub enum TimeWindow {
        #[serde(rename = "1h")]
        LastHour,
        #[serde(rename = "8h")]
        LastEightHours,
        #[serde(rename = "24h")]
        LastDay,
        #[serde(rename = "7d")]
        LastWeek,
    }

    impl TimeWindow {
        pub const ALL: [TimeWindow; 4] = [
            TimeWindow::LastHour,
            TimeWindow::LastEightHours,
            TimeWindow::LastDay,
            TimeWindow::LastWeek,
        ];

        pub fn span_minutes(&self) -> u32 {
            match self {
                TimeWindow::LastHour => 60,
                TimeWindow::LastEightHours => 8 * 60,
                TimeWindow::LastDay => 24 * 60,
                TimeWindow::LastWeek => 7 * 24 * 60,
            }
        }

        /// Sampling cadence. Coarser for longer windows so a machine never
        /// contributes more than 84 records.
        pub fn interval_minutes(&self) -> u32 {
            match self {
                TimeWindow::LastHour => 5,
                TimeWindow::LastEightHours => 15,
                TimeWindow::LastDay => 30,
                TimeWindow::LastWeek => 120,
            }
        }

        pub fn samples_per_machine(&self) -> usize {
            (self.span_minutes() / self.interval_minutes()) as usize
        }

        pub fn as_str(&self) -> &'static str {
            match self {
                TimeWindow::LastHour => "1h",
                TimeWindow::LastEightHours => "8h",
                TimeWindow::LastDay => "24h",
                TimeWindow::LastWeek => "7d",
            }
        }

        pub fn label(&self) -> &'static str {
            match self {
                TimeWindow::LastHour => "Last Hour",
                TimeWindow::LastEightHours => "Last 8 Hours",
                TimeWindow::LastDay => "Last 24 Hours",
                TimeWindow::LastWeek => "Last Week",
            }
        }
    }

    impl FromStr for TimeWindow {
        type Err = SelectionError;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            let token = s.trim();
            TimeWindow::ALL
                .into_iter()
                .find(|w| token == w.as_str() || token.eq_ignore_ascii_case(w.label()))
                .ok_or_else(|| SelectionError::UnknownWindow(s.to_string()))
        }
    }

    impl fmt::Display for TimeWindow {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.as_str())
        }
    }

    /// Records for the selected machines over one window, in time order
    #[derive(Debug, Clone, Serialize)]
    pub struct Snapshot {
        pub window: TimeWindow,
        pub machines: Vec<String>,
        pub interval_minutes: u32,
        pub generated_at: DateTime<Utc>,
        pub records: Vec<ProductionRecord>,
    }

    impl Snapshot {
        pub fn new(window: TimeWindow, machines: Vec<String>, records: Vec<ProductionRecord>) -> Self {
            Self {
                window,
                machines,
                interval_minutes: window.interval_minutes(),
                generated_at: Utc::now(),
                records,
            }
        }

        pub fn is_empty(&self) -> bool {
            self.records.is_empty()
        }

        pub fn len(&self) -> usize {
            self.records.len()
        }

        pub fn total_production(&self) -> u64 {
            self.records.iter().map(|r| r.total_production as u64).sum()
        }

        pub fn total_scrap(&self) -> u64 {
            self.records.iter().map(|r| r.scrap_quantity as u64).sum()
        }

        /// Pooled rate: total scrap over total production
        pub fn overall_scrap_rate(&self) -> f64 {
            scrap_rate(self.total_scrap(), self.total_production())
        }

        pub fn scrap_cost(&self) -> f64 {
            self.records.iter().map(ProductionRecord::scrap_cost).sum()
        }

        pub fn records_for<'a>(&'a self, machine_id: &'a str) -> impl Iterator<Item = &'a ProductionRecord> + 'a {
            self.records.iter().filter(move |r| r.machine_id == machine_id)
        }
    }

    /// A label key-value pair
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Label {
        pub key: String,
        pub value: String,
    }

    impl Label {
        pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
            Self { key: key.into(), value: value.into() }
        }
    }

    /// Alert severity levels
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum AlertLevel {
        Info,
        Warning,
        Critical,
    }

    impl AlertLevel {
        pub fn parse(s: &str) -> Option<Self> {
            match s.trim().to_ascii_lowercase().as_str() {
                "info" => Some(AlertLevel::Info),
                "warn" | "warning" => Some(AlertLevel::Warning),
                "critical" => Some(AlertLevel::Critical),
                _ => None,
            }
        }
    }

    impl fmt::Display for AlertLevel {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                AlertLevel::Info => write!(f, "INFO"),
                AlertLevel::Warning => write!(f, "WARNING"),
                AlertLevel::Critical => write!(f, "CRITICAL"),
            }
        }
    }

    /// An alert raised by one evaluator rule for one refresh cycle
    #[derive(Debug, Clone, Serialize)]
    pub struct Alert {
        pub timestamp: DateTime<Utc>,
        pub level: AlertLevel,
        pub rule: &'static str,
        pub value: f64,
        pub threshold: Option<f64>,
        pub message: String,
        pub labels: SmallVec<[Label; 4]>,
    }

    impl Alert {
        pub fn new(rule: &'static str, level: AlertLevel, value: f64, message: impl Into<String>) -> Self {
            Self {
                timestamp: Utc::now(),
                level,
                rule,
                value,
                threshold: None,
                message: message.into(),
                labels: SmallVec::new(),
            }
        }

        pub fn with_threshold(mut self, threshold: f64) -> Self {
            self.threshold = Some(threshold);
            self
        }

        pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
            self.labels.push(Label::new(key, value));
            self
        }

        pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
            self.timestamp = timestamp;
            self
        }

        pub fn label(&self, key: &str) -> Option<&str> {
            self.labels.iter().find(|l| l.key == key).map(|l| l.value.as_str())
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct RootCause {
        pub cause: String,
        pub count: u32,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct ShiftSummary {
        pub shift: String,
        pub scrap_rate: f64,
    }

    /// Format a USD amount with thousands separators and no cents, e.g. `$15,000`.
    pub fn format_usd(amount: f64) -> String {
        let rounded = amount.round();
        let sign = if rounded < 0.0 { "-" } else { "" };
        let digits = format!("{:.0}", rounded.abs());
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }
        format!("{}${}", sign, grouped)
    }

}
