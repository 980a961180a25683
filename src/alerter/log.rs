use anyhow::Result;
use async_trait::async_trait;

use crate::types::{Alert, AlertLevel};
use super::AlertChannel;

/// Writes each alert as a log banner at a matching log level
pub struct LogChannel;

#[async_trait]
impl AlertChannel for LogChannel {
    fn name(&self) -> &str { "log" }

    fn accepts_level(&self, _level: AlertLevel) -> bool {
        true
    }

    async fn send(&self, alert: &Alert, site: &str) -> Result<()> {
        let machine = alert.label("machine").unwrap_or("-");
        match alert.level {
            AlertLevel::Critical => {
                tracing::error!(site, rule = alert.rule, machine, value = alert.value, "🚨 {}", alert.message)
            }
            AlertLevel::Warning => {
                tracing::warn!(site, rule = alert.rule, machine, value = alert.value, "⚠️ {}", alert.message)
            }
            AlertLevel::Info => {
                tracing::info!(site, rule = alert.rule, machine, value = alert.value, "ℹ️ {}", alert.message)
            }
        }
        Ok(())
    }
}
