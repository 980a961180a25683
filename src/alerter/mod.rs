pub mod log;
pub mod webhook;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::AlertingConfig;
use crate::types::{Alert, AlertLevel};

/// Trait for alert delivery channels
#[async_trait]
pub trait AlertChannel: Send + Sync {
    /// Channel name
    fn name(&self) -> &str;

    /// Send a single alert
    async fn send(&self, alert: &Alert, site: &str) -> Result<()>;

    /// Check if this channel accepts the given level
    fn accepts_level(&self, level: AlertLevel) -> bool;
}

/// Fans the alerts of one refresh cycle out to every channel.
///
/// Alerts are recomputed every cycle, so nothing is deduplicated or held
/// back between cycles.
pub struct AlertManager {
    channels: Vec<Box<dyn AlertChannel>>,
    site: String,
}

impl AlertManager {
    pub fn new(config: &AlertingConfig, site: &str) -> Result<Self> {
        let mut channels: Vec<Box<dyn AlertChannel>> = Vec::new();

        if config.log_banners {
            channels.push(Box::new(log::LogChannel));
        }

        if let Some(ref wc) = config.webhook {
            if wc.enabled {
                channels.push(Box::new(webhook::WebhookChannel::new(wc)?));
            }
        }

        tracing::info!(channels = channels.len(), "Initialized alert channels");

        Ok(Self::with_channels(channels, site))
    }

    pub fn with_channels(channels: Vec<Box<dyn AlertChannel>>, site: &str) -> Self {
        Self { channels, site: site.to_string() }
    }

    /// Deliver every alert to every accepting channel.
    ///
    /// Channel failures are logged and skipped; returns the number of
    /// successful deliveries.
    pub async fn dispatch(&self, alerts: &[Alert]) -> usize {
        let mut delivered = 0;
        for alert in alerts {
            for channel in &self.channels {
                if !channel.accepts_level(alert.level) {
                    continue;
                }
                match channel.send(alert, &self.site).await {
                    Ok(()) => delivered += 1,
                    Err(e) => {
                        tracing::error!(
                            channel = channel.name(),
                            rule = alert.rule,
                            error = %e,
                            "Failed to send alert"
                        );
                    }
                }
            }
        }
        delivered
    }
}

/// Parse a configured level filter; unknown names are dropped
pub(crate) fn parse_level_filter(names: &[String]) -> Vec<AlertLevel> {
    names.iter().filter_map(|s| AlertLevel::parse(s)).collect()
}
