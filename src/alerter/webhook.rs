use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::WebhookConfig;
use crate::types::{Alert, AlertLevel};
use super::{parse_level_filter, AlertChannel};

/// Posts each alert as JSON to a configured endpoint
pub struct WebhookChannel {
    url: String,
    headers: std::collections::HashMap<String, String>,
    level_filter: Vec<AlertLevel>,
    client: reqwest::Client,
}

impl WebhookChannel {
    pub fn new(config: &WebhookConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            url: config.url.clone(),
            headers: config.headers.clone(),
            level_filter: parse_level_filter(&config.level_filter),
            client,
        })
    }
}

/// Body posted for one alert
pub fn payload(alert: &Alert, site: &str) -> Value {
    json!({
        "site": site,
        "level": alert.level,
        "rule": alert.rule,
        "message": &alert.message,
        "value": alert.value,
        "threshold": alert.threshold,
        "labels": &alert.labels,
        "timestamp": alert.timestamp.to_rfc3339(),
    })
}

#[async_trait]
impl AlertChannel for WebhookChannel {
    fn name(&self) -> &str { "webhook" }

    fn accepts_level(&self, level: AlertLevel) -> bool {
        self.level_filter.is_empty() || self.level_filter.contains(&level)
    }

    async fn send(&self, alert: &Alert, site: &str) -> Result<()> {
        let mut req = self.client.post(&self.url).json(&payload(alert, site));
        for (k, v) in &self.headers {
            req = req.header(k, v);
        }

        req.send().await?.error_for_status()?;
        Ok(())
    }
}
