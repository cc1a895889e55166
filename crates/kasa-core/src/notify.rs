//! Low-balance notification seam
//!
//! The ledger only depends on the `Notifier` trait. Delivery is best-effort:
//! callers log failures and carry on.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{Error, Result};

/// Timeout for outbound notification requests
pub const NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Human-readable name for logs
    fn name(&self) -> &str;

    /// Tell someone the cash balance fell below the minimum
    async fn notify_low_balance(&self, current_total: Decimal, threshold: Decimal) -> Result<()>;

    /// Send a test message to verify delivery works
    async fn send_test(&self) -> Result<()>;
}

/// Writes alerts to the log only
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn notify_low_balance(&self, current_total: Decimal, threshold: Decimal) -> Result<()> {
        warn!(
            %current_total,
            %threshold,
            "Cash balance below minimum limit"
        );
        Ok(())
    }

    async fn send_test(&self) -> Result<()> {
        info!("Test notification (log only)");
        Ok(())
    }
}

/// JSON body posted to the webhook
#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    event: &'a str,
    subject: &'a str,
    recipient: Option<&'a str>,
    current_total: Option<Decimal>,
    threshold: Option<Decimal>,
    sent_at: String,
}

/// Posts alerts to an HTTP endpoint (mail relay, chat hook, etc.)
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
    recipient: Option<String>,
}

impl WebhookNotifier {
    pub fn new(url: &str, recipient: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(NOTIFY_TIMEOUT).build()?;
        Ok(Self {
            client,
            url: url.to_string(),
            recipient,
        })
    }

    async fn post(&self, payload: &WebhookPayload<'_>) -> Result<()> {
        let response = self.client.post(&self.url).json(payload).send().await?;
        if !response.status().is_success() {
            return Err(Error::Notification(format!(
                "Webhook returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn notify_low_balance(&self, current_total: Decimal, threshold: Decimal) -> Result<()> {
        self.post(&WebhookPayload {
            event: "low_balance",
            subject: "Cash balance below minimum limit",
            recipient: self.recipient.as_deref(),
            current_total: Some(current_total),
            threshold: Some(threshold),
            sent_at: Utc::now().to_rfc3339(),
        })
        .await?;
        info!(url = %self.url, "Low balance alert delivered");
        Ok(())
    }

    async fn send_test(&self) -> Result<()> {
        self.post(&WebhookPayload {
            event: "test",
            subject: "Notification service is working",
            recipient: self.recipient.as_deref(),
            current_total: None,
            threshold: None,
            sent_at: Utc::now().to_rfc3339(),
        })
        .await
    }
}

/// Build the notifier described by the configuration
pub fn from_config(config: &crate::config::Config) -> Result<Box<dyn Notifier>> {
    match config.alert_webhook.as_deref() {
        Some(url) => Ok(Box::new(WebhookNotifier::new(
            url,
            config.alert_recipient.clone(),
        )?)),
        None => Ok(Box::new(LogNotifier)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::test_utils::MockWebhookServer;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_webhook_posts_low_balance_payload() {
        let server = MockWebhookServer::start().await;
        let notifier = WebhookNotifier::new(&server.url(), Some("owner@example.com".into())).unwrap();

        notifier
            .notify_low_balance(Decimal::new(800000, 2), Decimal::from(10_000))
            .await
            .unwrap();

        let received = server.received();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0]["event"], "low_balance");
        assert_eq!(received[0]["recipient"], "owner@example.com");
        assert_eq!(received[0]["current_total"], "8000.00");
    }

    #[tokio::test]
    async fn test_webhook_error_status_is_reported() {
        let server = MockWebhookServer::start_with_status(StatusCode::BAD_GATEWAY).await;
        let notifier = WebhookNotifier::new(&server.url(), None).unwrap();

        let result = notifier.send_test().await;
        assert!(matches!(result, Err(Error::Notification(_))));
        assert_eq!(server.received()[0]["event"], "test");
    }

    #[test]
    fn test_from_config_picks_notifier() {
        let notifier = from_config(&Config::default()).unwrap();
        assert_eq!(notifier.name(), "log");

        let config = Config {
            alert_webhook: Some("http://127.0.0.1:9/hook".into()),
            ..Config::default()
        };
        assert_eq!(from_config(&config).unwrap().name(), "webhook");
    }
}
