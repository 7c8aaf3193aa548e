use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::config::Config;

/// An outbound email. Bodies are plain text; the web client renders its
/// own booking views, mail is informational only.
#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Outbound notification channel. Implementations must be safe to call
/// after a reservation transaction has committed; a failure here is a
/// logging event, never a booking failure.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<(), String>;
}

/// Sends through the Resend HTTP API.
pub struct ResendNotifier {
    client: reqwest::Client,
    api_key: String,
    from: String,
}

const RESEND_API_URL: &str = "https://api.resend.com/emails";

#[async_trait]
impl Notifier for ResendNotifier {
    async fn send(&self, message: EmailMessage) -> Result<(), String> {
        let response = self
            .client
            .post(RESEND_API_URL)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "from": self.from,
                "to": [message.to],
                "subject": message.subject,
                "text": message.body,
            }))
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(format!("resend returned {}", response.status()))
        }
    }
}

/// Stands in when no API key is configured; logs and drops.
pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
    async fn send(&self, message: EmailMessage) -> Result<(), String> {
        tracing::info!(to = %message.to, subject = %message.subject, "Email disabled, dropping message");
        Ok(())
    }
}

pub fn notifier_from_config(config: &Config) -> Arc<dyn Notifier> {
    match &config.resend_api_key {
        Some(key) => Arc::new(ResendNotifier {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .expect("Failed to build email HTTP client"),
            api_key: key.clone(),
            from: config.email_from.clone(),
        }),
        None => {
            tracing::warn!("RESEND_API_KEY not set, outbound email disabled");
            Arc::new(DisabledNotifier)
        }
    }
}

/// Fire-and-forget dispatch, called only after the surrounding
/// transaction has committed. Delivery failures are logged and
/// swallowed so notification problems can never roll back or fail a
/// booking or a payment settlement.
pub fn spawn_send(notifier: Arc<dyn Notifier>, message: EmailMessage) {
    tokio::spawn(async move {
        if let Err(e) = notifier.send(message.clone()).await {
            tracing::error!(to = %message.to, subject = %message.subject, error = %e, "Failed to send notification email");
        }
    });
}
