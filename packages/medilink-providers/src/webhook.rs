use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use uuid::Uuid;

use crate::Result;

/// JSON body posted to the notification webhook.
#[derive(Clone, Debug, Serialize)]
pub struct WebhookPayload {
	pub notification_id: Uuid,
	pub user_id: Uuid,
	pub appointment_id: Option<Uuid>,
	pub kind: String,
	pub title: String,
	pub body: String,
	/// RFC 3339 creation time.
	pub created_at: String,
}

pub struct WebhookNotifier {
	client: Client,
	url: String,
}
impl WebhookNotifier {
	pub fn new(url: &str, timeout_ms: u64) -> Result<Self> {
		let client = Client::builder().timeout(Duration::from_millis(timeout_ms)).build()?;

		Ok(Self { client, url: url.to_string() })
	}

	/// Builds a notifier when the config names a webhook URL.
	pub fn from_config(cfg: &medilink_config::Notifications) -> Result<Option<Self>> {
		cfg.webhook_url.as_deref().map(|url| Self::new(url, cfg.webhook_timeout_ms)).transpose()
	}

	pub fn url(&self) -> &str {
		&self.url
	}

	/// Posts `payload`. Any non-2xx status is an error.
	pub async fn deliver(&self, payload: &WebhookPayload) -> Result<()> {
		self.client.post(&self.url).json(payload).send().await?.error_for_status()?;

		Ok(())
	}
}
