//! Appointment reminders and notification delivery.
//!
//! Each tick enqueues reminders for confirmed appointments that start within the configured lead
//! time, then drains the delivery queue. Reminders are deduplicated by key so overlapping workers
//! and repeated ticks enqueue each reminder once. Delivery claims rows with a lease, so a crashed
//! worker only delays a notification until the lease runs out.

use std::{future::Future, sync::Arc, time::Duration as StdDuration};

use time::{Duration, OffsetDateTime, UtcOffset};
use tokio::time as tokio_time;

use medilink_config::Config;
use medilink_domain::{
	notification::{self, NotificationKind},
	schedule,
};
use medilink_providers::webhook::{WebhookNotifier, WebhookPayload};
use medilink_service::{BoxFuture, NewNotification, time_serde};
use medilink_storage::{appointments, db::Db, models::Notification, notifications};

use crate::Result;

const CLAIM_LEASE_SECONDS: i64 = 30;
const MAX_DELIVERY_ATTEMPTS: i32 = 8;
const MAX_DELIVERIES_PER_TICK: usize = 32;
const BASE_BACKOFF_MS: i64 = 500;
const MAX_BACKOFF_MS: i64 = 30_000;
const MAX_ERROR_CHARS: usize = 1_024;
const CREDENTIAL_KEYS: [&str; 5] = ["api_key", "apikey", "password", "secret", "token"];

/// Where delivered notifications go.
pub trait NotificationSink
where
	Self: Send + Sync,
{
	fn deliver<'a>(&'a self, payload: &'a WebhookPayload)
	-> BoxFuture<'a, medilink_providers::Result<()>>;
}

impl NotificationSink for WebhookNotifier {
	fn deliver<'a>(
		&'a self,
		payload: &'a WebhookPayload,
	) -> BoxFuture<'a, medilink_providers::Result<()>> {
		Box::pin(WebhookNotifier::deliver(self, payload))
	}
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeliveryOutcome {
	Delivered,
	/// No sink is configured; the notification stays in the in-app inbox only.
	Stored,
	Failed { attempts: i32 },
}

pub struct WorkerState {
	pub db: Db,
	pub utc_offset: UtcOffset,
	pub reminder_lead: Duration,
	pub poll_interval: StdDuration,
	pub sink: Option<Arc<dyn NotificationSink>>,
}
impl WorkerState {
	pub fn from_config(cfg: &Config, db: Db) -> Result<Self> {
		let sink = WebhookNotifier::from_config(&cfg.notifications)?
			.map(|notifier| Arc::new(notifier) as Arc<dyn NotificationSink>);

		Ok(Self {
			db,
			utc_offset: schedule::clinic_offset(cfg.scheduling.utc_offset_minutes)?,
			reminder_lead: schedule::reminder_lead(cfg.notifications.reminder_lead_minutes)?,
			poll_interval: StdDuration::from_millis(cfg.notifications.poll_interval_ms),
			sink,
		})
	}

	pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
		self.sink = Some(sink);

		self
	}

	pub fn has_sink(&self) -> bool {
		self.sink.is_some()
	}
}

/// Runs ticks until `shutdown` resolves. Tick errors are logged and retried on the next tick.
pub async fn run_worker<F>(state: WorkerState, shutdown: F)
where
	F: Future<Output = ()>,
{
	tokio::pin!(shutdown);

	loop {
		tick(&state, OffsetDateTime::now_utc()).await;

		tokio::select! {
			_ = &mut shutdown => break,
			_ = tokio_time::sleep(state.poll_interval) => {},
		}
	}
}

async fn tick(state: &WorkerState, now: OffsetDateTime) {
	match schedule_reminders(state, now).await {
		Ok(0) => {},
		Ok(enqueued) => tracing::info!(enqueued, "Enqueued appointment reminders."),
		Err(err) => tracing::error!(error = %err, "Reminder scheduling failed."),
	}

	for _ in 0..MAX_DELIVERIES_PER_TICK {
		match deliver_next(state, now).await {
			Ok(Some(_)) => continue,
			Ok(None) => break,
			Err(err) => {
				tracing::error!(error = %err, "Notification delivery failed.");

				break;
			},
		}
	}
}

/// Enqueues a reminder for both participants of every confirmed appointment that starts within
/// the lead window. Returns how many new reminders were stored.
pub async fn schedule_reminders(state: &WorkerState, now: OffsetDateTime) -> Result<usize> {
	let from = schedule::clinic_today(now, state.utc_offset);
	let to = schedule::clinic_today(now.saturating_add(state.reminder_lead), state.utc_offset);
	let upcoming = appointments::list_confirmed_between(&state.db.pool, from, to).await?;
	let mut enqueued = 0;

	for appointment in upcoming {
		let start = schedule::start_instant(
			appointment.appointment_date,
			appointment.appointment_time,
			state.utc_offset,
		);

		if !schedule::reminder_due(start, now, state.reminder_lead) {
			continue;
		}

		let when = format!(
			"{} at {}",
			schedule::format_date(appointment.appointment_date),
			schedule::format_time(appointment.appointment_time)
		);

		for (user_id, body) in [
			(appointment.patient_id, format!("Your appointment on {when} is coming up.")),
			(appointment.doctor_id, format!("You have a patient appointment on {when}.")),
		] {
			let reminder = NewNotification {
				user_id,
				appointment_id: Some(appointment.appointment_id),
				kind: NotificationKind::AppointmentReminder,
				title: "Appointment reminder".to_string(),
				body,
				dedupe_key: Some(notification::reminder_dedupe_key(
					appointment.appointment_id,
					user_id,
					appointment.appointment_date,
					appointment.appointment_time,
				)),
			};

			if medilink_service::notifications::enqueue(&state.db.pool, reminder, now).await? {
				enqueued += 1;
			}
		}
	}

	Ok(enqueued)
}

/// Claims one due notification and hands it to the sink. Returns `None` when nothing is due.
pub async fn deliver_next(
	state: &WorkerState,
	now: OffsetDateTime,
) -> Result<Option<DeliveryOutcome>> {
	let Some(notification) = notifications::claim_next_delivery(
		&state.db,
		now,
		Duration::seconds(CLAIM_LEASE_SECONDS),
		MAX_DELIVERY_ATTEMPTS,
	)
	.await?
	else {
		return Ok(None);
	};
	let notification_id = notification.notification_id;
	let Some(sink) = &state.sink else {
		notifications::mark_delivered(&state.db.pool, notification_id, now).await?;

		return Ok(Some(DeliveryOutcome::Stored));
	};

	match sink.deliver(&payload_for(&notification)).await {
		Ok(()) => {
			notifications::mark_delivered(&state.db.pool, notification_id, now).await?;

			tracing::info!(%notification_id, kind = %notification.kind, "Delivered notification.");

			Ok(Some(DeliveryOutcome::Delivered))
		},
		Err(err) => {
			let attempts = notification.attempts.saturating_add(1);
			let retry_at = now + backoff_for_attempt(attempts);
			let error_text = sanitize_error(&err.to_string());

			notifications::mark_delivery_failed(
				&state.db.pool,
				notification_id,
				attempts,
				&error_text,
				retry_at,
				now,
			)
			.await?;

			if attempts >= MAX_DELIVERY_ATTEMPTS {
				tracing::error!(
					%notification_id,
					attempts,
					error = %error_text,
					"Giving up on notification."
				);
			} else {
				tracing::warn!(
					%notification_id,
					attempts,
					error = %error_text,
					"Notification delivery failed."
				);
			}

			Ok(Some(DeliveryOutcome::Failed { attempts }))
		},
	}
}

fn payload_for(notification: &Notification) -> WebhookPayload {
	WebhookPayload {
		notification_id: notification.notification_id,
		user_id: notification.user_id,
		appointment_id: notification.appointment_id,
		kind: notification.kind.clone(),
		title: notification.title.clone(),
		body: notification.body.clone(),
		created_at: time_serde::format(notification.created_at),
	}
}

fn backoff_for_attempt(attempt: i32) -> Duration {
	let attempts = attempt.max(1) as u32;
	let exp = attempts.saturating_sub(1).min(6);
	let base = BASE_BACKOFF_MS.saturating_mul(1 << exp);

	Duration::milliseconds(base.min(MAX_BACKOFF_MS))
}

/// Redacts credentials from provider errors before they are stored.
fn sanitize_error(text: &str) -> String {
	let mut previous_was_bearer = false;
	let words: Vec<String> = text
		.split_whitespace()
		.map(|word| {
			let redacted = if previous_was_bearer {
				"[REDACTED]".to_string()
			} else {
				redact_credential(word).unwrap_or_else(|| word.to_string())
			};

			previous_was_bearer = word.eq_ignore_ascii_case("bearer");

			redacted
		})
		.collect();
	let joined = words.join(" ");

	if joined.chars().count() <= MAX_ERROR_CHARS {
		return joined;
	}

	let mut truncated: String = joined.chars().take(MAX_ERROR_CHARS).collect();

	truncated.push_str("...");

	truncated
}

/// `key=value` or `key:value` words whose key looks like a credential.
fn redact_credential(word: &str) -> Option<String> {
	let sep = word.find(['=', ':'])?;
	let key = word[..sep].to_ascii_lowercase();

	if !CREDENTIAL_KEYS.iter().any(|needle| key.contains(needle)) {
		return None;
	}

	Some(format!("{}[REDACTED]", &word[..=sep]))
}
