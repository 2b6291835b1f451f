use serde::{Deserialize, Serialize};
use sqlx::{Executor, Postgres};
use time::OffsetDateTime;
use uuid::Uuid;

use medilink_domain::notification::NotificationKind;
use medilink_storage::{
	models::Notification,
	notifications::{self, DELIVERY_PENDING},
};

use crate::{Error, MedilinkService, Principal, Result};

const DEFAULT_LIMIT: u32 = 50;
const MAX_LIMIT: u32 = 200;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct NotificationListRequest {
	#[serde(default)]
	pub unread_only: bool,
	pub limit: Option<u32>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct NotificationView {
	pub notification_id: Uuid,
	pub appointment_id: Option<Uuid>,
	pub kind: String,
	pub title: String,
	pub body: String,
	#[serde(with = "crate::time_serde::option")]
	pub read_at: Option<OffsetDateTime>,
	pub delivery_status: String,
	#[serde(with = "crate::time_serde")]
	pub created_at: OffsetDateTime,
}
impl From<Notification> for NotificationView {
	fn from(row: Notification) -> Self {
		Self {
			notification_id: row.notification_id,
			appointment_id: row.appointment_id,
			kind: row.kind,
			title: row.title,
			body: row.body,
			read_at: row.read_at,
			delivery_status: row.delivery_status,
			created_at: row.created_at,
		}
	}
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct NotificationListResponse {
	pub notifications: Vec<NotificationView>,
	pub unread: usize,
}

/// Content of a notification that has not been stored yet.
#[derive(Clone, Debug)]
pub struct NewNotification {
	pub user_id: Uuid,
	pub appointment_id: Option<Uuid>,
	pub kind: NotificationKind,
	pub title: String,
	pub body: String,
	pub dedupe_key: Option<String>,
}
impl NewNotification {
	/// A pending row, immediately available for delivery.
	pub fn into_row(self, now: OffsetDateTime) -> Notification {
		Notification {
			notification_id: Uuid::new_v4(),
			user_id: self.user_id,
			appointment_id: self.appointment_id,
			kind: self.kind.as_str().to_string(),
			title: self.title,
			body: self.body,
			dedupe_key: self.dedupe_key,
			read_at: None,
			delivery_status: DELIVERY_PENDING.to_string(),
			attempts: 0,
			last_error: None,
			available_at: now,
			created_at: now,
			updated_at: now,
		}
	}
}

impl MedilinkService {
	pub async fn list_notifications(
		&self,
		principal: &Principal,
		req: NotificationListRequest,
	) -> Result<NotificationListResponse> {
		let limit = crate::page_limit(req.limit, DEFAULT_LIMIT, MAX_LIMIT);
		let rows = notifications::list_notifications(
			&self.db.pool,
			principal.user_id,
			req.unread_only,
			limit,
		)
		.await?;
		let notifications: Vec<NotificationView> = rows.into_iter().map(Into::into).collect();
		let unread = notifications.iter().filter(|item| item.read_at.is_none()).count();

		Ok(NotificationListResponse { notifications, unread })
	}

	pub async fn mark_notification_read(
		&self,
		principal: &Principal,
		notification_id: Uuid,
	) -> Result<NotificationView> {
		let now = OffsetDateTime::now_utc();
		let row = notifications::mark_notification_read(
			&self.db.pool,
			principal.user_id,
			notification_id,
			now,
		)
		.await?
		.ok_or_else(|| Error::not_found("Notification not found."))?;

		Ok(row.into())
	}
}

/// Stores `notification` through `executor`, usually the transaction that caused it.
pub async fn enqueue<'e, E>(executor: E, notification: NewNotification, now: OffsetDateTime) -> Result<bool>
where
	E: Executor<'e, Database = Postgres>,
{
	let kind = notification.kind;
	let user_id = notification.user_id;
	let inserted = notifications::insert_notification(executor, &notification.into_row(now)).await?;

	tracing::debug!(%user_id, kind = kind.as_str(), inserted, "Enqueued notification.");

	Ok(inserted)
}
