use sqlx::{Executor, Postgres};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::{Result, db::Db, models::Notification};

pub const DELIVERY_PENDING: &str = "PENDING";
pub const DELIVERY_DONE: &str = "DONE";
pub const DELIVERY_FAILED: &str = "FAILED";

const NOTIFICATION_COLUMNS: &str = "\
notification_id, user_id, appointment_id, kind, title, body, dedupe_key, read_at, \
delivery_status, attempts, last_error, available_at, created_at, updated_at";

/// Inserts a notification. Returns false when another row already holds its `dedupe_key`.
pub async fn insert_notification<'e, E>(executor: E, notification: &Notification) -> Result<bool>
where
	E: Executor<'e, Database = Postgres>,
{
	let result = sqlx::query(
		"\
INSERT INTO notifications (
	notification_id,
	user_id,
	appointment_id,
	kind,
	title,
	body,
	dedupe_key,
	read_at,
	delivery_status,
	attempts,
	last_error,
	available_at,
	created_at,
	updated_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
ON CONFLICT (dedupe_key) DO NOTHING",
	)
	.bind(notification.notification_id)
	.bind(notification.user_id)
	.bind(notification.appointment_id)
	.bind(notification.kind.as_str())
	.bind(notification.title.as_str())
	.bind(notification.body.as_str())
	.bind(notification.dedupe_key.as_deref())
	.bind(notification.read_at)
	.bind(notification.delivery_status.as_str())
	.bind(notification.attempts)
	.bind(notification.last_error.as_deref())
	.bind(notification.available_at)
	.bind(notification.created_at)
	.bind(notification.updated_at)
	.execute(executor)
	.await?;

	Ok(result.rows_affected() > 0)
}

pub async fn list_notifications<'e, E>(
	executor: E,
	user_id: Uuid,
	unread_only: bool,
	limit: i64,
) -> Result<Vec<Notification>>
where
	E: Executor<'e, Database = Postgres>,
{
	let sql = format!(
		"\
SELECT {NOTIFICATION_COLUMNS}
FROM notifications
WHERE user_id = $1 AND (NOT $2 OR read_at IS NULL)
ORDER BY created_at DESC, notification_id
LIMIT $3"
	);
	let notifications = sqlx::query_as::<_, Notification>(&sql)
		.bind(user_id)
		.bind(unread_only)
		.bind(limit)
		.fetch_all(executor)
		.await?;

	Ok(notifications)
}

/// Marks one of `user_id`'s notifications read, keeping the first read time.
pub async fn mark_notification_read<'e, E>(
	executor: E,
	user_id: Uuid,
	notification_id: Uuid,
	now: OffsetDateTime,
) -> Result<Option<Notification>>
where
	E: Executor<'e, Database = Postgres>,
{
	let sql = format!(
		"\
UPDATE notifications
SET read_at = COALESCE(read_at, $3), updated_at = $3
WHERE notification_id = $1 AND user_id = $2
RETURNING {NOTIFICATION_COLUMNS}"
	);
	let notification = sqlx::query_as::<_, Notification>(&sql)
		.bind(notification_id)
		.bind(user_id)
		.bind(now)
		.fetch_optional(executor)
		.await?;

	Ok(notification)
}

/// Deletes notifications of `kind` for `appointment_id` that have not been delivered yet.
pub async fn withdraw_undelivered<'e, E>(
	executor: E,
	appointment_id: Uuid,
	kind: &str,
) -> Result<u64>
where
	E: Executor<'e, Database = Postgres>,
{
	let result = sqlx::query(
		"\
DELETE FROM notifications
WHERE appointment_id = $1
	AND kind = $2
	AND delivery_status IN ('PENDING', 'FAILED')",
	)
	.bind(appointment_id)
	.bind(kind)
	.execute(executor)
	.await?;

	Ok(result.rows_affected())
}

/// Claims the next notification awaiting delivery and leases it for `lease`.
///
/// Rows stay claimable while they are `PENDING` or `FAILED` with fewer than `max_attempts`
/// attempts. The lease pushes `available_at` forward so a crashed worker's claim expires.
pub async fn claim_next_delivery(
	db: &Db,
	now: OffsetDateTime,
	lease: Duration,
	max_attempts: i32,
) -> Result<Option<Notification>> {
	let mut tx = db.pool.begin().await?;
	let sql = format!(
		"\
SELECT {NOTIFICATION_COLUMNS}
FROM notifications
WHERE delivery_status IN ('PENDING', 'FAILED')
	AND attempts < $2
	AND available_at <= $1
ORDER BY available_at
LIMIT 1
FOR UPDATE SKIP LOCKED"
	);
	let row = sqlx::query_as::<_, Notification>(&sql)
		.bind(now)
		.bind(max_attempts)
		.fetch_optional(&mut *tx)
		.await?;
	let notification = if let Some(mut notification) = row {
		let lease_until = now + lease;

		sqlx::query(
			"UPDATE notifications SET available_at = $1, updated_at = $2 WHERE notification_id = $3",
		)
		.bind(lease_until)
		.bind(now)
		.bind(notification.notification_id)
		.execute(&mut *tx)
		.await?;

		notification.available_at = lease_until;

		Some(notification)
	} else {
		None
	};

	tx.commit().await?;

	Ok(notification)
}

pub async fn mark_delivered<'e, E>(executor: E, notification_id: Uuid, now: OffsetDateTime) -> Result<()>
where
	E: Executor<'e, Database = Postgres>,
{
	sqlx::query(
		"\
UPDATE notifications
SET delivery_status = 'DONE', last_error = NULL, updated_at = $1
WHERE notification_id = $2",
	)
	.bind(now)
	.bind(notification_id)
	.execute(executor)
	.await?;

	Ok(())
}

pub async fn mark_delivery_failed<'e, E>(
	executor: E,
	notification_id: Uuid,
	attempts: i32,
	error: &str,
	retry_at: OffsetDateTime,
	now: OffsetDateTime,
) -> Result<()>
where
	E: Executor<'e, Database = Postgres>,
{
	sqlx::query(
		"\
UPDATE notifications
SET
	delivery_status = 'FAILED',
	attempts = $1,
	last_error = $2,
	available_at = $3,
	updated_at = $4
WHERE notification_id = $5",
	)
	.bind(attempts)
	.bind(error)
	.bind(retry_at)
	.bind(now)
	.bind(notification_id)
	.execute(executor)
	.await?;

	Ok(())
}
