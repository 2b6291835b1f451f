use sqlx::{Executor, Postgres};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
	Result,
	models::{ConversationSummary, Message},
};

const MESSAGE_COLUMNS: &str = "message_id, sender_id, recipient_id, body, read_at, created_at";

pub async fn insert_message<'e, E>(executor: E, message: &Message) -> Result<()>
where
	E: Executor<'e, Database = Postgres>,
{
	sqlx::query(
		"\
INSERT INTO messages (message_id, sender_id, recipient_id, body, read_at, created_at)
VALUES ($1, $2, $3, $4, $5, $6)",
	)
	.bind(message.message_id)
	.bind(message.sender_id)
	.bind(message.recipient_id)
	.bind(message.body.as_str())
	.bind(message.read_at)
	.bind(message.created_at)
	.execute(executor)
	.await?;

	Ok(())
}

/// The most recent `limit` messages between two users, oldest first.
pub async fn list_conversation<'e, E>(
	executor: E,
	user_id: Uuid,
	peer_id: Uuid,
	before: Option<OffsetDateTime>,
	limit: i64,
) -> Result<Vec<Message>>
where
	E: Executor<'e, Database = Postgres>,
{
	let sql = format!(
		"\
SELECT {MESSAGE_COLUMNS}
FROM (
	SELECT {MESSAGE_COLUMNS}
	FROM messages
	WHERE LEAST(sender_id, recipient_id) = LEAST($1::uuid, $2::uuid)
		AND GREATEST(sender_id, recipient_id) = GREATEST($1::uuid, $2::uuid)
		AND ($3::timestamptz IS NULL OR created_at < $3)
	ORDER BY created_at DESC, message_id DESC
	LIMIT $4
) recent
ORDER BY created_at, message_id"
	);
	let messages = sqlx::query_as::<_, Message>(&sql)
		.bind(user_id)
		.bind(peer_id)
		.bind(before)
		.bind(limit)
		.fetch_all(executor)
		.await?;

	Ok(messages)
}

/// One row per conversation partner, most recently active first.
pub async fn list_conversations<'e, E>(executor: E, user_id: Uuid) -> Result<Vec<ConversationSummary>>
where
	E: Executor<'e, Database = Postgres>,
{
	let summaries = sqlx::query_as::<_, ConversationSummary>(
		"\
SELECT peer_id, peer_name, peer_role, last_body, last_sender_id, last_at, unread
FROM (
	SELECT DISTINCT ON (m.peer_id)
		m.peer_id,
		u.name AS peer_name,
		u.role AS peer_role,
		m.body AS last_body,
		m.sender_id AS last_sender_id,
		m.created_at AS last_at,
		(
			SELECT count(*)
			FROM messages x
			WHERE x.sender_id = m.peer_id AND x.recipient_id = $1 AND x.read_at IS NULL
		) AS unread
	FROM (
		SELECT
			CASE WHEN sender_id = $1 THEN recipient_id ELSE sender_id END AS peer_id,
			message_id,
			sender_id,
			body,
			created_at
		FROM messages
		WHERE sender_id = $1 OR recipient_id = $1
	) m
	JOIN users u ON u.user_id = m.peer_id
	ORDER BY m.peer_id, m.created_at DESC, m.message_id DESC
) summaries
ORDER BY last_at DESC, peer_id",
	)
	.bind(user_id)
	.fetch_all(executor)
	.await?;

	Ok(summaries)
}

/// Stamps `read_at` on every unread message `peer_id` sent to `user_id`.
pub async fn mark_conversation_read<'e, E>(
	executor: E,
	user_id: Uuid,
	peer_id: Uuid,
	now: OffsetDateTime,
) -> Result<u64>
where
	E: Executor<'e, Database = Postgres>,
{
	let result = sqlx::query(
		"\
UPDATE messages
SET read_at = $3
WHERE recipient_id = $1 AND sender_id = $2 AND read_at IS NULL",
	)
	.bind(user_id)
	.bind(peer_id)
	.bind(now)
	.execute(executor)
	.await?;

	Ok(result.rows_affected())
}
