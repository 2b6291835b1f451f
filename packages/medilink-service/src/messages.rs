use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use medilink_domain::role::Role;
use medilink_storage::{
	messages,
	models::{ConversationSummary, Message},
	users,
};

use crate::{Error, MedilinkService, Principal, Result};

const MAX_BODY_CHARS: usize = 5_000;
const DEFAULT_LIMIT: u32 = 50;
const MAX_LIMIT: u32 = 200;

#[derive(Clone, Debug, Deserialize)]
pub struct SendMessageRequest {
	pub recipient_id: Uuid,
	pub body: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ConversationRequest {
	/// Only messages created strictly before this instant.
	#[serde(default, with = "crate::time_serde::option")]
	pub before: Option<OffsetDateTime>,
	pub limit: Option<u32>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct MessageView {
	pub message_id: Uuid,
	pub sender_id: Uuid,
	pub recipient_id: Uuid,
	pub body: String,
	#[serde(with = "crate::time_serde::option")]
	pub read_at: Option<OffsetDateTime>,
	#[serde(with = "crate::time_serde")]
	pub created_at: OffsetDateTime,
}
impl From<Message> for MessageView {
	fn from(row: Message) -> Self {
		Self {
			message_id: row.message_id,
			sender_id: row.sender_id,
			recipient_id: row.recipient_id,
			body: row.body,
			read_at: row.read_at,
			created_at: row.created_at,
		}
	}
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ConversationSummaryView {
	pub peer_id: Uuid,
	pub peer_name: String,
	pub peer_role: Option<Role>,
	pub last_message: String,
	pub last_sender_id: Uuid,
	#[serde(with = "crate::time_serde")]
	pub last_at: OffsetDateTime,
	pub unread: i64,
}
impl From<ConversationSummary> for ConversationSummaryView {
	fn from(row: ConversationSummary) -> Self {
		Self {
			peer_id: row.peer_id,
			peer_name: row.peer_name,
			peer_role: Role::parse(&row.peer_role),
			last_message: row.last_body,
			last_sender_id: row.last_sender_id,
			last_at: row.last_at,
			unread: row.unread,
		}
	}
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ConversationResponse {
	pub peer_id: Uuid,
	pub messages: Vec<MessageView>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct MarkReadResponse {
	pub peer_id: Uuid,
	pub marked: u64,
}

impl MedilinkService {
	pub async fn send_message(
		&self,
		principal: &Principal,
		req: SendMessageRequest,
	) -> Result<MessageView> {
		if req.recipient_id == principal.user_id {
			return Err(Error::invalid("You cannot message yourself."));
		}

		let body = crate::required_text("body", &req.body, MAX_BODY_CHARS)?;

		users::find_user(&self.db.pool, req.recipient_id)
			.await?
			.ok_or_else(|| Error::not_found("Recipient not found."))?;

		let message = Message {
			message_id: Uuid::new_v4(),
			sender_id: principal.user_id,
			recipient_id: req.recipient_id,
			body,
			read_at: None,
			created_at: OffsetDateTime::now_utc(),
		};

		messages::insert_message(&self.db.pool, &message).await?;

		tracing::debug!(message_id = %message.message_id, "Sent message.");

		Ok(message.into())
	}

	/// One entry per conversation partner, most recently active first.
	pub async fn list_conversations(
		&self,
		principal: &Principal,
	) -> Result<Vec<ConversationSummaryView>> {
		let rows = messages::list_conversations(&self.db.pool, principal.user_id).await?;

		Ok(rows.into_iter().map(Into::into).collect())
	}

	/// The latest page of messages with `peer_id`, oldest first.
	pub async fn conversation(
		&self,
		principal: &Principal,
		peer_id: Uuid,
		req: ConversationRequest,
	) -> Result<ConversationResponse> {
		if peer_id == principal.user_id {
			return Err(Error::invalid("A conversation needs two different users."));
		}

		let limit = crate::page_limit(req.limit, DEFAULT_LIMIT, MAX_LIMIT);
		let rows =
			messages::list_conversation(&self.db.pool, principal.user_id, peer_id, req.before, limit)
				.await?;

		Ok(ConversationResponse { peer_id, messages: rows.into_iter().map(Into::into).collect() })
	}

	/// Marks every unread message from `peer_id` to the caller as read.
	pub async fn mark_conversation_read(
		&self,
		principal: &Principal,
		peer_id: Uuid,
	) -> Result<MarkReadResponse> {
		let marked = messages::mark_conversation_read(
			&self.db.pool,
			principal.user_id,
			peer_id,
			OffsetDateTime::now_utc(),
		)
		.await?;

		Ok(MarkReadResponse { peer_id, marked })
	}
}
