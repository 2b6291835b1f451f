use serde_json::Value;
use time::{Date, OffsetDateTime, Time};
use uuid::Uuid;

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct User {
	pub user_id: Uuid,
	pub name: String,
	pub email: String,
	pub password_hash: String,
	pub role: String,
	pub phone: Option<String>,
	pub specialization: Option<String>,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct Appointment {
	pub appointment_id: Uuid,
	pub patient_id: Uuid,
	pub doctor_id: Uuid,
	pub appointment_date: Date,
	pub appointment_time: Time,
	pub status: String,
	pub notes: String,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct MedicalRecord {
	pub record_id: Uuid,
	pub patient_id: Uuid,
	pub record_type: String,
	pub title: String,
	pub file_url: String,
	pub notes: Option<String>,
	pub data: Option<Value>,
	pub uploaded_by: Uuid,
	pub last_updated_by: Option<Uuid>,
	pub is_deleted: bool,
	pub deleted_by: Option<Uuid>,
	pub deleted_at: Option<OffsetDateTime>,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct Message {
	pub message_id: Uuid,
	pub sender_id: Uuid,
	pub recipient_id: Uuid,
	pub body: String,
	pub read_at: Option<OffsetDateTime>,
	pub created_at: OffsetDateTime,
}

/// Latest message and unread count for one conversation partner.
#[derive(Clone, Debug, sqlx::FromRow)]
pub struct ConversationSummary {
	pub peer_id: Uuid,
	pub peer_name: String,
	pub peer_role: String,
	pub last_body: String,
	pub last_sender_id: Uuid,
	pub last_at: OffsetDateTime,
	pub unread: i64,
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct Notification {
	pub notification_id: Uuid,
	pub user_id: Uuid,
	pub appointment_id: Option<Uuid>,
	pub kind: String,
	pub title: String,
	pub body: String,
	pub dedupe_key: Option<String>,
	pub read_at: Option<OffsetDateTime>,
	pub delivery_status: String,
	pub attempts: i32,
	pub last_error: Option<String>,
	pub available_at: OffsetDateTime,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}
