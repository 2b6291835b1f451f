//! Medical records. Deletion is soft: rows keep their content and gain `is_deleted`,
//! `deleted_by` and `deleted_at`. Every read path here skips deleted rows except
//! [`lock_record`], which callers use to make deletion idempotent.

use serde_json::Value;
use sqlx::{Executor, Postgres};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{Result, models::MedicalRecord};

const RECORD_COLUMNS: &str = "\
record_id, patient_id, record_type, title, file_url, notes, data, uploaded_by, last_updated_by, \
is_deleted, deleted_by, deleted_at, created_at, updated_at";

pub struct RecordUpdate<'a> {
	pub record_type: Option<&'a str>,
	pub title: Option<&'a str>,
	pub file_url: Option<&'a str>,
	pub notes: Option<&'a str>,
	pub data: Option<&'a Value>,
}

pub async fn insert_record<'e, E>(executor: E, record: &MedicalRecord) -> Result<()>
where
	E: Executor<'e, Database = Postgres>,
{
	sqlx::query(
		"\
INSERT INTO medical_records (
	record_id,
	patient_id,
	record_type,
	title,
	file_url,
	notes,
	data,
	uploaded_by,
	last_updated_by,
	is_deleted,
	deleted_by,
	deleted_at,
	created_at,
	updated_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
	)
	.bind(record.record_id)
	.bind(record.patient_id)
	.bind(record.record_type.as_str())
	.bind(record.title.as_str())
	.bind(record.file_url.as_str())
	.bind(record.notes.as_deref())
	.bind(record.data.as_ref())
	.bind(record.uploaded_by)
	.bind(record.last_updated_by)
	.bind(record.is_deleted)
	.bind(record.deleted_by)
	.bind(record.deleted_at)
	.bind(record.created_at)
	.bind(record.updated_at)
	.execute(executor)
	.await?;

	Ok(())
}

pub async fn find_active_record<'e, E>(executor: E, record_id: Uuid) -> Result<Option<MedicalRecord>>
where
	E: Executor<'e, Database = Postgres>,
{
	let sql = format!(
		"SELECT {RECORD_COLUMNS} FROM medical_records WHERE record_id = $1 AND is_deleted = false"
	);
	let record = sqlx::query_as::<_, MedicalRecord>(&sql)
		.bind(record_id)
		.fetch_optional(executor)
		.await?;

	Ok(record)
}

/// Locks a record row whether or not it is deleted.
pub async fn lock_record<'e, E>(executor: E, record_id: Uuid) -> Result<Option<MedicalRecord>>
where
	E: Executor<'e, Database = Postgres>,
{
	let sql = format!(
		"SELECT {RECORD_COLUMNS} FROM medical_records WHERE record_id = $1 FOR NO KEY UPDATE"
	);
	let record = sqlx::query_as::<_, MedicalRecord>(&sql)
		.bind(record_id)
		.fetch_optional(executor)
		.await?;

	Ok(record)
}

pub async fn list_active_records<'e, E>(
	executor: E,
	patient_id: Uuid,
	record_type: Option<&str>,
) -> Result<Vec<MedicalRecord>>
where
	E: Executor<'e, Database = Postgres>,
{
	let sql = format!(
		"\
SELECT {RECORD_COLUMNS}
FROM medical_records
WHERE patient_id = $1
	AND is_deleted = false
	AND ($2::text IS NULL OR record_type = $2)
ORDER BY created_at DESC, record_id"
	);
	let records = sqlx::query_as::<_, MedicalRecord>(&sql)
		.bind(patient_id)
		.bind(record_type)
		.fetch_all(executor)
		.await?;

	Ok(records)
}

/// Returns `None` when the record is missing or already deleted.
pub async fn update_record<'e, E>(
	executor: E,
	record_id: Uuid,
	update: &RecordUpdate<'_>,
	updated_by: Uuid,
	now: OffsetDateTime,
) -> Result<Option<MedicalRecord>>
where
	E: Executor<'e, Database = Postgres>,
{
	let sql = format!(
		"\
UPDATE medical_records
SET
	record_type = COALESCE($2, record_type),
	title = COALESCE($3, title),
	file_url = COALESCE($4, file_url),
	notes = COALESCE($5, notes),
	data = COALESCE($6, data),
	last_updated_by = $7,
	updated_at = $8
WHERE record_id = $1 AND is_deleted = false
RETURNING {RECORD_COLUMNS}"
	);
	let record = sqlx::query_as::<_, MedicalRecord>(&sql)
		.bind(record_id)
		.bind(update.record_type)
		.bind(update.title)
		.bind(update.file_url)
		.bind(update.notes)
		.bind(update.data)
		.bind(updated_by)
		.bind(now)
		.fetch_optional(executor)
		.await?;

	Ok(record)
}

/// Marks a live record deleted. Returns false when it was already deleted or does not exist.
pub async fn soft_delete_record<'e, E>(
	executor: E,
	record_id: Uuid,
	deleted_by: Uuid,
	now: OffsetDateTime,
) -> Result<bool>
where
	E: Executor<'e, Database = Postgres>,
{
	let result = sqlx::query(
		"\
UPDATE medical_records
SET is_deleted = true, deleted_by = $2, deleted_at = $3, updated_at = $3
WHERE record_id = $1 AND is_deleted = false",
	)
	.bind(record_id)
	.bind(deleted_by)
	.bind(now)
	.execute(executor)
	.await?;

	Ok(result.rows_affected() > 0)
}
