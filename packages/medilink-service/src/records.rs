//! Medical records with soft delete.
//!
//! A patient may work with their own records. A doctor may work with the records of any patient
//! who has had at least one appointment with them. Deleted records behave as missing everywhere.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use medilink_domain::role::Role;
use medilink_storage::{
	appointments,
	models::MedicalRecord,
	records::{self, RecordUpdate},
	users,
};

use crate::{Error, MedilinkService, Principal, Result};

const MAX_TYPE_CHARS: usize = 64;
const MAX_TITLE_CHARS: usize = 200;
const MAX_URL_CHARS: usize = 2_048;
const MAX_NOTES_CHARS: usize = 10_000;
const NOT_FOUND: &str = "Record not found.";

#[derive(Clone, Debug, Deserialize)]
pub struct CreateRecordRequest {
	/// Required when a doctor uploads; defaults to the caller for patients.
	pub patient_id: Option<Uuid>,
	pub record_type: String,
	pub title: String,
	pub file_url: String,
	#[serde(default)]
	pub notes: Option<String>,
	#[serde(default)]
	pub data: Option<Value>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct RecordListRequest {
	pub patient_id: Option<Uuid>,
	pub record_type: Option<String>,
}

/// Absent fields are left unchanged.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct UpdateRecordRequest {
	pub record_type: Option<String>,
	pub title: Option<String>,
	pub file_url: Option<String>,
	pub notes: Option<String>,
	pub data: Option<Value>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RecordView {
	pub record_id: Uuid,
	pub patient_id: Uuid,
	pub record_type: String,
	pub title: String,
	pub file_url: String,
	pub notes: Option<String>,
	pub data: Option<Value>,
	pub uploaded_by: Uuid,
	pub last_updated_by: Option<Uuid>,
	#[serde(with = "crate::time_serde")]
	pub created_at: OffsetDateTime,
	#[serde(with = "crate::time_serde")]
	pub updated_at: OffsetDateTime,
}
impl From<MedicalRecord> for RecordView {
	fn from(row: MedicalRecord) -> Self {
		Self {
			record_id: row.record_id,
			patient_id: row.patient_id,
			record_type: row.record_type,
			title: row.title,
			file_url: row.file_url,
			notes: row.notes,
			data: row.data,
			uploaded_by: row.uploaded_by,
			last_updated_by: row.last_updated_by,
			created_at: row.created_at,
			updated_at: row.updated_at,
		}
	}
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DeleteRecordResponse {
	pub record_id: Uuid,
	/// False when the record had already been deleted.
	pub deleted: bool,
}

impl MedilinkService {
	pub async fn create_record(
		&self,
		principal: &Principal,
		req: CreateRecordRequest,
	) -> Result<RecordView> {
		let now = OffsetDateTime::now_utc();
		let patient_id = self.resolve_patient(principal, req.patient_id).await?;
		let record = MedicalRecord {
			record_id: Uuid::new_v4(),
			patient_id,
			record_type: crate::required_text("record_type", &req.record_type, MAX_TYPE_CHARS)?,
			title: crate::required_text("title", &req.title, MAX_TITLE_CHARS)?,
			file_url: validate_file_url(&req.file_url)?,
			notes: crate::optional_text("notes", req.notes.as_deref(), MAX_NOTES_CHARS)?,
			data: req.data.filter(|value| !value.is_null()),
			uploaded_by: principal.user_id,
			last_updated_by: None,
			is_deleted: false,
			deleted_by: None,
			deleted_at: None,
			created_at: now,
			updated_at: now,
		};

		records::insert_record(&self.db.pool, &record).await?;

		tracing::info!(record_id = %record.record_id, %patient_id, uploaded_by = %principal.user_id, "Created record.");

		Ok(record.into())
	}

	/// Live records of one patient, newest first.
	pub async fn list_records(
		&self,
		principal: &Principal,
		req: RecordListRequest,
	) -> Result<Vec<RecordView>> {
		let patient_id = self.resolve_patient(principal, req.patient_id).await?;
		let record_type = req.record_type.as_deref().map(str::trim).filter(|value| !value.is_empty());
		let rows = records::list_active_records(&self.db.pool, patient_id, record_type).await?;

		Ok(rows.into_iter().map(Into::into).collect())
	}

	pub async fn get_record(&self, principal: &Principal, record_id: Uuid) -> Result<RecordView> {
		let row = records::find_active_record(&self.db.pool, record_id)
			.await?
			.ok_or_else(|| Error::not_found(NOT_FOUND))?;

		self.check_record_access(principal, row.patient_id).await?;

		Ok(row.into())
	}

	pub async fn update_record(
		&self,
		principal: &Principal,
		record_id: Uuid,
		req: UpdateRecordRequest,
	) -> Result<RecordView> {
		let now = OffsetDateTime::now_utc();
		let record_type = req
			.record_type
			.as_deref()
			.map(|value| crate::required_text("record_type", value, MAX_TYPE_CHARS))
			.transpose()?;
		let title = req
			.title
			.as_deref()
			.map(|value| crate::required_text("title", value, MAX_TITLE_CHARS))
			.transpose()?;
		let file_url = req.file_url.as_deref().map(validate_file_url).transpose()?;
		let notes = req
			.notes
			.as_deref()
			.map(|value| crate::required_text("notes", value, MAX_NOTES_CHARS))
			.transpose()?;
		let mut tx = self.db.pool.begin().await?;
		let current = records::lock_record(&mut *tx, record_id)
			.await?
			.filter(|row| !row.is_deleted)
			.ok_or_else(|| Error::not_found(NOT_FOUND))?;

		self.check_record_access(principal, current.patient_id).await?;

		let update = RecordUpdate {
			record_type: record_type.as_deref(),
			title: title.as_deref(),
			file_url: file_url.as_deref(),
			notes: notes.as_deref(),
			data: req.data.as_ref().filter(|value| !value.is_null()),
		};
		let row = records::update_record(&mut *tx, record_id, &update, principal.user_id, now)
			.await?
			.ok_or_else(|| Error::not_found(NOT_FOUND))?;

		tx.commit().await?;

		tracing::info!(%record_id, updated_by = %principal.user_id, "Updated record.");

		Ok(row.into())
	}

	/// Soft-deletes a record. Deleting an already deleted record succeeds without changes.
	pub async fn delete_record(
		&self,
		principal: &Principal,
		record_id: Uuid,
	) -> Result<DeleteRecordResponse> {
		let now = OffsetDateTime::now_utc();
		let mut tx = self.db.pool.begin().await?;
		let current = records::lock_record(&mut *tx, record_id)
			.await?
			.ok_or_else(|| Error::not_found(NOT_FOUND))?;

		self.check_record_access(principal, current.patient_id).await?;

		if current.is_deleted {
			tx.commit().await?;

			return Ok(DeleteRecordResponse { record_id, deleted: false });
		}

		let deleted = records::soft_delete_record(&mut *tx, record_id, principal.user_id, now).await?;

		tx.commit().await?;

		tracing::info!(%record_id, deleted_by = %principal.user_id, "Soft-deleted record.");

		Ok(DeleteRecordResponse { record_id, deleted })
	}

	/// Picks the patient a record operation targets and checks the caller may act on them.
	async fn resolve_patient(&self, principal: &Principal, requested: Option<Uuid>) -> Result<Uuid> {
		let patient_id = match (principal.role, requested) {
			(Role::Patient, None) => principal.user_id,
			(Role::Patient, Some(patient_id)) => patient_id,
			(Role::Doctor, Some(patient_id)) => patient_id,
			(Role::Doctor, None) => return Err(Error::invalid("patient_id is required.")),
		};

		self.check_record_access(principal, patient_id).await?;

		if principal.role == Role::Doctor {
			users::find_user(&self.db.pool, patient_id)
				.await?
				.filter(|user| user.role == Role::Patient.as_str())
				.ok_or_else(|| Error::not_found("Patient not found."))?;
		}

		Ok(patient_id)
	}

	async fn check_record_access(&self, principal: &Principal, patient_id: Uuid) -> Result<()> {
		let allowed = match principal.role {
			Role::Patient => principal.user_id == patient_id,
			Role::Doctor =>
				appointments::has_care_relationship(&self.db.pool, principal.user_id, patient_id)
					.await?,
		};

		if !allowed {
			return Err(Error::forbidden("You do not have access to this patient's records."));
		}

		Ok(())
	}
}

fn validate_file_url(raw: &str) -> Result<String> {
	let url = crate::required_text("file_url", raw, MAX_URL_CHARS)?;

	if !(url.starts_with("http://") || url.starts_with("https://")) {
		return Err(Error::invalid("file_url must start with http:// or https://."));
	}

	Ok(url)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn file_url_must_be_http() {
		assert_eq!(
			validate_file_url(" https://files.example.com/x.pdf ").expect("valid"),
			"https://files.example.com/x.pdf"
		);
		assert!(validate_file_url("").is_err());
		assert!(validate_file_url("ftp://files.example.com/x.pdf").is_err());
	}

	#[test]
	fn view_hides_deletion_fields() {
		let now = OffsetDateTime::UNIX_EPOCH;
		let view = RecordView::from(MedicalRecord {
			record_id: Uuid::nil(),
			patient_id: Uuid::nil(),
			record_type: "prescription".to_string(),
			title: "Amoxicillin".to_string(),
			file_url: "https://files.example.com/rx.pdf".to_string(),
			notes: None,
			data: None,
			uploaded_by: Uuid::nil(),
			last_updated_by: None,
			is_deleted: false,
			deleted_by: None,
			deleted_at: None,
			created_at: now,
			updated_at: now,
		});
		let json = serde_json::to_value(&view).expect("serialize");

		assert!(json.get("is_deleted").is_none());
		assert!(json.get("deleted_at").is_none());
		assert_eq!(json["record_type"], "prescription");
	}
}
