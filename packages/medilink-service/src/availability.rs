use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use medilink_domain::{role::Role, schedule};
use medilink_storage::{appointments, availability, users};

use crate::{Error, MedilinkService, Principal, Result};

#[derive(Clone, Debug, Deserialize)]
pub struct SetAvailabilityRequest {
	/// `YYYY-MM-DD` on the clinic's wall clock.
	pub date: String,
	/// `HH:MM` start times. Duplicates are ignored.
	pub slots: Vec<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct AvailabilityResponse {
	pub doctor_id: Uuid,
	pub date: String,
	pub slots: Vec<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct OpenSlotsResponse {
	pub doctor_id: Uuid,
	pub date: String,
	pub open_slots: Vec<String>,
	pub published_count: usize,
}

impl MedilinkService {
	/// Replaces the calling doctor's slots for one date. An empty list clears the date.
	pub async fn set_availability(
		&self,
		principal: &Principal,
		req: SetAvailabilityRequest,
	) -> Result<AvailabilityResponse> {
		principal.require(Role::Doctor, "publish availability")?;

		let now = OffsetDateTime::now_utc();
		let date = schedule::parse_date(&req.date)?;

		schedule::check_availability_date(date, schedule::clinic_today(now, self.clinic_offset()?))?;

		let slots = schedule::normalize_slots(&req.slots)?;
		let mut tx = self.db.pool.begin().await?;

		users::lock_user(&mut *tx, principal.user_id)
			.await?
			.ok_or_else(|| Error::not_found("Doctor not found."))?;
		availability::replace_slots(&mut tx, principal.user_id, date, &slots).await?;

		tx.commit().await?;

		tracing::info!(
			doctor_id = %principal.user_id,
			date = %schedule::format_date(date),
			slots = slots.len(),
			"Replaced availability."
		);

		Ok(AvailabilityResponse {
			doctor_id: principal.user_id,
			date: schedule::format_date(date),
			slots: slots.into_iter().map(schedule::format_time).collect(),
		})
	}

	/// Published slots of `doctor_id` on `date` that are neither booked nor already started.
	pub async fn open_slots(&self, doctor_id: Uuid, date: &str) -> Result<OpenSlotsResponse> {
		let now = OffsetDateTime::now_utc();
		let offset = self.clinic_offset()?;
		let date = schedule::parse_date(date)?;
		let doctor = users::find_user(&self.db.pool, doctor_id)
			.await?
			.filter(|user| user.role == Role::Doctor.as_str())
			.ok_or_else(|| Error::not_found("Doctor not found."))?;
		let published = availability::list_slots(&self.db.pool, doctor.user_id, date).await?;
		let taken =
			appointments::confirmed_times_for_doctor(&self.db.pool, doctor.user_id, date).await?;
		let open_slots = schedule::open_slots(&published, &taken)
			.into_iter()
			.filter(|time| schedule::start_instant(date, *time, offset) > now)
			.map(schedule::format_time)
			.collect();

		Ok(OpenSlotsResponse {
			doctor_id: doctor.user_id,
			date: schedule::format_date(date),
			open_slots,
			published_count: published.len(),
		})
	}
}
