//! Booking, rescheduling and the appointment status machine.
//!
//! Writes that can create a confirmed booking take a row lock on the doctor first, so two
//! concurrent bookings for the same doctor run one after the other. The partial unique indexes on
//! confirmed slots stay as the last guard and surface as conflicts.

use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use time::{Date, OffsetDateTime, Time, UtcOffset};
use uuid::Uuid;

use medilink_domain::{
	notification::NotificationKind,
	role::Role,
	schedule,
	status::{self, AppointmentStatus, TransitionOutcome},
};
use medilink_storage::{
	appointments::{self, AppointmentFilter, Participant},
	availability,
	models::Appointment,
	notifications as notification_queue,
	users,
};

use crate::{
	Error, MedilinkService, Principal, Result,
	notifications::{self, NewNotification},
};

const MAX_NOTES_CHARS: usize = 2_000;
const DEFAULT_LIMIT: u32 = 100;
const MAX_LIMIT: u32 = 500;
const NOT_FOUND: &str = "Appointment not found.";

#[derive(Clone, Debug, Deserialize)]
pub struct BookRequest {
	pub doctor_id: Uuid,
	/// `YYYY-MM-DD` on the clinic's wall clock.
	pub date: String,
	/// `HH:MM`, 24-hour.
	pub time: String,
	#[serde(default)]
	pub notes: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct AppointmentListRequest {
	pub status: Option<String>,
	pub from: Option<String>,
	pub to: Option<String>,
	pub limit: Option<u32>,
}

/// Absent fields keep their current value.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct UpdateAppointmentRequest {
	pub date: Option<String>,
	pub time: Option<String>,
	pub notes: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct StatusChangeRequest {
	pub status: AppointmentStatus,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct AppointmentView {
	pub appointment_id: Uuid,
	pub patient_id: Uuid,
	pub doctor_id: Uuid,
	pub date: String,
	pub time: String,
	#[serde(with = "crate::time_serde")]
	pub starts_at: OffsetDateTime,
	pub status: AppointmentStatus,
	pub notes: String,
	#[serde(with = "crate::time_serde")]
	pub created_at: OffsetDateTime,
	#[serde(with = "crate::time_serde")]
	pub updated_at: OffsetDateTime,
}
impl AppointmentView {
	fn from_row(row: Appointment, offset: UtcOffset) -> Result<Self> {
		let status = stored_status(&row)?;

		Ok(Self {
			appointment_id: row.appointment_id,
			patient_id: row.patient_id,
			doctor_id: row.doctor_id,
			date: schedule::format_date(row.appointment_date),
			time: schedule::format_time(row.appointment_time),
			starts_at: schedule::start_instant(row.appointment_date, row.appointment_time, offset),
			status,
			notes: row.notes,
			created_at: row.created_at,
			updated_at: row.updated_at,
		})
	}
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct AppointmentListResponse {
	pub appointments: Vec<AppointmentView>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct StatusChangeResponse {
	pub appointment: AppointmentView,
	pub changed: bool,
}

impl MedilinkService {
	pub async fn book_appointment(
		&self,
		principal: &Principal,
		req: BookRequest,
	) -> Result<AppointmentView> {
		principal.require(Role::Patient, "book appointments")?;

		let now = OffsetDateTime::now_utc();
		let offset = self.clinic_offset()?;
		let date = schedule::parse_date(&req.date)?;
		let time = schedule::parse_time(&req.time)?;
		let notes = crate::optional_text("notes", req.notes.as_deref(), MAX_NOTES_CHARS)?
			.unwrap_or_default();

		schedule::check_booking_window(
			schedule::start_instant(date, time, offset),
			now,
			self.cfg.scheduling.max_advance_days,
		)?;

		let mut tx = self.db.pool.begin().await?;
		let doctor = users::lock_user(&mut *tx, req.doctor_id)
			.await?
			.filter(|user| user.role == Role::Doctor.as_str())
			.ok_or_else(|| Error::not_found("Doctor not found."))?;

		self.check_slot_free(&mut tx, doctor.user_id, principal.user_id, date, time, None).await?;

		let appointment = Appointment {
			appointment_id: Uuid::new_v4(),
			patient_id: principal.user_id,
			doctor_id: doctor.user_id,
			appointment_date: date,
			appointment_time: time,
			status: AppointmentStatus::Confirmed.as_str().to_string(),
			notes,
			created_at: now,
			updated_at: now,
		};

		appointments::insert_appointment(&mut *tx, &appointment).await?;

		let patient_name = display_name(&mut tx, principal.user_id).await?;

		notifications::enqueue(
			&mut *tx,
			NewNotification {
				user_id: doctor.user_id,
				appointment_id: Some(appointment.appointment_id),
				kind: NotificationKind::AppointmentBooked,
				title: "New appointment".to_string(),
				body: format!(
					"{patient_name} booked an appointment on {} at {}.",
					schedule::format_date(date),
					schedule::format_time(time)
				),
				dedupe_key: None,
			},
			now,
		)
		.await?;

		tx.commit().await?;

		tracing::info!(
			appointment_id = %appointment.appointment_id,
			doctor_id = %appointment.doctor_id,
			patient_id = %appointment.patient_id,
			"Booked appointment."
		);

		AppointmentView::from_row(appointment, offset)
	}

	pub async fn get_appointment(
		&self,
		principal: &Principal,
		appointment_id: Uuid,
	) -> Result<AppointmentView> {
		let row = appointments::find_appointment(&self.db.pool, appointment_id)
			.await?
			.filter(|row| is_participant(principal, row))
			.ok_or_else(|| Error::not_found(NOT_FOUND))?;

		AppointmentView::from_row(row, self.clinic_offset()?)
	}

	/// The caller's appointments, newest first.
	pub async fn list_appointments(
		&self,
		principal: &Principal,
		req: AppointmentListRequest,
	) -> Result<AppointmentListResponse> {
		let offset = self.clinic_offset()?;
		let status = req
			.status
			.as_deref()
			.map(|raw| {
				AppointmentStatus::parse(raw)
					.ok_or_else(|| Error::invalid(format!("Unknown appointment status {raw:?}.")))
			})
			.transpose()?;
		let from = req.from.as_deref().map(schedule::parse_date).transpose()?;
		let to = req.to.as_deref().map(schedule::parse_date).transpose()?;

		if let (Some(from), Some(to)) = (from, to)
			&& from > to
		{
			return Err(Error::invalid("from must not be after to."));
		}

		let participant = match principal.role {
			Role::Patient => Participant::Patient(principal.user_id),
			Role::Doctor => Participant::Doctor(principal.user_id),
		};
		let filter = AppointmentFilter {
			participant,
			status: status.map(AppointmentStatus::as_str),
			from,
			to,
			limit: crate::page_limit(req.limit, DEFAULT_LIMIT, MAX_LIMIT),
		};
		let rows = appointments::list_appointments(&self.db.pool, &filter).await?;
		let appointments = rows
			.into_iter()
			.map(|row| AppointmentView::from_row(row, offset))
			.collect::<Result<Vec<_>>>()?;

		Ok(AppointmentListResponse { appointments })
	}

	/// Reschedules and/or edits the notes of a confirmed appointment.
	pub async fn update_appointment(
		&self,
		principal: &Principal,
		appointment_id: Uuid,
		req: UpdateAppointmentRequest,
	) -> Result<AppointmentView> {
		if req.date.is_none() && req.time.is_none() && req.notes.is_none() {
			return Err(Error::invalid("Provide date, time or notes to update."));
		}

		let now = OffsetDateTime::now_utc();
		let offset = self.clinic_offset()?;
		let mut tx = self.db.pool.begin().await?;
		let current = appointments::lock_appointment(&mut *tx, appointment_id)
			.await?
			.filter(|row| is_participant(principal, row))
			.ok_or_else(|| Error::not_found(NOT_FOUND))?;

		if stored_status(&current)? != AppointmentStatus::Confirmed {
			return Err(Error::conflict("Only confirmed appointments can be changed."));
		}

		let date = match req.date.as_deref() {
			Some(raw) => schedule::parse_date(raw)?,
			None => current.appointment_date,
		};
		let time = match req.time.as_deref() {
			Some(raw) => schedule::parse_time(raw)?,
			None => current.appointment_time,
		};
		let notes = match req.notes.as_deref() {
			Some(raw) => crate::optional_text("notes", Some(raw), MAX_NOTES_CHARS)?.unwrap_or_default(),
			None => current.notes.clone(),
		};
		let moved = date != current.appointment_date || time != current.appointment_time;

		if moved {
			schedule::check_booking_window(
				schedule::start_instant(date, time, offset),
				now,
				self.cfg.scheduling.max_advance_days,
			)?;
			users::lock_user(&mut *tx, current.doctor_id)
				.await?
				.ok_or_else(|| Error::not_found("Doctor not found."))?;

			self.check_slot_free(
				&mut tx,
				current.doctor_id,
				current.patient_id,
				date,
				time,
				Some(current.appointment_id),
			)
			.await?;
		}

		let updated =
			appointments::update_schedule(&mut *tx, appointment_id, date, time, &notes, now).await?;

		if moved {
			withdraw_reminders(&mut tx, appointment_id).await?;

			let actor_name = display_name(&mut tx, principal.user_id).await?;

			notifications::enqueue(
				&mut *tx,
				NewNotification {
					user_id: counterpart(principal, &current),
					appointment_id: Some(appointment_id),
					kind: NotificationKind::AppointmentRescheduled,
					title: "Appointment rescheduled".to_string(),
					body: format!(
						"{actor_name} moved your appointment from {} at {} to {} at {}.",
						schedule::format_date(current.appointment_date),
						schedule::format_time(current.appointment_time),
						schedule::format_date(date),
						schedule::format_time(time)
					),
					dedupe_key: None,
				},
				now,
			)
			.await?;
		}

		tx.commit().await?;

		tracing::info!(%appointment_id, moved, "Updated appointment.");

		AppointmentView::from_row(updated, offset)
	}

	pub async fn change_appointment_status(
		&self,
		principal: &Principal,
		appointment_id: Uuid,
		req: StatusChangeRequest,
	) -> Result<StatusChangeResponse> {
		let now = OffsetDateTime::now_utc();
		let offset = self.clinic_offset()?;
		let mut tx = self.db.pool.begin().await?;
		let current = appointments::lock_appointment(&mut *tx, appointment_id)
			.await?
			.filter(|row| is_participant(principal, row))
			.ok_or_else(|| Error::not_found(NOT_FOUND))?;
		let start = schedule::start_instant(current.appointment_date, current.appointment_time, offset);
		let outcome =
			status::plan_transition(stored_status(&current)?, req.status, principal.role, start, now)?;
		let TransitionOutcome::Changed(target) = outcome else {
			tx.commit().await?;

			return Ok(StatusChangeResponse {
				appointment: AppointmentView::from_row(current, offset)?,
				changed: false,
			});
		};
		let updated =
			appointments::update_status(&mut *tx, appointment_id, target.as_str(), now).await?;

		withdraw_reminders(&mut tx, appointment_id).await?;
		let when = format!(
			"{} at {}",
			schedule::format_date(current.appointment_date),
			schedule::format_time(current.appointment_time)
		);
		let notification = match target {
			AppointmentStatus::Cancelled => {
				let actor_name = display_name(&mut tx, principal.user_id).await?;

				Some(NewNotification {
					user_id: counterpart(principal, &current),
					appointment_id: Some(appointment_id),
					kind: NotificationKind::AppointmentCancelled,
					title: "Appointment cancelled".to_string(),
					body: format!("{actor_name} cancelled the appointment on {when}."),
					dedupe_key: None,
				})
			},
			AppointmentStatus::Completed => Some(NewNotification {
				user_id: current.patient_id,
				appointment_id: Some(appointment_id),
				kind: NotificationKind::AppointmentCompleted,
				title: "Appointment completed".to_string(),
				body: format!("Your appointment on {when} is marked completed."),
				dedupe_key: None,
			}),
			AppointmentStatus::Confirmed => None,
		};

		if let Some(notification) = notification {
			notifications::enqueue(&mut *tx, notification, now).await?;
		}

		tx.commit().await?;

		tracing::info!(%appointment_id, status = target.as_str(), "Changed appointment status.");

		Ok(StatusChangeResponse { appointment: AppointmentView::from_row(updated, offset)?, changed: true })
	}

	/// Availability and clash checks shared by booking and rescheduling.
	async fn check_slot_free(
		&self,
		conn: &mut PgConnection,
		doctor_id: Uuid,
		patient_id: Uuid,
		date: Date,
		time: Time,
		exclude: Option<Uuid>,
	) -> Result<()> {
		if self.cfg.scheduling.require_availability
			&& !availability::slot_exists(&mut *conn, doctor_id, date, time).await?
		{
			return Err(Error::conflict("The doctor has not published that time slot."));
		}

		let clash =
			appointments::find_slot_clash(&mut *conn, doctor_id, patient_id, date, time, exclude)
				.await?;

		if clash.doctor_busy {
			return Err(Error::conflict("The doctor is already booked at that time."));
		}
		if clash.patient_busy {
			return Err(Error::conflict("The patient already has an appointment at that time."));
		}

		Ok(())
	}
}

fn is_participant(principal: &Principal, row: &Appointment) -> bool {
	match principal.role {
		Role::Patient => row.patient_id == principal.user_id,
		Role::Doctor => row.doctor_id == principal.user_id,
	}
}

fn counterpart(principal: &Principal, row: &Appointment) -> Uuid {
	if principal.user_id == row.patient_id { row.doctor_id } else { row.patient_id }
}

fn stored_status(row: &Appointment) -> Result<AppointmentStatus> {
	AppointmentStatus::parse(&row.status).ok_or_else(|| Error::Storage {
		message: format!("Appointment {} has unknown status {:?}.", row.appointment_id, row.status),
	})
}

/// Drops reminders that were queued for the appointment's old slot and are not yet delivered.
async fn withdraw_reminders(conn: &mut PgConnection, appointment_id: Uuid) -> Result<()> {
	let withdrawn = notification_queue::withdraw_undelivered(
		conn,
		appointment_id,
		NotificationKind::AppointmentReminder.as_str(),
	)
	.await?;

	if withdrawn > 0 {
		tracing::debug!(%appointment_id, withdrawn, "Withdrew pending reminders.");
	}

	Ok(())
}

async fn display_name(conn: &mut PgConnection, user_id: Uuid) -> Result<String> {
	let name = users::find_user(conn, user_id)
		.await?
		.map(|user| user.name)
		.unwrap_or_else(|| "Someone".to_string());

	Ok(name)
}
