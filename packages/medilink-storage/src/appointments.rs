use sqlx::{Executor, Postgres, QueryBuilder};
use time::{Date, OffsetDateTime, Time};
use uuid::Uuid;

use crate::{Error, Result, models::Appointment};

const APPOINTMENT_COLUMNS: &str = "\
appointment_id, patient_id, doctor_id, appointment_date, appointment_time, status, notes, \
created_at, updated_at";
const SLOT_TAKEN: &str = "That time slot is already booked.";

/// Which participant column a listing filters on.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Participant {
	Patient(Uuid),
	Doctor(Uuid),
}

#[derive(Clone, Debug)]
pub struct AppointmentFilter<'a> {
	pub participant: Participant,
	pub status: Option<&'a str>,
	pub from: Option<Date>,
	pub to: Option<Date>,
	pub limit: i64,
}

/// Confirmed bookings that collide with a proposed slot.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, sqlx::FromRow)]
pub struct SlotClash {
	pub doctor_busy: bool,
	pub patient_busy: bool,
}

pub async fn insert_appointment<'e, E>(executor: E, appointment: &Appointment) -> Result<()>
where
	E: Executor<'e, Database = Postgres>,
{
	sqlx::query(
		"\
INSERT INTO appointments (
	appointment_id,
	patient_id,
	doctor_id,
	appointment_date,
	appointment_time,
	status,
	notes,
	created_at,
	updated_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
	)
	.bind(appointment.appointment_id)
	.bind(appointment.patient_id)
	.bind(appointment.doctor_id)
	.bind(appointment.appointment_date)
	.bind(appointment.appointment_time)
	.bind(appointment.status.as_str())
	.bind(appointment.notes.as_str())
	.bind(appointment.created_at)
	.bind(appointment.updated_at)
	.execute(executor)
	.await
	.map_err(|err| Error::unique_violation_as_conflict(err, SLOT_TAKEN))?;

	Ok(())
}

pub async fn find_appointment<'e, E>(executor: E, appointment_id: Uuid) -> Result<Option<Appointment>>
where
	E: Executor<'e, Database = Postgres>,
{
	let sql = format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE appointment_id = $1");
	let appointment = sqlx::query_as::<_, Appointment>(&sql)
		.bind(appointment_id)
		.fetch_optional(executor)
		.await?;

	Ok(appointment)
}

pub async fn lock_appointment<'e, E>(executor: E, appointment_id: Uuid) -> Result<Option<Appointment>>
where
	E: Executor<'e, Database = Postgres>,
{
	let sql = format!(
		"SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE appointment_id = $1 FOR NO KEY UPDATE"
	);
	let appointment = sqlx::query_as::<_, Appointment>(&sql)
		.bind(appointment_id)
		.fetch_optional(executor)
		.await?;

	Ok(appointment)
}

/// Checks both participants for a confirmed booking at `date` `time`, ignoring `exclude`.
pub async fn find_slot_clash<'e, E>(
	executor: E,
	doctor_id: Uuid,
	patient_id: Uuid,
	date: Date,
	time: Time,
	exclude: Option<Uuid>,
) -> Result<SlotClash>
where
	E: Executor<'e, Database = Postgres>,
{
	let clash = sqlx::query_as::<_, SlotClash>(
		"\
SELECT
	EXISTS (
		SELECT 1
		FROM appointments
		WHERE doctor_id = $1
			AND appointment_date = $3
			AND appointment_time = $4
			AND status = 'confirmed'
			AND ($5::uuid IS NULL OR appointment_id <> $5)
	) AS doctor_busy,
	EXISTS (
		SELECT 1
		FROM appointments
		WHERE patient_id = $2
			AND appointment_date = $3
			AND appointment_time = $4
			AND status = 'confirmed'
			AND ($5::uuid IS NULL OR appointment_id <> $5)
	) AS patient_busy",
	)
	.bind(doctor_id)
	.bind(patient_id)
	.bind(date)
	.bind(time)
	.bind(exclude)
	.fetch_one(executor)
	.await?;

	Ok(clash)
}

/// Times on `date` already held by a confirmed booking with `doctor_id`.
pub async fn confirmed_times_for_doctor<'e, E>(
	executor: E,
	doctor_id: Uuid,
	date: Date,
) -> Result<Vec<Time>>
where
	E: Executor<'e, Database = Postgres>,
{
	let times = sqlx::query_scalar::<_, Time>(
		"\
SELECT appointment_time
FROM appointments
WHERE doctor_id = $1 AND appointment_date = $2 AND status = 'confirmed'
ORDER BY appointment_time",
	)
	.bind(doctor_id)
	.bind(date)
	.fetch_all(executor)
	.await?;

	Ok(times)
}

/// Newest first, matching the `(participant, date DESC)` indexes.
pub async fn list_appointments<'e, E>(
	executor: E,
	filter: &AppointmentFilter<'_>,
) -> Result<Vec<Appointment>>
where
	E: Executor<'e, Database = Postgres>,
{
	let mut builder = QueryBuilder::<Postgres>::new("SELECT ");

	builder.push(APPOINTMENT_COLUMNS);
	builder.push(" FROM appointments WHERE ");

	match filter.participant {
		Participant::Patient(user_id) => {
			builder.push("patient_id = ");
			builder.push_bind(user_id);
		},
		Participant::Doctor(user_id) => {
			builder.push("doctor_id = ");
			builder.push_bind(user_id);
		},
	}

	if let Some(status) = filter.status {
		builder.push(" AND status = ");
		builder.push_bind(status);
	}
	if let Some(from) = filter.from {
		builder.push(" AND appointment_date >= ");
		builder.push_bind(from);
	}
	if let Some(to) = filter.to {
		builder.push(" AND appointment_date <= ");
		builder.push_bind(to);
	}

	builder.push(" ORDER BY appointment_date DESC, appointment_time DESC, appointment_id LIMIT ");
	builder.push_bind(filter.limit);

	let appointments = builder.build_query_as::<Appointment>().fetch_all(executor).await?;

	Ok(appointments)
}

pub async fn update_status<'e, E>(
	executor: E,
	appointment_id: Uuid,
	status: &str,
	now: OffsetDateTime,
) -> Result<Appointment>
where
	E: Executor<'e, Database = Postgres>,
{
	let sql = format!(
		"\
UPDATE appointments
SET status = $2, updated_at = $3
WHERE appointment_id = $1
RETURNING {APPOINTMENT_COLUMNS}"
	);
	let appointment = sqlx::query_as::<_, Appointment>(&sql)
		.bind(appointment_id)
		.bind(status)
		.bind(now)
		.fetch_optional(executor)
		.await?
		.ok_or_else(|| Error::NotFound(format!("appointment {appointment_id}")))?;

	Ok(appointment)
}

/// Moves an appointment and replaces its notes.
pub async fn update_schedule<'e, E>(
	executor: E,
	appointment_id: Uuid,
	date: Date,
	time: Time,
	notes: &str,
	now: OffsetDateTime,
) -> Result<Appointment>
where
	E: Executor<'e, Database = Postgres>,
{
	let sql = format!(
		"\
UPDATE appointments
SET appointment_date = $2, appointment_time = $3, notes = $4, updated_at = $5
WHERE appointment_id = $1
RETURNING {APPOINTMENT_COLUMNS}"
	);
	let appointment = sqlx::query_as::<_, Appointment>(&sql)
		.bind(appointment_id)
		.bind(date)
		.bind(time)
		.bind(notes)
		.bind(now)
		.fetch_optional(executor)
		.await
		.map_err(|err| Error::unique_violation_as_conflict(err, SLOT_TAKEN))?
		.ok_or_else(|| Error::NotFound(format!("appointment {appointment_id}")))?;

	Ok(appointment)
}

/// Confirmed appointments dated between `from` and `to` inclusive, soonest first.
pub async fn list_confirmed_between<'e, E>(
	executor: E,
	from: Date,
	to: Date,
) -> Result<Vec<Appointment>>
where
	E: Executor<'e, Database = Postgres>,
{
	let sql = format!(
		"\
SELECT {APPOINTMENT_COLUMNS}
FROM appointments
WHERE status = 'confirmed' AND appointment_date BETWEEN $1 AND $2
ORDER BY appointment_date, appointment_time, appointment_id"
	);
	let appointments =
		sqlx::query_as::<_, Appointment>(&sql).bind(from).bind(to).fetch_all(executor).await?;

	Ok(appointments)
}

/// True when the two users share at least one appointment in any status.
pub async fn has_care_relationship<'e, E>(
	executor: E,
	doctor_id: Uuid,
	patient_id: Uuid,
) -> Result<bool>
where
	E: Executor<'e, Database = Postgres>,
{
	let exists = sqlx::query_scalar::<_, bool>(
		"\
SELECT EXISTS (
	SELECT 1
	FROM appointments
	WHERE doctor_id = $1 AND patient_id = $2
)",
	)
	.bind(doctor_id)
	.bind(patient_id)
	.fetch_one(executor)
	.await?;

	Ok(exists)
}
