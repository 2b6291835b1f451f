use sqlx::{Executor, Postgres};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{Error, Result, models::User};

const USER_COLUMNS: &str = "\
user_id, name, email, password_hash, role, phone, specialization, created_at, updated_at";

pub async fn insert_user<'e, E>(executor: E, user: &User) -> Result<()>
where
	E: Executor<'e, Database = Postgres>,
{
	sqlx::query(
		"\
INSERT INTO users (
	user_id,
	name,
	email,
	password_hash,
	role,
	phone,
	specialization,
	created_at,
	updated_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
	)
	.bind(user.user_id)
	.bind(user.name.as_str())
	.bind(user.email.as_str())
	.bind(user.password_hash.as_str())
	.bind(user.role.as_str())
	.bind(user.phone.as_deref())
	.bind(user.specialization.as_deref())
	.bind(user.created_at)
	.bind(user.updated_at)
	.execute(executor)
	.await
	.map_err(|err| Error::unique_violation_as_conflict(err, "Email is already registered."))?;

	Ok(())
}

pub async fn find_user<'e, E>(executor: E, user_id: Uuid) -> Result<Option<User>>
where
	E: Executor<'e, Database = Postgres>,
{
	let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = $1");
	let user = sqlx::query_as::<_, User>(&sql).bind(user_id).fetch_optional(executor).await?;

	Ok(user)
}

/// Emails are matched case-insensitively.
pub async fn find_user_by_email<'e, E>(executor: E, email: &str) -> Result<Option<User>>
where
	E: Executor<'e, Database = Postgres>,
{
	let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower($1)");
	let user = sqlx::query_as::<_, User>(&sql).bind(email).fetch_optional(executor).await?;

	Ok(user)
}

/// Locks the user row for the rest of the transaction.
///
/// Booking takes this lock on the doctor so concurrent bookings for the same doctor serialize.
pub async fn lock_user<'e, E>(executor: E, user_id: Uuid) -> Result<Option<User>>
where
	E: Executor<'e, Database = Postgres>,
{
	let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = $1 FOR NO KEY UPDATE");
	let user = sqlx::query_as::<_, User>(&sql).bind(user_id).fetch_optional(executor).await?;

	Ok(user)
}

pub async fn list_doctors<'e, E>(executor: E, specialization: Option<&str>) -> Result<Vec<User>>
where
	E: Executor<'e, Database = Postgres>,
{
	let sql = format!(
		"\
SELECT {USER_COLUMNS}
FROM users
WHERE role = 'doctor'
	AND ($1::text IS NULL OR lower(specialization) = lower($1))
ORDER BY name, user_id"
	);
	let doctors = sqlx::query_as::<_, User>(&sql).bind(specialization).fetch_all(executor).await?;

	Ok(doctors)
}

/// Patients who have booked at least one appointment with `doctor_id`.
pub async fn list_patients_of_doctor<'e, E>(executor: E, doctor_id: Uuid) -> Result<Vec<User>>
where
	E: Executor<'e, Database = Postgres>,
{
	let sql = format!(
		"\
SELECT {USER_COLUMNS}
FROM users
WHERE role = 'patient'
	AND user_id IN (SELECT patient_id FROM appointments WHERE doctor_id = $1)
ORDER BY name, user_id"
	);
	let patients = sqlx::query_as::<_, User>(&sql).bind(doctor_id).fetch_all(executor).await?;

	Ok(patients)
}

pub struct ProfileUpdate<'a> {
	pub name: Option<&'a str>,
	pub phone: Option<&'a str>,
	pub specialization: Option<&'a str>,
}

/// Applies the fields present in `update` and returns the stored row.
pub async fn update_profile<'e, E>(
	executor: E,
	user_id: Uuid,
	update: &ProfileUpdate<'_>,
	now: OffsetDateTime,
) -> Result<Option<User>>
where
	E: Executor<'e, Database = Postgres>,
{
	let sql = format!(
		"\
UPDATE users
SET
	name = COALESCE($2, name),
	phone = COALESCE($3, phone),
	specialization = COALESCE($4, specialization),
	updated_at = $5
WHERE user_id = $1
RETURNING {USER_COLUMNS}"
	);
	let user = sqlx::query_as::<_, User>(&sql)
		.bind(user_id)
		.bind(update.name)
		.bind(update.phone)
		.bind(update.specialization)
		.bind(now)
		.fetch_optional(executor)
		.await?;

	Ok(user)
}
