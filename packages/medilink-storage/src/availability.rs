use sqlx::{Executor, PgConnection, Postgres, QueryBuilder};
use time::{Date, Time};
use uuid::Uuid;

use crate::Result;

/// Replaces every published slot of `doctor_id` on `date` with `slots`.
///
/// Call inside a transaction so readers never observe a half-written day.
pub async fn replace_slots(
	conn: &mut PgConnection,
	doctor_id: Uuid,
	date: Date,
	slots: &[Time],
) -> Result<()> {
	sqlx::query("DELETE FROM availability_slots WHERE doctor_id = $1 AND slot_date = $2")
		.bind(doctor_id)
		.bind(date)
		.execute(&mut *conn)
		.await?;

	if slots.is_empty() {
		return Ok(());
	}

	let mut builder =
		QueryBuilder::<Postgres>::new("INSERT INTO availability_slots (doctor_id, slot_date, slot_time) ");

	builder.push_values(slots.iter(), |mut row, slot| {
		row.push_bind(doctor_id).push_bind(date).push_bind(*slot);
	});
	builder.push(" ON CONFLICT DO NOTHING");
	builder.build().execute(&mut *conn).await?;

	Ok(())
}

pub async fn list_slots<'e, E>(executor: E, doctor_id: Uuid, date: Date) -> Result<Vec<Time>>
where
	E: Executor<'e, Database = Postgres>,
{
	let slots = sqlx::query_scalar::<_, Time>(
		"\
SELECT slot_time
FROM availability_slots
WHERE doctor_id = $1 AND slot_date = $2
ORDER BY slot_time",
	)
	.bind(doctor_id)
	.bind(date)
	.fetch_all(executor)
	.await?;

	Ok(slots)
}

pub async fn slot_exists<'e, E>(executor: E, doctor_id: Uuid, date: Date, time: Time) -> Result<bool>
where
	E: Executor<'e, Database = Postgres>,
{
	let exists = sqlx::query_scalar::<_, bool>(
		"\
SELECT EXISTS (
	SELECT 1
	FROM availability_slots
	WHERE doctor_id = $1 AND slot_date = $2 AND slot_time = $3
)",
	)
	.bind(doctor_id)
	.bind(date)
	.bind(time)
	.fetch_one(executor)
	.await?;

	Ok(exists)
}
