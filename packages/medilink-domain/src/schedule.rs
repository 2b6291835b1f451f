//! Calendar rules for availability slots and bookings.
//!
//! Appointment dates and times are wall-clock values in the clinic's UTC offset. They are stored
//! and exchanged as `YYYY-MM-DD` and `HH:MM` and only turned into instants when compared with the
//! current time.

use std::collections::BTreeSet;

use time::{
	Date, Duration, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset,
	format_description::BorrowedFormatItem, macros::format_description,
};

const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");
const TIME_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[hour]:[minute]");

/// Upper bound on slots a doctor may publish for a single date.
pub const MAX_SLOTS_PER_DAY: usize = 96;

const SECONDS_PER_DAY: i64 = 86_400;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
	#[error("Invalid date {value:?}; expected YYYY-MM-DD.")]
	InvalidDate { value: String },
	#[error("Invalid time {value:?}; expected HH:MM.")]
	InvalidTime { value: String },
	#[error("UTC offset of {minutes} minutes is out of range.")]
	InvalidOffset { minutes: i32 },
	#[error("Appointments must be booked in the future.")]
	InPast,
	#[error("Appointments can be booked at most {max_advance_days} days ahead.")]
	BeyondHorizon { max_advance_days: i64 },
	#[error("Availability cannot be published for a past date.")]
	PastDate,
	#[error("At most {max} slots can be published per date.")]
	TooManySlots { max: usize },
	#[error("Reminder lead of {minutes} minutes is out of range.")]
	InvalidLead { minutes: i64 },
}

pub fn parse_date(raw: &str) -> Result<Date, ScheduleError> {
	Date::parse(raw.trim(), DATE_FORMAT)
		.map_err(|_| ScheduleError::InvalidDate { value: raw.to_string() })
}

pub fn parse_time(raw: &str) -> Result<Time, ScheduleError> {
	Time::parse(raw.trim(), TIME_FORMAT)
		.map_err(|_| ScheduleError::InvalidTime { value: raw.to_string() })
}

pub fn format_date(date: Date) -> String {
	date.format(DATE_FORMAT).unwrap_or_else(|_| date.to_string())
}

pub fn format_time(time: Time) -> String {
	time.format(TIME_FORMAT).unwrap_or_else(|_| time.to_string())
}

pub fn clinic_offset(utc_offset_minutes: i32) -> Result<UtcOffset, ScheduleError> {
	UtcOffset::from_whole_seconds(utc_offset_minutes.saturating_mul(60))
		.map_err(|_| ScheduleError::InvalidOffset { minutes: utc_offset_minutes })
}

/// The instant an appointment at `date` `time` (clinic wall clock) starts.
pub fn start_instant(date: Date, time: Time, offset: UtcOffset) -> OffsetDateTime {
	PrimitiveDateTime::new(date, time).assume_offset(offset)
}

/// Today's date on the clinic's wall clock.
pub fn clinic_today(now: OffsetDateTime, offset: UtcOffset) -> Date {
	now.to_offset(offset).date()
}

pub fn check_booking_window(
	start: OffsetDateTime,
	now: OffsetDateTime,
	max_advance_days: i64,
) -> Result<(), ScheduleError> {
	if start <= now {
		return Err(ScheduleError::InPast);
	}
	// A horizon too large to represent does not limit anything.
	if let Some(seconds) = max_advance_days.checked_mul(SECONDS_PER_DAY)
		&& start - now > Duration::seconds(seconds)
	{
		return Err(ScheduleError::BeyondHorizon { max_advance_days });
	}

	Ok(())
}

pub fn check_availability_date(date: Date, today: Date) -> Result<(), ScheduleError> {
	if date < today {
		return Err(ScheduleError::PastDate);
	}

	Ok(())
}

/// Parses, deduplicates and sorts the slot times a doctor publishes for one date.
pub fn normalize_slots<S>(raw: &[S]) -> Result<Vec<Time>, ScheduleError>
where
	S: AsRef<str>,
{
	let mut slots = BTreeSet::new();

	for value in raw {
		slots.insert(parse_time(value.as_ref())?);
	}

	if slots.len() > MAX_SLOTS_PER_DAY {
		return Err(ScheduleError::TooManySlots { max: MAX_SLOTS_PER_DAY });
	}

	Ok(slots.into_iter().collect())
}

/// Published slots minus the times already taken, in ascending order.
pub fn open_slots(published: &[Time], taken: &[Time]) -> Vec<Time> {
	let taken: BTreeSet<&Time> = taken.iter().collect();
	let mut open: Vec<Time> =
		published.iter().filter(|slot| !taken.contains(slot)).copied().collect();

	open.sort();
	open.dedup();

	open
}

/// Converts the configured reminder lead into a duration, rejecting values that do not fit.
pub fn reminder_lead(minutes: i64) -> Result<Duration, ScheduleError> {
	match minutes.checked_mul(60) {
		Some(seconds) if seconds > 0 => Ok(Duration::seconds(seconds)),
		_ => Err(ScheduleError::InvalidLead { minutes }),
	}
}

/// A reminder is due once the appointment starts within `lead` of `now` and has not started yet.
pub fn reminder_due(start: OffsetDateTime, now: OffsetDateTime, lead: Duration) -> bool {
	start > now && start - now <= lead
}

#[cfg(test)]
mod tests {
	use time::macros::{date, datetime, time};

	use super::*;

	#[test]
	fn formats_round_trip_wall_clock_values() {
		assert_eq!(format_date(date!(2025 - 07 - 05)), "2025-07-05");
		assert_eq!(format_time(time!(9:05)), "09:05");
	}

	#[test]
	fn start_instant_applies_clinic_offset() {
		let offset = clinic_offset(-180).expect("valid offset");
		let start = start_instant(date!(2025 - 07 - 05), time!(15:00), offset);

		assert_eq!(start, datetime!(2025-07-05 18:00 UTC));
	}

	#[test]
	fn oversized_horizon_does_not_overflow() {
		let now = datetime!(2025-07-01 12:00 UTC);

		assert_eq!(check_booking_window(now + Duration::hours(1), now, 200_000_000_000_000), Ok(()));
		assert_eq!(check_booking_window(now + Duration::days(4_000), now, i64::MAX), Ok(()));
		assert_eq!(
			check_booking_window(now - Duration::hours(1), now, i64::MAX),
			Err(ScheduleError::InPast)
		);
	}

	#[test]
	fn reminder_lead_rejects_values_that_do_not_fit() {
		assert_eq!(reminder_lead(90), Ok(Duration::minutes(90)));
		assert_eq!(reminder_lead(0), Err(ScheduleError::InvalidLead { minutes: 0 }));
		assert_eq!(
			reminder_lead(i64::MAX / 2),
			Err(ScheduleError::InvalidLead { minutes: i64::MAX / 2 })
		);
	}

	#[test]
	fn clinic_today_follows_offset() {
		let offset = clinic_offset(120).expect("valid offset");

		assert_eq!(clinic_today(datetime!(2025-07-05 23:30 UTC), offset), date!(2025 - 07 - 06));
	}
}
