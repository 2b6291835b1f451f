use serde::{Deserialize, Serialize};
use time::{Date, Time};
use uuid::Uuid;

use crate::schedule;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
	AppointmentBooked,
	AppointmentCancelled,
	AppointmentCompleted,
	AppointmentRescheduled,
	AppointmentReminder,
}
impl NotificationKind {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::AppointmentBooked => "appointment_booked",
			Self::AppointmentCancelled => "appointment_cancelled",
			Self::AppointmentCompleted => "appointment_completed",
			Self::AppointmentRescheduled => "appointment_rescheduled",
			Self::AppointmentReminder => "appointment_reminder",
		}
	}

	pub fn parse(raw: &str) -> Option<Self> {
		match raw.trim() {
			"appointment_booked" => Some(Self::AppointmentBooked),
			"appointment_cancelled" => Some(Self::AppointmentCancelled),
			"appointment_completed" => Some(Self::AppointmentCompleted),
			"appointment_rescheduled" => Some(Self::AppointmentRescheduled),
			"appointment_reminder" => Some(Self::AppointmentReminder),
			_ => None,
		}
	}
}

/// Key that makes a reminder unique per appointment, recipient and scheduled start.
///
/// The start is part of the key so a rescheduled appointment earns a fresh reminder.
pub fn reminder_dedupe_key(appointment_id: Uuid, user_id: Uuid, date: Date, time: Time) -> String {
	format!(
		"{}:{appointment_id}:{user_id}:{}T{}",
		NotificationKind::AppointmentReminder.as_str(),
		schedule::format_date(date),
		schedule::format_time(time)
	)
}

#[cfg(test)]
mod tests {
	use time::macros::{date, time};

	use super::*;

	#[test]
	fn kinds_round_trip_through_names() {
		for kind in [
			NotificationKind::AppointmentBooked,
			NotificationKind::AppointmentCancelled,
			NotificationKind::AppointmentCompleted,
			NotificationKind::AppointmentRescheduled,
			NotificationKind::AppointmentReminder,
		] {
			assert_eq!(NotificationKind::parse(kind.as_str()), Some(kind));
		}

		assert_eq!(NotificationKind::parse("appointment_moved"), None);
	}

	#[test]
	fn reminder_key_tracks_start() {
		let appointment_id = Uuid::nil();
		let user_id = Uuid::from_u128(7);
		let key = reminder_dedupe_key(appointment_id, user_id, date!(2031 - 03 - 14), time!(9:05));

		assert_eq!(
			key,
			format!("appointment_reminder:{appointment_id}:{user_id}:2031-03-14T09:05")
		);
		assert_ne!(
			key,
			reminder_dedupe_key(appointment_id, user_id, date!(2031 - 03 - 14), time!(9:30))
		);
	}
}
