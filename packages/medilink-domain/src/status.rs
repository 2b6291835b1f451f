use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::role::Role;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
	Confirmed,
	Completed,
	Cancelled,
}
impl AppointmentStatus {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Confirmed => "confirmed",
			Self::Completed => "completed",
			Self::Cancelled => "cancelled",
		}
	}

	pub fn parse(raw: &str) -> Option<Self> {
		match raw.trim().to_ascii_lowercase().as_str() {
			"confirmed" => Some(Self::Confirmed),
			"completed" => Some(Self::Completed),
			"cancelled" => Some(Self::Cancelled),
			_ => None,
		}
	}

	pub fn is_terminal(self) -> bool {
		matches!(self, Self::Completed | Self::Cancelled)
	}
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TransitionOutcome {
	Changed(AppointmentStatus),
	Unchanged,
}

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum TransitionError {
	#[error("Appointment is already {} and cannot change.", current.as_str())]
	Terminal { current: AppointmentStatus },
	#[error("A {} cannot mark an appointment {}.", role.as_str(), target.as_str())]
	NotPermitted { role: Role, target: AppointmentStatus },
	#[error("An appointment cannot be completed before it starts.")]
	NotStarted,
}

/// Decides whether `role` may move an appointment from `current` to `target`.
///
/// `confirmed` is the only non-terminal state. Requesting the current state is always a no-op.
pub fn plan_transition(
	current: AppointmentStatus,
	target: AppointmentStatus,
	role: Role,
	start: OffsetDateTime,
	now: OffsetDateTime,
) -> Result<TransitionOutcome, TransitionError> {
	if current == target {
		return Ok(TransitionOutcome::Unchanged);
	}
	if current.is_terminal() {
		return Err(TransitionError::Terminal { current });
	}

	match target {
		AppointmentStatus::Confirmed => Ok(TransitionOutcome::Unchanged),
		AppointmentStatus::Completed => {
			if role != Role::Doctor {
				return Err(TransitionError::NotPermitted { role, target });
			}
			if start > now {
				return Err(TransitionError::NotStarted);
			}

			Ok(TransitionOutcome::Changed(target))
		},
		AppointmentStatus::Cancelled => Ok(TransitionOutcome::Changed(target)),
	}
}
