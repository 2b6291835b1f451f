use medilink_domain::{schedule::ScheduleError, status::TransitionError};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Unauthorized: {message}")]
	Unauthorized { message: String },
	#[error("Forbidden: {message}")]
	Forbidden { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Conflict: {message}")]
	Conflict { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
}
impl Error {
	pub(crate) fn invalid(message: impl Into<String>) -> Self {
		Self::InvalidRequest { message: message.into() }
	}

	pub(crate) fn forbidden(message: impl Into<String>) -> Self {
		Self::Forbidden { message: message.into() }
	}

	pub(crate) fn not_found(message: impl Into<String>) -> Self {
		Self::NotFound { message: message.into() }
	}

	pub(crate) fn conflict(message: impl Into<String>) -> Self {
		Self::Conflict { message: message.into() }
	}
}

impl From<sqlx::Error> for Error {
	fn from(err: sqlx::Error) -> Self {
		Self::Storage { message: err.to_string() }
	}
}

impl From<medilink_storage::Error> for Error {
	fn from(err: medilink_storage::Error) -> Self {
		match err {
			medilink_storage::Error::Sqlx(inner) => Self::Storage { message: inner.to_string() },
			medilink_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			medilink_storage::Error::NotFound(message) => Self::NotFound { message },
			medilink_storage::Error::Conflict(message) => Self::Conflict { message },
		}
	}
}

impl From<medilink_providers::Error> for Error {
	fn from(err: medilink_providers::Error) -> Self {
		Self::Provider { message: err.to_string() }
	}
}

impl From<ScheduleError> for Error {
	fn from(err: ScheduleError) -> Self {
		Self::InvalidRequest { message: err.to_string() }
	}
}

impl From<TransitionError> for Error {
	fn from(err: TransitionError) -> Self {
		match err {
			TransitionError::NotPermitted { .. } => Self::Forbidden { message: err.to_string() },
			TransitionError::Terminal { .. } | TransitionError::NotStarted =>
				Self::Conflict { message: err.to_string() },
		}
	}
}
