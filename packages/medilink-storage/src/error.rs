#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Sqlx(#[from] sqlx::Error),
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),
	#[error("Not found: {0}")]
	NotFound(String),
	#[error("Conflict: {0}")]
	Conflict(String),
}
impl Error {
	/// Turns a unique-constraint violation into [`Error::Conflict`] with `message`.
	pub fn unique_violation_as_conflict(err: sqlx::Error, message: &str) -> Self {
		if let sqlx::Error::Database(db_err) = &err
			&& db_err.is_unique_violation()
		{
			return Self::Conflict(message.to_string());
		}

		Self::Sqlx(err)
	}
}
