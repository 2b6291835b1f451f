pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Storage(#[from] medilink_storage::Error),
	#[error(transparent)]
	Service(#[from] medilink_service::Error),
	#[error(transparent)]
	Provider(#[from] medilink_providers::Error),
	#[error(transparent)]
	Schedule(#[from] medilink_domain::schedule::ScheduleError),
}
