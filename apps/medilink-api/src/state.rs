use std::sync::Arc;

use medilink_config::Config;
use medilink_service::MedilinkService;
use medilink_storage::db::Db;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<MedilinkService>,
}
impl AppState {
	/// Connects to Postgres and bootstraps the schema.
	pub async fn new(config: Config) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.postgres).await?;

		db.ensure_schema().await?;

		let service = MedilinkService::new(config, db)?;

		Ok(Self::from_service(service))
	}

	pub fn from_service(service: MedilinkService) -> Self {
		Self { service: Arc::new(service) }
	}
}
