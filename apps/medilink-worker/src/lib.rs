pub mod worker;

mod error;

pub use error::{Error, Result};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use medilink_storage::db::Db;

#[derive(Debug, Parser)]
#[command(
	version = medilink_cli::VERSION,
	rename_all = "kebab",
	styles = medilink_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: std::path::PathBuf,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = medilink_config::load(&args.config)?;

	init_tracing(&config.service.log_level);

	let db = Db::connect(&config.storage.postgres).await?;

	db.ensure_schema().await?;

	let state = worker::WorkerState::from_config(&config, db)?;

	tracing::info!(
		poll_interval_ms = config.notifications.poll_interval_ms,
		webhook = state.has_sink(),
		"Notification worker started."
	);

	worker::run_worker(state, shutdown_signal()).await;

	tracing::info!("Notification worker stopped.");

	Ok(())
}

fn init_tracing(log_level: &str) {
	let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn shutdown_signal() {
	if let Err(err) = tokio::signal::ctrl_c().await {
		tracing::error!(error = %err, "Failed to listen for shutdown signal.");
	}
}
