pub mod auth;
pub mod metrics;
pub mod routes;
pub mod state;

use std::{net::SocketAddr, path::PathBuf};

use clap::Parser;
use tokio::{net::TcpListener, sync::oneshot};
use tracing_subscriber::EnvFilter;

use medilink_storage::db::Db;
use medilink_worker::worker::{self, WorkerState};

use crate::state::AppState;

#[derive(Debug, Parser)]
#[command(
	version = medilink_cli::VERSION,
	rename_all = "kebab",
	styles = medilink_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = medilink_config::load(&args.config)?;

	init_tracing(&config);

	let http_addr: SocketAddr = config.service.http_bind.parse()?;
	let state = AppState::new(config).await?;
	let embedded = if state.service.cfg.notifications.embedded_scheduler {
		let db = Db { pool: state.service.db.pool.clone() };
		let worker_state = WorkerState::from_config(&state.service.cfg, db)?;
		let (stop_tx, stop_rx) = oneshot::channel::<()>();
		let handle = tokio::spawn(worker::run_worker(worker_state, async move {
			let _ = stop_rx.await;
		}));

		tracing::info!("Embedded notification scheduler started.");

		Some((stop_tx, handle))
	} else {
		None
	};
	let app = routes::router(state);
	let http_listener = TcpListener::bind(http_addr).await?;

	tracing::info!(%http_addr, "HTTP server listening.");

	axum::serve(http_listener, app).with_graceful_shutdown(shutdown_signal()).await?;

	if let Some((stop_tx, handle)) = embedded {
		let _ = stop_tx.send(());

		handle.await?;
	}

	tracing::info!("HTTP server stopped.");

	Ok(())
}

fn init_tracing(config: &medilink_config::Config) {
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn shutdown_signal() {
	if let Err(err) = tokio::signal::ctrl_c().await {
		tracing::error!(error = %err, "Failed to listen for shutdown signal.");
	}
}
