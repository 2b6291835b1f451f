use clap::Parser;

use medilink_worker::Args;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	medilink_worker::run(Args::parse()).await
}
