use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = medilink_api::Args::parse();

	medilink_api::run(args).await
}
