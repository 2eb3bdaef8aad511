// crates.io
use clap::Parser;
// self
use cairn_eval::Args;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;
	let args = Args::parse();
	cairn_eval::run(args).await
}
