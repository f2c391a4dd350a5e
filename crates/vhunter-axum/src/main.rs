//! `vhunter` binary - the composition root.

use clap::Parser;

use vhunter_axum::{Cli, init_tracing, start_server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let settings = cli.load_settings()?;
    let _log_guard = init_tracing(&settings.log);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "vhunter starting");
    start_server(settings).await
}
