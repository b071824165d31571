use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use waver::cli::{run, Cli};
use waver::load_config::config_verbose;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let verbose = cli.verbose || config_verbose(cli.config_path());
    init_tracing(verbose);
    tracing::info!(verbose, "CLI application startup: tracing initialised, environment loaded");

    let result = run(cli).await;
    match &result {
        Ok(_) => tracing::info!("CLI completed successfully"),
        Err(e) => tracing::error!(error = %e, "CLI exited with error"),
    }
    result
}

// RUST_LOG wins over both the flag and the config file.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
