use std::process::ExitCode;

use clap::Parser;
use tracing::info;

use warden::app::Orchestrator;
use warden::cli::Cli;
use warden::config::Config;
use warden::logging;

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let mut config = match Config::load_or_default(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            return ExitCode::from(1);
        }
    };

    // CLI overrides the file.
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }

    logging::init(config.logging.level());
    info!(version = env!("CARGO_PKG_VERSION"), "warden starting");

    let status = Orchestrator::run(config).await;

    info!(clean = matches!(status, warden::app::ExitStatus::Clean), "warden stopped");
    status.into()
}
