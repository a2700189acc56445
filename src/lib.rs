pub mod analysis; // Endpoint fallback client + response normalization
pub mod choreography; // Post-result viewport focus
pub mod cli;
pub mod config;
pub mod intake; // Image selection + preview
pub mod notify;
pub mod session; // Request lifecycle state machine

#[cfg(test)]
pub(crate) mod test_support;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

pub async fn run() -> ExitCode {
    // Initialize tracing; stdout is reserved for results.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = cli::Cli::parse();
    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    match cli::execute(&cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!(error = %e, "Analysis could not run");
            eprintln!("error: {e}");
            ExitCode::from(2)
        }
    }
}
