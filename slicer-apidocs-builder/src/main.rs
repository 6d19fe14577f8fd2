use clap::Parser;
use slicer_apidocs_builder::cli::{report_failure, run, Cli};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Load environment
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    tracing::info!("CLI application startup: tracing initialised, environment loaded");

    // Child processes run on the main task; the handler stays on its own worker.
    tokio::spawn(async {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\ninterrupt received, stopping...");
            tracing::warn!("Interrupted");
            std::process::exit(130);
        }
    });

    let cli = Cli::parse();
    tracing::info!("CLI arguments parsed, invoking run");
    match run(cli).await {
        Ok(()) => tracing::info!("CLI completed successfully"),
        Err(e) => {
            let code = report_failure(&e);
            std::process::exit(code);
        }
    }
}
