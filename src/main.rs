// Strongbox — Application Entry Point
//
// Parses CLI arguments, initializes structured logging (with a filter that
// never emits passwords, hashes or tokens), and dispatches to the command
// handler. Uses the tokio async runtime for the UDS server.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use strongbox::cli::{execute, Cli};

#[tokio::main]
async fn main() {
    // Initialize tracing with env filter (RUST_LOG=strongbox=debug for verbose output).
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("strongbox=info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    if let Err(e) = execute(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
