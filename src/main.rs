//! jmstool - Entry point
//!
//! Parses the command line, sets up logging on stderr and runs the selected
//! command. The process exits explicitly: a pending blocking read on stdin
//! would otherwise keep the runtime from shutting down.

use clap::Parser;
use tracing::error;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use jmstool::config::{log_filter, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr, stdout belongs to the remote session
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_filter(cli.verbose)));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let code = match jmstool::commands::run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            e.exit_code()
        }
    };

    std::process::exit(code);
}
