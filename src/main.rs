mod cli;
mod config;
mod engine;
mod error;
mod model;
mod orchestrator;
mod sink;
mod storage;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    init_tracing(args.log_level);

    match cli::run(args).await {
        Ok(()) => Ok(()),
        Err(e) => {
            eprintln!("Error: {e:#}");
            // Build failures carry their own exit codes.
            let code = e
                .downcast_ref::<error::BuildError>()
                .map(error::BuildError::exit_code)
                .unwrap_or(1);
            std::process::exit(code);
        }
    }
}

fn init_tracing(level: model::MessageLevel) {
    let default = match level {
        model::MessageLevel::Error => "error",
        model::MessageLevel::Warn => "warn",
        model::MessageLevel::Info => "info",
        model::MessageLevel::Debug => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
