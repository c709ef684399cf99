//! Chartsnap CLI entry point.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use chartsnap::cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Render(args) => chartsnap::cli::commands::render::execute(args, cli.json).await,
        Commands::Config(args) => chartsnap::cli::commands::config::execute(args, cli.json)
            .await
            .map(|()| 0),
    };

    match result {
        Ok(exit_status) => std::process::exit(exit_status),
        Err(err) => chartsnap::cli::handle_error(&err, cli.json),
    }
}
