use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use graphserve::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "graphserve=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            model,
            inputs,
            outputs,
            host,
            port,
            batch,
            config,
        } => {
            graphserve::cli::serve(model, inputs, outputs, host, port, batch, config).await?;
        }
        Commands::Inspect { model } => {
            graphserve::cli::inspect(model)?;
        }
    }

    Ok(())
}
