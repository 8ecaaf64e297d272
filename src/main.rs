//! DAFU - Main Entry Point

use clap::Parser;
use dafu_anomaly::cli::{run, Cli};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dafu=info".into()),
        )
        .init();

    run(Cli::parse())
}
