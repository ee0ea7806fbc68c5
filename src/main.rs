mod cli;
mod commands;
mod utils;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt::time::ChronoLocal, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::Args;

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging();

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(crate::commands::run_download(args))
}

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("segdl=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S%.3f".to_string()))
                .with_writer(std::io::stderr),
        )
        .init();
}
