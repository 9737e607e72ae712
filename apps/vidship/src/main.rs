//! vidship entry point.

mod app;
mod cli;

use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let args = cli::Args::parse();

    // Initialize structured logging. RUST_LOG wins over the -v flag.
    let default_filter = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        video_id = %args.video_id,
        "starting vidship"
    );

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(app::run(args))?;

    tracing::info!("finished successfully");
    Ok(())
}
