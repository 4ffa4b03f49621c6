mod bytes;
mod cli;
mod source;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use unarc_pipeline::Pipeline;
use unarc_store::FsStore;

use crate::bytes::format_bytes;
use crate::cli::Cli;
use crate::source::AnySource;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("unarc: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let src = cli.source()?;
    let dest = cli.destination()?;
    let config = cli.config()?;

    tracing::info!(
        %src,
        %dest,
        workers = config.workers,
        disk_limit = %format_bytes(config.disk_limit),
        "unpacking"
    );

    let source = AnySource::for_location(&src, &cli.store_root);
    let sink = FsStore::new(&cli.store_root);
    let pipeline = Pipeline::new(source, sink, config);

    let cancel = pipeline.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling");
            cancel.cancel();
        }
    });

    let report = pipeline
        .run(&src, &dest)
        .await
        .with_context(|| format!("unpack {src}"))?;

    if cli.verbose {
        eprintln!("{report}");
    }
    Ok(())
}
