//! dumpguard - disk-bounded dump supervisor
//!
//! Runs a dump producer (mydumper by default) into a fresh directory. Once a
//! second, if the directory has grown past the limit, the producer is
//! stopped, every file is uploaded to S3 and truncated, and the producer is
//! continued. When the producer exits the remaining files are drained and the
//! directory is removed.

mod config;
mod supervisor;
mod workdir;

use anyhow::Result;
use clap::Parser;
use dumpguard_s3::S3UploadTarget;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::{AppConfig, Args, LogFormat};

#[tokio::main]
async fn main() {
    // Load environment variables before clap reads its env fallbacks
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(args.log_format);

    info!("Starting dumpguard");

    if let Err(err) = run(args).await {
        error!(error = %format!("{err:#}"), "dumpguard failed");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let config = AppConfig::try_from(args)?;
    info!(
        output = %config.output.display(),
        producer = %config.producer,
        limit = config.limit.bytes(),
        "Configuration loaded"
    );

    let target = S3UploadTarget::connect(&config.s3).await;
    let report = supervisor::run(&config, target).await?;

    info!(
        objects = report.objects,
        bytes = report.bytes,
        "dumpguard finished"
    );
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}
