//! Top-level run: launch the producer, keep its directory in check, clean up
//!
//! Ordering on success: producer exits, the monitor is told to finish, the
//! final drain completes, and only then is the directory removed. On any
//! failure the producer is killed and the directory removed on the way out.

use anyhow::{Context, Result};
use dumpguard_domain::{
    BackpressureMonitor, BucketName, Drainer, GuardError, MonitorReport, UploadTarget,
};
use dumpguard_producer::{Producer, ProducerError};
use tracing::{error, info};

use crate::config::AppConfig;
use crate::workdir::MonitoredDirectory;

/// First event observed while the producer and the monitor run side by side
enum Outcome {
    ProducerExited(std::result::Result<(), ProducerError>),
    MonitorStopped(dumpguard_domain::Result<MonitorReport>),
}

/// Run the producer under backpressure until it exits and its output is drained
pub async fn run<U>(config: &AppConfig, target: U) -> Result<MonitorReport>
where
    U: UploadTarget + 'static,
{
    let bucket = BucketName::timestamped(&config.bucket_suffix)?;
    let drainer = Drainer::new(target, bucket);
    drainer.prepare().await.context("preparing bucket")?;

    let workdir = MonitoredDirectory::create(&config.output)?;
    let mut producer = Producer::spawn(&config.producer, &config.producer_args)
        .map_err(GuardError::from)
        .context("starting producer")?;

    let monitor = BackpressureMonitor::new(
        workdir.path().to_path_buf(),
        config.limit,
        drainer,
        producer.controller(),
    )
    .with_interval(config.tick_interval);
    let mut handle = monitor.spawn();

    let outcome = tokio::select! {
        exited = producer.wait() => Outcome::ProducerExited(exited),
        stopped = handle.stopped() => Outcome::MonitorStopped(stopped),
    };

    match outcome {
        Outcome::ProducerExited(Ok(())) => {}
        Outcome::ProducerExited(Err(err)) => {
            error!(error = %err, "Producer failed, skipping final drain");
            handle.abort();
            // Make sure no drain is still touching the directory
            let _ = handle.stopped().await;
            return Err(GuardError::from(err)).context("running producer");
        }
        Outcome::MonitorStopped(stopped) => {
            let err = stopped
                .err()
                .unwrap_or_else(|| GuardError::Monitor("stopped before the producer exited".to_string()));
            error!(error = %err, "Monitor failed, killing producer");
            producer.kill().await;
            return Err(err).context("monitoring output directory");
        }
    }

    let report = handle.finish().await.context("draining remaining files")?;
    workdir
        .remove()
        .with_context(|| format!("removing {}", config.output.display()))?;

    info!(
        drains = report.drains,
        objects = report.objects,
        bytes = report.bytes,
        "Run complete"
    );
    Ok(report)
}
