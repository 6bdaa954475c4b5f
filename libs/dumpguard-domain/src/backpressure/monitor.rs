//! Backpressure monitor - the periodic pause/drain/resume loop
//!
//! The loop selects over two event sources: a tick timer rearmed after every
//! tick, and a one-shot finish notice sent once the producer has exited.
//!
//! ```text
//!            tick, under limit
//!           +----------------+
//!           v                |
//!       Polling -------------+
//!        |    ^
//!  tick, |    | drained (producer resumed)
//!  over  v    |
//!     Draining(Tick)
//!
//!       Polling --finish--> Draining(ProducerExited) --> Stopped
//! ```
//!
//! A tick that finds the producer already exited drains nothing and returns
//! to polling; the finish notice follows. Any probe, signal or drain failure
//! ends the loop with that error.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::drainer::{DrainReport, Drainer};
use super::error::{GuardError, Result};
use super::limit::DiskLimit;
use super::probe;
use crate::ports::{ProcessController, Suspension, UploadTarget};

/// Tick period used in production
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Why a drain was started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DrainTrigger {
    /// A tick found the directory over the limit; the producer is running
    Tick,
    /// The producer has exited; nothing to suspend
    ProducerExited,
}

/// States of the monitor loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MonitorState {
    Polling,
    Draining(DrainTrigger),
    Stopped,
}

/// Counters accumulated over a monitor's lifetime
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MonitorReport {
    pub ticks: u64,
    pub drains: u64,
    pub objects: usize,
    pub bytes: u64,
}

impl MonitorReport {
    fn record(&mut self, drain: &DrainReport) {
        self.drains += 1;
        self.objects += drain.objects.len();
        self.bytes += drain.bytes;
    }
}

/// Keeps a directory under a disk-usage limit while a producer writes to it
///
/// Generic over the upload target and the process controller so the loop
/// can be driven with fakes in tests.
pub struct BackpressureMonitor<U, P> {
    dir: PathBuf,
    limit: DiskLimit,
    drainer: Drainer<U>,
    controller: P,
    interval: Duration,
    report: MonitorReport,
}

impl<U, P> BackpressureMonitor<U, P>
where
    U: UploadTarget,
    P: ProcessController,
{
    pub fn new(dir: PathBuf, limit: DiskLimit, drainer: Drainer<U>, controller: P) -> Self {
        Self {
            dir,
            limit,
            drainer,
            controller,
            interval: DEFAULT_TICK_INTERVAL,
            report: MonitorReport::default(),
        }
    }

    /// Override the tick period
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run the loop until `finish` fires and the final drain completes
    ///
    /// A dropped `finish` sender counts as a finish notice.
    pub async fn run(mut self, mut finish: oneshot::Receiver<()>) -> Result<MonitorReport> {
        info!(
            dir = %self.dir.display(),
            limit = self.limit.bytes(),
            interval_ms = self.interval.as_millis() as u64,
            "Monitor started"
        );

        let mut state = MonitorState::Polling;
        loop {
            let next = match state {
                MonitorState::Polling => self.poll(&mut finish).await?,
                MonitorState::Draining(DrainTrigger::Tick) => {
                    self.drain_suspended().await?;
                    MonitorState::Polling
                }
                MonitorState::Draining(DrainTrigger::ProducerExited) => {
                    let drained = self.drainer.drain(&self.dir).await?;
                    self.report.record(&drained);
                    MonitorState::Stopped
                }
                MonitorState::Stopped => {
                    info!(
                        ticks = self.report.ticks,
                        drains = self.report.drains,
                        objects = self.report.objects,
                        bytes = self.report.bytes,
                        "Monitor stopped"
                    );
                    return Ok(self.report);
                }
            };

            if next != state {
                debug!(from = ?state, to = ?next, "Monitor state change");
            }
            state = next;
        }
    }

    /// Spawn the loop on the current runtime
    pub fn spawn(self) -> MonitorHandle
    where
        U: 'static,
        P: 'static,
    {
        let (finish_tx, finish_rx) = oneshot::channel();
        let task = tokio::spawn(self.run(finish_rx));
        MonitorHandle {
            finish: Some(finish_tx),
            task,
            joined: false,
        }
    }

    async fn poll(&mut self, finish: &mut oneshot::Receiver<()>) -> Result<MonitorState> {
        tokio::select! {
            biased;

            notice = finish => {
                if notice.is_err() {
                    warn!("Finish channel closed, draining as if the producer exited");
                }
                Ok(MonitorState::Draining(DrainTrigger::ProducerExited))
            }
            _ = tokio::time::sleep(self.interval) => {
                self.report.ticks += 1;
                if probe::over_limit(&self.dir, self.limit).await? {
                    Ok(MonitorState::Draining(DrainTrigger::Tick))
                } else {
                    Ok(MonitorState::Polling)
                }
            }
        }
    }

    async fn drain_suspended(&mut self) -> Result<()> {
        if self.controller.suspend()? == Suspension::Exited {
            // The finish notice is on its way and triggers the final drain
            debug!("Producer already exited, skipping tick drain");
            return Ok(());
        }
        debug!("Producer suspended");

        let drained = self.drainer.drain(&self.dir).await;
        // Resume even when the drain failed so the producer is not left stopped
        let resumed = self.controller.resume();

        match (drained, resumed) {
            (Ok(report), Ok(())) => {
                debug!("Producer resumed");
                self.report.record(&report);
                Ok(())
            }
            (Err(err), Ok(())) | (Ok(_), Err(err)) => Err(err),
            (Err(drain_err), Err(resume_err)) => {
                error!(error = %resume_err, "Failed to resume producer after drain failure");
                Err(drain_err)
            }
        }
    }
}

/// Handle on a spawned monitor
///
/// Dropping the handle aborts the loop.
pub struct MonitorHandle {
    finish: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<MonitorReport>>,
    joined: bool,
}

impl MonitorHandle {
    /// Tell the monitor the producer has exited, then wait for the final drain
    pub async fn finish(&mut self) -> Result<MonitorReport> {
        if let Some(finish) = self.finish.take() {
            // A closed receiver means the loop already ended; the join reports why
            let _ = finish.send(());
        }
        self.join().await
    }

    /// Wait for the loop to end on its own, which only happens on failure
    /// before `finish` is called
    pub async fn stopped(&mut self) -> Result<MonitorReport> {
        self.join().await
    }

    async fn join(&mut self) -> Result<MonitorReport> {
        if self.joined {
            return Err(GuardError::Monitor("monitor already joined".to_string()));
        }
        let outcome = (&mut self.task).await;
        self.joined = true;
        outcome.map_err(|err| GuardError::Monitor(err.to_string()))?
    }

    /// Stop the loop without a final drain
    pub fn abort(&self) {
        self.task.abort();
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
