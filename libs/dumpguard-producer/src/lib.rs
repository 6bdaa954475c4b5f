//! Producer process supervision
//!
//! Wraps the external dump producer so the rest of dumpguard can:
//! - launch it with its argument list
//! - pause and continue it with SIGSTOP/SIGCONT (via [`SignalController`])
//! - wait for its exit and see the tail of its stderr when it fails
//! - kill it on the way out of a failed run

#[cfg(not(unix))]
compile_error!("dumpguard-producer needs SIGSTOP/SIGCONT and only supports Unix platforms");

mod error;
mod signal;

pub use error::{ProducerError, Result};
pub use signal::SignalController;

use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use nix::unistd::Pid;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Number of stderr lines kept for error reports
const STDERR_TAIL_LINES: usize = 50;

/// How long to wait for the stderr pipe to close after a failed exit
const STDERR_GRACE: Duration = Duration::from_secs(1);

/// A running producer process
///
/// The child is killed if the `Producer` is dropped while still running.
pub struct Producer {
    program: String,
    child: Child,
    pid: Pid,
    reaped: Arc<AtomicBool>,
    stderr: Option<JoinHandle<String>>,
}

impl Producer {
    /// Launch `program` with `args`
    ///
    /// stdout is inherited; stderr is captured so a failed run can report it.
    ///
    /// # Errors
    ///
    /// Returns `ProducerError::Launch` if the program cannot be started.
    pub fn spawn(program: &str, args: &[String]) -> Result<Self> {
        info!(program = %program, args = ?args, "Launching producer");

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| ProducerError::launch(program, err))?;

        let pid = child.id().ok_or_else(|| {
            ProducerError::launch(
                program,
                std::io::Error::new(std::io::ErrorKind::Other, "process exited before its pid was read"),
            )
        })?;
        let pid = Pid::from_raw(pid as i32);
        let stderr = child.stderr.take().map(|pipe| tokio::spawn(collect_stderr(pipe)));

        info!(program = %program, pid = %pid, "Producer started");

        Ok(Self {
            program: program.to_string(),
            child,
            pid,
            reaped: Arc::new(AtomicBool::new(false)),
            stderr,
        })
    }

    /// Controller sending job-control signals to this process
    ///
    /// Once this `Producer` has reaped the child, the controller stops
    /// signalling and reports the producer as exited.
    pub fn controller(&self) -> SignalController {
        SignalController::new(self.pid, self.reaped.clone())
    }

    /// Wait for the producer to exit
    ///
    /// Stops (SIGSTOP) are not reported as exits; this only returns once the
    /// process has terminated.
    ///
    /// # Errors
    ///
    /// - `ProducerError::Exited` with the stderr tail on a non-zero exit
    /// - `ProducerError::Wait` if the exit status cannot be collected
    pub async fn wait(&mut self) -> Result<()> {
        let status = self.child.wait().await.map_err(ProducerError::Wait)?;
        self.reaped.store(true, Ordering::Release);
        if status.success() {
            info!(program = %self.program, pid = %self.pid, "Producer exited successfully");
            return Ok(());
        }

        // Grandchildren may keep the pipe open, so do not wait on it forever
        let stderr = match self.stderr.take() {
            Some(task) => tokio::time::timeout(STDERR_GRACE, task)
                .await
                .ok()
                .and_then(|joined| joined.ok())
                .unwrap_or_default(),
            None => String::new(),
        };
        warn!(program = %self.program, pid = %self.pid, status = %status, "Producer exited unsuccessfully");
        Err(ProducerError::Exited { status, stderr })
    }

    /// Kill the producer and reap it; a no-op if it already exited
    pub async fn kill(&mut self) {
        match self.child.kill().await {
            Ok(()) => info!(program = %self.program, pid = %self.pid, "Producer killed"),
            Err(err) => debug!(pid = %self.pid, error = %err, "Producer kill skipped"),
        }
        // Either way the child is no longer running
        if matches!(self.child.try_wait(), Ok(Some(_))) {
            self.reaped.store(true, Ordering::Release);
        }
    }
}

/// Forward producer stderr to the log and keep its last lines
async fn collect_stderr(pipe: ChildStderr) -> String {
    let mut lines = BufReader::new(pipe).lines();
    let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);

    while let Ok(Some(line)) = lines.next_line().await {
        debug!(target: "producer", "{}", line);
        if tail.len() == STDERR_TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line);
    }

    Vec::from(tail).join("\n")
}
