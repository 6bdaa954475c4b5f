//! SIGSTOP/SIGCONT control of the producer

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dumpguard_domain::{ports::ProcessController, GuardError, Suspension};
use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tracing::debug;

use crate::error::{ProducerError, Result};

/// Outcome of a signal delivery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    Delivered,
    /// The process was reaped; the signal was not (or could not be) sent
    Gone,
}

/// Sends job-control signals to one process
///
/// A stopped process performs no writes until it is continued, which is
/// what makes draining its output directory safe.
///
/// The `reaped` flag is shared with the owning [`crate::Producer`] and set as
/// soon as the child is reaped. After that the pid may belong to another
/// process, so no further signal is sent.
#[derive(Debug, Clone)]
pub struct SignalController {
    pid: Pid,
    reaped: Arc<AtomicBool>,
}

impl SignalController {
    pub(crate) fn new(pid: Pid, reaped: Arc<AtomicBool>) -> Self {
        Self { pid, reaped }
    }

    /// Deliver `signal` unless the process is known to be gone
    pub(crate) fn send(&self, signal: Signal) -> Result<Delivery> {
        if self.reaped.load(Ordering::Acquire) {
            debug!(pid = %self.pid, signal = signal.as_str(), "Producer reaped, signal not sent");
            return Ok(Delivery::Gone);
        }

        match kill(self.pid, signal) {
            Ok(()) => {
                debug!(pid = %self.pid, signal = signal.as_str(), "Signal delivered");
                Ok(Delivery::Delivered)
            }
            // Reaped between the flag check and the signal
            Err(Errno::ESRCH) => {
                debug!(pid = %self.pid, signal = signal.as_str(), "Producer no longer exists");
                Ok(Delivery::Gone)
            }
            Err(errno) => Err(ProducerError::signal(
                signal.as_str(),
                self.pid.as_raw(),
                errno.desc(),
            )),
        }
    }
}

impl ProcessController for SignalController {
    fn suspend(&self) -> std::result::Result<Suspension, GuardError> {
        match self.send(Signal::SIGSTOP)? {
            Delivery::Delivered => Ok(Suspension::Suspended),
            Delivery::Gone => Ok(Suspension::Exited),
        }
    }

    fn resume(&self) -> std::result::Result<(), GuardError> {
        // A producer that is gone cannot be left stopped
        self.send(Signal::SIGCONT)?;
        Ok(())
    }
}
