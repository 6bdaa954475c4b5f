//! Error types for the producer library

use std::io;
use std::process::ExitStatus;

use dumpguard_domain::GuardError;
use thiserror::Error;

/// Result type alias for producer operations
pub type Result<T> = std::result::Result<T, ProducerError>;

/// Errors that can occur while running the producer
#[derive(Error, Debug)]
pub enum ProducerError {
    /// The program could not be started
    #[error("Failed to launch '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: io::Error,
    },

    /// A signal could not be delivered
    #[error("Failed to send {signal} to pid {pid}: {reason}")]
    Signal {
        signal: &'static str,
        pid: i32,
        reason: String,
    },

    /// Waiting on the child failed
    #[error("Failed to wait for producer: {0}")]
    Wait(#[source] io::Error),

    /// The producer ran and exited unsuccessfully
    #[error("Producer exited with {status}: {stderr}")]
    Exited { status: ExitStatus, stderr: String },
}

impl ProducerError {
    /// Create a launch error
    pub fn launch(program: impl Into<String>, source: io::Error) -> Self {
        Self::Launch {
            program: program.into(),
            source,
        }
    }

    /// Create a signal error
    pub fn signal(signal: &'static str, pid: i32, reason: impl Into<String>) -> Self {
        Self::Signal {
            signal,
            pid,
            reason: reason.into(),
        }
    }
}

impl From<ProducerError> for GuardError {
    fn from(err: ProducerError) -> Self {
        match err {
            ProducerError::Launch { .. } => GuardError::launch(err.to_string()),
            ProducerError::Signal { signal, pid, reason } => {
                GuardError::signal(signal, format!("pid {}: {}", pid, reason))
            }
            ProducerError::Wait(_) | ProducerError::Exited { .. } => {
                GuardError::producer(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_maps_to_launch_error() {
        let err = ProducerError::launch(
            "mydumper",
            io::Error::new(io::ErrorKind::NotFound, "No such file or directory"),
        );
        assert!(err.to_string().contains("'mydumper'"));

        let guard: GuardError = err.into();
        assert!(matches!(guard, GuardError::Launch(_)));
    }

    #[test]
    fn test_signal_keeps_signal_name() {
        let guard: GuardError = ProducerError::signal("SIGCONT", 42, "ESRCH: No such process").into();
        match guard {
            GuardError::Signal { signal, reason } => {
                assert_eq!(signal, "SIGCONT");
                assert!(reason.contains("pid 42"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
