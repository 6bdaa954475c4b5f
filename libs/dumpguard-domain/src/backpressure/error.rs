//! Domain errors for backpressure operations
//!
//! Every kind here is fatal for a run: nothing in the controller retries.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while supervising the producer
///
/// These errors are independent of infrastructure implementation details
/// (no AWS SDK or `nix` error types here); adapters convert into them.
#[derive(Error, Debug)]
pub enum GuardError {
    /// Bad flags, a zero limit, or a pre-existing output directory
    #[error("Configuration error: {0}")]
    Config(String),

    /// The producer could not be started
    #[error("Failed to launch producer: {0}")]
    Launch(String),

    /// The producer failed after launch (non-zero exit, wait failure)
    #[error("Producer failed: {0}")]
    Producer(String),

    /// The monitored path exists but is not a directory
    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    /// The monitored directory could not be stat'ed or listed
    #[error("Failed to probe {}: {source}", .path.display())]
    Probe {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A stop or continue signal could not be delivered
    #[error("Failed to send {signal} to producer: {reason}")]
    Signal { signal: &'static str, reason: String },

    /// The remote store rejected a bucket or an object
    #[error("Upload failed: {0}")]
    Upload(String),

    /// A local file could not be opened or truncated during a drain
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The monitor task panicked, was cancelled, or was already joined
    #[error("Monitor stopped unexpectedly: {0}")]
    Monitor(String),

    /// A drain stopped part-way; earlier files are uploaded and truncated,
    /// `file` and everything after it are untouched
    #[error("Drain aborted at '{file}' after {drained} file(s): {source}")]
    DrainPartialFailure {
        file: String,
        drained: usize,
        #[source]
        source: Box<GuardError>,
    },
}

impl GuardError {
    /// Create a configuration error with a message
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a launch error with a message
    pub fn launch(msg: impl Into<String>) -> Self {
        Self::Launch(msg.into())
    }

    /// Create a producer failure with a message
    pub fn producer(msg: impl Into<String>) -> Self {
        Self::Producer(msg.into())
    }

    /// Create a signal delivery error
    pub fn signal(signal: &'static str, reason: impl Into<String>) -> Self {
        Self::Signal {
            signal,
            reason: reason.into(),
        }
    }

    /// Create an upload error with a message
    pub fn upload(msg: impl Into<String>) -> Self {
        Self::Upload(msg.into())
    }

    pub(crate) fn probe(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Probe {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn partial(file: impl Into<String>, drained: usize, source: GuardError) -> Self {
        Self::DrainPartialFailure {
            file: file.into(),
            drained,
            source: Box::new(source),
        }
    }
}

/// Result type alias for backpressure operations
pub type Result<T> = std::result::Result<T, GuardError>;
