//! Backpressure domain module
//!
//! This module contains the disk-usage controller: measuring the monitored
//! directory, draining it to remote storage, and the loop that suspends the
//! producer around each drain.

pub mod drainer;
pub mod error;
pub mod limit;
pub mod monitor;
pub mod naming;
pub mod probe;

pub use drainer::{DrainReport, Drainer};
pub use error::{GuardError, Result};
pub use limit::DiskLimit;
pub use monitor::{
    BackpressureMonitor, DrainTrigger, MonitorHandle, MonitorReport, MonitorState,
    DEFAULT_TICK_INTERVAL,
};
pub use naming::{BucketName, ObjectName, ObjectSequences};
