//! # dumpguard Domain Layer
//!
//! This crate contains the backpressure logic that keeps a dump producer's
//! output directory under a disk-usage bound. It follows hexagonal
//! architecture principles:
//!
//! - **Probe**: measures the monitored directory (`backpressure::probe`)
//! - **Drainer**: uploads and truncates every file (`backpressure::drainer`)
//! - **Monitor**: the periodic pause/drain/resume loop (`backpressure::monitor`)
//! - **Ports**: trait definitions for the remote store and process control
//!
//! ## Architecture
//!
//! This layer has NO dependencies on AWS or on OS signalling. Both are
//! expressed as traits (ports) implemented by the adapter crates.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::path::PathBuf;
//! use dumpguard_domain::{BackpressureMonitor, BucketName, DiskLimit, Drainer};
//! use dumpguard_domain::ports::{ProcessController, UploadTarget};
//!
//! async fn example<U: UploadTarget + 'static, P: ProcessController + 'static>(
//!     target: U,
//!     controller: P,
//! ) -> dumpguard_domain::Result<()> {
//!     let drainer = Drainer::new(target, BucketName::timestamped("mydumper")?);
//!     let limit = DiskLimit::new(64 * 1024 * 1024)?;
//!     let monitor = BackpressureMonitor::new(PathBuf::from("dump"), limit, drainer, controller);
//!     let mut handle = monitor.spawn();
//!     // ... wait for the producer to exit ...
//!     let report = handle.finish().await?;
//!     println!("uploaded {} objects", report.objects);
//!     Ok(())
//! }
//! ```

pub mod backpressure;
pub mod ports;

// Re-export commonly used types
pub use backpressure::{
    BackpressureMonitor, BucketName, DiskLimit, DrainReport, DrainTrigger, Drainer, GuardError,
    MonitorHandle, MonitorReport, MonitorState, ObjectName, ObjectSequences, Result,
    DEFAULT_TICK_INTERVAL,
};
pub use ports::{ProcessController, Suspension, UploadTarget};

#[cfg(test)]
pub(crate) mod test_support;
