//! Ports (trait definitions) for external dependencies
//!
//! This module defines the contracts (ports) that external adapters must implement.
//! Following hexagonal architecture, the domain defines what it needs, and the
//! infrastructure provides implementations.
//!
//! ## Static Dispatch
//!
//! `UploadTarget` uses native Rust async traits with `impl Future` return types
//! instead of `async_trait` to keep static dispatch. `ProcessController` is
//! synchronous: delivering a signal is a single system call.

use std::future::Future;
use std::path::Path;

use crate::backpressure::{BucketName, ObjectName, Result};

/// Port for the remote object store receiving drained files
///
/// Implementations must convert every infrastructure failure into
/// `GuardError::Upload`. Calls are awaited one at a time; there is no
/// timeout, so a hung call blocks the whole controller.
pub trait UploadTarget: Send + Sync {
    /// Create `bucket`, treating "already owned by us" as success
    ///
    /// # Errors
    ///
    /// Returns `GuardError::Upload` for any other creation failure
    fn create_bucket_if_absent(&self, bucket: &BucketName) -> impl Future<Output = Result<()>> + Send;

    /// Upload the current contents of the file at `path` as `object`
    ///
    /// # Returns
    ///
    /// The number of bytes written to the store
    ///
    /// # Errors
    ///
    /// Returns `GuardError::Upload` if the store rejects the object
    fn put_object(
        &self,
        bucket: &BucketName,
        object: &ObjectName,
        path: &Path,
    ) -> impl Future<Output = Result<u64>> + Send;
}

/// Result of asking the producer to stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suspension {
    /// The producer is stopped and must be resumed after the drain
    Suspended,
    /// The producer has already exited; nothing was signalled
    Exited,
}

/// Port for pausing and continuing the producer process
///
/// While suspended the producer must perform no writes; this is the only
/// mutual exclusion between the producer and a drain. The monitor never
/// issues two suspends without a resume in between.
#[cfg_attr(test, mockall::automock)]
pub trait ProcessController: Send + Sync {
    /// Stop the producer
    ///
    /// Returns `Suspension::Exited` once the producer has terminated, in
    /// which case no signal is sent and `resume` must not be expected.
    ///
    /// # Errors
    ///
    /// Returns `GuardError::Signal` if the signal cannot be delivered to a
    /// live process
    fn suspend(&self) -> Result<Suspension>;

    /// Continue a stopped producer
    ///
    /// A producer that exited while stopped needs no continue, so that case
    /// succeeds.
    ///
    /// # Errors
    ///
    /// Returns `GuardError::Signal` if the signal cannot be delivered to a
    /// live process
    fn resume(&self) -> Result<()>;
}
