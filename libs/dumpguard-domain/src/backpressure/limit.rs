use std::fmt;
use std::num::NonZeroU64;

use serde::{Deserialize, Serialize};

use super::error::{GuardError, Result};

/// Disk-usage bound for the monitored directory, in bytes
///
/// A zero limit would put every non-empty directory over the bound, so it is
/// rejected at construction rather than inside the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DiskLimit(NonZeroU64);

impl DiskLimit {
    /// Create a limit, failing with `GuardError::Config` for zero
    pub fn new(bytes: u64) -> Result<Self> {
        NonZeroU64::new(bytes)
            .map(Self)
            .ok_or_else(|| GuardError::config("disk usage limit must be greater than zero"))
    }

    pub fn bytes(&self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for DiskLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bytes", self.0)
    }
}

impl TryFrom<u64> for DiskLimit {
    type Error = GuardError;

    fn try_from(bytes: u64) -> Result<Self> {
        Self::new(bytes)
    }
}
