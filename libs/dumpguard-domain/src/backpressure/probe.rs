//! Disk usage probe for the monitored directory
//!
//! Only immediate entries are counted. If the producer creates
//! subdirectories, the directory entry's own size is counted but its
//! contents are not.

use std::io::ErrorKind;
use std::path::Path;

use tokio::fs;
use tracing::{debug, trace};

use super::error::{GuardError, Result};
use super::limit::DiskLimit;

/// Check whether the immediate entries of `dir` add up to at least `limit`
///
/// Stops summing as soon as the bound is reached.
///
/// # Errors
///
/// - `GuardError::NotADirectory` if `dir` is not a directory
/// - `GuardError::Probe` if `dir` cannot be stat'ed or listed
pub async fn over_limit(dir: &Path, limit: DiskLimit) -> Result<bool> {
    let total = sum_entries(dir, Some(limit.bytes())).await?;
    let over = total >= limit.bytes();
    debug!(dir = %dir.display(), usage = total, limit = limit.bytes(), over, "Probed directory usage");
    Ok(over)
}

/// Fail unless `dir` resolves to a directory
pub(crate) async fn ensure_directory(dir: &Path) -> Result<()> {
    let metadata = fs::metadata(dir)
        .await
        .map_err(|err| GuardError::probe(dir, err))?;
    if !metadata.is_dir() {
        return Err(GuardError::NotADirectory(dir.to_path_buf()));
    }
    Ok(())
}

async fn sum_entries(dir: &Path, stop_at: Option<u64>) -> Result<u64> {
    ensure_directory(dir).await?;

    let mut entries = fs::read_dir(dir)
        .await
        .map_err(|err| GuardError::probe(dir, err))?;

    let mut total: u64 = 0;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|err| GuardError::probe(dir, err))?
    {
        let metadata = match entry.metadata().await {
            Ok(metadata) => metadata,
            // Removed or renamed by the producer after listing
            Err(err) if err.kind() == ErrorKind::NotFound => continue,
            Err(err) => return Err(GuardError::probe(entry.path(), err)),
        };

        total = total.saturating_add(metadata.len());
        trace!(entry = %entry.path().display(), size = metadata.len(), total, "Counted entry");

        if stop_at.is_some_and(|bound| total >= bound) {
            break;
        }
    }

    Ok(total)
}
