//! Drainer - moves the monitored directory's contents to remote storage
//!
//! Each file is uploaded under a fresh object name and then truncated in
//! place. Files are never deleted: the producer may still hold them open for
//! appending and must be able to keep writing without reopening.

use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncSeekExt;
use tracing::{debug, info, instrument, warn};

use super::error::{GuardError, Result};
use super::naming::{BucketName, ObjectName, ObjectSequences};
use super::probe;
use crate::ports::UploadTarget;

/// Outcome of one successful drain
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    /// Objects written, in upload order
    pub objects: Vec<ObjectName>,
    /// Bytes reported written by the store
    pub bytes: u64,
    /// Entries left alone (subdirectories, already-drained empty files)
    pub skipped: usize,
}

impl DrainReport {
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

/// A regular file found when the directory was listed
struct TrackedFile {
    name: String,
    path: PathBuf,
}

/// Uploads and truncates every file in a directory
///
/// The drainer owns the per-name sequence counters for its run, so two
/// drainers never share object numbering.
///
/// It must only be invoked while the producer is guaranteed not to be
/// writing: suspended, or already exited.
pub struct Drainer<U> {
    target: U,
    bucket: BucketName,
    sequences: ObjectSequences,
}

impl<U> Drainer<U>
where
    U: UploadTarget,
{
    /// Create a drainer writing into `bucket` with fresh counters
    pub fn new(target: U, bucket: BucketName) -> Self {
        Self {
            target,
            bucket,
            sequences: ObjectSequences::new(),
        }
    }

    /// Create the run's bucket if it does not exist yet
    pub async fn prepare(&self) -> Result<()> {
        self.target.create_bucket_if_absent(&self.bucket).await?;
        info!(bucket = %self.bucket, "Bucket ready");
        Ok(())
    }

    /// Upload then truncate every regular file currently in `dir`
    ///
    /// Entries are processed in name order. The first failure aborts the
    /// drain: files already handled stay uploaded and truncated, the failing
    /// file and all later ones are left untouched. A later drain re-lists the
    /// directory and picks up whatever still has content.
    ///
    /// # Errors
    ///
    /// - `GuardError::NotADirectory` / `GuardError::Probe` if `dir` cannot be listed
    /// - `GuardError::Io` if a file name is not valid UTF-8; nothing is uploaded
    /// - `GuardError::DrainPartialFailure` wrapping the upload or I/O error
    ///   that stopped the drain
    #[instrument(skip(self, dir), fields(dir = %dir.display(), bucket = %self.bucket))]
    pub async fn drain(&mut self, dir: &Path) -> Result<DrainReport> {
        let (files, skipped) = self.list_files(dir).await?;
        let mut report = DrainReport {
            skipped,
            ..DrainReport::default()
        };

        debug!(files = files.len(), "Draining directory");

        for file in files {
            match self.drain_file(&file).await {
                Ok(Some((object, bytes))) => {
                    report.objects.push(object);
                    report.bytes += bytes;
                }
                Ok(None) => report.skipped += 1,
                Err(err) => {
                    warn!(file = %file.name, drained = report.objects.len(), error = %err, "Drain aborted");
                    return Err(GuardError::partial(file.name, report.objects.len(), err));
                }
            }
        }

        info!(
            objects = report.objects.len(),
            bytes = report.bytes,
            skipped = report.skipped,
            "Drain complete"
        );
        Ok(report)
    }

    /// Regular files in name order, plus the number of other entries passed over
    async fn list_files(&self, dir: &Path) -> Result<(Vec<TrackedFile>, usize)> {
        probe::ensure_directory(dir).await?;

        let mut entries = fs::read_dir(dir)
            .await
            .map_err(|err| GuardError::probe(dir, err))?;

        let mut files = Vec::new();
        let mut skipped = 0;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|err| GuardError::probe(dir, err))?
        {
            let file_type = entry
                .file_type()
                .await
                .map_err(|err| GuardError::probe(entry.path(), err))?;
            if !file_type.is_file() {
                debug!(entry = %entry.path().display(), "Skipping non-regular entry");
                skipped += 1;
                continue;
            }
            // Object names are derived from file names, so they must be exact
            let name = entry.file_name().into_string().map_err(|raw| {
                GuardError::io(
                    entry.path(),
                    io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("file name {:?} is not valid UTF-8", raw),
                    ),
                )
            })?;
            files.push(TrackedFile {
                name,
                path: entry.path(),
            });
        }

        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok((files, skipped))
    }

    async fn drain_file(&mut self, file: &TrackedFile) -> Result<Option<(ObjectName, u64)>> {
        let io_err = |err| GuardError::io(&file.path, err);

        let mut handle = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&file.path)
            .await
            .map_err(io_err)?;

        let size = handle.metadata().await.map_err(io_err)?.len();
        if size == 0 && self.sequences.uploads(&file.name) > 0 {
            debug!(file = %file.name, "Nothing new since last drain");
            return Ok(None);
        }

        let object = self.sequences.next_name(&file.name);
        let bytes = self
            .target
            .put_object(&self.bucket, &object, &file.path)
            .await?;
        self.sequences.commit(&file.name);

        handle.set_len(0).await.map_err(io_err)?;
        handle.seek(SeekFrom::Start(0)).await.map_err(io_err)?;

        debug!(file = %file.name, object = %object, bytes, "Uploaded and truncated");
        Ok(Some((object, bytes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::InMemoryTarget;
    use std::fs;
    use std::io::Write;
    use tempfile::TempDir;

    fn drainer(target: &InMemoryTarget) -> Drainer<InMemoryTarget> {
        Drainer::new(target.clone(), BucketName::parse("test-bucket").unwrap())
    }

    fn file_len(dir: &TempDir, name: &str) -> u64 {
        fs::metadata(dir.path().join(name)).unwrap().len()
    }

    #[tokio::test]
    async fn test_empty_directory_uploads_nothing() {
        let dir = TempDir::new().unwrap();
        let target = InMemoryTarget::new();
        let mut drainer = drainer(&target);

        let report = drainer.drain(dir.path()).await.unwrap();

        assert!(report.is_empty());
        assert_eq!(target.put_calls(), 0);
    }

    #[tokio::test]
    async fn test_drain_uploads_and_truncates_every_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("f1"), b"one").unwrap();
        fs::write(dir.path().join("f2"), b"two two").unwrap();
        fs::write(dir.path().join("f3"), b"three three three").unwrap();
        let target = InMemoryTarget::new();
        let mut drainer = drainer(&target);

        let report = drainer.drain(dir.path()).await.unwrap();

        let names: Vec<&str> = report.objects.iter().map(ObjectName::as_str).collect();
        assert_eq!(names, vec!["f1-0", "f2-0", "f3-0"]);
        assert_eq!(report.bytes, 3 + 7 + 17);
        assert_eq!(target.object("f2-0").unwrap().as_ref(), b"two two");
        for name in ["f1", "f2", "f3"] {
            assert_eq!(file_len(&dir, name), 0);
        }
    }

    #[tokio::test]
    async fn test_repeated_drains_use_new_object_names() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dump.sql");
        let target = InMemoryTarget::new();
        let mut drainer = drainer(&target);

        fs::write(&path, b"first").unwrap();
        drainer.drain(dir.path()).await.unwrap();

        fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap()
            .write_all(b"second")
            .unwrap();
        drainer.drain(dir.path()).await.unwrap();

        assert_eq!(target.object("dump.sql-0").unwrap().as_ref(), b"first");
        assert_eq!(target.object("dump.sql-1").unwrap().as_ref(), b"second");
        assert_eq!(drainer.sequences.uploads("dump.sql"), 2);
    }

    #[tokio::test]
    async fn test_open_append_handle_writes_from_start_after_drain() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("f1");
        let mut producer = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .unwrap();
        producer.write_all(&[b'a'; 10]).unwrap();

        let target = InMemoryTarget::new();
        let mut drainer = drainer(&target);
        drainer.drain(dir.path()).await.unwrap();
        assert_eq!(file_len(&dir, "f1"), 0);

        producer.write_all(b"bbbbb").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"bbbbb");
    }

    #[tokio::test]
    async fn test_failed_upload_stops_drain() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("f1"), vec![1u8; 30]).unwrap();
        fs::write(dir.path().join("f2"), vec![2u8; 40]).unwrap();
        fs::write(dir.path().join("f3"), vec![3u8; 50]).unwrap();
        let target = InMemoryTarget::new();
        target.fail_on("f2-0");
        let mut drainer = drainer(&target);

        let err = drainer.drain(dir.path()).await.unwrap_err();

        match err {
            GuardError::DrainPartialFailure {
                file,
                drained,
                source,
            } => {
                assert_eq!(file, "f2");
                assert_eq!(drained, 1);
                assert!(matches!(*source, GuardError::Upload(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(target.object("f1-0").is_some());
        assert!(target.object("f2-0").is_none());
        assert!(target.object("f3-0").is_none());
        assert_eq!(file_len(&dir, "f1"), 0);
        assert_eq!(file_len(&dir, "f2"), 40);
        assert_eq!(file_len(&dir, "f3"), 50);
    }

    #[tokio::test]
    async fn test_retry_after_failure_reuses_object_name() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("f1"), b"payload").unwrap();
        fs::write(dir.path().join("f2"), b"payload").unwrap();
        let target = InMemoryTarget::new();
        target.fail_on("f2-0");
        let mut drainer = drainer(&target);

        assert!(drainer.drain(dir.path()).await.is_err());
        target.clear_failure();
        let report = drainer.drain(dir.path()).await.unwrap();

        // f1 was already drained and is empty, f2 keeps its first name
        let names: Vec<&str> = report.objects.iter().map(ObjectName::as_str).collect();
        assert_eq!(names, vec!["f2-0"]);
        assert_eq!(report.skipped, 1);
    }

    #[tokio::test]
    async fn test_new_empty_file_is_uploaded_once() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("metadata"), b"").unwrap();
        let target = InMemoryTarget::new();
        let mut drainer = drainer(&target);

        let first = drainer.drain(dir.path()).await.unwrap();
        let second = drainer.drain(dir.path()).await.unwrap();

        assert_eq!(first.objects.len(), 1);
        assert!(second.is_empty());
        assert_eq!(target.object("metadata-0").unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_subdirectories_are_skipped() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("f1"), b"x").unwrap();
        let target = InMemoryTarget::new();
        let mut drainer = drainer(&target);

        let report = drainer.drain(dir.path()).await.unwrap();

        assert_eq!(report.objects.len(), 1);
        assert_eq!(report.skipped, 1);
    }

    #[tokio::test]
    async fn test_prepare_creates_bucket() {
        let target = InMemoryTarget::new();
        let drainer = drainer(&target);

        drainer.prepare().await.unwrap();
        drainer.prepare().await.unwrap();

        assert_eq!(target.buckets(), vec!["test-bucket".to_string()]);
    }

    #[tokio::test]
    async fn test_drain_of_regular_file_path_fails() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("f1"), b"x").unwrap();
        let target = InMemoryTarget::new();
        let mut drainer = drainer(&target);

        let err = drainer.drain(&dir.path().join("f1")).await.unwrap_err();

        assert!(matches!(err, GuardError::NotADirectory(_)));
    }

    #[tokio::test]
    async fn test_non_utf8_name_is_rejected_before_any_upload() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a-valid"), b"x").unwrap();
        fs::write(dir.path().join(OsStr::from_bytes(b"dump\xff")), b"y").unwrap();
        let target = InMemoryTarget::new();
        let mut drainer = drainer(&target);

        let err = drainer.drain(dir.path()).await.unwrap_err();

        assert!(matches!(err, GuardError::Io { .. }));
        assert_eq!(target.put_calls(), 0);
        assert_eq!(file_len(&dir, "a-valid"), 1);
    }
}
