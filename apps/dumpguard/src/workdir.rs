use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use dumpguard_domain::GuardError;
use tracing::{info, warn};

/// The producer's output directory, owned for the length of a run
///
/// Created before the producer starts and removed recursively when the run
/// ends: explicitly through [`MonitoredDirectory::remove`] on success, or on
/// drop for every failure path.
#[derive(Debug)]
pub struct MonitoredDirectory {
    path: PathBuf,
    removed: bool,
}

impl MonitoredDirectory {
    /// Create the directory (and missing parents)
    pub fn create(path: &Path) -> Result<Self, GuardError> {
        if path.exists() {
            return Err(GuardError::config(format!(
                "output directory {} already exists",
                path.display()
            )));
        }
        std::fs::create_dir_all(path).map_err(|err| {
            GuardError::config(format!("cannot create {}: {}", path.display(), err))
        })?;

        info!(dir = %path.display(), "Created monitored directory");
        Ok(Self {
            path: path.to_path_buf(),
            removed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the directory and everything left in it
    pub fn remove(mut self) -> io::Result<()> {
        self.removed = true;
        std::fs::remove_dir_all(&self.path)?;
        info!(dir = %self.path.display(), "Removed monitored directory");
        Ok(())
    }
}

impl Drop for MonitoredDirectory {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => info!(dir = %self.path.display(), "Removed monitored directory"),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => warn!(dir = %self.path.display(), error = %err, "Failed to remove monitored directory"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_remove_deletes_contents() {
        let root = TempDir::new().unwrap();
        let path = root.path().join("dump");
        let dir = MonitoredDirectory::create(&path).unwrap();
        std::fs::write(dir.path().join("f1"), b"data").unwrap();

        dir.remove().unwrap();

        assert!(!path.exists());
    }

    #[test]
    fn test_drop_removes_directory() {
        let root = TempDir::new().unwrap();
        let path = root.path().join("dump");

        {
            let dir = MonitoredDirectory::create(&path).unwrap();
            std::fs::write(dir.path().join("f1"), b"data").unwrap();
        }

        assert!(!path.exists());
    }

    #[test]
    fn test_existing_directory_is_config_error() {
        let root = TempDir::new().unwrap();

        let err = MonitoredDirectory::create(root.path()).unwrap_err();

        assert!(matches!(err, GuardError::Config(_)));
        assert!(root.path().exists());
    }
}
