//! Filesystem lock preventing overlapping scrape runs on the same host.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, warn};

/// Held for the duration of a scrape run; the lock file is removed on drop.
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    /// Try to take the lock. Returns None when another run already holds it.
    pub fn acquire(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = path.as_ref().to_path_buf();
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Ok(None);
            }
            Err(e) => {
                return Err(e).with_context(|| format!("creating lock file {}", path.display()))
            }
        };

        writeln!(file, "pid: {}", std::process::id())
            .and_then(|()| writeln!(file, "started_at: {}", Utc::now().to_rfc3339()))
            .with_context(|| format!("writing lock file {}", path.display()))?;

        info!(path = %path.display(), "Run lock acquired");
        Ok(Some(Self { path }))
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "Lock file not removed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_is_refused_until_release() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scraping.lock");

        let lock = RunLock::acquire(&path).unwrap();
        assert!(lock.is_some());
        assert!(RunLock::acquire(&path).unwrap().is_none());

        drop(lock);
        assert!(!path.exists());
        assert!(RunLock::acquire(&path).unwrap().is_some());
    }

    #[test]
    fn lock_file_records_the_owning_process() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scraping.lock");

        let _lock = RunLock::acquire(&path).unwrap().unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains(&format!("pid: {}", std::process::id())));
    }
}
