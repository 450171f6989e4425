//! Scratch directory management
//!
//! A [`ScratchDir`] owns the process-wide scratch directory that holds
//! per-session socket files. The directory is created lazily on first use and
//! removed recursively by [`ScratchDir::purge`] at host teardown. Creation is
//! guarded so concurrent first calls cannot race to create two directories.
//!
//! The caller is responsible for not purging while a session with a live
//! subprocess still references a path inside the directory.

use std::io;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use byedap_config::constants::SCRATCH_DIR_PREFIX;
use tempfile::TempDir;
use tracing::{debug, warn};

/// Lazily created, explicitly purged scratch directory.
#[derive(Debug, Default)]
pub struct ScratchDir {
    // None until first use and after purge
    inner: Mutex<Option<TempDir>>,
}

impl ScratchDir {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `scratch_dir/name`, creating the scratch directory if needed.
    ///
    /// The first caller creates the directory; subsequent callers reuse it.
    /// If the directory was purged or removed externally, it is recreated.
    pub fn path(&self, name: &str) -> io::Result<PathBuf> {
        let mut slot = self.inner.lock().unwrap_or_else(PoisonError::into_inner);

        let missing = !matches!(slot.as_ref(), Some(dir) if dir.path().exists());
        if missing {
            let created = tempfile::Builder::new()
                .prefix(SCRATCH_DIR_PREFIX)
                .tempdir()?;
            debug!(path = %created.path().display(), "Created scratch directory");
            *slot = Some(created);
        }

        let dir = slot.as_ref().ok_or_else(unavailable)?;
        Ok(dir.path().join(name))
    }

    /// Recursively remove the scratch directory and everything under it.
    ///
    /// A no-op (not an error) if the directory was never created or is
    /// already gone. Safe to call repeatedly.
    pub fn purge(&self) {
        let mut slot = self.inner.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(dir) = slot.take() {
            let path = dir.path().to_path_buf();
            match dir.close() {
                Ok(()) => debug!(path = %path.display(), "Purged scratch directory"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), "Failed to purge scratch directory: {}", e),
            }
        }
    }
}

fn unavailable() -> io::Error {
    io::Error::other("scratch directory unavailable")
}
