//! Scoped temporary workspace for intermediate markdown.
//!
//! One [`Workspace`] is created per batch and passed explicitly to whatever
//! needs to write intermediates. The underlying `TempDir` is deleted when the
//! handle is closed or dropped, which covers normal completion, early `?`
//! returns and panics alike.

use crate::error::CertbookError;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

/// Handle to the batch's temporary directory.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn new() -> Result<Self, CertbookError> {
        let dir = tempfile::Builder::new()
            .prefix("certbook-")
            .tempdir()
            .map_err(CertbookError::WorkspaceFailed)?;
        debug!("Workspace at {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `<stem>.md` into the workspace and return its path.
    pub fn write_markdown(&self, stem: &str, body: &str) -> io::Result<PathBuf> {
        let path = self.dir.path().join(format!("{stem}.md"));
        std::fs::write(&path, body)?;
        Ok(path)
    }

    /// Delete the workspace now, logging instead of failing.
    pub fn close(self) {
        let path = self.dir.path().to_path_buf();
        match self.dir.close() {
            Ok(()) => debug!("Removed workspace {}", path.display()),
            Err(e) => warn!("Could not remove workspace {}: {}", path.display(), e),
        }
    }
}
