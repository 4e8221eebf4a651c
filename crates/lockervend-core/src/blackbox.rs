//! Append-only black-box logs.
//!
//! The black box survives resets of both the controller and the peripheral,
//! so engineering can reconstruct what happened after the fact. Writing is
//! best effort: a full disk or a missing permission is reported through
//! `tracing` and otherwise ignored, because diagnostics must never take the
//! kiosk down.

use crate::types::BlackBoxEntry;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Handle to one black-box log file.
///
/// Cloning is cheap; every append opens the file in append mode, so
/// concurrent writers never truncate each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlackBoxLog {
    path: PathBuf,
}

impl BlackBoxLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an entry.
    ///
    /// Returns `true` if the line reached the file.
    pub fn append(&self, entry: &BlackBoxEntry) -> bool {
        match self.try_append(&entry.to_line()) {
            Ok(()) => {
                debug!("Black box entry written to {}", self.path.display());
                true
            }
            Err(e) => {
                warn!(
                    "Failed to write black box entry to {}: {} (entry: {})",
                    self.path.display(),
                    e,
                    entry.message
                );
                false
            }
        }
    }

    fn try_append(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())
    }
}
