use std::path::PathBuf;

use chanmirror_core::{resolver::FailedSpec, state::LocalRepositoryState};
use serde::Serialize;

// ---- Clone / Check ----

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Download what is missing and publish a new index.
    Clone,
    /// Report what `Clone` would do without touching the target directory.
    Check,
}

impl SyncMode {
    pub fn is_dry_run(self) -> bool {
        matches!(self, SyncMode::Check)
    }
}

/// Outcome of synchronizing one platform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlatformSyncReport {
    pub platform: String,
    /// Bytes of every package counted in `count`.
    pub total_size: u64,
    /// Resolved packages that are valid on disk after the run, or would be.
    pub count: usize,
    /// Packages downloaded, or that would be downloaded.
    pub new: usize,
    /// Entries of the previous index carried over into the new one.
    pub old: usize,
    pub failed: usize,
    pub failed_packages: Vec<String>,
    /// Path of the written `repodata.json`; `None` on a dry run.
    pub repodata: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub dry_run: bool,
    pub platforms: Vec<PlatformSyncReport>,
    pub failed_specs: Vec<FailedSpec>,
}

impl SyncReport {
    pub fn downloaded(&self) -> usize {
        self.platforms.iter().map(|p| p.new).sum()
    }

    pub fn failed(&self) -> usize {
        self.platforms.iter().map(|p| p.failed).sum()
    }
}

// ---- Validate / Clean ----

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlatformValidationReport {
    pub platform: String,
    pub packages: usize,
    pub invalid_packages: Vec<String>,
    pub unknown_files: Vec<String>,
    pub removed_files: Vec<String>,
    /// The local index could not be parsed, so every file was reported unknown.
    pub degraded: bool,
}

impl From<LocalRepositoryState> for PlatformValidationReport {
    fn from(state: LocalRepositoryState) -> Self {
        Self {
            platform: state.platform,
            packages: state.packages.len(),
            invalid_packages: state.invalid_packages,
            unknown_files: state.unknown_files,
            removed_files: state.removed_files,
            degraded: state.degraded,
        }
    }
}

// ---- List ----

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ListEntry {
    pub platform: String,
    pub name: String,
    pub version: String,
    pub filename: String,
    pub size: u64,
}
