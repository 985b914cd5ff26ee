use std::path::PathBuf;

use crate::OperationId;

/// All event types emitted while mirroring a channel.
///
/// Packages are identified by their platform subdirectory and file name.
#[derive(Debug, Clone)]
pub enum MirrorEvent {
    /// Resolution of the requested specs is starting.
    Resolving { total_specs: usize },
    /// A single spec finished resolving.
    SpecResolved { spec: String, packages: usize },
    /// A single spec could not be resolved.
    SpecFailed { spec: String, reason: String },
    /// A platform is about to be processed.
    PlatformStarted { platform: String, packages: usize },
    /// Download is starting.
    DownloadStarting {
        op_id: OperationId,
        platform: String,
        filename: String,
        total: u64,
    },
    /// Download progress update.
    DownloadProgress {
        op_id: OperationId,
        platform: String,
        filename: String,
        current: u64,
        total: u64,
    },
    /// Download completed.
    DownloadComplete {
        op_id: OperationId,
        platform: String,
        filename: String,
        total: u64,
    },
    /// The package is already present and valid.
    PackagePresent {
        op_id: OperationId,
        platform: String,
        filename: String,
    },
    /// Verification stage of a downloaded package.
    Verifying {
        op_id: OperationId,
        platform: String,
        filename: String,
        stage: VerifyStage,
    },
    /// The package could not be mirrored.
    PackageFailed {
        op_id: OperationId,
        platform: String,
        filename: String,
        reason: String,
    },
    /// A stale or corrupt file was deleted from the mirror.
    FileRemoved { platform: String, filename: String },
    /// A platform index was written.
    RepodataWritten {
        platform: String,
        path: PathBuf,
        packages: usize,
    },
    /// Progress across the packages of one platform.
    BatchProgress {
        platform: String,
        completed: u32,
        total: u32,
        failed: u32,
    },
    /// Free-form log message.
    Log { level: LogLevel, message: String },
}

/// Verification stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyStage {
    /// Size and SHA-256 match the index.
    Passed,
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}
