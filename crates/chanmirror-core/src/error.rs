//! Error types for chanmirror-core.

use std::path::PathBuf;

use chanmirror_config::error::ConfigError;
use chanmirror_dl::error::DownloadError;
use chanmirror_utils::error::{FileSystemError, PathError};
use miette::Diagnostic;
use thiserror::Error;

/// A file on disk does not match the record that describes it.
#[derive(Error, Diagnostic, Debug)]
pub enum IntegrityError {
    #[error("`{}` is empty", path.display())]
    #[diagnostic(code(chanmirror::integrity::empty))]
    EmptyFile { path: PathBuf },

    #[error("Size mismatch for `{}`: expected {expected} bytes, found {actual}", path.display())]
    #[diagnostic(code(chanmirror::integrity::size))]
    SizeMismatch {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    #[error("SHA-256 mismatch for `{}`: expected {expected}, found {actual}", path.display())]
    #[diagnostic(
        code(chanmirror::integrity::sha256),
        help("The file is corrupted or was replaced upstream. It will be downloaded again.")
    )]
    HashMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("Failed to read `{}`", path.display())]
    #[diagnostic(code(chanmirror::integrity::unreadable))]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Why a single package could not be made present.
#[derive(Error, Diagnostic, Debug)]
pub enum EnsureError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Integrity(#[from] IntegrityError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Transport(#[from] DownloadError),

    #[error(transparent)]
    #[diagnostic(code(chanmirror::filesystem))]
    FileSystem(#[from] FileSystemError),

    #[error("Error while {action}")]
    #[diagnostic(code(chanmirror::io), help("Check file permissions and disk space"))]
    Io {
        action: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{filename}` would be written outside the `{platform}` directory")]
    #[diagnostic(
        code(chanmirror::ensure::unsafe_path),
        help("Platform and file names must be single path components")
    )]
    UnsafePath { platform: String, filename: String },
}

#[derive(Error, Diagnostic, Debug)]
pub enum RepodataError {
    #[error("Failed to read `{}`", path.display())]
    #[diagnostic(code(chanmirror::repodata::read))]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed repodata in `{origin}`")]
    #[diagnostic(
        code(chanmirror::repodata::parse),
        help("The index is not valid repodata JSON")
    )]
    Parse {
        origin: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize repodata")]
    #[diagnostic(code(chanmirror::repodata::serialize))]
    Serialize(#[source] serde_json::Error),

    #[error("Failed to decompress bzip2 data")]
    #[diagnostic(code(chanmirror::repodata::bzip2))]
    Decompress(#[source] std::io::Error),

    #[error("Failed to compress bzip2 data")]
    #[diagnostic(code(chanmirror::repodata::bzip2))]
    Compress(#[source] std::io::Error),
}

/// A spec could not be turned into a set of concrete packages.
#[derive(Error, Diagnostic, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("Invalid package spec `{spec}`: {reason}")]
    #[diagnostic(
        code(chanmirror::resolve::invalid_spec),
        help("Use conda match spec syntax, e.g. `numpy`, `numpy=1.26`, `numpy >=1.26,<2`")
    )]
    InvalidSpec { spec: String, reason: String },

    #[error("Nothing provides `{spec}`")]
    #[diagnostic(code(chanmirror::resolve::not_found))]
    NotFound { spec: String },

    #[error("`{name}` was already chosen as {chosen}, which does not satisfy `{spec}`")]
    #[diagnostic(
        code(chanmirror::resolve::conflict),
        help("Resolve the package on its own or relax the conflicting constraint")
    )]
    Conflict {
        name: String,
        chosen: String,
        spec: String,
    },

    #[error("{0}")]
    #[diagnostic(code(chanmirror::resolve::unsatisfiable))]
    Unsatisfiable(String),
}

/// Structural error: the run cannot continue.
#[derive(Error, Diagnostic, Debug)]
pub enum MirrorError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(
        code(chanmirror::filesystem),
        help("Check that the target directory is writable")
    )]
    FileSystem(#[from] FileSystemError),

    #[error(transparent)]
    #[diagnostic(code(chanmirror::path))]
    Path(#[from] PathError),

    #[error("Error while {action}")]
    #[diagnostic(code(chanmirror::io), help("Check file permissions and disk space"))]
    IoError {
        action: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Repodata(#[from] RepodataError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Download(#[from] DownloadError),

    #[error("Failed to load upstream channel `{channel}`")]
    #[diagnostic(
        code(chanmirror::upstream),
        help("Check the channel name or URL and your network connection")
    )]
    Upstream {
        channel: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Worker task failed: {0}")]
    #[diagnostic(
        code(chanmirror::task),
        help("This is an internal error, please report it")
    )]
    Task(String),

    #[error("{0}")]
    #[diagnostic(code(chanmirror::error))]
    Custom(String),
}

/// Trait for adding context to IO errors.
pub trait ErrorContext<T> {
    fn with_context<C>(self, context: C) -> std::result::Result<T, MirrorError>
    where
        C: FnOnce() -> String;
}

impl<T> ErrorContext<T> for std::io::Result<T> {
    fn with_context<C>(self, context: C) -> std::result::Result<T, MirrorError>
    where
        C: FnOnce() -> String,
    {
        self.map_err(|err| {
            MirrorError::IoError {
                action: context(),
                source: err,
            }
        })
    }
}
