//! Error types for the registry crate.

use chanmirror_core::error::{MirrorError, RepodataError};
use chanmirror_dl::error::DownloadError;
use miette::Diagnostic;
use thiserror::Error;

/// Errors that can occur while reading an upstream channel.
#[derive(Error, Diagnostic, Debug)]
pub enum RegistryError {
    #[error("Invalid channel `{0}`")]
    #[diagnostic(
        code(chanmirror_registry::invalid_channel),
        help("Use a channel name such as `conda-forge` or a full URL")
    )]
    InvalidChannel(String),

    #[error("Invalid URL: {0}")]
    #[diagnostic(
        code(chanmirror_registry::invalid_url),
        help("Ensure the URL is valid and properly formatted")
    )]
    InvalidUrl(String),

    #[error(transparent)]
    #[diagnostic(
        code(chanmirror_registry::download),
        help("Check your network connection and the channel URL")
    )]
    Download(#[from] DownloadError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Repodata(#[from] RepodataError),

    #[error("Repodata for `{0}` is too short")]
    #[diagnostic(
        code(chanmirror_registry::metadata_too_short),
        help("The upstream index appears to be truncated")
    )]
    MetadataTooShort(String),
}

pub type Result<T> = std::result::Result<T, RegistryError>;

impl RegistryError {
    /// Wraps the error as a structural failure of `channel`.
    pub fn into_mirror_error(self, channel: &str) -> MirrorError {
        MirrorError::Upstream {
            channel: channel.to_string(),
            source: Box::new(self),
        }
    }
}
