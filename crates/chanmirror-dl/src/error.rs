use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum DownloadError {
    #[error("Invalid URL: {url}")]
    #[diagnostic(code(chanmirror_dl::invalid_url))]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Unsupported URL scheme: {url}")]
    #[diagnostic(
        code(chanmirror_dl::unknown_url),
        help("Only http:// and https:// URLs can be fetched")
    )]
    UnknownUrl { url: String },

    #[error(transparent)]
    #[diagnostic(
        code(chanmirror_dl::network),
        help("Check your internet connection or try again later")
    )]
    Network(#[from] Box<ureq::Error>),

    #[error("HTTP {status}: {url}")]
    #[diagnostic(code(chanmirror_dl::http_error))]
    HttpError { status: u16, url: String },

    #[error("I/O error: {0}")]
    #[diagnostic(code(chanmirror_dl::io))]
    Io(#[from] std::io::Error),
}

impl From<ureq::Error> for DownloadError {
    /// Converts a `ureq::Error` into a `DownloadError`.
    ///
    /// Status code failures become [`DownloadError::HttpError`] without a URL, every other
    /// error is wrapped as [`DownloadError::Network`].
    fn from(e: ureq::Error) -> Self {
        match e {
            ureq::Error::StatusCode(status) => {
                Self::HttpError {
                    status,
                    url: String::new(),
                }
            }
            other => Self::Network(Box::new(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_error_invalid_url() {
        let err = DownloadError::InvalidUrl {
            url: "invalid".to_string(),
            source: url::ParseError::RelativeUrlWithoutBase,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Invalid URL"));
        assert!(msg.contains("invalid"));
    }

    #[test]
    fn test_download_error_http_error() {
        let err = DownloadError::HttpError {
            status: 404,
            url: "https://conda.anaconda.org/conda-forge/noarch/missing.conda".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("HTTP 404"));
        assert!(msg.contains("missing.conda"));
    }

    #[test]
    fn test_download_error_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = DownloadError::Io(io_err);
        assert!(err.to_string().contains("I/O error"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_from_ureq_error() {
        let download_err: DownloadError = ureq::Error::ConnectionFailed.into();
        assert!(matches!(download_err, DownloadError::Network(_)));

        let download_err: DownloadError = ureq::Error::StatusCode(503).into();
        assert!(matches!(
            download_err,
            DownloadError::HttpError {
                status: 503,
                ..
            }
        ));
    }
}
