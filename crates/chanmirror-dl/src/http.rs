use tracing::debug;
use ureq::{
    http::{header::CONTENT_LENGTH, Response},
    Body,
};
use url::Url;

use crate::{error::DownloadError, http_client::SHARED_AGENT};

pub struct Http;

impl Http {
    /// Issues a GET request through the shared agent.
    ///
    /// The URL must be absolute and use `http` or `https`. Any non-2xx status is turned into
    /// [`DownloadError::HttpError`] carrying the requested URL.
    pub fn fetch(url: &str) -> Result<Response<Body>, DownloadError> {
        let parsed = Url::parse(url).map_err(|source| {
            DownloadError::InvalidUrl {
                url: url.to_string(),
                source,
            }
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(DownloadError::UnknownUrl {
                url: url.to_string(),
            });
        }

        debug!("GET {}", url);
        let resp = SHARED_AGENT.get(url).call()?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DownloadError::HttpError {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(resp)
    }

    /// Returns the `Content-Length` of a response, if the server sent a valid one.
    pub fn content_length(resp: &Response<Body>) -> Option<u64> {
        resp.headers()
            .get(CONTENT_LENGTH)
            .and_then(|h| h.to_str().ok())
            .and_then(|len| len.parse::<u64>().ok())
    }
}
