use std::{
    collections::HashMap,
    io::{Cursor, Read},
    sync::Mutex,
};

use crate::{error::DownloadError, http::Http};

/// An open response body together with its advertised length.
pub struct TransportResponse {
    pub reader: Box<dyn Read + Send>,
    pub content_length: Option<u64>,
}

impl TransportResponse {
    /// Reads the whole body into memory.
    pub fn into_bytes(mut self) -> Result<Vec<u8>, DownloadError> {
        let mut buf = Vec::with_capacity(self.content_length.unwrap_or(0) as usize);
        self.reader.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

/// Streamed GET by URL.
///
/// Everything that talks to the upstream channel goes through this trait, so the HTTP stack
/// can be replaced without touching the mirror logic.
pub trait Transport: Send + Sync {
    fn get(&self, url: &str) -> Result<TransportResponse, DownloadError>;

    fn get_bytes(&self, url: &str) -> Result<Vec<u8>, DownloadError> {
        self.get(url)?.into_bytes()
    }
}

/// [`Transport`] backed by the process-wide shared `ureq` agent.
#[derive(Clone, Default)]
pub struct HttpTransport;

impl Transport for HttpTransport {
    fn get(&self, url: &str) -> Result<TransportResponse, DownloadError> {
        let resp = Http::fetch(url)?;
        let content_length = Http::content_length(&resp);
        let reader = resp.into_body().into_reader();

        Ok(TransportResponse {
            reader: Box::new(reader),
            content_length,
        })
    }
}

/// [`Transport`] that serves fixed bodies from memory.
///
/// Unknown URLs answer with HTTP 404. Every request is recorded so callers can inspect what
/// was fetched.
#[derive(Default)]
pub struct MemoryTransport {
    bodies: HashMap<String, Vec<u8>>,
    requests: Mutex<Vec<String>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(mut self, url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        self.insert(url, body);
        self
    }

    pub fn insert(&mut self, url: impl Into<String>, body: impl Into<Vec<u8>>) {
        self.bodies.insert(url.into(), body.into());
    }

    /// URLs requested so far, in request order.
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    pub fn clear_requests(&self) {
        if let Ok(mut requests) = self.requests.lock() {
            requests.clear();
        }
    }
}

impl Transport for MemoryTransport {
    fn get(&self, url: &str) -> Result<TransportResponse, DownloadError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(url.to_string());
        }

        let body = self.bodies.get(url).ok_or_else(|| {
            DownloadError::HttpError {
                status: 404,
                url: url.to_string(),
            }
        })?;

        Ok(TransportResponse {
            content_length: Some(body.len() as u64),
            reader: Box::new(Cursor::new(body.clone())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_transport_serves_body() {
        let transport =
            MemoryTransport::new().with_body("https://example.org/noarch/a.conda", b"abc".to_vec());

        let resp = transport.get("https://example.org/noarch/a.conda").unwrap();
        assert_eq!(resp.content_length, Some(3));
        assert_eq!(resp.into_bytes().unwrap(), b"abc");
        assert_eq!(
            transport.requests(),
            vec!["https://example.org/noarch/a.conda".to_string()]
        );
    }

    #[test]
    fn test_memory_transport_unknown_url() {
        let transport = MemoryTransport::new();
        let err = transport
            .get_bytes("https://example.org/noarch/missing.conda")
            .unwrap_err();
        assert!(matches!(
            err,
            DownloadError::HttpError {
                status: 404,
                ..
            }
        ));
        assert_eq!(transport.requests().len(), 1);

        transport.clear_requests();
        assert!(transport.requests().is_empty());
    }
}
