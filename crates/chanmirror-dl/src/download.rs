use std::{
    fs::{self, File},
    io::{BufWriter, Read as _, Write as _},
    path::PathBuf,
};

use tracing::debug;

use crate::{
    error::DownloadError,
    transport::{Transport, TransportResponse},
    types::Progress,
};

/// Default read size for streamed downloads.
pub const DEFAULT_CHUNK_SIZE: usize = 16 * 1024;

pub struct Download {
    pub url: String,
    pub output: PathBuf,
    pub chunk_size: usize,
    pub on_progress: Option<Box<dyn Fn(Progress) + Send + Sync>>,
}

impl Download {
    /// Creates a new `Download` of `url` into `output`.
    ///
    /// The builder defaults to [`DEFAULT_CHUNK_SIZE`] reads and no progress callback. The
    /// parent directory of `output` must already exist.
    ///
    /// # Examples
    ///
    /// ```
    /// use chanmirror_dl::download::Download;
    ///
    /// let dl = Download::new(
    ///     "https://conda.anaconda.org/conda-forge/noarch/six-1.16.0-pyh6c4a22f_0.tar.bz2",
    ///     "/srv/mirror/noarch/six-1.16.0-pyh6c4a22f_0.tar.bz2",
    /// )
    /// .chunk_size(64 * 1024);
    /// ```
    pub fn new(url: impl Into<String>, output: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            output: output.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            on_progress: None,
        }
    }

    /// Sets the size of each read from the response body. Zero falls back to the default.
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = if chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            chunk_size
        };
        self
    }

    /// Registers a progress callback.
    ///
    /// The closure receives `Progress::Starting` once, `Progress::Chunk` after every chunk
    /// written, and `Progress::Complete` when the body has been fully written.
    pub fn progress<F>(mut self, on_progress: F) -> Self
    where
        F: Fn(Progress) + Send + Sync + 'static,
    {
        self.on_progress = Some(Box::new(on_progress));
        self
    }

    /// Streams the body of `url` into the output file and returns the number of bytes written.
    ///
    /// An existing output file is truncated once the request succeeds. If the transfer fails
    /// part-way, the partially written file is removed before the error is returned.
    pub fn execute(&self, transport: &dyn Transport) -> Result<u64, DownloadError> {
        debug!("downloading {} -> {}", self.url, self.output.display());

        let mut resp = transport.get(&self.url)?;
        let total = resp.content_length.unwrap_or(0);

        self.emit(Progress::Starting {
            total,
        });

        let file = File::create(&self.output)?;
        let result = self.stream_to_file(&mut resp, file, total);
        if result.is_err() {
            if let Err(err) = fs::remove_file(&self.output) {
                debug!(
                    "failed to remove partial download {}: {}",
                    self.output.display(),
                    err
                );
            }
        }
        let downloaded = result?;

        self.emit(Progress::Complete {
            total: downloaded,
        });

        Ok(downloaded)
    }

    fn stream_to_file(
        &self,
        resp: &mut TransportResponse,
        file: File,
        total: u64,
    ) -> Result<u64, DownloadError> {
        let mut writer = BufWriter::new(file);
        let mut buffer = vec![0u8; self.chunk_size];
        let mut downloaded = 0u64;

        loop {
            let n = resp.reader.read(&mut buffer)?;
            if n == 0 {
                break;
            }

            writer.write_all(&buffer[..n])?;
            downloaded += n as u64;

            self.emit(Progress::Chunk {
                current: downloaded,
                total,
            });
        }

        writer.flush()?;
        Ok(downloaded)
    }

    fn emit(&self, progress: Progress) {
        if let Some(ref cb) = self.on_progress {
            cb(progress);
        }
    }
}
