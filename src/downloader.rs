use crate::error::{DownloadError, RequestFailure};
use crate::http::HttpClient;
use crate::models::{CollectionSpec, FetchMethod, FileEntry};
use crate::sanitize::basename;
use futures::TryStreamExt;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::io::StreamReader;
use tracing::{debug, info, warn};
use url::Url;

/// Largest read taken from the response body between cancellation checks.
pub const CHUNK_SIZE: usize = 8 * 1024;

/// Polled before every chunk; a set signal aborts the transfer.
pub trait CancelSignal: Send + Sync {
    fn is_cancelled(&self) -> bool;
}

impl CancelSignal for AtomicBool {
    fn is_cancelled(&self) -> bool {
        self.load(Ordering::SeqCst)
    }
}

impl<T: CancelSignal + ?Sized> CancelSignal for Arc<T> {
    fn is_cancelled(&self) -> bool {
        (**self).is_cancelled()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProgressReading {
    /// Fraction of the known total, `0.0..=1.0`.
    Percent(f64),
    /// Total unknown; raw bytes so far.
    Bytes(u64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub reading: ProgressReading,
    /// Average bytes per second since the request started.
    pub speed: f64,
    pub transferred: u64,
    pub total: Option<u64>,
}

/// Observer of transfer progress. Has no influence on the transfer itself.
pub trait ProgressSink {
    fn on_progress(&mut self, progress: &Progress);
}

impl<F: FnMut(&Progress)> ProgressSink for F {
    fn on_progress(&mut self, progress: &Progress) {
        self(progress)
    }
}

/// Where relative entry names are resolved from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadSource {
    /// Registry item identifier; names are paths inside the item.
    Registry(String),
    /// Listing page URL; names are hrefs found on it.
    Page(String),
}

#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub source: DownloadSource,
    pub name: String,
    pub destination_dir: PathBuf,
    pub expected_size: Option<u64>,
}

impl DownloadRequest {
    pub fn for_entry(collection: &CollectionSpec, entry: &FileEntry, destination_dir: PathBuf) -> Self {
        let (source, expected_size) = match collection.method {
            FetchMethod::Api => (DownloadSource::Registry(collection.source.clone()), entry.size),
            FetchMethod::Html => (DownloadSource::Page(collection.source.clone()), None),
        };
        Self {
            source,
            name: entry.name.clone(),
            destination_dir,
            expected_size,
        }
    }
}

/// State of the one transfer in flight.
struct DownloadSession {
    url: String,
    total: Option<u64>,
    transferred: u64,
    started: Instant,
}

impl DownloadSession {
    fn progress(&self) -> Progress {
        let elapsed = self.started.elapsed().as_secs_f64();
        let speed = if elapsed > 0.0 {
            self.transferred as f64 / elapsed
        } else {
            0.0
        };
        let reading = match self.total {
            Some(total) => ProgressReading::Percent((self.transferred as f64 / total as f64).min(1.0)),
            None => ProgressReading::Bytes(self.transferred),
        };
        Progress {
            reading,
            speed,
            transferred: self.transferred,
            total: self.total,
        }
    }
}

/// Streams entries to local storage, one transfer at a time.
pub struct Downloader {
    client: HttpClient,
    stall_timeout: Duration,
}

impl Downloader {
    pub fn new(client: HttpClient, stall_timeout: Duration) -> Self {
        Self {
            client,
            stall_timeout,
        }
    }

    pub fn resolve_url(&self, source: &DownloadSource, name: &str) -> String {
        if name.starts_with("http") {
            return name.to_string();
        }
        match source {
            DownloadSource::Registry(identifier) => self.client.download_url(identifier, name),
            DownloadSource::Page(page) => Url::parse(page)
                .and_then(|base| base.join(name))
                .map(String::from)
                .unwrap_or_else(|_| name.to_string()),
        }
    }

    /// Downloads one entry into `request.destination_dir`.
    ///
    /// Taking `&mut self` keeps a single transfer in flight per downloader.
    /// Data is streamed into a temporary file next to the destination and only
    /// renamed over it once the transfer completes uncancelled, so an existing
    /// file with the same name survives any failure.
    pub async fn download(
        &mut self,
        request: &DownloadRequest,
        cancel: &dyn CancelSignal,
        progress: &mut dyn ProgressSink,
    ) -> Result<PathBuf, DownloadError> {
        let file_name = basename(&request.name);
        if file_name.is_empty() || file_name == "." || file_name == ".." {
            return Err(DownloadError::Write {
                path: request.destination_dir.join(&file_name),
                source: io::Error::new(io::ErrorKind::InvalidInput, "entry has no file name"),
            });
        }
        let dest = request.destination_dir.join(&file_name);

        fs::create_dir_all(&request.destination_dir)
            .await
            .map_err(|source| DownloadError::Write {
                path: request.destination_dir.clone(),
                source,
            })?;

        let (file, partial) = tempfile::Builder::new()
            .prefix(&format!(".{file_name}."))
            .suffix(".part")
            .tempfile_in(&request.destination_dir)
            .map_err(|source| DownloadError::Write {
                path: request.destination_dir.clone(),
                source,
            })?
            .into_parts();

        let url = self.resolve_url(&request.source, &request.name);
        info!(url, dest = %dest.display(), partial = %partial.display(), "Starting download");

        // `partial` is deleted on drop, which covers every early return.
        let result = self
            .transfer(&url, File::from_std(file), request.expected_size, cancel, progress)
            .await
            .and_then(|bytes| {
                partial
                    .persist(&dest)
                    .map_err(|e| DownloadError::Write {
                        path: dest.clone(),
                        source: e.error,
                    })
                    .map(|()| bytes)
            });

        match result {
            Ok(bytes) => {
                info!(dest = %dest.display(), bytes, "Download complete");
                Ok(dest)
            }
            Err(e) => {
                match &e {
                    DownloadError::Cancelled => info!(url, "Download cancelled"),
                    _ => warn!(url, error = %e, "Download failed"),
                }
                Err(e)
            }
        }
    }

    async fn transfer(
        &self,
        url: &str,
        mut file: File,
        expected_size: Option<u64>,
        cancel: &dyn CancelSignal,
        progress: &mut dyn ProgressSink,
    ) -> Result<u64, DownloadError> {
        let started = Instant::now();
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DownloadError::transfer(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::transfer(url, RequestFailure::Status(status.as_u16())));
        }

        let mut session = DownloadSession {
            url: url.to_string(),
            total: expected_size
                .filter(|size| *size > 0)
                .or_else(|| response.content_length())
                .filter(|size| *size > 0),
            transferred: 0,
            started,
        };
        debug!(url, total = ?session.total, "Response received");

        let stream = response.bytes_stream().map_err(io::Error::other);
        let reader = StreamReader::new(stream);
        tokio::pin!(reader);
        let mut buf = vec![0u8; CHUNK_SIZE];

        loop {
            if cancel.is_cancelled() {
                return Err(DownloadError::Cancelled);
            }

            let n = match tokio::time::timeout(self.stall_timeout, reader.read(&mut buf)).await {
                Ok(read) => read.map_err(|e| DownloadError::transfer(&session.url, e))?,
                Err(_) => {
                    return Err(DownloadError::transfer(
                        &session.url,
                        RequestFailure::Stalled(self.stall_timeout.as_secs()),
                    ));
                }
            };
            if n == 0 {
                break;
            }

            file.write_all(&buf[..n])
                .await
                .map_err(|e| DownloadError::transfer(&session.url, e))?;
            session.transferred += n as u64;
            progress.on_progress(&session.progress());
        }

        file.flush()
            .await
            .map_err(|e| DownloadError::transfer(&session.url, e))?;
        drop(file);

        // A cancel arriving with the last chunk still discards the file.
        if cancel.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }

        Ok(session.transferred)
    }
}
