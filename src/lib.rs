//! Browse remote file archives and download entries to local storage.
//!
//! - [`fetch`] acquires collection listings (HTML scraping or registry
//!   metadata) through the [`cache::ListingCache`].
//! - [`downloader`] streams one entry at a time with progress and cancellation.
//! - [`input`], [`keyboard`], [`browser`], [`screen`] and [`app`] make up the
//!   joystick-driven terminal front end.

pub mod app;
pub mod browser;
pub mod cache;
pub mod config;
pub mod downloader;
pub mod error;
pub mod fetch;
pub mod http;
pub mod input;
pub mod keyboard;
pub mod logging;
pub mod models;
pub mod sanitize;
pub mod screen;

pub use cache::ListingCache;
pub use config::AppConfig;
pub use downloader::{CancelSignal, DownloadRequest, Downloader, Progress, ProgressReading, ProgressSink};
pub use error::{DownloadError, ErrorKind, FetchError};
pub use fetch::ListingFetcher;
pub use http::HttpClient;
pub use models::{CollectionSpec, FetchMethod, FileEntry};
