//! Single-entry downloads against a mock archive.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use archive_browser::downloader::DownloadSource;
use archive_browser::error::ErrorKind;
use archive_browser::{CancelSignal, DownloadRequest, Downloader, HttpClient, Progress, ProgressReading};

fn downloader(server: &MockServer) -> Downloader {
    let client = HttpClient::new(server.uri(), None, false).unwrap();
    Downloader::new(client, Duration::from_secs(10))
}

fn request(source: DownloadSource, name: &str, dir: &TempDir, expected_size: Option<u64>) -> DownloadRequest {
    DownloadRequest {
        source,
        name: name.to_string(),
        destination_dir: dir.path().join("gba"),
        expected_size,
    }
}

/// Names of everything left in the destination directory.
fn leftovers(dir: &TempDir) -> Vec<String> {
    match std::fs::read_dir(dir.path().join("gba")) {
        Ok(entries) => {
            let mut names: Vec<String> = entries
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .collect();
            names.sort();
            names
        }
        Err(_) => Vec::new(),
    }
}

/// Stays clear until the whole body has been reported, then fires on the
/// second check after that: the one following the end-of-stream read.
#[derive(Default)]
struct CancelAfterStream {
    body_complete: AtomicBool,
    checks_after_body: AtomicUsize,
}

impl CancelSignal for CancelAfterStream {
    fn is_cancelled(&self) -> bool {
        if !self.body_complete.load(Ordering::SeqCst) {
            return false;
        }
        self.checks_after_body.fetch_add(1, Ordering::SeqCst) >= 1
    }
}

#[tokio::test]
async fn registry_entry_is_saved_under_its_basename() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let body = vec![7u8; 20_000];

    Mock::given(method("GET"))
        .and(path("/download/item/dir/a%20b.zip"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .expect(1)
        .mount(&server)
        .await;

    let req = request(
        DownloadSource::Registry("item".into()),
        "dir/a b.zip",
        &dir,
        Some(body.len() as u64),
    );
    let cancel = AtomicBool::new(false);
    let mut readings = Vec::new();
    let mut on_progress = |p: &Progress| readings.push(p.clone());

    let saved = downloader(&server)
        .download(&req, &cancel, &mut on_progress)
        .await
        .unwrap();

    assert_eq!(saved, dir.path().join("gba").join("a b.zip"));
    assert_eq!(std::fs::read(&saved).unwrap(), body);

    let last = readings.last().unwrap();
    assert_eq!(last.transferred, 20_000);
    assert_eq!(last.reading, ProgressReading::Percent(1.0));
}

#[tokio::test]
async fn page_entry_resolves_against_listing_url() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/roms/gba/Zelda.gba"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"rom".to_vec()))
        .mount(&server)
        .await;

    let page = format!("{}/roms/gba/", server.uri());
    let req = request(DownloadSource::Page(page), "Zelda.gba", &dir, None);
    let cancel = AtomicBool::new(false);
    let mut readings = Vec::new();
    let mut on_progress = |p: &Progress| readings.push(p.clone());

    let saved = downloader(&server)
        .download(&req, &cancel, &mut on_progress)
        .await
        .unwrap();

    assert_eq!(std::fs::read(saved).unwrap(), b"rom");
    // Without an expected size the response length is used.
    assert_eq!(readings.last().unwrap().total, Some(3));
}

#[tokio::test]
async fn cancel_before_first_chunk_leaves_no_file() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; 4096]))
        .mount(&server)
        .await;

    let req = request(DownloadSource::Registry("item".into()), "a.zip", &dir, None);
    let cancel = AtomicBool::new(true);
    let mut on_progress = |_: &Progress| {};

    let err = downloader(&server)
        .download(&req, &cancel, &mut on_progress)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert!(!dir.path().join("gba").join("a.zip").exists());
}

#[tokio::test]
async fn cancel_during_transfer_removes_partial_file() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; 64 * 1024]))
        .mount(&server)
        .await;

    let req = request(DownloadSource::Registry("item".into()), "big.zip", &dir, None);
    let cancel = AtomicBool::new(false);
    let mut on_progress = |_: &Progress| cancel.store(true, Ordering::SeqCst);

    let err = downloader(&server)
        .download(&req, &cancel, &mut on_progress)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert!(!dir.path().join("gba").join("big.zip").exists());
    assert!(leftovers(&dir).is_empty());
}

#[tokio::test]
async fn http_error_is_a_download_error() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let req = request(DownloadSource::Registry("item".into()), "missing.zip", &dir, Some(10));
    let cancel = AtomicBool::new(false);
    let mut on_progress = |_: &Progress| {};

    let err = downloader(&server)
        .download(&req, &cancel, &mut on_progress)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::DownloadError);
    assert!(!dir.path().join("gba").join("missing.zip").exists());
}

#[tokio::test]
async fn unwritable_destination_is_a_write_error() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("gba"), b"not a directory").unwrap();

    let req = request(DownloadSource::Registry("item".into()), "a.zip", &dir, None);
    let cancel = AtomicBool::new(false);
    let mut on_progress = |_: &Progress| {};

    let err = downloader(&server)
        .download(&req, &cancel, &mut on_progress)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::WriteError);
}

#[tokio::test]
async fn cancel_after_stream_end_discards_download() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![3u8; 100]))
        .mount(&server)
        .await;

    let req = request(DownloadSource::Registry("item".into()), "late.zip", &dir, Some(100));
    let cancel = CancelAfterStream::default();
    let mut on_progress = |p: &Progress| {
        if p.transferred == 100 {
            cancel.body_complete.store(true, Ordering::SeqCst);
        }
    };

    let err = downloader(&server)
        .download(&req, &cancel, &mut on_progress)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert_eq!(cancel.checks_after_body.load(Ordering::SeqCst), 2);
    assert!(leftovers(&dir).is_empty());
}

#[tokio::test]
async fn failed_download_keeps_existing_file() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("gba")).unwrap();
    std::fs::write(dir.path().join("gba").join("a.zip"), b"complete earlier copy").unwrap();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let req = request(DownloadSource::Registry("item".into()), "a.zip", &dir, None);
    let cancel = AtomicBool::new(false);
    let mut on_progress = |_: &Progress| {};

    let err = downloader(&server)
        .download(&req, &cancel, &mut on_progress)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::DownloadError);
    assert_eq!(
        std::fs::read(dir.path().join("gba").join("a.zip")).unwrap(),
        b"complete earlier copy"
    );
    assert_eq!(leftovers(&dir), vec!["a.zip"]);
}

#[tokio::test]
async fn cancelled_download_keeps_existing_file() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("gba")).unwrap();
    std::fs::write(dir.path().join("gba").join("a.zip"), b"complete earlier copy").unwrap();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; 64 * 1024]))
        .mount(&server)
        .await;

    let req = request(DownloadSource::Registry("item".into()), "a.zip", &dir, None);
    let cancel = AtomicBool::new(false);
    let mut on_progress = |_: &Progress| cancel.store(true, Ordering::SeqCst);

    let err = downloader(&server)
        .download(&req, &cancel, &mut on_progress)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert_eq!(
        std::fs::read(dir.path().join("gba").join("a.zip")).unwrap(),
        b"complete earlier copy"
    );
    assert_eq!(leftovers(&dir), vec!["a.zip"]);
}

#[tokio::test]
async fn successful_download_replaces_existing_file() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("gba")).unwrap();
    std::fs::write(dir.path().join("gba").join("a.zip"), b"old").unwrap();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"new contents".to_vec()))
        .mount(&server)
        .await;

    let req = request(DownloadSource::Registry("item".into()), "a.zip", &dir, None);
    let cancel = AtomicBool::new(false);
    let mut on_progress = |_: &Progress| {};

    downloader(&server)
        .download(&req, &cancel, &mut on_progress)
        .await
        .unwrap();

    assert_eq!(std::fs::read(dir.path().join("gba").join("a.zip")).unwrap(), b"new contents");
    assert_eq!(leftovers(&dir), vec!["a.zip"]);
}
