//! Service-level tests over scripted media sources.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, RetryConfig};
use crate::error::{Error, FetchError};
use crate::fetcher::MediaFetchClient;
use crate::source::{FetchedAudio, MediaSource, ProgressCallback};
use crate::types::{Event, FetchProgress, ItemRef};

use super::PlaylistDownloadService;
use super::batch::run_batch;

const PLAYLIST_URL: &str = "https://www.youtube.com/playlist?list=PLtest123";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Scripted source: serves one canned listing, writes a fake audio file per
/// successful item, and permanently fails the ids it is told to fail.
struct ScriptedSource {
    listing: String,
    fail_ids: Vec<&'static str>,
    listing_calls: AtomicU32,
    audio_calls: AtomicU32,
}

impl ScriptedSource {
    fn new(listing: impl Into<String>) -> Self {
        Self {
            listing: listing.into(),
            fail_ids: Vec::new(),
            listing_calls: AtomicU32::new(0),
            audio_calls: AtomicU32::new(0),
        }
    }

    fn failing(mut self, id: &'static str) -> Self {
        self.fail_ids.push(id);
        self
    }
}

#[async_trait]
impl MediaSource for ScriptedSource {
    async fn fetch_listing(&self, _url: &str, _flat: bool) -> Result<String, FetchError> {
        self.listing_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.listing.clone())
    }

    async fn fetch_audio(
        &self,
        item_url: &str,
        dest_dir: &Path,
        on_progress: ProgressCallback<'_>,
    ) -> Result<FetchedAudio, FetchError> {
        self.audio_calls.fetch_add(1, Ordering::SeqCst);
        // Watch URLs end in ?v=<id>
        let id = item_url.rsplit('=').next().unwrap_or_default().to_string();
        if self.fail_ids.iter().any(|f| *f == id) {
            return Err(FetchError::Unavailable {
                reason: format!("Video unavailable: {id}"),
            });
        }
        on_progress(FetchProgress {
            percent: 100.0,
            downloaded_bytes: 4,
            total_bytes: Some(4),
            speed_bytes_per_sec: None,
            eta_seconds: None,
        });
        let path = dest_dir.join(format!("{id}.mp3"));
        std::fs::write(&path, id.as_bytes()).unwrap();
        Ok(FetchedAudio {
            title: Some(format!("Track {id}")),
            file_path: Some(path),
        })
    }
}

/// Source whose listing call always reports missing content.
struct UnavailableSource;

#[async_trait]
impl MediaSource for UnavailableSource {
    async fn fetch_listing(&self, _url: &str, _flat: bool) -> Result<String, FetchError> {
        Err(FetchError::Unavailable {
            reason: "This playlist does not exist".to_string(),
        })
    }

    async fn fetch_audio(
        &self,
        _item_url: &str,
        _dest_dir: &Path,
        _on_progress: ProgressCallback<'_>,
    ) -> Result<FetchedAudio, FetchError> {
        unreachable!("listing never resolves, so no audio is fetched")
    }
}

/// Source that only measures fetch concurrency.
#[derive(Default)]
struct GaugeSource {
    active: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl MediaSource for GaugeSource {
    async fn fetch_listing(&self, _url: &str, _flat: bool) -> Result<String, FetchError> {
        unreachable!("gauge source serves no listings")
    }

    async fn fetch_audio(
        &self,
        _item_url: &str,
        _dest_dir: &Path,
        _on_progress: ProgressCallback<'_>,
    ) -> Result<FetchedAudio, FetchError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(25)).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(FetchedAudio::default())
    }
}

fn quick_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 0,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        backoff_multiplier: 2.0,
        jitter: false,
    }
}

fn test_config(dir: &TempDir) -> Config {
    Config {
        download_dir: dir.path().to_path_buf(),
        retry: quick_retry(),
        ..Config::default()
    }
}

async fn service_over(source: Arc<dyn MediaSource>, dir: &TempDir) -> PlaylistDownloadService {
    PlaylistDownloadService::with_source(test_config(dir), source)
        .await
        .expect("service construction failed")
}

fn listing_of(ids: &[&str]) -> String {
    let entries: Vec<String> = ids
        .iter()
        .map(|id| format!(r#"{{"id": "{id}", "title": "Song {id}", "thumbnail": ""}}"#))
        .collect();
    format!(
        r#"{{"title": "Test Mix", "uploader": "Test Channel", "thumbnail": "https://img.example/t.jpg", "entries": [{}]}}"#,
        entries.join(",")
    )
}

fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn archive_names(path: &Path) -> Vec<String> {
    let mut archive = zip::ZipArchive::new(std::fs::File::open(path).unwrap()).unwrap();
    (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect()
}

// ---------------------------------------------------------------------------
// download
// ---------------------------------------------------------------------------

#[tokio::test]
async fn download_packs_all_items_and_reports_events() {
    let dir = TempDir::new().unwrap();
    let source = Arc::new(ScriptedSource::new(listing_of(&["aaa", "bbb", "ccc"])));
    let service = service_over(source.clone(), &dir).await;
    let mut rx = service.subscribe();

    let archive_path = service.download(PLAYLIST_URL).await.unwrap();

    assert!(archive_path.exists());
    assert_eq!(
        archive_names(&archive_path),
        vec!["aaa.mp3", "bbb.mp3", "ccc.mp3"]
    );
    assert!(
        !dir.path().join("aaa.mp3").exists(),
        "packed sources must be deleted"
    );

    assert_eq!(source.listing_calls.load(Ordering::SeqCst), 1);
    assert_eq!(source.audio_calls.load(Ordering::SeqCst), 3);

    let events = drain(&mut rx);
    match events.first() {
        Some(Event::DownloadStarted { title, total_items }) => {
            assert_eq!(title, "Test Mix");
            assert_eq!(*total_items, 3);
        }
        other => panic!("expected DownloadStarted first, got {other:?}"),
    }
    let started = events
        .iter()
        .filter(|e| matches!(e, Event::ItemStarted { .. }))
        .count();
    let completed = events
        .iter()
        .filter(|e| matches!(e, Event::ItemCompleted { .. }))
        .count();
    assert_eq!(started, 3);
    assert_eq!(completed, 3);
    assert!(
        events.iter().any(|e| matches!(e, Event::ItemProgress { .. })),
        "progress must be forwarded as events"
    );
    assert!(events.iter().any(|e| matches!(
        e,
        Event::BatchCompleted {
            success_count: 3,
            failure_count: 0,
            total_count: 3
        }
    )));
    match events.last() {
        Some(Event::ArchiveCreated { path, entry_count }) => {
            assert_eq!(path, &archive_path);
            assert_eq!(*entry_count, 3);
        }
        other => panic!("expected ArchiveCreated last, got {other:?}"),
    }
}

#[tokio::test]
async fn failed_item_does_not_fail_the_download() {
    let dir = TempDir::new().unwrap();
    let source = Arc::new(ScriptedSource::new(listing_of(&["aaa", "bbb", "ccc"])).failing("bbb"));
    let service = service_over(source.clone(), &dir).await;
    let mut rx = service.subscribe();

    let archive_path = service.download(PLAYLIST_URL).await.unwrap();

    assert_eq!(archive_names(&archive_path), vec!["aaa.mp3", "ccc.mp3"]);

    let events = drain(&mut rx);
    let failures: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            Event::ItemFailed {
                external_id, error, ..
            } => Some((external_id.clone(), error.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, "bbb");
    assert!(
        failures[0].1.to_lowercase().contains("unavailable"),
        "failure detail should carry the source reason, got {}",
        failures[0].1
    );
    assert!(events.iter().any(|e| matches!(
        e,
        Event::BatchCompleted {
            success_count: 2,
            failure_count: 1,
            total_count: 3
        }
    )));
}

#[tokio::test]
async fn all_items_failed_still_packs_an_empty_archive() {
    let dir = TempDir::new().unwrap();
    let source = Arc::new(
        ScriptedSource::new(listing_of(&["aaa", "bbb"]))
            .failing("aaa")
            .failing("bbb"),
    );
    let service = service_over(source, &dir).await;
    let mut rx = service.subscribe();

    let archive_path = service.download(PLAYLIST_URL).await.unwrap();

    assert!(archive_names(&archive_path).is_empty());
    let events = drain(&mut rx);
    assert!(events.iter().any(|e| matches!(
        e,
        Event::BatchCompleted {
            success_count: 0,
            failure_count: 2,
            total_count: 2
        }
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        Event::ArchiveCreated { entry_count: 0, .. }
    )));
}

#[tokio::test]
async fn empty_playlist_yields_an_empty_archive() {
    let dir = TempDir::new().unwrap();
    let source = Arc::new(ScriptedSource::new(listing_of(&[])));
    let service = service_over(source.clone(), &dir).await;

    let archive_path = service.download(PLAYLIST_URL).await.unwrap();

    assert!(archive_names(&archive_path).is_empty());
    assert_eq!(source.audio_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn invalid_url_is_rejected_before_any_source_call() {
    let dir = TempDir::new().unwrap();
    let source = Arc::new(ScriptedSource::new(listing_of(&["aaa"])));
    let service = service_over(source.clone(), &dir).await;

    let err = service
        .download("https://www.youtube.com/watch?v=solo")
        .await
        .unwrap_err();

    assert!(
        matches!(err, Error::InvalidInput(_)),
        "expected InvalidInput, got {err:?}"
    );
    assert_eq!(source.listing_calls.load(Ordering::SeqCst), 0);
    assert_eq!(source.audio_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_playlist_surfaces_as_collection_unavailable() {
    let dir = TempDir::new().unwrap();
    let service = service_over(Arc::new(UnavailableSource), &dir).await;

    let err = service.download(PLAYLIST_URL).await.unwrap_err();

    match err {
        Error::CollectionUnavailable { reason, .. } => {
            assert_eq!(reason, "This playlist does not exist");
        }
        other => panic!("expected CollectionUnavailable, got {other:?}"),
    }
}

#[cfg(unix)]
#[tokio::test]
async fn unwritable_destination_is_rejected_before_resolving() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().unwrap();
    let source = Arc::new(ScriptedSource::new(listing_of(&["aaa"])));
    let service = service_over(source.clone(), &dir).await;

    std::fs::set_permissions(dir.path(), std::fs::Permissions::from_mode(0o555)).unwrap();

    // Ensure cleanup happens even if assertions panic
    struct RestorePerms<'a>(&'a Path);
    impl Drop for RestorePerms<'_> {
        fn drop(&mut self) {
            let _ = std::fs::set_permissions(self.0, std::fs::Permissions::from_mode(0o755));
        }
    }
    let _guard = RestorePerms(dir.path());

    let err = service.download(PLAYLIST_URL).await.unwrap_err();

    assert!(
        matches!(err, Error::DestinationUnwritable { .. }),
        "expected DestinationUnwritable, got {err:?}"
    );
    assert_eq!(
        source.listing_calls.load(Ordering::SeqCst),
        0,
        "writability must be probed before the listing call"
    );
}

// ---------------------------------------------------------------------------
// shutdown
// ---------------------------------------------------------------------------

#[tokio::test]
async fn shutdown_rejects_new_downloads() {
    let dir = TempDir::new().unwrap();
    let source = Arc::new(ScriptedSource::new(listing_of(&["aaa"])));
    let service = service_over(source.clone(), &dir).await;
    let mut rx = service.subscribe();

    service.shutdown();
    let err = service.download(PLAYLIST_URL).await.unwrap_err();

    assert!(
        matches!(err, Error::ShuttingDown),
        "expected ShuttingDown, got {err:?}"
    );
    assert_eq!(source.listing_calls.load(Ordering::SeqCst), 0);
    assert!(drain(&mut rx).iter().any(|e| matches!(e, Event::Shutdown)));
}

// ---------------------------------------------------------------------------
// batch concurrency
// ---------------------------------------------------------------------------

#[tokio::test]
async fn batch_concurrency_stays_within_the_worker_cap() {
    let dir = TempDir::new().unwrap();
    let gauge = Arc::new(GaugeSource::default());
    let client = MediaFetchClient::new(gauge.clone(), quick_retry(), CancellationToken::new());
    let (event_tx, _rx) = broadcast::channel(1000);

    let items: Vec<ItemRef> = (0..8)
        .map(|i| ItemRef {
            external_id: format!("id{i}"),
            fetch_url: format!("https://www.youtube.com/watch?v=id{i}"),
        })
        .collect();

    let (summary, outcomes) = run_batch(&client, items, dir.path(), 3, &event_tx).await;

    assert_eq!(summary.success_count, 8);
    assert_eq!(summary.total_count, 8);
    assert_eq!(outcomes.len(), 8);
    let peak = gauge.peak.load(Ordering::SeqCst);
    assert!(peak <= 3, "at most 3 fetches may be in flight, saw {peak}");
    assert!(peak >= 2, "expected actual concurrency, saw {peak}");
}
