//! Client-level retry wrapper around a media source
//!
//! [`MediaFetchClient`] is what batch workers actually call. It layers the
//! crate's retry policy over a [`MediaSource`] and converts per-item failures
//! into data: a worker never sees `Err` for a single bad item, only a
//! [`FetchResult`] that says so. Operation-level listing fetches keep their
//! error channel because the caller cannot proceed without the answer.

use crate::config::RetryConfig;
use crate::error::FetchError;
use crate::retry::retry_with_backoff;
use crate::source::{MediaSource, ProgressCallback};
use crate::types::{FetchResult, ItemRef};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Fetch client layering transient-failure retries over a [`MediaSource`]
///
/// One client serves every worker of a batch; cloning shares the underlying
/// source and shutdown token.
#[derive(Clone)]
pub struct MediaFetchClient {
    source: Arc<dyn MediaSource>,
    retry: RetryConfig,
    cancel: CancellationToken,
}

impl MediaFetchClient {
    /// Create a client over `source` with the given retry policy.
    ///
    /// The token is consulted before each item and between retry attempts;
    /// an in-flight tool invocation always runs to completion.
    pub fn new(
        source: Arc<dyn MediaSource>,
        retry: RetryConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            source,
            retry,
            cancel,
        }
    }

    /// Fetch the raw listing JSON for a collection URL, retrying transient failures.
    ///
    /// # Errors
    ///
    /// Returns the final [`FetchError`] once retries are exhausted or the
    /// failure is permanent.
    pub async fn fetch_listing(&self, url: &str, flat: bool) -> Result<String, FetchError> {
        retry_with_backoff(&self.retry, Some(&self.cancel), || {
            self.source.fetch_listing(url, flat)
        })
        .await
    }

    /// Fetch one item's audio, absorbing any failure into the result.
    ///
    /// Exhausted retries and permanent failures alike produce an unsuccessful
    /// [`FetchResult`] carrying the failure detail; the batch decides what to
    /// do with it.
    pub async fn fetch(
        &self,
        item: &ItemRef,
        dest_dir: &Path,
        on_progress: ProgressCallback<'_>,
    ) -> FetchResult {
        if self.cancel.is_cancelled() {
            return FetchResult::failed(FetchError::Cancelled.to_string());
        }

        let attempt = retry_with_backoff(&self.retry, Some(&self.cancel), || {
            self.source
                .fetch_audio(&item.fetch_url, dest_dir, on_progress)
        })
        .await;

        match attempt {
            Ok(fetched) => FetchResult::ok(fetched.title),
            Err(e) => {
                tracing::warn!(
                    external_id = %item.external_id,
                    error = %e,
                    "item fetch failed after retries"
                );
                FetchResult::failed(e.to_string())
            }
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{FetchedAudio, watch_url};
    use crate::types::FetchProgress;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Scripted source: pops one canned response per call and counts calls.
    #[derive(Default)]
    struct StubSource {
        listing_results: Mutex<VecDeque<Result<String, FetchError>>>,
        audio_results: Mutex<VecDeque<Result<FetchedAudio, FetchError>>>,
        listing_calls: AtomicU32,
        audio_calls: AtomicU32,
    }

    impl StubSource {
        fn with_audio(results: Vec<Result<FetchedAudio, FetchError>>) -> Self {
            Self {
                audio_results: Mutex::new(results.into()),
                ..Self::default()
            }
        }
    }

    #[async_trait::async_trait]
    impl MediaSource for StubSource {
        async fn fetch_listing(&self, _url: &str, _flat: bool) -> Result<String, FetchError> {
            self.listing_calls.fetch_add(1, Ordering::SeqCst);
            self.listing_results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| {
                    Err(FetchError::MalformedOutput {
                        reason: "stub script exhausted".to_string(),
                    })
                })
        }

        async fn fetch_audio(
            &self,
            _item_url: &str,
            _dest_dir: &Path,
            on_progress: ProgressCallback<'_>,
        ) -> Result<FetchedAudio, FetchError> {
            self.audio_calls.fetch_add(1, Ordering::SeqCst);
            on_progress(FetchProgress {
                percent: 50.0,
                downloaded_bytes: 512,
                total_bytes: Some(1024),
                speed_bytes_per_sec: None,
                eta_seconds: None,
            });
            self.audio_results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| {
                    Err(FetchError::MalformedOutput {
                        reason: "stub script exhausted".to_string(),
                    })
                })
        }
    }

    fn fast_retry(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(50),
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }

    fn item(id: &str) -> ItemRef {
        ItemRef {
            external_id: id.to_string(),
            fetch_url: watch_url(id),
        }
    }

    fn transient_error() -> FetchError {
        FetchError::ExitStatus {
            code: Some(1),
            stderr_tail: "ERROR: <urlopen error timed out>".to_string(),
        }
    }

    fn client(source: StubSource, retry: RetryConfig) -> (MediaFetchClient, Arc<StubSource>) {
        let source = Arc::new(source);
        let client = MediaFetchClient::new(
            Arc::clone(&source) as Arc<dyn MediaSource>,
            retry,
            CancellationToken::new(),
        );
        (client, source)
    }

    #[tokio::test]
    async fn successful_fetch_carries_the_reported_title() {
        let stub = StubSource::with_audio(vec![Ok(FetchedAudio {
            title: Some("Track One".to_string()),
            file_path: None,
        })]);
        let (client, source) = client(stub, fast_retry(3));

        let no_progress = |_p: FetchProgress| {};
        let result = client
            .fetch(&item("abc123"), Path::new("/tmp/work"), &no_progress)
            .await;

        assert!(result.success);
        assert_eq!(result.title.as_deref(), Some("Track One"));
        assert!(result.error_detail.is_none());
        assert_eq!(source.audio_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transient_failure_is_retried_then_succeeds() {
        let stub = StubSource::with_audio(vec![
            Err(transient_error()),
            Ok(FetchedAudio::default()),
        ]);
        let (client, source) = client(stub, fast_retry(3));

        let no_progress = |_p: FetchProgress| {};
        let result = client
            .fetch(&item("abc123"), Path::new("/tmp/work"), &no_progress)
            .await;

        assert!(result.success, "second attempt should have succeeded");
        assert_eq!(
            source.audio_calls.load(Ordering::SeqCst),
            2,
            "one transient failure means exactly one retry"
        );
    }

    #[tokio::test]
    async fn permanent_failure_is_not_retried_and_becomes_data() {
        let stub = StubSource::with_audio(vec![Err(FetchError::Unavailable {
            reason: "Video unavailable".to_string(),
        })]);
        let (client, source) = client(stub, fast_retry(3));

        let no_progress = |_p: FetchProgress| {};
        let result = client
            .fetch(&item("gone404"), Path::new("/tmp/work"), &no_progress)
            .await;

        assert!(!result.success);
        assert!(
            result
                .error_detail
                .as_deref()
                .is_some_and(|d| d.contains("Video unavailable")),
            "failure detail should carry the upstream reason, got {:?}",
            result.error_detail
        );
        assert_eq!(
            source.audio_calls.load(Ordering::SeqCst),
            1,
            "permanently unavailable content must not be retried"
        );
    }

    #[tokio::test]
    async fn exhausted_retries_produce_a_failed_result_not_an_error() {
        let stub = StubSource::with_audio(vec![
            Err(transient_error()),
            Err(transient_error()),
            Err(transient_error()),
        ]);
        let (client, source) = client(stub, fast_retry(2));

        let no_progress = |_p: FetchProgress| {};
        let result = client
            .fetch(&item("flaky"), Path::new("/tmp/work"), &no_progress)
            .await;

        assert!(!result.success);
        assert!(result.error_detail.is_some());
        assert_eq!(
            source.audio_calls.load(Ordering::SeqCst),
            3,
            "initial call + 2 retries"
        );
    }

    #[tokio::test]
    async fn cancelled_client_skips_the_source_entirely() {
        let stub = StubSource::with_audio(vec![Ok(FetchedAudio::default())]);
        let source = Arc::new(stub);
        let token = CancellationToken::new();
        let client = MediaFetchClient::new(
            Arc::clone(&source) as Arc<dyn MediaSource>,
            fast_retry(3),
            token.clone(),
        );
        token.cancel();

        let no_progress = |_p: FetchProgress| {};
        let result = client
            .fetch(&item("abc123"), Path::new("/tmp/work"), &no_progress)
            .await;

        assert!(!result.success);
        assert!(
            result
                .error_detail
                .as_deref()
                .is_some_and(|d| d.contains("cancelled")),
            "detail should say the fetch was cancelled, got {:?}",
            result.error_detail
        );
        assert_eq!(
            source.audio_calls.load(Ordering::SeqCst),
            0,
            "a cancelled client must not touch the source"
        );
    }

    #[tokio::test]
    async fn progress_callbacks_are_forwarded_to_the_caller() {
        let stub = StubSource::with_audio(vec![Ok(FetchedAudio::default())]);
        let (client, _source) = client(stub, fast_retry(0));

        let snapshots: Arc<Mutex<Vec<FetchProgress>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&snapshots);
        let on_progress = move |p: FetchProgress| {
            sink.lock().unwrap().push(p);
        };

        let result = client
            .fetch(&item("abc123"), Path::new("/tmp/work"), &on_progress)
            .await;

        assert!(result.success);
        let snapshots = snapshots.lock().unwrap();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].percent, 50.0);
        assert_eq!(snapshots[0].total_bytes, Some(1024));
    }

    #[tokio::test]
    async fn listing_errors_propagate_to_the_caller() {
        let stub = StubSource {
            listing_results: Mutex::new(
                vec![Err(FetchError::Unavailable {
                    reason: "playlist does not exist".to_string(),
                })]
                .into(),
            ),
            ..StubSource::default()
        };
        let (client, source) = client(stub, fast_retry(3));

        let err = client
            .fetch_listing("https://www.youtube.com/playlist?list=PLx", true)
            .await
            .expect_err("unavailable listings must surface as errors");

        assert!(matches!(err, FetchError::Unavailable { .. }));
        assert_eq!(
            source.listing_calls.load(Ordering::SeqCst),
            1,
            "permanent listing failures must not be retried"
        );
    }

    #[tokio::test]
    async fn listing_retries_transient_failures() {
        let stub = StubSource {
            listing_results: Mutex::new(
                vec![
                    Err(transient_error()),
                    Ok(r#"{"title": "Mix", "entries": []}"#.to_string()),
                ]
                .into(),
            ),
            ..StubSource::default()
        };
        let (client, source) = client(stub, fast_retry(3));

        let listing = client
            .fetch_listing("https://www.youtube.com/playlist?list=PLx", true)
            .await
            .expect("retry should have recovered the listing");

        assert!(listing.contains("Mix"));
        assert_eq!(source.listing_calls.load(Ordering::SeqCst), 2);
    }
}
