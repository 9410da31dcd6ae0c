//! Playlist download orchestration.
//!
//! [`PlaylistDownloadService`] wires the resolver, the bounded concurrent
//! batch fetcher, and the archive builder into the single `download`
//! operation: resolve the listing, fetch every item, pack the results into
//! one zip, report progress over a broadcast event channel.
//!
//! - [`batch`] - bounded concurrent item fetching with a strict join barrier

mod batch;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::archive::ArchiveBuilder;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::fetcher::MediaFetchClient;
use crate::probe::recommended_workers;
use crate::resolver::{CollectionResolver, extract_playlist_id};
use crate::source::{MediaSource, YtDlpSource};
use crate::types::{CollectionRef, Event};

/// Orchestrates the full playlist download: resolve, fetch, pack.
///
/// Cloneable; all shared state is behind `Arc` or cheaply cloneable
/// handles. One service instance owns one working directory, and callers
/// serialize download operations per directory.
#[derive(Clone)]
pub struct PlaylistDownloadService {
    /// Static configuration (shared across clones)
    config: Arc<Config>,
    /// Retry-wrapped source client, shared with the resolver
    client: MediaFetchClient,
    /// Listing resolution over the same client
    resolver: CollectionResolver,
    /// Zip packaging for finished batches
    archive: ArchiveBuilder,
    /// Event broadcast channel sender (multiple subscribers supported)
    event_tx: broadcast::Sender<Event>,
    /// Cooperative cancellation for shutdown
    cancel: CancellationToken,
}

impl PlaylistDownloadService {
    /// Create a service backed by the default `yt-dlp` source.
    ///
    /// Fails when the extraction tool cannot be located or the download
    /// directory cannot be created.
    pub async fn new(config: Config) -> Result<Self> {
        let source = YtDlpSource::new(config.download.clone())?;
        Self::with_source(config, Arc::new(source)).await
    }

    /// Create a service over any [`MediaSource`] implementation.
    ///
    /// This is the seam used by tests and alternative backends; everything
    /// above the source behaves identically.
    pub async fn with_source(config: Config, source: Arc<dyn MediaSource>) -> Result<Self> {
        tokio::fs::create_dir_all(&config.download_dir)
            .await
            .map_err(|e| Error::DestinationUnwritable {
                path: config.download_dir.clone(),
                reason: format!("cannot create download directory: {e}"),
            })?;

        // Buffered so multiple subscribers receive all events independently
        let (event_tx, _rx) = broadcast::channel(1000);
        let cancel = CancellationToken::new();
        let client = MediaFetchClient::new(source, config.retry.clone(), cancel.clone());
        let resolver = CollectionResolver::new(client.clone());
        let archive = ArchiveBuilder::new(config.archive.clone(), config.download.audio_format);

        Ok(Self {
            config: Arc::new(config),
            client,
            resolver,
            archive,
            event_tx,
            cancel,
        })
    }

    /// Download every item of the playlist and pack the audio into one zip.
    ///
    /// Returns the archive path. Per-item failures do not fail the
    /// operation; they are reported through [`Event::ItemFailed`] and the
    /// batch summary, and whatever succeeded is still packed.
    pub async fn download(&self, url: &str) -> Result<PathBuf> {
        if self.cancel.is_cancelled() {
            return Err(Error::ShuttingDown);
        }

        // Cheap rejections first: id syntax, then destination writability,
        // before any source invocation.
        let playlist_id = extract_playlist_id(url)?;
        ensure_writable(&self.config.download_dir).await?;

        tracing::info!(playlist_id = %playlist_id, url = %url, "starting playlist download");
        let listing = self
            .resolver
            .resolve_listing(&CollectionRef::new(url))
            .await?;

        let total = listing.items.len();
        self.event_tx
            .send(Event::DownloadStarted {
                title: listing.metadata.title.clone(),
                total_items: total,
            })
            .ok();
        tracing::info!(title = %listing.metadata.title, items = total, "playlist resolved");

        let worker_count = recommended_workers()
            .min(self.config.download.max_workers)
            .max(1);
        let (summary, _outcomes) = batch::run_batch(
            &self.client,
            listing.items,
            &self.config.download_dir,
            worker_count,
            &self.event_tx,
        )
        .await;
        tracing::info!(
            succeeded = summary.success_count,
            failed = summary.failure_count,
            total = summary.total_count,
            "download summary"
        );

        let packed = self.archive.pack(&self.config.download_dir).await?;
        self.event_tx
            .send(Event::ArchiveCreated {
                path: packed.path.clone(),
                entry_count: packed.entry_count,
            })
            .ok();

        Ok(packed.path)
    }

    /// Subscribe to the download lifecycle event stream.
    ///
    /// Every subscriber receives all events emitted after the call; slow
    /// subscribers can lag and miss events once the channel buffer fills.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Request a graceful shutdown.
    ///
    /// In-flight fetches stop cooperatively at the next attempt boundary;
    /// new `download` calls fail with [`Error::ShuttingDown`].
    pub fn shutdown(&self) {
        tracing::info!("shutdown requested, cancelling in-flight fetches");
        self.cancel.cancel();
        self.event_tx.send(Event::Shutdown).ok();
    }
}

/// Probe the directory with a throwaway file so permission problems
/// surface before any fetch work is scheduled.
async fn ensure_writable(dir: &Path) -> Result<()> {
    let probe = dir.join(".write-probe");
    tokio::fs::write(&probe, b"")
        .await
        .map_err(|e| Error::DestinationUnwritable {
            path: dir.to_path_buf(),
            reason: e.to_string(),
        })?;
    let _ = tokio::fs::remove_file(&probe).await;
    Ok(())
}
