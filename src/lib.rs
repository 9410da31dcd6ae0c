//! # playlist-dl
//!
//! Backend library for downloading entire audio playlists as a single zip
//! archive.
//!
//! ## Design Philosophy
//!
//! playlist-dl is designed to be:
//! - **Library-first** - No CLI or HTTP layer, purely a Rust crate for embedding
//! - **Event-driven** - Consumers subscribe to lifecycle events, no polling required
//! - **Failure-tolerant** - One dead item never sinks the playlist; whatever
//!   succeeded is still packed
//! - **Tool-backed** - Item extraction delegates to `yt-dlp`, wrapped behind a
//!   pluggable [`MediaSource`] trait
//!
//! ## Quick Start
//!
//! ```no_run
//! use playlist_dl::{Config, PlaylistDownloadService};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = PlaylistDownloadService::new(Config::default()).await?;
//!
//!     // Subscribe to events
//!     let mut events = service.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("event: {event:?}");
//!         }
//!     });
//!
//!     let archive = service
//!         .download("https://www.youtube.com/playlist?list=PLx9_abc123")
//!         .await?;
//!     println!("archive at {}", archive.display());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Zip packaging for finished downloads
pub mod archive;
/// Configuration types
pub mod config;
/// Playlist download orchestration (decomposed into focused submodules)
pub mod downloader;
/// Error types
pub mod error;
/// Retry-wrapped client over a media source
pub mod fetcher;
/// Metadata-only playlist lookups
pub mod info;
/// Host capability probing for worker sizing
pub mod probe;
/// Playlist listing resolution
pub mod resolver;
/// Retry logic with exponential backoff
pub mod retry;
/// Media source trait and the yt-dlp implementation
pub mod source;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use archive::{ArchiveBuilder, PackedArchive};
pub use config::{ArchiveConfig, AudioFormat, Config, DownloadConfig, RetryConfig};
pub use downloader::PlaylistDownloadService;
pub use error::{ApiError, Error, ErrorDetail, FetchError, Result, ToHttpStatus};
pub use fetcher::MediaFetchClient;
pub use info::PlaylistInfoService;
pub use resolver::{CollectionResolver, extract_playlist_id};
pub use source::{FetchedAudio, MediaSource, ProgressCallback, YtDlpSource};
pub use types::{
    BatchSummary, CollectionListing, CollectionMetadata, CollectionRef, DownloadOutcome, Event,
    FetchProgress, FetchResult, ItemRef, ItemSummary,
};

/// Helper function to run the download service with graceful signal handling.
///
/// Waits for a termination signal and then calls the service's `shutdown()`
/// method, stopping in-flight fetches cooperatively.
///
/// - **Unix:** listens for SIGTERM and SIGINT.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use playlist_dl::{Config, PlaylistDownloadService, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let service = PlaylistDownloadService::new(Config::default()).await?;
///     run_with_shutdown(service).await?;
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(service: PlaylistDownloadService) -> Result<()> {
    wait_for_signal().await;
    service.shutdown();
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("received SIGTERM"),
                _ = sigint.recv() => tracing::info!("received SIGINT (Ctrl+C)"),
            }
        }
        // Restricted environments (containers, tests) can refuse registration
        _ => {
            tracing::warn!("signal registration failed, falling back to ctrl_c");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("received Ctrl+C"),
        Err(e) => tracing::error!(error = %e, "failed to listen for Ctrl+C"),
    }
}
