//! Media source abstraction over the external extraction tool
//!
//! This module provides a trait-based seam between the download pipeline and
//! the process that actually talks to the remote media site. The pipeline only
//! sees the [`MediaSource`] trait; the production implementation shells out to
//! the `yt-dlp` binary, and tests substitute scripted sources.
//!
//! ## Architecture
//!
//! - [`MediaSource`]: the interface for listing and audio fetches
//! - [`YtDlpSource`]: production implementation driving the `yt-dlp` CLI
//!
//! Listings come back as the tool's raw JSON; interpreting that JSON is the
//! resolver's concern, so a source stays a dumb transport.
//!
//! ## Usage
//!
//! ```no_run
//! use playlist_dl::config::DownloadConfig;
//! use playlist_dl::source::{MediaSource, YtDlpSource};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let source = YtDlpSource::new(DownloadConfig::default())?;
//!
//!     let listing = source
//!         .fetch_listing("https://www.youtube.com/playlist?list=PL123", true)
//!         .await?;
//!     println!("raw listing: {} bytes", listing.len());
//!
//!     Ok(())
//! }
//! ```

mod parser;
mod ytdlp;

pub use ytdlp::YtDlpSource;

use crate::error::FetchError;
use crate::types::FetchProgress;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Callback invoked with each progress snapshot parsed from the tool's output.
///
/// Invoked inline on the fetch task, so implementations must be cheap and
/// non-blocking (typically a channel send).
pub type ProgressCallback<'a> = &'a (dyn Fn(FetchProgress) + Send + Sync);

/// Product of a successful audio fetch
///
/// Both fields depend on the tool reporting a destination path on its output
/// stream; either can be `None` when the stream did not include one.
#[must_use]
#[derive(Debug, Clone, Default)]
pub struct FetchedAudio {
    /// Item title derived from the reported destination filename
    pub title: Option<String>,

    /// Final audio file path as reported by the tool
    pub file_path: Option<PathBuf>,
}

/// Trait for fetching listings and audio from a remote media source
///
/// Implementations wrap one way of reaching the remote site. All methods take
/// `&self` and the trait is object-safe; the pipeline holds sources behind
/// `Arc<dyn MediaSource>` so tests can inject scripted behavior.
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Fetch the raw JSON listing for a collection URL.
    ///
    /// With `flat` set, the source asks for the shallow per-item form (ids and
    /// titles only), which is one cheap remote call. Without it, every item is
    /// fully resolved, including durations.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] when the tool cannot be spawned, exits with a
    /// failure status, or produces no output.
    async fn fetch_listing(&self, url: &str, flat: bool) -> Result<String, FetchError>;

    /// Fetch one item's audio into `dest_dir`, reporting parsed progress.
    ///
    /// Progress snapshots are best-effort: lines that do not parse are
    /// skipped, and a fetch can succeed without a single callback firing.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] when the tool cannot be spawned or exits with
    /// a failure status. Permanent content failures (removed or private
    /// items) surface as [`FetchError::Unavailable`] so callers skip retries.
    async fn fetch_audio(
        &self,
        item_url: &str,
        dest_dir: &Path,
        on_progress: ProgressCallback<'_>,
    ) -> Result<FetchedAudio, FetchError>;
}

/// Build the direct watch URL for a source-assigned item id.
#[must_use]
pub fn watch_url(external_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={external_id}")
}
