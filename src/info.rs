//! Metadata-only playlist lookups.
//!
//! [`PlaylistInfoService`] answers "what is in this playlist" without
//! downloading anything: no working directory, no events, no archive. It
//! shares the resolver and retry-wrapped client with the download path.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::Result;
use crate::fetcher::MediaFetchClient;
use crate::resolver::{CollectionResolver, extract_playlist_id};
use crate::source::{MediaSource, YtDlpSource};
use crate::types::{CollectionMetadata, CollectionRef};

/// Resolves playlist metadata for display, without downloading.
#[derive(Clone)]
pub struct PlaylistInfoService {
    resolver: CollectionResolver,
}

impl PlaylistInfoService {
    /// Create a service backed by the default `yt-dlp` source.
    pub fn new(config: Config) -> Result<Self> {
        let source = YtDlpSource::new(config.download.clone())?;
        Ok(Self::with_source(config, Arc::new(source)))
    }

    /// Create a service over any [`MediaSource`] implementation.
    pub fn with_source(config: Config, source: Arc<dyn MediaSource>) -> Self {
        let client = MediaFetchClient::new(source, config.retry.clone(), CancellationToken::new());
        Self {
            resolver: CollectionResolver::new(client),
        }
    }

    /// Resolve display metadata for a playlist URL.
    ///
    /// `fast_mode` answers from a single flat listing with `NA` durations;
    /// otherwise every entry is extracted and durations come back formatted,
    /// with the total summed. URLs without a `list` identifier are rejected
    /// before any source contact.
    pub async fn get_info(&self, url: &str, fast_mode: bool) -> Result<CollectionMetadata> {
        extract_playlist_id(url)?;
        self.resolver
            .resolve_detailed(&CollectionRef {
                url: url.to_string(),
                fast_mode,
            })
            .await
    }
}
