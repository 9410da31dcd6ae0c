//! Playlist listing resolution.
//!
//! Turns the single-JSON listing dump emitted by the media source into the
//! crate's [`CollectionListing`] and [`CollectionMetadata`] shapes. The
//! resolver never talks to the source directly; it drives a
//! [`MediaFetchClient`] and normalizes whatever comes back, filling the
//! `Unknown Playlist` / `Unknown Channel` / `NA` sentinels for fields the
//! source left out.

use serde::Deserialize;
use url::Url;

use crate::error::{Error, FetchError, Result};
use crate::fetcher::MediaFetchClient;
use crate::source::watch_url;
use crate::types::{CollectionListing, CollectionMetadata, CollectionRef, ItemRef, ItemSummary};
use crate::utils::format_duration;

const FALLBACK_TITLE: &str = "Unknown Playlist";
const FALLBACK_UPLOADER: &str = "Unknown Channel";
const FALLBACK_ITEM_TITLE: &str = "Unknown Title";

/// Sentinel for durations the listing did not resolve.
const DURATION_UNKNOWN: &str = "NA";

/// Extract the playlist identifier from a playlist page URL.
///
/// The identifier is the `list` query parameter. Anything without one
/// (including URLs that do not parse at all) is rejected before any source
/// contact happens, so malformed input fails fast and cheap.
///
/// ```
/// use playlist_dl::resolver::extract_playlist_id;
///
/// let id = extract_playlist_id("https://www.youtube.com/playlist?list=PLx9_abc").unwrap();
/// assert_eq!(id, "PLx9_abc");
/// ```
pub fn extract_playlist_id(url: &str) -> Result<String> {
    let parsed = Url::parse(url).map_err(|_| invalid_playlist_url())?;
    parsed
        .query_pairs()
        .find(|(key, _)| key == "list")
        .map(|(_, value)| value.into_owned())
        .filter(|id| !id.is_empty())
        .ok_or_else(invalid_playlist_url)
}

fn invalid_playlist_url() -> Error {
    Error::InvalidInput("Invalid playlist URL".to_string())
}

/// Listing dump as the tool prints it. Only the fields we consume; every
/// one of them can be absent or null in real dumps.
#[derive(Debug, Deserialize)]
struct RawListing {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    uploader: Option<String>,
    #[serde(default)]
    thumbnail: Option<String>,
    /// `None` when the dump carries no entry list at all; entries removed
    /// by the source arrive as JSON nulls inside the vec.
    entries: Option<Vec<Option<RawEntry>>>,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    /// Seconds. Flat listings usually omit it; full extraction reports it
    /// as a number, occasionally fractional.
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    thumbnail: Option<String>,
}

/// Resolves playlist URLs into metadata and fetchable item sets.
#[derive(Clone)]
pub struct CollectionResolver {
    client: MediaFetchClient,
}

impl CollectionResolver {
    /// Create a resolver over an existing fetch client.
    pub fn new(client: MediaFetchClient) -> Self {
        Self { client }
    }

    /// Resolve the playlist into wire metadata plus fetchable item refs.
    ///
    /// Uses a flat listing: one source invocation regardless of playlist
    /// length, at the price of `NA` durations. This is the resolve step of
    /// the download path, which never needs durations.
    pub async fn resolve_listing(&self, reference: &CollectionRef) -> Result<CollectionListing> {
        let raw = self.fetch_raw(&reference.url, true).await?;
        let listing = build_listing(raw, false);
        tracing::debug!(
            url = %reference.url,
            items = listing.items.len(),
            "resolved playlist listing"
        );
        Ok(listing)
    }

    /// Resolve display metadata for the info path.
    ///
    /// With `fast_mode` set this is a flat listing and durations stay `NA`.
    /// Otherwise the source extracts every entry, durations come back
    /// formatted per item, and `total_duration` is the formatted sum.
    pub async fn resolve_detailed(&self, reference: &CollectionRef) -> Result<CollectionMetadata> {
        let raw = self.fetch_raw(&reference.url, reference.fast_mode).await?;
        let listing = build_listing(raw, !reference.fast_mode);
        tracing::debug!(
            url = %reference.url,
            items = listing.metadata.video_count,
            fast_mode = reference.fast_mode,
            "resolved playlist metadata"
        );
        Ok(listing.metadata)
    }

    async fn fetch_raw(&self, url: &str, flat: bool) -> Result<RawListing> {
        let payload = self
            .client
            .fetch_listing(url, flat)
            .await
            .map_err(|e| map_listing_error(url, e))?;

        let raw: RawListing = serde_json::from_str(&payload).map_err(|e| {
            Error::CollectionUnavailable {
                url: url.to_string(),
                reason: format!("unparseable listing JSON: {e}"),
            }
        })?;

        if raw.entries.is_none() {
            return Err(Error::CollectionUnavailable {
                url: url.to_string(),
                reason: "listing has no entries".to_string(),
            });
        }
        Ok(raw)
    }
}

/// Content-level listing failures surface as a missing collection; tool and
/// infrastructure failures keep their fetch identity for status mapping.
fn map_listing_error(url: &str, error: FetchError) -> Error {
    match error {
        FetchError::Unavailable { reason } | FetchError::MalformedOutput { reason } => {
            Error::CollectionUnavailable {
                url: url.to_string(),
                reason,
            }
        }
        other => Error::Fetch(other),
    }
}

fn build_listing(raw: RawListing, resolve_durations: bool) -> CollectionListing {
    let mut items = Vec::new();
    let mut summaries = Vec::new();
    let mut total_seconds = 0.0_f64;

    for entry in raw.entries.unwrap_or_default().into_iter().flatten() {
        let Some(id) = entry.id else {
            tracing::debug!("skipping listing entry without an id");
            continue;
        };

        let duration = match entry.duration {
            Some(seconds) if resolve_durations => {
                total_seconds += seconds;
                format_duration(seconds.round() as u64)
            }
            _ => DURATION_UNKNOWN.to_string(),
        };

        summaries.push(ItemSummary {
            title: entry
                .title
                .unwrap_or_else(|| FALLBACK_ITEM_TITLE.to_string()),
            duration,
            thumbnail: entry.thumbnail.unwrap_or_default(),
        });
        items.push(ItemRef {
            fetch_url: watch_url(&id),
            external_id: id,
        });
    }

    let total_duration = if resolve_durations {
        format_duration(total_seconds.round() as u64)
    } else {
        DURATION_UNKNOWN.to_string()
    };

    let thumbnail_url = raw.thumbnail.unwrap_or_else(|| {
        summaries
            .first()
            .map(|s| s.thumbnail.clone())
            .unwrap_or_default()
    });

    let metadata = CollectionMetadata {
        title: raw.title.unwrap_or_else(|| FALLBACK_TITLE.to_string()),
        channel_name: raw
            .uploader
            .unwrap_or_else(|| FALLBACK_UPLOADER.to_string()),
        video_count: summaries.len(),
        total_duration,
        thumbnail_url,
        items: summaries,
    };

    CollectionListing { metadata, items }
}
