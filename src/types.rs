//! Core types for playlist-dl

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Caller's reference to a playlist, as received from the embedding layer
///
/// `fast_mode` skips per-item duration lookup during metadata resolution,
/// trading completeness for a single flat listing call.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CollectionRef {
    /// Playlist page URL (must carry a `list` query parameter)
    pub url: String,

    /// Skip per-item duration resolution (default: false)
    #[serde(default)]
    pub fast_mode: bool,
}

impl CollectionRef {
    /// Create a reference with `fast_mode` off
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            fast_mode: false,
        }
    }
}

/// One member item of a resolved playlist, ready to fetch
///
/// The fetch URL is derived from the item's external id at resolve time;
/// the set of refs produced by one resolve call is fixed for the whole
/// download operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRef {
    /// Source-assigned item identifier
    pub external_id: String,

    /// Direct watch URL handed to the extraction tool
    pub fetch_url: String,
}

/// Per-item display metadata in the wire shape the embedding API exposes
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSummary {
    /// Item title
    pub title: String,

    /// Formatted duration (`H:MM:SS` / `M:SS`), or `"NA"` when unresolved
    pub duration: String,

    /// Thumbnail URL, empty string when the source provides none
    pub thumbnail: String,
}

/// Playlist metadata in the wire shape the embedding API exposes
///
/// Serializes camelCase with the item list under the key `songs`, matching
/// the JSON contract consumed by existing clients.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionMetadata {
    /// Playlist title
    pub title: String,

    /// Uploader / channel name
    pub channel_name: String,

    /// Number of resolved items
    pub video_count: usize,

    /// Formatted total duration, `"NA"` when not computed
    pub total_duration: String,

    /// Playlist thumbnail URL (falls back to the first item's thumbnail)
    pub thumbnail_url: String,

    /// Per-item summaries, in source-listing order
    #[serde(rename = "songs")]
    pub items: Vec<ItemSummary>,
}

impl Default for CollectionMetadata {
    fn default() -> Self {
        Self {
            title: "Unknown Playlist".to_string(),
            channel_name: "Unknown Channel".to_string(),
            video_count: 0,
            total_duration: "NA".to_string(),
            thumbnail_url: String::new(),
            items: vec![],
        }
    }
}

/// Full resolve product: wire metadata plus the fetchable item set
#[derive(Clone, Debug)]
pub struct CollectionListing {
    /// Wire-shaped metadata for events and the info path
    pub metadata: CollectionMetadata,

    /// Fetchable refs in source-listing order
    pub items: Vec<ItemRef>,
}

/// Terminal result of one item's fetch within a batch
///
/// Every item of a batch yields exactly one outcome; a failed outcome never
/// fails the batch it belongs to.
#[derive(Clone, Debug)]
pub struct DownloadOutcome {
    /// The item this outcome belongs to
    pub item: ItemRef,

    /// Whether the fetch produced a usable audio file
    pub success: bool,

    /// Failure description for reporting (None on success)
    pub error_detail: Option<String>,
}

/// Aggregate result of a completed batch
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Items that produced an audio file
    pub success_count: usize,

    /// Items that exhausted retries or failed permanently
    pub failure_count: usize,

    /// Items scheduled (always `success_count + failure_count`)
    pub total_count: usize,
}

impl BatchSummary {
    /// Tally a finished batch from its per-item outcomes
    pub fn from_outcomes(outcomes: &[DownloadOutcome]) -> Self {
        let success_count = outcomes.iter().filter(|o| o.success).count();
        Self {
            success_count,
            failure_count: outcomes.len() - success_count,
            total_count: outcomes.len(),
        }
    }
}

/// Result of a single source fetch, after client-level retries
///
/// Per-item failures are data, not errors: the fetch client reports an
/// unsuccessful result instead of returning `Err`.
#[derive(Clone, Debug)]
pub struct FetchResult {
    /// Whether the tool exited successfully
    pub success: bool,

    /// Item title reported by the tool, when it printed one
    pub title: Option<String>,

    /// Failure description (None on success)
    pub error_detail: Option<String>,
}

impl FetchResult {
    /// Successful fetch, optionally carrying the reported title
    pub fn ok(title: Option<String>) -> Self {
        Self {
            success: true,
            title,
            error_detail: None,
        }
    }

    /// Failed fetch with a reportable reason
    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            success: false,
            title: None,
            error_detail: Some(detail.into()),
        }
    }
}

/// Progress snapshot parsed from the tool's output stream
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FetchProgress {
    /// Progress percentage (0.0 to 100.0)
    pub percent: f32,

    /// Bytes downloaded so far
    pub downloaded_bytes: u64,

    /// Expected total size in bytes (None when the tool only estimates)
    pub total_bytes: Option<u64>,

    /// Current transfer speed in bytes per second (None when unknown)
    pub speed_bytes_per_sec: Option<u64>,

    /// Estimated seconds to completion (None when unknown)
    pub eta_seconds: Option<u64>,
}

/// Event emitted during the download lifecycle
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Playlist resolved, batch starting
    DownloadStarted {
        /// Playlist title
        title: String,
        /// Number of items scheduled
        total_items: usize,
    },

    /// One item's fetch began
    ItemStarted {
        /// 1-based position within the batch
        index: usize,
        /// Items scheduled in the batch
        total: usize,
        /// Source-assigned item identifier
        external_id: String,
    },

    /// Progress update for an in-flight item
    ItemProgress {
        /// Source-assigned item identifier
        external_id: String,
        /// Progress percentage (0.0 to 100.0)
        percent: f32,
        /// Bytes downloaded so far
        downloaded_bytes: u64,
        /// Expected total size in bytes
        #[serde(skip_serializing_if = "Option::is_none")]
        total_bytes: Option<u64>,
        /// Current transfer speed in bytes per second
        #[serde(skip_serializing_if = "Option::is_none")]
        speed_bytes_per_sec: Option<u64>,
        /// Estimated seconds to completion
        #[serde(skip_serializing_if = "Option::is_none")]
        eta_seconds: Option<u64>,
    },

    /// Item fetch finished successfully
    ItemCompleted {
        /// 1-based position within the batch
        index: usize,
        /// Items scheduled in the batch
        total: usize,
        /// Source-assigned item identifier
        external_id: String,
        /// Title reported by the tool, when available
        #[serde(skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },

    /// Item fetch exhausted its retries or failed permanently
    ItemFailed {
        /// 1-based position within the batch
        index: usize,
        /// Items scheduled in the batch
        total: usize,
        /// Source-assigned item identifier
        external_id: String,
        /// Failure description
        error: String,
    },

    /// All items have a terminal outcome
    BatchCompleted {
        /// Items that produced an audio file
        success_count: usize,
        /// Items that failed
        failure_count: usize,
        /// Items scheduled
        total_count: usize,
    },

    /// Archive written and sources cleaned up
    ArchiveCreated {
        /// Final archive path
        path: PathBuf,
        /// Number of files packed
        entry_count: usize,
    },

    /// Graceful shutdown initiated
    Shutdown,
}
