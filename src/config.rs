//! Configuration types for playlist-dl

use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Main configuration for the playlist services
///
/// Fields are organized into logical sub-configs:
/// - [`download`](DownloadConfig) — audio format, quality, tool budgets
/// - [`retry`](RetryConfig) — client-level retry for transient source failures
/// - [`archive`](ArchiveConfig) — archive naming and source cleanup
///
/// The download sub-config is flattened for serialization, so the JSON/TOML
/// format stays flat (no nesting) for the fields callers touch most.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Directory where fetched audio and finished archives land (default: "./downloads")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Audio fetch behavior (format, quality, tool budgets)
    #[serde(flatten)]
    pub download: DownloadConfig,

    /// Retry behavior for transient source failures
    #[serde(default)]
    pub retry: RetryConfig,

    /// Archive packaging behavior
    #[serde(default)]
    pub archive: ArchiveConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            download: DownloadConfig::default(),
            retry: RetryConfig::default(),
            archive: ArchiveConfig::default(),
        }
    }
}

/// Audio fetch configuration (format, quality, tool budgets)
///
/// Groups the knobs handed to the extraction tool for each item fetch.
/// Used as a nested sub-config within [`Config`]; immutable once the
/// services are constructed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Audio container/codec for extracted tracks (default: mp3)
    #[serde(default)]
    pub audio_format: AudioFormat,

    /// Audio quality passed to the extraction tool, in kbit/s (default: "320")
    #[serde(default = "default_quality")]
    pub quality: String,

    /// Upper bound on concurrent item fetches (default: 16)
    ///
    /// The effective worker count is the smaller of this cap and the
    /// host-derived recommendation from
    /// [`recommended_workers`](crate::probe::recommended_workers).
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// HTTP chunk size requested per range request, in bytes (default: 10 MiB)
    #[serde(default = "default_chunk_size")]
    pub chunk_size_bytes: u64,

    /// File I/O buffer size in bytes (default: 1 MiB)
    #[serde(default = "default_buffer_size")]
    pub buffer_size_bytes: u64,

    /// Whole-request and per-fragment retry budget handed to the tool (default: 10)
    ///
    /// This is the tool's internal budget. Client-level retries around the
    /// whole invocation are governed separately by [`RetryConfig`].
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Socket timeout for the tool's network I/O (default: 30 seconds)
    #[serde(default = "default_socket_timeout", with = "duration_serde")]
    pub socket_timeout: Duration,

    /// Fragments fetched in parallel within a single item (default: 8)
    #[serde(default = "default_concurrent_fragments")]
    pub concurrent_fragments: u32,

    /// Output filename template in the tool's own syntax (default: "%(title)s [%(id)s].%(ext)s")
    ///
    /// The default embeds the item id so two items with the same title cannot
    /// clobber each other inside one working directory.
    #[serde(default = "default_output_template")]
    pub output_template: String,

    /// Path to the yt-dlp executable (auto-detected on PATH if None)
    #[serde(default)]
    pub ytdlp_path: Option<PathBuf>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            audio_format: AudioFormat::default(),
            quality: default_quality(),
            max_workers: default_max_workers(),
            chunk_size_bytes: default_chunk_size(),
            buffer_size_bytes: default_buffer_size(),
            retry_attempts: default_retry_attempts(),
            socket_timeout: default_socket_timeout(),
            concurrent_fragments: default_concurrent_fragments(),
            output_template: default_output_template(),
            ytdlp_path: None,
        }
    }
}

/// Audio container/codec for extracted tracks
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioFormat {
    /// MPEG layer-3 (default)
    #[default]
    Mp3,
    /// MPEG-4 audio (AAC in an m4a container)
    M4a,
    /// Uncompressed WAV
    Wav,
}

impl AudioFormat {
    /// File extension the extraction tool produces for this format
    ///
    /// The same string is valid as the tool's `--audio-format` value.
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::M4a => "m4a",
            AudioFormat::Wav => "wav",
        }
    }
}

/// Retry configuration for transient source failures
///
/// Applies to whole source invocations (spawn hiccups, network-class exits).
/// The tool's own per-request budget is [`DownloadConfig::retry_attempts`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per invocation (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Archive packaging configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Prefix for generated archive filenames (default: "playlist")
    ///
    /// Archives are named `{prefix}_{unix_seconds}.zip`.
    #[serde(default = "default_archive_prefix")]
    pub name_prefix: String,

    /// Delete packed source files once the archive is fully written (default: true)
    ///
    /// Deletion only happens after every entry has been written and the
    /// archive finalized. A failed write leaves all sources in place.
    #[serde(default = "default_true")]
    pub delete_sources: bool,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            name_prefix: default_archive_prefix(),
            delete_sources: true,
        }
    }
}

// Default value functions
fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_quality() -> String {
    "320".to_string()
}

fn default_max_workers() -> usize {
    16
}

fn default_chunk_size() -> u64 {
    10 * 1024 * 1024 // 10 MiB
}

fn default_buffer_size() -> u64 {
    1024 * 1024 // 1 MiB
}

fn default_retry_attempts() -> u32 {
    10
}

fn default_socket_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_concurrent_fragments() -> u32 {
    8
}

fn default_output_template() -> String {
    "%(title)s [%(id)s].%(ext)s".to_string()
}

fn default_true() -> bool {
    true
}

fn default_archive_prefix() -> String {
    "playlist".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
