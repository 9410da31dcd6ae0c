//! [`MediaSource`] implementation driving the `yt-dlp` binary

use super::parser::{OutputParser, title_from_destination};
use super::{FetchedAudio, MediaSource, ProgressCallback};
use crate::config::DownloadConfig;
use crate::error::FetchError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

/// Binary name looked up on PATH when no explicit tool path is configured
const YTDLP_BINARY: &str = "yt-dlp";

/// Stderr lines retained for error reporting when the tool fails
const STDERR_TAIL_LINES: usize = 16;

/// Quality ranking handed to the tool: audio bitrate before anything else
const FORMAT_SORT: &str = "abr,asr,res,br,size";

/// Stderr markers for content that no retry can bring back
const UNAVAILABLE_MARKERS: &[&str] = &[
    "video unavailable",
    "private video",
    "private playlist",
    "playlist is private",
    "this video is not available",
    "has been removed",
    "does not exist",
];

/// Production [`MediaSource`] that shells out to `yt-dlp`.
///
/// Listings use a single `--dump-single-json` invocation and return the raw
/// JSON. Audio fetches stream the tool's `--newline` output, surfacing parsed
/// progress through the caller's callback and keeping a bounded stderr tail
/// for diagnosis when the tool fails.
#[derive(Debug)]
pub struct YtDlpSource {
    binary: PathBuf,
    config: DownloadConfig,
}

impl YtDlpSource {
    /// Locate the tool and build a source around it.
    ///
    /// An explicit `ytdlp_path` in the config wins over PATH lookup.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::ToolNotFound`] when the binary cannot be located.
    pub fn new(config: DownloadConfig) -> Result<Self, FetchError> {
        let binary = match &config.ytdlp_path {
            Some(path) if path.is_file() => path.clone(),
            Some(path) => {
                return Err(FetchError::ToolNotFound {
                    tool: path.display().to_string(),
                });
            }
            None => {
                which::which(YTDLP_BINARY).map_err(|_| FetchError::ToolNotFound {
                    tool: YTDLP_BINARY.to_string(),
                })?
            }
        };
        Ok(Self { binary, config })
    }

    /// Create a source with an explicit binary path, skipping lookup.
    pub fn with_binary(binary: PathBuf, config: DownloadConfig) -> Self {
        Self { binary, config }
    }

    /// Path of the binary this source invokes.
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn listing_args(&self, url: &str, flat: bool) -> Vec<String> {
        let mut args = vec![
            "--quiet".to_string(),
            "--no-warnings".to_string(),
            "--dump-single-json".to_string(),
        ];
        if flat {
            args.push("--flat-playlist".to_string());
        }
        args.push("--socket-timeout".to_string());
        args.push(self.config.socket_timeout.as_secs().to_string());
        args.push(url.to_string());
        args
    }

    fn audio_args(&self, item_url: &str, dest_dir: &Path) -> Vec<String> {
        let c = &self.config;
        vec![
            "--newline".to_string(),
            "--no-warnings".to_string(),
            "--no-playlist".to_string(),
            "--extract-audio".to_string(),
            "--audio-format".to_string(),
            c.audio_format.extension().to_string(),
            "--audio-quality".to_string(),
            c.quality.clone(),
            "--format".to_string(),
            "bestaudio/best".to_string(),
            "--format-sort".to_string(),
            FORMAT_SORT.to_string(),
            "--format-sort-force".to_string(),
            "--retries".to_string(),
            c.retry_attempts.to_string(),
            "--fragment-retries".to_string(),
            c.retry_attempts.to_string(),
            "--concurrent-fragments".to_string(),
            c.concurrent_fragments.to_string(),
            "--http-chunk-size".to_string(),
            c.chunk_size_bytes.to_string(),
            "--buffer-size".to_string(),
            c.buffer_size_bytes.to_string(),
            "--socket-timeout".to_string(),
            c.socket_timeout.as_secs().to_string(),
            "--output".to_string(),
            c.output_template.clone(),
            "--paths".to_string(),
            dest_dir.display().to_string(),
            item_url.to_string(),
        ]
    }
}

#[async_trait]
impl MediaSource for YtDlpSource {
    async fn fetch_listing(&self, url: &str, flat: bool) -> Result<String, FetchError> {
        let args = self.listing_args(url, flat);
        tracing::debug!(binary = %self.binary.display(), url, flat, "fetching listing");

        let output = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| FetchError::Spawn {
                tool: self.binary.display().to_string(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_exit(output.status.code(), tail_lines(&stderr)));
        }

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if stdout.trim().is_empty() {
            return Err(FetchError::MalformedOutput {
                reason: "listing produced no output".to_string(),
            });
        }
        Ok(stdout)
    }

    async fn fetch_audio(
        &self,
        item_url: &str,
        dest_dir: &Path,
        on_progress: ProgressCallback<'_>,
    ) -> Result<FetchedAudio, FetchError> {
        let args = self.audio_args(item_url, dest_dir);
        tracing::debug!(binary = %self.binary.display(), url = item_url, "fetching audio");

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| FetchError::Spawn {
                tool: self.binary.display().to_string(),
                reason: e.to_string(),
            })?;

        let stdout = child.stdout.take().ok_or_else(|| FetchError::Spawn {
            tool: self.binary.display().to_string(),
            reason: "stdout pipe not captured".to_string(),
        })?;
        let stderr = child.stderr.take().ok_or_else(|| FetchError::Spawn {
            tool: self.binary.display().to_string(),
            reason: "stderr pipe not captured".to_string(),
        })?;

        let mut stdout_lines = BufReader::new(stdout).lines();
        let mut stderr_lines = BufReader::new(stderr).lines();

        let parser = OutputParser::new();
        let mut stderr_tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
        let mut destination: Option<String> = None;
        let mut stdout_open = true;
        let mut stderr_open = true;

        // Drain both pipes to completion; a full pipe buffer would otherwise
        // stall the child.
        while stdout_open || stderr_open {
            tokio::select! {
                line = stdout_lines.next_line(), if stdout_open => match line {
                    Ok(Some(line)) => {
                        if let Some(progress) = parser.parse_progress(&line) {
                            on_progress(progress);
                        }
                        if let Some(dest) = parser.parse_destination(&line) {
                            destination = Some(dest);
                        }
                    }
                    Ok(None) => stdout_open = false,
                    Err(e) => {
                        tracing::debug!(error = %e, "stdout read failed");
                        stdout_open = false;
                    }
                },
                line = stderr_lines.next_line(), if stderr_open => match line {
                    Ok(Some(line)) => {
                        if stderr_tail.len() == STDERR_TAIL_LINES {
                            stderr_tail.pop_front();
                        }
                        stderr_tail.push_back(line);
                    }
                    Ok(None) => stderr_open = false,
                    Err(e) => {
                        tracing::debug!(error = %e, "stderr read failed");
                        stderr_open = false;
                    }
                },
            }
        }

        let status = child.wait().await.map_err(|e| FetchError::Spawn {
            tool: self.binary.display().to_string(),
            reason: e.to_string(),
        })?;

        if !status.success() {
            let tail = Vec::from(stderr_tail).join("\n");
            return Err(classify_exit(status.code(), tail));
        }

        let title = destination.as_deref().and_then(title_from_destination);
        let file_path = destination.map(PathBuf::from);
        Ok(FetchedAudio { title, file_path })
    }
}

/// Map a failed tool exit onto a fetch error, recognizing permanent
/// content-unavailable failures so they are not retried.
fn classify_exit(code: Option<i32>, stderr_tail: String) -> FetchError {
    let lower = stderr_tail.to_lowercase();
    if UNAVAILABLE_MARKERS.iter().any(|m| lower.contains(m)) {
        return FetchError::Unavailable {
            reason: stderr_tail,
        };
    }
    FetchError::ExitStatus { code, stderr_tail }
}

/// Keep only the last [`STDERR_TAIL_LINES`] lines of a captured stderr block.
fn tail_lines(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}
