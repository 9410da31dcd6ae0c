//! Parser for the extraction tool's progress output

use crate::types::FetchProgress;
use regex::Regex;
use std::path::Path;

/// Line-oriented parser for the tool's `--newline` progress stream.
///
/// Regexes are compiled once per fetch invocation; a pattern that fails to
/// compile disables its branch instead of failing the fetch.
pub(super) struct OutputParser {
    progress: Option<Regex>,
    percent_only: Option<Regex>,
    download_dest: Option<Regex>,
    extract_dest: Option<Regex>,
}

impl OutputParser {
    pub(super) fn new() -> Self {
        Self {
            // [download]  42.5% of ~100.00MiB at 1.50MiB/s ETA 00:30
            progress: Regex::new(
                r"\[download\]\s+(\d+\.?\d*)%\s+of\s+~?(\S+)\s+at\s+(\S+)\s+ETA\s+(\S+)",
            )
            .ok(),
            // Completion and throttled lines drop the size/speed tail
            percent_only: Regex::new(r"\[download\]\s+(\d+\.?\d*)%").ok(),
            download_dest: Regex::new(r"\[download\] Destination: (.+)").ok(),
            extract_dest: Regex::new(r"\[ExtractAudio\] Destination: (.+)").ok(),
        }
    }

    /// Parse a progress snapshot out of one stdout line, if it carries one.
    pub(super) fn parse_progress(&self, line: &str) -> Option<FetchProgress> {
        if let Some(re) = &self.progress
            && let Some(caps) = re.captures(line)
            && let Some(percent) = caps.get(1).and_then(|m| m.as_str().parse::<f32>().ok())
        {
            let total_bytes = caps.get(2).and_then(|m| parse_size(m.as_str()));
            let downloaded_bytes = total_bytes
                .map(|total| ((f64::from(percent) / 100.0) * total as f64).round() as u64)
                .unwrap_or(0);
            return Some(FetchProgress {
                percent,
                downloaded_bytes,
                total_bytes,
                speed_bytes_per_sec: caps.get(3).and_then(|m| parse_speed(m.as_str())),
                eta_seconds: caps.get(4).and_then(|m| parse_eta(m.as_str())),
            });
        }

        if let Some(re) = &self.percent_only
            && let Some(caps) = re.captures(line)
            && let Some(percent) = caps.get(1).and_then(|m| m.as_str().parse::<f32>().ok())
        {
            return Some(FetchProgress {
                percent,
                downloaded_bytes: 0,
                total_bytes: None,
                speed_bytes_per_sec: None,
                eta_seconds: None,
            });
        }

        None
    }

    /// Extract a reported destination path from one stdout line.
    ///
    /// Both the raw media destination and the post-extraction destination are
    /// recognized; the extraction line arrives later in the stream, so a
    /// caller keeping the last value seen ends up with the final audio path.
    pub(super) fn parse_destination(&self, line: &str) -> Option<String> {
        for re in [&self.extract_dest, &self.download_dest]
            .into_iter()
            .flatten()
        {
            if let Some(caps) = re.captures(line) {
                return caps.get(1).map(|m| m.as_str().trim().to_string());
            }
        }
        None
    }
}

/// Derive a display title from the tool's reported destination path.
///
/// The output template appends ` [<id>]` to the stem so concurrent items with
/// identical titles cannot collide; strip that suffix so events carry the
/// bare title.
pub(super) fn title_from_destination(path: &str) -> Option<String> {
    let stem = Path::new(path).file_stem()?.to_string_lossy().into_owned();
    let title = match Regex::new(r"\s*\[[^\]\[]+\]$") {
        Ok(re) => re.replace(&stem, "").into_owned(),
        Err(_) => stem,
    };
    if title.is_empty() { None } else { Some(title) }
}

/// Parse a human-readable size like "100.00MiB" or "~3.5GiB" into bytes.
fn parse_size(s: &str) -> Option<u64> {
    let s = s.trim().trim_start_matches('~');
    if s.is_empty() || s == "N/A" || s == "Unknown" {
        return None;
    }
    let re = Regex::new(r"([\d.]+)\s*([KMGT]i?B|B)").ok()?;
    let caps = re.captures(s)?;
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;
    let multiplier: f64 = match caps.get(2)?.as_str() {
        "B" => 1.0,
        "KB" | "KiB" => 1024.0,
        "MB" | "MiB" => 1024.0 * 1024.0,
        "GB" | "GiB" => 1024.0 * 1024.0 * 1024.0,
        "TB" | "TiB" => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        _ => 1.0,
    };
    Some((value * multiplier) as u64)
}

/// Parse a transfer speed like "1.50MiB/s" into bytes per second.
fn parse_speed(s: &str) -> Option<u64> {
    parse_size(s.trim().trim_end_matches("/s"))
}

/// Parse an ETA like "00:30" or "1:02:03" into seconds.
fn parse_eta(s: &str) -> Option<u64> {
    let s = s.trim();
    if s.is_empty() || s == "Unknown" || s == "N/A" {
        return None;
    }
    let mut seconds: u64 = 0;
    for part in s.split(':') {
        seconds = seconds
            .checked_mul(60)?
            .checked_add(part.parse::<u64>().ok()?)?;
    }
    Some(seconds)
}
