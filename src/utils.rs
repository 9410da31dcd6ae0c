//! Human-readable formatting helpers for sizes and durations

/// Format a byte count as a human-readable size with two decimals
///
/// Walks the units B, KB, MB, GB, TB; anything above a terabyte stays in TB.
///
/// # Examples
///
/// ```
/// use playlist_dl::utils::format_size;
///
/// assert_eq!(format_size(512), "512.00 B");
/// assert_eq!(format_size(1536), "1.50 KB");
/// ```
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    let mut size = bytes as f64;
    let mut unit_index = 0;
    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{size:.2} {}", UNITS[unit_index])
}

/// Format a duration in whole seconds as `H:MM:SS`, or `M:SS` under an hour
///
/// # Examples
///
/// ```
/// use playlist_dl::utils::format_duration;
///
/// assert_eq!(format_duration(90), "1:30");
/// assert_eq!(format_duration(3661), "1:01:01");
/// ```
#[must_use]
pub fn format_duration(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}
