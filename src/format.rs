use chrono::{DateTime, FixedOffset, NaiveDateTime};

/// `3725` -> `"1h 2m"`, `45` -> `"45s"`.
pub fn format_duration(total_seconds: u64) -> String {
    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3_600;
    let minutes = (total_seconds % 3_600) / 60;
    let seconds = total_seconds % 60;

    match (days, hours, minutes) {
        (0, 0, 0) => format!("{seconds}s"),
        (0, 0, _) => format!("{minutes}m"),
        (0, _, _) => format!("{hours}h {minutes}m"),
        _ => format!("{days}d {hours}h"),
    }
}

/// Server timestamps are naive UTC; shown in the observer's offset.
/// Unparseable input is returned as-is.
pub fn format_date(raw: &str, offset: FixedOffset) -> String {
    parse_timestamp(raw)
        .map(|utc| {
            utc.with_timezone(&offset)
                .format("%a, %b %-d, %Y %-I:%M %p")
                .to_string()
        })
        .unwrap_or_else(|| raw.to_string())
}

fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed);
    }
    raw.parse::<NaiveDateTime>()
        .ok()
        .map(|naive| naive.and_utc().fixed_offset())
}
