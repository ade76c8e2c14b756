//! Human readable durations

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Duration rounded to whole seconds, e.g. `42s`
pub fn format_duration(duration: Duration) -> String {
    format!("{}s", duration.as_secs_f64().round() as u64)
}

/// Relative time such as `3 minutes ago`; future times read `0 seconds ago`
pub fn time_ago_in_words(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - then).num_seconds().max(0) as u64;

    let (count, unit) = match seconds {
        s if s < 60 => (s, "second"),
        s if s < 60 * 60 => (s / 60, "minute"),
        s if s < 60 * 60 * 24 => (s / (60 * 60), "hour"),
        s if s < 60 * 60 * 24 * 30 => (s / (60 * 60 * 24), "day"),
        s if s < 60 * 60 * 24 * 365 => (s / (60 * 60 * 24 * 30), "month"),
        s => (s / (60 * 60 * 24 * 365), "year"),
    };

    if count == 1 {
        format!("1 {} ago", unit)
    } else {
        format!("{} {}s ago", count, unit)
    }
}
