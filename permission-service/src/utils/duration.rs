use chrono::Duration;

const UNITS: [(i64, &str); 3] = [(86_400, "day"), (3_600, "hour"), (60, "minute")];

/// Human-readable span using at most the two largest non-zero units,
/// e.g. `"2 days, 3 hours"` or `"45 minutes"`.
pub fn humanize_duration(duration: Duration) -> String {
    let mut remaining = duration.num_seconds().max(0);
    let mut parts = Vec::with_capacity(2);

    for (seconds, name) in UNITS {
        let count = remaining / seconds;
        remaining %= seconds;
        if count > 0 {
            let plural = if count == 1 { "" } else { "s" };
            parts.push(format!("{} {}{}", count, name, plural));
        }
        if parts.len() == 2 {
            break;
        }
    }

    if parts.is_empty() {
        "less than a minute".to_string()
    } else {
        parts.join(", ")
    }
}
