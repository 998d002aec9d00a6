use chrono::{DateTime, Duration, SecondsFormat, Utc};

/// Current UTC time formatted as RFC 3339 with microsecond precision
///
/// Microseconds keep the value usable as an optimistic version stamp when
/// several writes land within the same second.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Timestamp strictly later than `previous`, used as the next version stamp
pub fn next_version(previous: &str) -> String {
    let now = Utc::now();
    match DateTime::parse_from_rfc3339(previous) {
        Ok(prev) if prev.with_timezone(&Utc) >= now => (prev.with_timezone(&Utc)
            + Duration::microseconds(1))
        .to_rfc3339_opts(SecondsFormat::Micros, true),
        _ => now.to_rfc3339_opts(SecondsFormat::Micros, true),
    }
}

/// Lower-cases a name and replaces every run of non-alphanumeric characters with `-`
///
/// # Arguments
/// * `name` - Human readable name, e.g. "Customer Onboarding"
///
/// # Returns
/// * `String` - Identifier-safe slug, e.g. "customer-onboarding"
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.trim().chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Shortens a string for log output, appending an ellipsis when cut
pub fn truncate_for_log(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max_chars).collect();
    cut.push('…');
    cut
}
