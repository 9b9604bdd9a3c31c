pub mod openai;

/// Read a `Retry-After` header (seconds) as milliseconds.
fn retry_after_ms_from_headers(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(|secs| secs.saturating_mul(1_000))
}

/// Append a `retry_after_ms=` marker that [`crate::retry`] understands.
fn with_retry_after_marker(message: String, retry_after_ms: Option<u64>) -> String {
    match retry_after_ms {
        Some(ms) => format!("{message} (retry_after_ms={ms})"),
        None => message,
    }
}
