//! Mapping of HTTP outcomes onto provider failure kinds.

use articlegen_shared::ProviderError;

/// Longest slice of an error body kept in a failure message.
const MAX_DETAIL_CHARS: usize = 300;

/// Classify an unsuccessful HTTP status.
///
/// 401/403 are credential failures, 429 is a rate limit, 408/504 are
/// timeouts; everything else is transient.
pub fn classify_status(status: u16, body: &str) -> ProviderError {
    let body: String = body.trim().chars().take(MAX_DETAIL_CHARS).collect();
    let detail = if body.is_empty() {
        format!("HTTP {status}")
    } else {
        format!("HTTP {status}: {body}")
    };

    match status {
        401 | 403 => ProviderError::Auth(detail),
        429 => ProviderError::RateLimit(detail),
        408 | 504 => ProviderError::Timeout(detail),
        _ => ProviderError::Transient(detail),
    }
}

/// Classify a transport failure (connection refused, reset, client timeout).
pub fn classify_transport(e: &reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(e.to_string())
    } else {
        ProviderError::Transient(e.to_string())
    }
}
