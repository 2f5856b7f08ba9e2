//! Outcome classification for the endpoint layer
//!
//! The fetch-callback contract requires the endpoint layer to report
//! `FetchError` per the taxonomy rather than raising arbitrary errors. These
//! helpers map the three places a failure can surface — the transport, the
//! HTTP status line, and the application-level status code inside a 200
//! response — into that taxonomy.

use common::FetchError;

/// Rate-limit phrases in upstream error bodies. A 429 always rotates, but
/// some upstreams report throttling inside a 200 envelope with one of these.
const RATE_LIMIT_PATTERNS: &[&str] = &[
    "too many requests",
    "request too frequent",
    "frequency limit",
    "rate limit",
];

/// Session-invalid phrases: the credential is dead, not throttled.
const SESSION_PATTERNS: &[&str] = &[
    "cookie expired",
    "session expired",
    "not logged in",
    "login required",
    "invalid session",
    "invalid token",
];

/// Classify a transport-level failure. Timeouts, connection resets, and
/// proxy errors are all credential-independent and retryable.
pub fn transport_error(err: &reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Transient(format!("request timeout: {err}"))
    } else if err.is_connect() {
        FetchError::Transient(format!("connection failed: {err}"))
    } else {
        FetchError::Transient(format!("request failed: {err}"))
    }
}

/// Classify an HTTP response by status and body.
///
/// Returns `None` for success statuses: the body still has to pass the
/// application-level check (`api_code`). 429 rotates, 401/403 evicts,
/// 408/5xx retries, everything else non-success is fatal.
pub fn status(status: u16, body: &str) -> Option<FetchError> {
    match status {
        200..=299 => None,
        429 => Some(FetchError::RateLimited(truncate(body))),
        401 | 403 => Some(FetchError::InvalidCredential(truncate(body))),
        408 | 500 | 502 | 503 | 504 => Some(FetchError::Transient(format!(
            "upstream status {status}: {}",
            truncate(body)
        ))),
        _ => Some(FetchError::Fatal {
            code: i64::from(status),
            message: truncate(body),
        }),
    }
}

/// Classify an application-level status code from a decoded envelope.
///
/// Zero means success. Known throttling or session phrases in the message
/// map to the credential-specific variants; any other non-zero code is
/// fatal and propagates without retry or rotation.
pub fn api_code(code: i64, message: &str) -> Option<FetchError> {
    if code == 0 {
        return None;
    }
    let lower = message.to_lowercase();
    if RATE_LIMIT_PATTERNS.iter().any(|p| lower.contains(p)) {
        return Some(FetchError::RateLimited(truncate(message)));
    }
    if SESSION_PATTERNS.iter().any(|p| lower.contains(p)) {
        return Some(FetchError::InvalidCredential(truncate(message)));
    }
    Some(FetchError::Fatal {
        code,
        message: truncate(message),
    })
}

/// Keep error bodies log-sized.
fn truncate(body: &str) -> String {
    const MAX: usize = 256;
    if body.len() <= MAX {
        body.to_string()
    } else {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &body[..end])
    }
}
