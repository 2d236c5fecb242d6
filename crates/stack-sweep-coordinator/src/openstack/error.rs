//! OpenStack error classification
//!
//! Maps HTTP status codes and fault bodies onto [`CloudError`] categories.
//! Each service wraps its fault message differently:
//!
//! - Nova/Cinder: `{"itemNotFound": {"message": "...", "code": 404}}`
//! - Neutron: `{"NeutronError": {"type": "...", "message": "..."}}`
//! - Octavia: `{"faultstring": "..."}`
//! - Heat: `{"error": {"message": "..."}}`
//! - Designate: `{"message": "...", "code": 404}`
//! - Glance: plain text or HTML

use stack_sweep_common::CloudError;

/// Status codes for "not found" conditions
const NOT_FOUND_STATUSES: &[u16] = &[404];

/// Status codes for "in use" / wrong state conditions
const CONFLICT_STATUSES: &[u16] = &[409, 412];

/// Status codes for rejected credentials
const AUTH_STATUSES: &[u16] = &[401, 403];

/// Status codes for throttling/rate limiting
const THROTTLING_STATUSES: &[u16] = &[413, 429];

/// Status codes for temporarily unavailable services
const UNAVAILABLE_STATUSES: &[u16] = &[502, 503, 504];

/// Longest fault message kept from an unparseable body
const MAX_MESSAGE_LEN: usize = 200;

/// Classify an error response by status and body.
pub fn classify_status(status: u16, body: &str) -> CloudError {
    let message = extract_message(body).unwrap_or_else(|| format!("HTTP {status}"));

    match status {
        s if NOT_FOUND_STATUSES.contains(&s) => CloudError::NotFound(message),
        s if CONFLICT_STATUSES.contains(&s) => CloudError::Conflict(message),
        s if AUTH_STATUSES.contains(&s) => CloudError::Unauthorized(message),
        s if THROTTLING_STATUSES.contains(&s) => CloudError::Throttled,
        s if UNAVAILABLE_STATUSES.contains(&s) => CloudError::Unavailable(message),
        _ => CloudError::Api { status, message },
    }
}

/// Classify a request that never produced a response
pub fn classify_transport(error: &reqwest::Error) -> CloudError {
    if error.is_timeout() {
        CloudError::Transport(format!("request timed out: {error}"))
    } else if error.is_decode() {
        CloudError::Decode(error.to_string())
    } else {
        CloudError::Transport(error.to_string())
    }
}

/// Pull the human-readable fault message out of a response body
pub fn extract_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    let Ok(json) = serde_json::from_str::<serde_json::Value>(trimmed) else {
        return Some(truncate(trimmed));
    };

    let direct = ["message", "faultstring", "description"]
        .iter()
        .find_map(|key| json.get(*key).and_then(|v| v.as_str()));
    if let Some(message) = direct {
        return Some(message.to_string());
    }

    // One level of wrapping: {"itemNotFound": {...}}, {"NeutronError": {...}}, {"error": {...}}
    json.as_object()?
        .values()
        .find_map(|inner| inner.get("message").and_then(|v| v.as_str()))
        .map(str::to_string)
}

fn truncate(text: &str) -> String {
    match text.char_indices().nth(MAX_MESSAGE_LEN) {
        Some((index, _)) => format!("{}...", &text[..index]),
        None => text.to_string(),
    }
}
