//! Classification of GitLab responses into [`ProviderError`].
//!
//! This is the only place in the crate that looks at vendor message text.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;

use super::types::CheckShape;
use crate::errors::{ProviderError, Result};
use crate::http::HttpResponse;

/// Vendor message fragments meaning "a resource with this key exists".
const ALREADY_EXISTS_MARKERS: [&str; 3] = [
    "has already been taken",
    "already exists",
    "already been shared",
];

/// Classify a non-2xx GitLab response.
///
/// `resource` names what was being accessed and ends up in `NotFound` and
/// `AlreadyExists` errors.
pub(crate) fn normalize_response(resource: &str, response: &HttpResponse) -> ProviderError {
    let message = error_message(&response.body);

    match response.status {
        401 | 403 => ProviderError::InvalidCredentials {
            message: format!("{}: {}", response.status, message),
        },
        404 => ProviderError::not_found(resource),
        429 => ProviderError::RateLimited {
            reset_at: rate_limit_reset(response),
        },
        400 | 409 | 422 if is_already_exists(&message) => ProviderError::already_exists(resource),
        status => ProviderError::Http { status, message },
    }
}

/// Decode a 2xx body and check its shape.
pub(crate) fn decode<T>(resource: &str, body: &[u8]) -> Result<T>
where
    T: DeserializeOwned + CheckShape,
{
    let value = decode_unchecked::<T>(resource, body)?;
    value
        .check_shape()
        .map_err(|e| ProviderError::invalid_server_data(format!("{resource}: {e}")))?;
    Ok(value)
}

/// Decode a 2xx list body and check the shape of every element.
pub(crate) fn decode_list<T>(resource: &str, body: &[u8]) -> Result<Vec<T>>
where
    T: DeserializeOwned + CheckShape,
{
    let items = decode_unchecked::<Vec<T>>(resource, body)?;
    for item in &items {
        item.check_shape()
            .map_err(|e| ProviderError::invalid_server_data(format!("{resource}: {e}")))?;
    }
    Ok(items)
}

fn decode_unchecked<T: DeserializeOwned>(resource: &str, body: &[u8]) -> Result<T> {
    serde_json::from_slice(body)
        .map_err(|e| ProviderError::invalid_server_data(format!("{resource}: {e}")))
}

fn is_already_exists(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    ALREADY_EXISTS_MARKERS.iter().any(|m| lower.contains(m))
}

/// Flatten GitLab's error body into one line.
///
/// GitLab returns `{"message": "..."}`, `{"message": {"field": ["..."]}}`
/// or `{"error": "..."}`; anything else is returned as raw text.
fn error_message(body: &[u8]) -> String {
    let raw = String::from_utf8_lossy(body).trim().to_string();
    let Ok(value) = serde_json::from_slice::<serde_json::Value>(body) else {
        return raw;
    };

    let field = value.get("message").or_else(|| value.get("error"));
    match field {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Object(map)) => map
            .iter()
            .map(|(key, v)| format!("{key} {}", flatten(v)))
            .collect::<Vec<_>>()
            .join("; "),
        Some(serde_json::Value::Array(items)) => items.iter().map(flatten).collect::<Vec<_>>().join("; "),
        _ => raw,
    }
}

fn flatten(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(items) => items.iter().map(flatten).collect::<Vec<_>>().join(", "),
        other => other.to_string(),
    }
}

/// Reset time from `RateLimit-Reset` (epoch seconds), else one minute from now.
fn rate_limit_reset(response: &HttpResponse) -> DateTime<Utc> {
    response
        .header("ratelimit-reset")
        .and_then(|v| v.parse::<i64>().ok())
        .and_then(|epoch| DateTime::from_timestamp(epoch, 0))
        .unwrap_or_else(|| Utc::now() + chrono::Duration::minutes(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gitlab::types::GitLabGroup;

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: Vec::new(),
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_auth_statuses() {
        for status in [401, 403] {
            let err = normalize_response("project acme/demo", &response(status, r#"{"message":"401 Unauthorized"}"#));
            assert!(matches!(err, ProviderError::InvalidCredentials { .. }));
        }
    }

    #[test]
    fn test_not_found() {
        let err = normalize_response(
            "project acme/demo",
            &response(404, r#"{"message":"404 Project Not Found"}"#),
        );
        match err {
            ProviderError::NotFound { resource } => assert_eq!(resource, "project acme/demo"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_already_taken_field_errors() {
        let body = r#"{"message":{"name":["has already been taken"],"path":["has already been taken"]}}"#;
        let err = normalize_response("project acme/demo", &response(400, body));
        assert!(matches!(err, ProviderError::AlreadyExists { .. }));
    }

    #[test]
    fn test_already_exists_string_message() {
        let err = normalize_response(
            "deploy key ci",
            &response(409, r#"{"message":"Deploy key already exists"}"#),
        );
        assert!(matches!(err, ProviderError::AlreadyExists { .. }));
    }

    #[test]
    fn test_other_bad_request_is_http_error() {
        let err = normalize_response("project", &response(400, r#"{"error":"visibility is invalid"}"#));
        match err {
            ProviderError::Http { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "visibility is invalid");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_rate_limited_uses_reset_header() {
        let mut resp = response(429, "Retry later");
        resp.headers
            .push(("RateLimit-Reset".to_string(), "1700000000".to_string()));
        match normalize_response("projects", &resp) {
            ProviderError::RateLimited { reset_at } => {
                assert_eq!(reset_at.timestamp(), 1_700_000_000);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_non_json_body_is_kept_verbatim() {
        let err = normalize_response("project", &response(500, "Internal Server Error"));
        assert_eq!(err.to_string(), "HTTP error (500): Internal Server Error");
    }

    #[test]
    fn test_decode_rejects_malformed_json() {
        let err = decode::<GitLabGroup>("group acme", b"{not json").unwrap_err();
        assert!(matches!(err, ProviderError::InvalidServerData { .. }));
    }

    #[test]
    fn test_decode_rejects_blank_required_field() {
        let body = br#"{"id": 1, "name": "", "path": "acme", "full_path": "acme"}"#;
        let err = decode::<GitLabGroup>("group acme", body).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidServerData { .. }));
    }

    #[test]
    fn test_decode_list_checks_every_item() {
        let body = br#"[
            {"id": 1, "name": "a", "path": "a", "full_path": "a"},
            {"id": 0, "name": "b", "path": "b", "full_path": "b"}
        ]"#;
        assert!(decode_list::<GitLabGroup>("groups", body).is_err());
    }
}
