//! Client-facing error taxonomy.
//!
//! Every failure a caller can observe collapses into [`ApiError`]. Transport
//! layers construct the variants directly; HTTP responses above the auth
//! interceptor go through [`ApiError::from_status`] so the status → kind
//! mapping lives in exactly one place.

use std::collections::BTreeMap;

use thiserror::Error;

/// Result type used across the client crates.
pub type ApiResult<T> = Result<T, ApiError>;

/// Error presented to callers of the client services.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The backend could not be reached at all (DNS, refused connection).
    #[error("network unreachable: check your connection")]
    NetworkUnreachable,

    /// Login was rejected (wrong email/password combination).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The session is authenticated but not allowed to do this.
    #[error("forbidden")]
    Forbidden,

    /// Field-level validation failures, keyed by field name.
    #[error("validation failed on {} field(s)", .fields.len())]
    Validation {
        fields: BTreeMap<String, Vec<String>>,
    },

    /// An account already exists for the given email.
    #[error("an account with this email already exists")]
    DuplicateRegistration,

    /// The requested resource does not exist.
    #[error("not found")]
    NotFound,

    /// The session expired and could not be refreshed.
    #[error("session expired, please sign in again")]
    SessionExpired,

    /// Anything else the backend reported.
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },
}

impl ApiError {
    /// Single-field validation failure.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(field.into(), vec![message.into()]);
        Self::Validation { fields }
    }

    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self::Server {
            status,
            message: message.into(),
        }
    }

    /// Map an HTTP status + response body to an error kind.
    ///
    /// 401 here means the interceptor already failed to refresh; callers
    /// never see a raw unauthorized response with a live session.
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            400 | 422 => parse_field_errors(body)
                .map(|fields| Self::Validation { fields })
                .unwrap_or_else(|| Self::server(status, extract_message(body, status))),
            401 => Self::SessionExpired,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            _ => Self::server(status, extract_message(body, status)),
        }
    }
}

/// Pull a `{"errors": {"field": ["msg", ...]}}` map out of a response body.
fn parse_field_errors(body: &str) -> Option<BTreeMap<String, Vec<String>>> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let errors = value.get("errors")?.as_object()?;

    let mut fields = BTreeMap::new();
    for (field, messages) in errors {
        let messages: Vec<String> = match messages {
            serde_json::Value::String(s) => vec![s.clone()],
            serde_json::Value::Array(items) => items
                .iter()
                .filter_map(|m| m.as_str().map(str::to_owned))
                .collect(),
            _ => continue,
        };
        if !messages.is_empty() {
            fields.insert(field.clone(), messages);
        }
    }

    if fields.is_empty() { None } else { Some(fields) }
}

/// Best-effort human message from a response body.
fn extract_message(body: &str, status: u16) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["message", "msg", "error_description", "error"] {
            if let Some(text) = value.get(key).and_then(|v| v.as_str()) {
                if !text.is_empty() {
                    return text.to_string();
                }
            }
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("request failed with status {}", status)
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_covers_the_auth_cases() {
        assert_eq!(ApiError::from_status(401, ""), ApiError::SessionExpired);
        assert_eq!(ApiError::from_status(403, ""), ApiError::Forbidden);
        assert_eq!(ApiError::from_status(404, ""), ApiError::NotFound);
    }

    #[test]
    fn field_errors_are_parsed_from_400_bodies() {
        let body = r#"{"errors":{"email":["is invalid"],"password":["too short","too common"]}}"#;
        match ApiError::from_status(400, body) {
            ApiError::Validation { fields } => {
                assert_eq!(fields["email"], vec!["is invalid"]);
                assert_eq!(fields["password"].len(), 2);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn unparseable_400_falls_back_to_server_error() {
        match ApiError::from_status(400, "bad request") {
            ApiError::Server { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "bad request");
            }
            other => panic!("expected server error, got {other:?}"),
        }
    }

    #[test]
    fn message_extraction_prefers_structured_fields() {
        let err = ApiError::from_status(500, r#"{"message":"database offline"}"#);
        assert_eq!(err, ApiError::server(500, "database offline"));

        let err = ApiError::from_status(502, "");
        assert_eq!(err, ApiError::server(502, "request failed with status 502"));
    }
}
