//! Provider error model.
//!
//! Classification is driven by the structured `error_code`/`code` field the
//! provider puts in error bodies. Message text is surfaced for humans but is
//! never matched on; wording changes upstream must not change behavior.

use thiserror::Error;

/// Error from a provider call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The provider could not be reached (DNS, refused, timeout).
    #[error("provider unreachable: {0}")]
    Network(String),

    /// The provider answered with a non-success status.
    #[error("provider error ({status}): {message}")]
    Api {
        status: u16,
        code: ProviderErrorCode,
        message: String,
    },

    /// The provider answered 2xx but the payload did not parse.
    #[error("unexpected provider payload: {0}")]
    Payload(String),
}

impl ProviderError {
    pub fn code(&self) -> ProviderErrorCode {
        match self {
            ProviderError::Api { code, .. } => *code,
            _ => ProviderErrorCode::Unknown,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Classified provider error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorCode {
    /// Wrong email/password combination.
    InvalidCredentials,
    /// Signup hit an existing account.
    UserAlreadyExists,
    /// Account exists but the email is unconfirmed.
    EmailNotConfirmed,
    /// Refresh token invalid, revoked or already used.
    SessionExpired,
    /// Request payload rejected (weak password, malformed email).
    ValidationFailed,
    /// Anything the client has no special handling for.
    Unknown,
}

impl ProviderErrorCode {
    /// Map a raw wire code to a classified one.
    pub fn classify(raw: &str) -> Self {
        match raw {
            "invalid_credentials" | "invalid_grant" => Self::InvalidCredentials,
            "user_already_exists" | "email_exists" | "phone_exists" => Self::UserAlreadyExists,
            "email_not_confirmed" => Self::EmailNotConfirmed,
            "refresh_token_not_found" | "refresh_token_already_used" | "session_not_found"
            | "session_expired" => Self::SessionExpired,
            "validation_failed" | "weak_password" | "email_address_invalid" => {
                Self::ValidationFailed
            }
            _ => Self::Unknown,
        }
    }
}

/// Build a [`ProviderError::Api`] from a non-success response body.
///
/// Understands the provider's error shapes: auth errors carry `error_code`
/// (plus `msg`), table errors carry a string `code` (plus `message`), and
/// legacy OAuth-style errors carry `error`/`error_description`.
pub(crate) fn api_error(status: u16, body: &str) -> ProviderError {
    let value: Option<serde_json::Value> = serde_json::from_str(body).ok();

    let raw_code = value.as_ref().and_then(|v| {
        v.get("error_code")
            .and_then(|c| c.as_str())
            .or_else(|| v.get("code").and_then(|c| c.as_str()))
            .or_else(|| v.get("error").and_then(|c| c.as_str()))
    });

    let message = value
        .as_ref()
        .and_then(|v| {
            ["msg", "message", "error_description", "error"]
                .iter()
                .find_map(|key| v.get(key).and_then(|m| m.as_str()))
        })
        .map(str::to_owned)
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                format!("status {}", status)
            } else {
                trimmed.to_string()
            }
        });

    ProviderError::Api {
        status,
        code: raw_code
            .map(ProviderErrorCode::classify)
            .unwrap_or(ProviderErrorCode::Unknown),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_style_bodies_classify_by_error_code() {
        let err = api_error(
            400,
            r#"{"code":400,"error_code":"invalid_credentials","msg":"Invalid login credentials"}"#,
        );
        assert_eq!(err.code(), ProviderErrorCode::InvalidCredentials);
        assert_eq!(err.status(), Some(400));
    }

    #[test]
    fn table_style_bodies_classify_by_string_code() {
        let err = api_error(
            404,
            r#"{"code":"PGRST116","message":"no rows returned","details":null}"#,
        );
        assert_eq!(err.code(), ProviderErrorCode::Unknown);
        match err {
            ProviderError::Api { message, .. } => assert_eq!(message, "no rows returned"),
            other => panic!("expected api error, got {other:?}"),
        }
    }

    #[test]
    fn legacy_oauth_bodies_classify_by_error_field() {
        let err = api_error(
            400,
            r#"{"error":"invalid_grant","error_description":"Invalid refresh token"}"#,
        );
        assert_eq!(err.code(), ProviderErrorCode::InvalidCredentials);
    }

    #[test]
    fn duplicate_and_refresh_codes_are_recognized() {
        assert_eq!(
            ProviderErrorCode::classify("user_already_exists"),
            ProviderErrorCode::UserAlreadyExists
        );
        assert_eq!(
            ProviderErrorCode::classify("refresh_token_already_used"),
            ProviderErrorCode::SessionExpired
        );
        assert_eq!(
            ProviderErrorCode::classify("weak_password"),
            ProviderErrorCode::ValidationFailed
        );
    }

    #[test]
    fn unstructured_bodies_fall_back_to_unknown() {
        let err = api_error(500, "internal error");
        assert_eq!(err.code(), ProviderErrorCode::Unknown);
        match err {
            ProviderError::Api { message, .. } => assert_eq!(message, "internal error"),
            other => panic!("expected api error, got {other:?}"),
        }

        let err = api_error(502, "");
        match err {
            ProviderError::Api { message, .. } => assert_eq!(message, "status 502"),
            other => panic!("expected api error, got {other:?}"),
        }
    }
}
