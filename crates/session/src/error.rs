//! Session error model.

use thiserror::Error;

use milvault_provider::{ProviderError, ProviderErrorCode};

/// Result type for session operations.
pub type AuthResult<T> = Result<T, AuthError>;

/// Failure of a session operation, classified for presentation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The backend could not be reached. State was not mutated, except that
    /// a failed refresh always clears the session.
    #[error("network unreachable: check your connection")]
    NetworkUnreachable,

    #[error("invalid email or password")]
    InvalidCredentials,

    /// Sign-up hit an existing account.
    #[error("an account with this email already exists")]
    DuplicateRegistration,

    /// The account exists but its email is unconfirmed.
    #[error("email not confirmed yet")]
    EmailNotConfirmed,

    /// Local or provider-side input rejection, keyed by field.
    #[error("{field}: {message}")]
    Validation { field: String, message: String },

    /// A refresh was requested with no stored refresh token.
    #[error("no refresh token stored")]
    NoRefreshToken,

    /// The session is gone and a new sign-in is required.
    #[error("session expired, please sign in again")]
    SessionExpired,

    /// The operation requires a role this session does not hold.
    #[error("forbidden")]
    Forbidden,

    /// The operation requires a signed-in session.
    #[error("not signed in")]
    NotAuthenticated,

    /// Anything else the provider reported.
    #[error("auth provider error: {0}")]
    Provider(String),
}

impl AuthError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<ProviderError> for AuthError {
    fn from(err: ProviderError) -> Self {
        match &err {
            ProviderError::Network(_) => AuthError::NetworkUnreachable,
            ProviderError::Api { code, message, .. } => match code {
                ProviderErrorCode::InvalidCredentials => AuthError::InvalidCredentials,
                ProviderErrorCode::UserAlreadyExists => AuthError::DuplicateRegistration,
                ProviderErrorCode::EmailNotConfirmed => AuthError::EmailNotConfirmed,
                ProviderErrorCode::SessionExpired => AuthError::SessionExpired,
                ProviderErrorCode::ValidationFailed => {
                    AuthError::validation("request", message.clone())
                }
                ProviderErrorCode::Unknown => AuthError::Provider(message.clone()),
            },
            ProviderError::Payload(msg) => AuthError::Provider(msg.clone()),
        }
    }
}
