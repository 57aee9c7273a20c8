//! Auth backend seam.
//!
//! The manager talks to this trait rather than the provider client directly,
//! so tests and embedders can substitute an in-memory implementation.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use chrono::Utc;
use serde_json::json;

use milvault_core::{ProfileUpdate, User};
use milvault_provider::wire::{AuthSession, ProviderUser, SignUpOutcome};
use milvault_provider::{AuthApi, ProviderError, ProviderErrorCode, SignUpProfile};

/// Operations the session manager needs from the auth provider.
#[async_trait::async_trait]
pub trait AuthBackend: Send + Sync {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        profile: &SignUpProfile,
    ) -> Result<SignUpOutcome, ProviderError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, ProviderError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), ProviderError>;

    async fn refresh_session(&self, refresh_token: &str) -> Result<AuthSession, ProviderError>;

    async fn reset_password_request(&self, email: &str) -> Result<(), ProviderError>;

    async fn reset_password_confirm(
        &self,
        recovery_token: &str,
        new_password: &str,
    ) -> Result<(), ProviderError>;

    async fn resend_confirmation(&self, email: &str) -> Result<(), ProviderError>;

    async fn fetch_user(&self, access_token: &str) -> Result<ProviderUser, ProviderError>;

    async fn update_profile(
        &self,
        access_token: &str,
        update: &ProfileUpdate,
    ) -> Result<ProviderUser, ProviderError>;
}

#[async_trait::async_trait]
impl AuthBackend for AuthApi {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        profile: &SignUpProfile,
    ) -> Result<SignUpOutcome, ProviderError> {
        AuthApi::sign_up(self, email, password, profile).await
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, ProviderError> {
        AuthApi::sign_in(self, email, password).await
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), ProviderError> {
        AuthApi::sign_out(self, access_token).await
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<AuthSession, ProviderError> {
        AuthApi::refresh_session(self, refresh_token).await
    }

    async fn reset_password_request(&self, email: &str) -> Result<(), ProviderError> {
        AuthApi::reset_password_request(self, email).await
    }

    async fn reset_password_confirm(
        &self,
        recovery_token: &str,
        new_password: &str,
    ) -> Result<(), ProviderError> {
        AuthApi::reset_password_confirm(self, recovery_token, new_password).await
    }

    async fn resend_confirmation(&self, email: &str) -> Result<(), ProviderError> {
        AuthApi::resend_confirmation(self, email).await
    }

    async fn fetch_user(&self, access_token: &str) -> Result<ProviderUser, ProviderError> {
        AuthApi::fetch_user(self, access_token).await
    }

    async fn update_profile(
        &self,
        access_token: &str,
        update: &ProfileUpdate,
    ) -> Result<ProviderUser, ProviderError> {
        AuthApi::update_profile(self, access_token, update).await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// In-memory backend
// ─────────────────────────────────────────────────────────────────────────────

struct Account {
    password: String,
    user: User,
}

/// In-memory [`AuthBackend`] with canned accounts and call counters.
///
/// Issues serial `at-N`/`rt-N` token pairs and rotates the refresh token on
/// every refresh, like the real provider. Counters are public so tests can
/// assert how many network calls an operation would have made.
#[derive(Default)]
pub struct InMemoryAuthBackend {
    accounts: Mutex<HashMap<String, Account>>,
    refresh_sessions: Mutex<HashMap<String, String>>,
    access_sessions: Mutex<HashMap<String, String>>,
    serial: AtomicU64,
    confirmation_required: AtomicBool,
    refuse_refresh: AtomicBool,
    fail_sign_out: AtomicBool,
    pub sign_up_calls: AtomicUsize,
    pub sign_in_calls: AtomicUsize,
    pub sign_out_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub recover_calls: AtomicUsize,
}

impl InMemoryAuthBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(
        self,
        email: impl Into<String>,
        password: impl Into<String>,
        user: User,
    ) -> Self {
        self.add_account(email, password, user);
        self
    }

    pub fn add_account(&self, email: impl Into<String>, password: impl Into<String>, user: User) {
        self.accounts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(
                email.into(),
                Account {
                    password: password.into(),
                    user,
                },
            );
    }

    /// Make subsequent sign-ups require email confirmation.
    pub fn require_confirmation(&self, on: bool) {
        self.confirmation_required.store(on, Ordering::SeqCst);
    }

    /// Reject every refresh from now on, as a revoked session would.
    pub fn refuse_refresh(&self, on: bool) {
        self.refuse_refresh.store(on, Ordering::SeqCst);
    }

    /// Make remote sign-out fail (local cleanup must still happen).
    pub fn fail_sign_out(&self, on: bool) {
        self.fail_sign_out.store(on, Ordering::SeqCst);
    }

    fn issue_session(&self, email: &str, user: &User) -> AuthSession {
        let n = self.serial.fetch_add(1, Ordering::SeqCst);
        let access = format!("at-{n}");
        let refresh = format!("rt-{n}");

        self.refresh_sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(refresh.clone(), email.to_string());
        self.access_sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(access.clone(), email.to_string());

        AuthSession {
            access_token: access,
            refresh_token: refresh,
            expires_in: Some(3600),
            expires_at: None,
            user: provider_user(email, user),
        }
    }

    fn account_user(&self, email: &str) -> Option<User> {
        self.accounts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(email)
            .map(|a| a.user.clone())
    }

    fn api_err(status: u16, code: ProviderErrorCode, message: &str) -> ProviderError {
        ProviderError::Api {
            status,
            code,
            message: message.to_string(),
        }
    }
}

fn provider_user(email: &str, user: &User) -> ProviderUser {
    let mut meta = serde_json::Map::new();
    meta.insert("first_name".into(), json!(user.first_name));
    meta.insert("last_name".into(), json!(user.last_name));
    meta.insert("role".into(), json!(user.role.as_str()));
    if let Some(rank) = user.rank {
        meta.insert("rank".into(), json!(rank.as_str()));
    }
    if let Some(mid) = &user.military_id {
        meta.insert("military_id".into(), json!(mid));
    }
    if let Some(unit) = &user.unit {
        meta.insert("unit".into(), json!(unit));
    }

    ProviderUser {
        id: user.id,
        email: Some(email.to_string()),
        email_confirmed_at: user.verified.then(Utc::now),
        confirmed_at: None,
        created_at: user.created_at.or_else(|| Some(Utc::now())),
        phone: user.phone.clone(),
        user_metadata: serde_json::Value::Object(meta),
    }
}

#[async_trait::async_trait]
impl AuthBackend for InMemoryAuthBackend {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        profile: &SignUpProfile,
    ) -> Result<SignUpOutcome, ProviderError> {
        self.sign_up_calls.fetch_add(1, Ordering::SeqCst);

        if self.account_user(email).is_some() {
            return Err(Self::api_err(
                422,
                ProviderErrorCode::UserAlreadyExists,
                "User already registered",
            ));
        }

        let pending = self.confirmation_required.load(Ordering::SeqCst);
        let user = User {
            id: milvault_core::UserId::new(),
            email: email.to_string(),
            first_name: profile.first_name.clone(),
            last_name: profile.last_name.clone(),
            role: milvault_core::Role::Personnel,
            rank: profile.rank,
            military_id: profile.military_id.clone(),
            unit: profile.unit.clone(),
            phone: None,
            verified: !pending,
            created_at: Some(Utc::now()),
        };
        self.add_account(email, password, user.clone());

        if pending {
            Ok(SignUpOutcome::ConfirmationRequired(provider_user(
                email, &user,
            )))
        } else {
            Ok(SignUpOutcome::SessionIssued(
                self.issue_session(email, &user),
            ))
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, ProviderError> {
        self.sign_in_calls.fetch_add(1, Ordering::SeqCst);

        let matched = {
            let accounts = self.accounts.lock().unwrap_or_else(|e| e.into_inner());
            accounts
                .get(email)
                .and_then(|account| (account.password == password).then(|| account.user.clone()))
        };

        match matched {
            Some(user) => Ok(self.issue_session(email, &user)),
            None => Err(Self::api_err(
                400,
                ProviderErrorCode::InvalidCredentials,
                "Invalid login credentials",
            )),
        }
    }

    async fn sign_out(&self, _access_token: &str) -> Result<(), ProviderError> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_sign_out.load(Ordering::SeqCst) {
            return Err(ProviderError::Network("connection reset".into()));
        }
        Ok(())
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<AuthSession, ProviderError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);

        if self.refuse_refresh.load(Ordering::SeqCst) {
            return Err(Self::api_err(
                400,
                ProviderErrorCode::SessionExpired,
                "Invalid Refresh Token",
            ));
        }

        let email = {
            let mut sessions = self
                .refresh_sessions
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            sessions.remove(refresh_token)
        };

        match email.and_then(|email| self.account_user(&email).map(|u| (email, u))) {
            Some((email, user)) => Ok(self.issue_session(&email, &user)),
            None => Err(Self::api_err(
                400,
                ProviderErrorCode::SessionExpired,
                "Invalid Refresh Token",
            )),
        }
    }

    async fn reset_password_request(&self, _email: &str) -> Result<(), ProviderError> {
        self.recover_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn reset_password_confirm(
        &self,
        _recovery_token: &str,
        _new_password: &str,
    ) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn resend_confirmation(&self, _email: &str) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn fetch_user(&self, access_token: &str) -> Result<ProviderUser, ProviderError> {
        let email = self
            .access_sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(access_token)
            .cloned();

        match email.and_then(|email| self.account_user(&email).map(|u| (email, u))) {
            Some((email, user)) => Ok(provider_user(&email, &user)),
            None => Err(Self::api_err(
                401,
                ProviderErrorCode::Unknown,
                "invalid token",
            )),
        }
    }

    async fn update_profile(
        &self,
        access_token: &str,
        update: &ProfileUpdate,
    ) -> Result<ProviderUser, ProviderError> {
        let email = self
            .access_sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(access_token)
            .cloned();
        let Some(email) = email else {
            return Err(Self::api_err(
                401,
                ProviderErrorCode::Unknown,
                "invalid token",
            ));
        };

        let mut accounts = self.accounts.lock().unwrap_or_else(|e| e.into_inner());
        let Some(account) = accounts.get_mut(&email) else {
            return Err(Self::api_err(
                401,
                ProviderErrorCode::Unknown,
                "invalid token",
            ));
        };

        if let Some(v) = &update.first_name {
            account.user.first_name = v.clone();
        }
        if let Some(v) = &update.last_name {
            account.user.last_name = v.clone();
        }
        if let Some(v) = &update.phone {
            account.user.phone = Some(v.clone());
        }
        if let Some(v) = &update.unit {
            account.user.unit = Some(v.clone());
        }

        Ok(provider_user(&email, &account.user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use milvault_core::{Role, UserId};

    fn user(verified: bool) -> User {
        User {
            id: UserId::new(),
            email: "j.doe@mil.example".into(),
            first_name: "Jordan".into(),
            last_name: "Doe".into(),
            role: Role::Soldier,
            rank: None,
            military_id: None,
            unit: None,
            phone: None,
            verified,
            created_at: None,
        }
    }

    #[tokio::test]
    async fn sign_in_issues_rotating_sessions() {
        let backend =
            InMemoryAuthBackend::new().with_account("j.doe@mil.example", "pw", user(true));

        let first = backend.sign_in("j.doe@mil.example", "pw").await.unwrap();
        let second = backend.sign_in("j.doe@mil.example", "pw").await.unwrap();
        assert_ne!(first.access_token, second.access_token);
        assert_eq!(backend.sign_in_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn refresh_rotates_and_invalidates_the_old_token() {
        let backend =
            InMemoryAuthBackend::new().with_account("j.doe@mil.example", "pw", user(true));
        let session = backend.sign_in("j.doe@mil.example", "pw").await.unwrap();

        let refreshed = backend
            .refresh_session(&session.refresh_token)
            .await
            .unwrap();
        assert_ne!(refreshed.refresh_token, session.refresh_token);

        // The consumed refresh token is gone.
        let err = backend
            .refresh_session(&session.refresh_token)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::SessionExpired);
    }

    #[tokio::test]
    async fn sign_up_respects_confirmation_mode() {
        let backend = InMemoryAuthBackend::new();
        let profile = SignUpProfile {
            first_name: "New".into(),
            last_name: "Recruit".into(),
            ..Default::default()
        };

        backend.require_confirmation(true);
        let outcome = backend
            .sign_up("new@mil.example", "pw", &profile)
            .await
            .unwrap();
        assert!(matches!(outcome, SignUpOutcome::ConfirmationRequired(_)));

        let err = backend
            .sign_up("new@mil.example", "pw", &profile)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::UserAlreadyExists);
    }
}
