//! Session state manager.
//!
//! Owns the current user and the stored token pair. Construction loads
//! whatever the store persisted, so a restart restores the session before
//! the first guard check runs. All mutations flow through here; guard,
//! HTTP layer and feature services only read.

use std::sync::Arc;

use tokio::sync::{Mutex, watch};
use tokio_stream::wrappers::WatchStream;

use milvault_core::{Config, ProfileUpdate, Registration, Role, TokenPair, User};
use milvault_provider::{SignUpOutcome, SignUpProfile};
use milvault_store::{SessionStore, keys};

use crate::backend::AuthBackend;
use crate::error::{AuthError, AuthResult};

/// What a successful registration produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// Provider signed the account in immediately.
    SignedIn(User),
    /// Account created; a confirmation email is on its way. The user is
    /// cached provisionally with no tokens and is not authenticated.
    ConfirmationRequired(User),
}

/// Client-side session authority.
pub struct SessionManager {
    backend: Arc<dyn AuthBackend>,
    store: SessionStore,
    config: Config,
    user_tx: watch::Sender<Option<User>>,
    refresh_gate: Mutex<()>,
}

impl SessionManager {
    /// Build the manager, seeding the user channel from persisted state.
    pub fn new(backend: Arc<dyn AuthBackend>, store: SessionStore, config: Config) -> Self {
        let initial = store.get::<User>(keys::CURRENT_USER);
        if let Some(user) = &initial {
            tracing::info!(user_id = %user.id, "restored persisted session");
        }
        let (user_tx, _) = watch::channel(initial);

        Self {
            backend,
            store,
            config,
            user_tx,
            refresh_gate: Mutex::new(()),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Authentication
    // ─────────────────────────────────────────────────────────────────────

    /// Sign in with email/password.
    ///
    /// On success the token pair and user are persisted together and the
    /// user is published; on failure nothing is mutated.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        remember_email: bool,
    ) -> AuthResult<User> {
        let session = self.backend.sign_in(email, password).await?;
        let (pair, user) = session.into_parts();
        self.persist_session(&pair, &user);

        if remember_email {
            self.store.set_string(keys::REMEMBER_EMAIL, email);
        } else {
            self.store.remove(keys::REMEMBER_EMAIL);
        }

        tracing::info!(user_id = %user.id, "signed in");
        Ok(user)
    }

    /// Register a new account.
    ///
    /// The password confirmation is checked locally; a mismatch never
    /// reaches the network.
    pub async fn register(&self, registration: &Registration) -> AuthResult<RegisterOutcome> {
        if !self.config.registration_enabled {
            return Err(AuthError::Forbidden);
        }
        if registration.password != registration.confirm_password {
            return Err(AuthError::validation(
                "confirm_password",
                "passwords do not match",
            ));
        }

        let profile = SignUpProfile {
            first_name: registration.first_name.clone(),
            last_name: registration.last_name.clone(),
            military_id: registration.military_id.clone(),
            rank: registration.rank,
            unit: registration.unit.clone(),
        };

        let outcome = self
            .backend
            .sign_up(&registration.email, &registration.password, &profile)
            .await?;

        match outcome {
            SignUpOutcome::SessionIssued(session) => {
                let (pair, user) = session.into_parts();
                self.persist_session(&pair, &user);
                tracing::info!(user_id = %user.id, "registered and signed in");
                Ok(RegisterOutcome::SignedIn(user))
            }
            SignUpOutcome::ConfirmationRequired(provider_user) => {
                let user = provider_user.into_user();
                // Provisional identity: cached for the confirm-email flow,
                // but carries no tokens and is not authenticated.
                self.store.set(keys::CURRENT_USER, &user);
                self.user_tx.send_replace(Some(user.clone()));
                tracing::info!(user_id = %user.id, "registered, confirmation pending");
                Ok(RegisterOutcome::ConfirmationRequired(user))
            }
        }
    }

    /// Sign out. Remote invalidation is best-effort; local state is always
    /// cleared, so logout never fails.
    pub async fn logout(&self) {
        if let Some(token) = self.store.get_string(keys::AUTH_TOKEN) {
            if let Err(err) = self.backend.sign_out(&token).await {
                tracing::warn!("remote sign-out failed, clearing local session anyway: {err}");
            }
        }
        self.clear_session();
        tracing::info!("signed out");
    }

    // ─────────────────────────────────────────────────────────────────────
    // Refresh
    // ─────────────────────────────────────────────────────────────────────

    /// Exchange the stored refresh token for a fresh pair.
    ///
    /// With no refresh token stored this fails immediately, without a
    /// network call. A failed exchange clears the whole session; a
    /// half-refreshed state never survives.
    pub async fn refresh(&self) -> AuthResult<TokenPair> {
        let _gate = self.refresh_gate.lock().await;
        self.refresh_locked().await
    }

    /// Single-flight refresh used by the HTTP layer on 401.
    ///
    /// `observed_token` is the access token the failing request was sent
    /// with. Callers that arrive while a refresh is running block on the
    /// gate; once inside, the stored token tells them what happened
    /// meanwhile. Unchanged: this caller performs the refresh. Changed:
    /// another caller already refreshed, adopt its pair without a network
    /// call. Gone: the session was cleared, fail.
    pub async fn refresh_coalesced(&self, observed_token: Option<&str>) -> AuthResult<TokenPair> {
        let _gate = self.refresh_gate.lock().await;

        let current = self.store.get_string(keys::AUTH_TOKEN);
        match (observed_token, current.as_deref()) {
            (_, None) => return Err(AuthError::SessionExpired),
            (Some(observed), Some(current_token)) if observed != current_token => {
                tracing::debug!("adopting token refreshed by a concurrent caller");
                let refresh_token = self
                    .store
                    .get_string(keys::REFRESH_TOKEN)
                    .unwrap_or_default();
                return Ok(TokenPair::new(current_token.to_string(), refresh_token));
            }
            _ => {}
        }

        self.refresh_locked().await
    }

    async fn refresh_locked(&self) -> AuthResult<TokenPair> {
        let Some(refresh_token) = self.store.get_string(keys::REFRESH_TOKEN) else {
            self.clear_session();
            return Err(AuthError::NoRefreshToken);
        };

        match self.backend.refresh_session(&refresh_token).await {
            Ok(session) => {
                let (pair, user) = session.into_parts();
                self.persist_session(&pair, &user);
                tracing::debug!("session refreshed");
                Ok(pair)
            }
            Err(err) => {
                tracing::warn!("session refresh failed, clearing session: {err}");
                self.clear_session();
                Err(err.into())
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // State reads
    // ─────────────────────────────────────────────────────────────────────

    /// Snapshot of the current user.
    pub fn current_user(&self) -> Option<User> {
        self.user_tx.borrow().clone()
    }

    /// Watch receiver for user transitions (`changed()` for pushes).
    pub fn subscribe(&self) -> watch::Receiver<Option<User>> {
        self.user_tx.subscribe()
    }

    /// The user channel as a `Stream`.
    pub fn user_stream(&self) -> WatchStream<Option<User>> {
        WatchStream::new(self.subscribe())
    }

    pub fn access_token(&self) -> Option<String> {
        self.store.get_string(keys::AUTH_TOKEN)
    }

    /// Authenticated means a cached user **and** a cached access token; a
    /// provisional unverified user alone does not qualify.
    pub fn is_authenticated(&self) -> bool {
        self.current_user().is_some() && self.access_token().is_some()
    }

    /// Role check against the cached user only. Never touches the network.
    pub fn has_role(&self, role: Role) -> bool {
        self.user_tx
            .borrow()
            .as_ref()
            .is_some_and(|user| user.role == role)
    }

    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        self.user_tx
            .borrow()
            .as_ref()
            .is_some_and(|user| roles.contains(&user.role))
    }

    pub fn remembered_email(&self) -> Option<String> {
        self.store.get_string(keys::REMEMBER_EMAIL)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────
    // Account maintenance
    // ─────────────────────────────────────────────────────────────────────

    /// Push a profile update and adopt the provider's resulting record.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> AuthResult<User> {
        let token = self.access_token().ok_or(AuthError::NotAuthenticated)?;
        let provider_user = self.backend.update_profile(&token, update).await?;
        let user = provider_user.into_user();
        self.store.set(keys::CURRENT_USER, &user);
        self.user_tx.send_replace(Some(user.clone()));
        Ok(user)
    }

    /// Adopt `user` as the current user without a network call, for flows
    /// that already hold a fresh record (e.g. a confirmation deep-link).
    pub fn update_user(&self, user: User) {
        self.store.set(keys::CURRENT_USER, &user);
        self.user_tx.send_replace(Some(user));
    }

    /// Re-fetch the account record (e.g. after email confirmation).
    pub async fn reload_user(&self) -> AuthResult<User> {
        let token = self.access_token().ok_or(AuthError::NotAuthenticated)?;
        let provider_user = self.backend.fetch_user(&token).await?;
        let user = provider_user.into_user();
        self.store.set(keys::CURRENT_USER, &user);
        self.user_tx.send_replace(Some(user.clone()));
        Ok(user)
    }

    pub async fn forgot_password(&self, email: &str) -> AuthResult<()> {
        self.backend.reset_password_request(email).await?;
        Ok(())
    }

    /// Complete a recovery flow. The confirmation is checked locally first.
    pub async fn reset_password(
        &self,
        recovery_token: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> AuthResult<()> {
        if new_password != confirm_password {
            return Err(AuthError::validation(
                "confirm_password",
                "passwords do not match",
            ));
        }
        self.backend
            .reset_password_confirm(recovery_token, new_password)
            .await?;
        Ok(())
    }

    pub async fn resend_confirmation(&self, email: &str) -> AuthResult<()> {
        self.backend.resend_confirmation(email).await?;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────

    /// Tokens and user are written in one path so no caller can observe a
    /// token without its user.
    fn persist_session(&self, pair: &TokenPair, user: &User) {
        self.store.set_string(keys::AUTH_TOKEN, &pair.access_token);
        self.store
            .set_string(keys::REFRESH_TOKEN, &pair.refresh_token);
        self.store.set(keys::CURRENT_USER, user);
        self.user_tx.send_replace(Some(user.clone()));
    }

    /// Also used by the HTTP layer when a freshly refreshed token is still
    /// rejected; the session is unusable at that point.
    pub(crate) fn clear_session(&self) {
        self.store.remove(keys::AUTH_TOKEN);
        self.store.remove(keys::REFRESH_TOKEN);
        self.store.remove(keys::CURRENT_USER);
        self.store.remove(keys::REMEMBER_EMAIL);
        self.user_tx.send_replace(None);
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("authenticated", &self.is_authenticated())
            .finish_non_exhaustive()
    }
}
