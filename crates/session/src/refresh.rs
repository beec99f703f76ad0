//! Refresh coordinator.
//!
//! Owns every path that talks to the backend on behalf of the session: the
//! on-mount initialization, the single-flight token refresh, the periodic
//! background check, and the login entry points. Backend failures never
//! escape as raw errors from the refresh paths; they resolve to a logged
//! [`RefreshOutcome`] and, where the session cannot continue, a logout.

use chrono::Utc;
use hearth_core::{AuthStatus, AuthTokens, User};
use hearth_http::types::{
    LoginRequest, LoginResponse, PasskeyOptionsRequest, PasskeyVerifyRequest, SessionResponse,
    TwoFactorRequest,
};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::backend::AuthBackend;
use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::store::TokenStore;
use crate::token::{is_token_expired, is_valid_token_format, needs_refresh};

/// How a refresh trigger was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// New tokens are in the store
    Refreshed,
    /// Another refresh was already in flight; nothing was sent
    Coalesced,
    /// The refresh failed and the session was logged out
    Failed,
    /// The session changed while the request was in flight; the result was dropped
    Superseded,
}

/// Result of one background tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    /// No authenticated session to look after
    NotAuthenticated,
    /// The access token is outside the lookahead window
    Fresh,
    /// No recorded activity within the idle timeout; the session was logged out
    IdleExpired,
    Refresh(RefreshOutcome),
}

/// Result of a password login
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Authenticated { session_id: String },
    TwoFactorRequired { user_id: String },
}

/// Second factor submitted to complete a login
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TwoFactorCode {
    Totp(String),
    Recovery(String),
}

impl TwoFactorCode {
    fn into_request(self, user_id: String) -> TwoFactorRequest {
        let (code, recovery_code) = match self {
            Self::Totp(code) => (Some(code), None),
            Self::Recovery(code) => (None, Some(code)),
        };
        TwoFactorRequest {
            user_id,
            code,
            recovery_code,
        }
    }
}

/// Held for the duration of one refresh; released on drop
struct RefreshSlot {
    in_flight: Arc<AtomicBool>,
}

impl RefreshSlot {
    fn try_acquire(in_flight: &Arc<AtomicBool>) -> Option<Self> {
        in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self {
                in_flight: Arc::clone(in_flight),
            })
    }
}

impl Drop for RefreshSlot {
    fn drop(&mut self) {
        self.in_flight.store(false, Ordering::Release);
    }
}

#[derive(Clone)]
pub struct RefreshCoordinator {
    store: Arc<TokenStore>,
    backend: Arc<dyn AuthBackend>,
    lookahead: Duration,
    poll_interval: Duration,
    in_flight: Arc<AtomicBool>,
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("lookahead", &self.lookahead)
            .field("poll_interval", &self.poll_interval)
            .field("in_flight", &self.in_flight.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl RefreshCoordinator {
    pub fn new(config: &SessionConfig, store: Arc<TokenStore>, backend: Arc<dyn AuthBackend>) -> Self {
        Self {
            store,
            backend,
            lookahead: config.refresh.lookahead(),
            poll_interval: config.refresh.poll_interval(),
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    pub const fn store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    /// True while a refresh request is outstanding
    pub fn is_refreshing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Resolve the hydrated session into a terminal status.
    ///
    /// No tokens leaves the session unauthenticated. A live access token with a
    /// known user resumes it. A refresh token alongside a missing or expired
    /// access token gets exactly one refresh. Anything else is logged out.
    pub async fn initialize(&self) -> AuthStatus {
        let session = self.store.snapshot();

        if session.tokens.is_empty() {
            self.store.mark_unauthenticated();
            debug!("No stored tokens; session is unauthenticated");
            return self.store.status();
        }

        self.store.set_loading();
        let access_valid = session.access_token().is_some_and(|t| !is_token_expired(t));

        if access_valid && session.user.is_some() && self.store.restore_authenticated() {
            info!(session_id = ?session.session_id, "Resumed stored session");
        } else if !access_valid && session.refresh_token().is_some() {
            let outcome = self.refresh().await;
            debug!(?outcome, "Initial refresh finished");
        } else {
            warn!(
                access_valid,
                has_user = session.user.is_some(),
                "Stored session is unusable; logging out"
            );
            self.store.logout();
        }

        self.store.status()
    }

    /// Exchange the refresh token for a new pair.
    ///
    /// At most one refresh runs at a time; a trigger while one is in flight
    /// returns [`RefreshOutcome::Coalesced`] without contacting the backend.
    pub async fn refresh(&self) -> RefreshOutcome {
        let Some(_slot) = RefreshSlot::try_acquire(&self.in_flight) else {
            debug!("Refresh already in flight; coalescing");
            return RefreshOutcome::Coalesced;
        };

        let Some(started) = self.store.begin_refresh() else {
            if self.store.status() == AuthStatus::Refreshing {
                return RefreshOutcome::Coalesced;
            }
            warn!(error = %SessionError::MissingRefreshToken, "Cannot refresh session");
            self.store.logout();
            return RefreshOutcome::Failed;
        };
        let generation = started.generation;
        let Some(refresh_token) = started.refresh_token() else {
            self.store.logout_if_current(generation);
            return RefreshOutcome::Failed;
        };

        debug!(generation, "Refreshing access token");
        let tokens = match self.backend.refresh(refresh_token).await {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!(error = %e, generation, "Token refresh failed");
                return if self.store.logout_if_current(generation) {
                    RefreshOutcome::Failed
                } else {
                    RefreshOutcome::Superseded
                };
            }
        };

        if !self.store.complete_refresh(generation, tokens.clone()) {
            return self.reject_refreshed_tokens(generation, &tokens);
        }
        info!(generation, "Access token refreshed");

        self.reload_profile(generation, &tokens.access_token, started.user.as_ref())
            .await
    }

    // Only a badly shaped token ends the session; anything else means the
    // store moved on while the request was in flight
    fn reject_refreshed_tokens(&self, generation: u64, tokens: &AuthTokens) -> RefreshOutcome {
        let session = self.store.snapshot();
        if session.generation != generation
            || session.status != AuthStatus::Refreshing
            || is_valid_token_format(&tokens.access_token)
        {
            debug!(generation, "Discarding refresh result for a superseded session");
            return RefreshOutcome::Superseded;
        }
        error!(
            token_len = tokens.access_token.len(),
            "Backend issued a malformed access token"
        );
        self.store.logout_if_current(generation);
        RefreshOutcome::Failed
    }

    // Profile failures leave the refreshed session in place
    async fn reload_profile(
        &self,
        generation: u64,
        access_token: &str,
        previous: Option<&User>,
    ) -> RefreshOutcome {
        match self.backend.fetch_profile(access_token).await {
            Ok(me) => {
                let user_id = me.user.id.clone();
                if self.store.apply_profile(generation, me.user) {
                    return RefreshOutcome::Refreshed;
                }
                if self.store.snapshot().generation != generation {
                    debug!(generation, "Discarding profile for a superseded session");
                    return RefreshOutcome::Superseded;
                }
                if previous.is_some_and(|user| user.id != user_id) {
                    warn!(
                        error = %SessionError::UserMismatch(user_id),
                        "Ignoring profile returned after refresh"
                    );
                }
                RefreshOutcome::Refreshed
            }
            Err(e) => {
                warn!(error = %e, "Profile fetch after refresh failed; keeping session");
                RefreshOutcome::Refreshed
            }
        }
    }

    /// One background tick
    pub async fn check_once(&self) -> CheckOutcome {
        let session = self.store.snapshot();
        match session.status {
            AuthStatus::Authenticated => {}
            AuthStatus::Refreshing => return CheckOutcome::Refresh(RefreshOutcome::Coalesced),
            _ => return CheckOutcome::NotAuthenticated,
        }

        if self.store.is_idle_expired(Utc::now()) {
            info!("Session idle timeout reached; logging out");
            self.store.logout();
            return CheckOutcome::IdleExpired;
        }

        let stale = session
            .access_token()
            .is_none_or(|token| needs_refresh(token, self.lookahead));
        if !stale {
            return CheckOutcome::Fresh;
        }

        CheckOutcome::Refresh(self.refresh().await)
    }

    /// Run [`Self::check_once`] every `poll_interval` until the handle is shut down or dropped
    pub fn spawn_background_check(&self) -> BackgroundCheck {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let coordinator = self.clone();
        let period = self.poll_interval;

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let outcome = coordinator.check_once().await;
                        debug!(?outcome, "Background session check");
                    }
                    _ = shutdown_rx.changed() => {
                        break;
                    }
                }
            }
            debug!("Background session check stopped");
        });

        info!(interval_secs = period.as_secs(), "Background session check started");
        BackgroundCheck {
            shutdown: shutdown_tx,
            handle: Some(handle),
        }
    }

    /// Sign in with email and password
    ///
    /// # Errors
    ///
    /// Returns the backend error if the credentials are rejected, or
    /// [`SessionError::MalformedToken`] if the issued token is unusable
    pub async fn login(&self, request: &LoginRequest) -> Result<LoginOutcome> {
        self.store.set_loading();
        match self.backend.login(request).await {
            Ok(LoginResponse::Authenticated(session)) => {
                let session_id = self.install(session)?;
                Ok(LoginOutcome::Authenticated { session_id })
            }
            Ok(LoginResponse::TwoFactorRequired(challenge)) => {
                self.store.mark_unauthenticated();
                info!(user_id = %challenge.user_id, "Second factor required");
                Ok(LoginOutcome::TwoFactorRequired {
                    user_id: challenge.user_id,
                })
            }
            Err(e) => {
                warn!(error = %e, "Login failed");
                self.store.mark_unauthenticated();
                Err(e.into())
            }
        }
    }

    /// Check a second factor without completing the login
    ///
    /// # Errors
    ///
    /// Returns the backend error if the request fails
    pub async fn validate_two_factor(&self, user_id: &str, code: TwoFactorCode) -> Result<bool> {
        let request = code.into_request(user_id.to_string());
        Ok(self.backend.validate_two_factor(&request).await?.valid)
    }

    /// Finish a login that answered [`LoginOutcome::TwoFactorRequired`]
    ///
    /// # Errors
    ///
    /// Returns the backend error if the code is rejected, or
    /// [`SessionError::MalformedToken`] if the issued token is unusable
    pub async fn complete_two_factor(&self, user_id: &str, code: TwoFactorCode) -> Result<String> {
        let request = code.into_request(user_id.to_string());
        self.store.set_loading();
        match self.backend.complete_two_factor_login(&request).await {
            Ok(session) => self.install(session),
            Err(e) => {
                warn!(error = %e, user_id, "Second factor rejected");
                self.store.mark_unauthenticated();
                Err(e.into())
            }
        }
    }

    /// WebAuthn assertion options for a passkey login
    ///
    /// # Errors
    ///
    /// Returns the backend error if the request fails
    pub async fn passkey_options(&self, email: Option<String>) -> Result<JsonValue> {
        let request = PasskeyOptionsRequest { email };
        Ok(self.backend.passkey_options(&request).await?)
    }

    /// Sign in with a signed WebAuthn assertion
    ///
    /// # Errors
    ///
    /// Returns the backend error if the assertion is rejected, or
    /// [`SessionError::MalformedToken`] if the issued token is unusable
    pub async fn login_with_passkey(&self, response: JsonValue) -> Result<String> {
        self.store.set_loading();
        match self.backend.verify_passkey(&PasskeyVerifyRequest { response }).await {
            Ok(session) => self.install(session),
            Err(e) => {
                warn!(error = %e, "Passkey login failed");
                self.store.mark_unauthenticated();
                Err(e.into())
            }
        }
    }

    /// Tell the backend the session is over, then log out locally whatever it answers
    pub async fn sign_out(&self) {
        if let Some(access_token) = self.store.access_token() {
            if let Err(e) = self.backend.logout(&access_token).await {
                warn!(error = %e, "Remote logout failed; clearing local session anyway");
            }
        }
        self.store.logout();
    }

    fn install(&self, session: SessionResponse) -> Result<String> {
        self.store
            .initialize_session(session.user, session.tokens)
            .inspect_err(|_| self.store.mark_unauthenticated())
    }
}

/// Handle to the task started by [`RefreshCoordinator::spawn_background_check`].
///
/// Dropping the handle stops the task after its current tick.
#[derive(Debug)]
pub struct BackgroundCheck {
    shutdown: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl BackgroundCheck {
    /// Stop the loop and wait for it to exit
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "Background session check ended abnormally");
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }
}

impl Drop for BackgroundCheck {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendError;
    use crate::backend::mock::MockAuthBackend;
    use crate::storage::MemoryStorage;
    use crate::token::test_tokens::token_expiring_in;
    use hearth_core::UserContext;
    use hearth_http::types::{MeResponse, TwoFactorChallenge, TwoFactorValidation};
    use serde_json::json;

    fn setup(backend: MockAuthBackend) -> (RefreshCoordinator, Arc<TokenStore>) {
        let config = SessionConfig::default();
        let store = Arc::new(TokenStore::new(&config, Arc::new(MemoryStorage::new())));
        let coordinator = RefreshCoordinator::new(&config, store.clone(), Arc::new(backend));
        (coordinator, store)
    }

    fn signed_in(store: &TokenStore, access_ttl: i64) {
        store
            .initialize_session(
                User::new("u1", "tenant"),
                AuthTokens::new(token_expiring_in(access_ttl), "r1"),
            )
            .unwrap();
    }

    fn me(user: User) -> MeResponse {
        MeResponse {
            user,
            context: UserContext::default(),
        }
    }

    #[tokio::test]
    async fn test_refresh_success_updates_tokens_and_profile() {
        let mut backend = MockAuthBackend::new();
        backend
            .expect_refresh()
            .withf(|token| token == "r1")
            .times(1)
            .returning(|_| Ok(AuthTokens::new(token_expiring_in(3600), "r2")));
        backend.expect_fetch_profile().times(1).returning(|_| {
            let mut user = User::new("u1", "tenant");
            user.name = Some("Ada".into());
            Ok(me(user))
        });

        let (coordinator, store) = setup(backend);
        signed_in(&store, 60);

        assert_eq!(coordinator.refresh().await, RefreshOutcome::Refreshed);
        assert!(store.is_authenticated());
        assert_eq!(store.snapshot().refresh_token(), Some("r2"));
        assert_eq!(store.user().unwrap().name.as_deref(), Some("Ada"));
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test]
    async fn test_refresh_rejected_logs_out() {
        let mut backend = MockAuthBackend::new();
        backend
            .expect_refresh()
            .times(1)
            .returning(|_| Err(BackendError::Unauthorized));
        backend.expect_fetch_profile().never();

        let (coordinator, store) = setup(backend);
        signed_in(&store, 60);

        assert_eq!(coordinator.refresh().await, RefreshOutcome::Failed);
        let session = store.snapshot();
        assert_eq!(session.status, AuthStatus::Unauthenticated);
        assert!(session.access_token().is_none());
        assert!(session.user.is_none());
    }

    #[tokio::test]
    async fn test_profile_failure_keeps_session() {
        let mut backend = MockAuthBackend::new();
        backend
            .expect_refresh()
            .returning(|_| Ok(AuthTokens::new(token_expiring_in(3600), "r2")));
        backend
            .expect_fetch_profile()
            .returning(|_| Err(BackendError::Transport("connection reset".into())));

        let (coordinator, store) = setup(backend);
        signed_in(&store, 60);

        assert_eq!(coordinator.refresh().await, RefreshOutcome::Refreshed);
        assert!(store.is_authenticated());
        assert_eq!(store.user().unwrap().id, "u1");
        assert_eq!(store.snapshot().refresh_token(), Some("r2"));
    }

    #[tokio::test]
    async fn test_malformed_refreshed_token_logs_out() {
        let mut backend = MockAuthBackend::new();
        backend
            .expect_refresh()
            .returning(|_| Ok(AuthTokens::new("garbage", "r2")));
        backend.expect_fetch_profile().never();

        let (coordinator, store) = setup(backend);
        signed_in(&store, 60);

        assert_eq!(coordinator.refresh().await, RefreshOutcome::Failed);
        assert_eq!(store.status(), AuthStatus::Unauthenticated);
    }

    #[tokio::test]
    async fn test_refresh_without_refresh_token_logs_out() {
        let mut backend = MockAuthBackend::new();
        backend.expect_refresh().never();

        let (coordinator, store) = setup(backend);
        store
            .set_tokens(AuthTokens::new(token_expiring_in(60), "r1"))
            .unwrap();
        store.logout();

        assert_eq!(coordinator.refresh().await, RefreshOutcome::Failed);
        assert_eq!(store.status(), AuthStatus::Unauthenticated);
    }

    #[tokio::test]
    async fn test_initialize_without_tokens() {
        let mut backend = MockAuthBackend::new();
        backend.expect_refresh().never();

        let (coordinator, store) = setup(backend);
        assert_eq!(coordinator.initialize().await, AuthStatus::Unauthenticated);
        assert!(!store.is_authenticated());
    }

    #[tokio::test]
    async fn test_initialize_resumes_live_session() {
        let mut backend = MockAuthBackend::new();
        backend.expect_refresh().never();

        let (coordinator, store) = setup(backend);
        signed_in(&store, 3600);
        store.set_loading();

        assert_eq!(coordinator.initialize().await, AuthStatus::Authenticated);
    }

    #[tokio::test]
    async fn test_initialize_refreshes_expired_access_token() {
        let mut backend = MockAuthBackend::new();
        backend
            .expect_refresh()
            .times(1)
            .returning(|_| Ok(AuthTokens::new(token_expiring_in(3600), "r2")));
        backend
            .expect_fetch_profile()
            .returning(|_| Ok(me(User::new("u1", "tenant"))));

        let (coordinator, store) = setup(backend);
        signed_in(&store, -10);

        assert_eq!(coordinator.initialize().await, AuthStatus::Authenticated);
        assert_eq!(store.snapshot().refresh_token(), Some("r2"));
    }

    #[tokio::test]
    async fn test_initialize_with_valid_token_but_no_user_logs_out() {
        let mut backend = MockAuthBackend::new();
        backend.expect_refresh().never();

        let (coordinator, store) = setup(backend);
        store
            .set_tokens(AuthTokens::new(token_expiring_in(3600), "r1"))
            .unwrap();

        assert_eq!(coordinator.initialize().await, AuthStatus::Unauthenticated);
        assert!(store.snapshot().tokens.is_empty());
    }

    #[tokio::test]
    async fn test_check_once_leaves_fresh_tokens_alone() {
        let mut backend = MockAuthBackend::new();
        backend.expect_refresh().never();

        let (coordinator, store) = setup(backend);
        assert_eq!(coordinator.check_once().await, CheckOutcome::NotAuthenticated);

        signed_in(&store, 3600);
        assert_eq!(coordinator.check_once().await, CheckOutcome::Fresh);
    }

    #[tokio::test]
    async fn test_check_once_refreshes_near_expiry() {
        let mut backend = MockAuthBackend::new();
        backend
            .expect_refresh()
            .times(1)
            .returning(|_| Ok(AuthTokens::new(token_expiring_in(3600), "r2")));
        backend
            .expect_fetch_profile()
            .returning(|_| Ok(me(User::new("u1", "tenant"))));

        let (coordinator, store) = setup(backend);
        signed_in(&store, 90);

        assert_eq!(
            coordinator.check_once().await,
            CheckOutcome::Refresh(RefreshOutcome::Refreshed)
        );
    }

    #[tokio::test]
    async fn test_check_once_while_refreshing_is_coalesced() {
        let mut backend = MockAuthBackend::new();
        backend.expect_refresh().never();

        let (coordinator, store) = setup(backend);
        signed_in(&store, 90);
        store.begin_refresh().unwrap();

        assert_eq!(
            coordinator.check_once().await,
            CheckOutcome::Refresh(RefreshOutcome::Coalesced)
        );
        assert_eq!(store.status(), AuthStatus::Refreshing);
    }

    #[tokio::test]
    async fn test_login_with_two_factor() {
        let mut backend = MockAuthBackend::new();
        backend.expect_login().times(1).returning(|_| {
            Ok(LoginResponse::TwoFactorRequired(TwoFactorChallenge {
                requires_two_factor: true,
                user_id: "u7".into(),
            }))
        });
        backend
            .expect_validate_two_factor()
            .withf(|req| req.user_id == "u7" && req.recovery_code.as_deref() == Some("abcd-efgh"))
            .returning(|_| Ok(TwoFactorValidation { valid: true }));
        backend
            .expect_complete_two_factor_login()
            .withf(|req| req.user_id == "u7" && req.code.as_deref() == Some("123456"))
            .times(1)
            .returning(|_| {
                Ok(SessionResponse {
                    user: User::new("u7", "landlord"),
                    tokens: AuthTokens::new(token_expiring_in(3600), "r7"),
                })
            });

        let (coordinator, store) = setup(backend);
        let request = LoginRequest {
            email: "lee@example.com".into(),
            password: "hunter2".into(),
        };

        let outcome = coordinator.login(&request).await.unwrap();
        assert_eq!(
            outcome,
            LoginOutcome::TwoFactorRequired {
                user_id: "u7".into()
            }
        );
        assert_eq!(store.status(), AuthStatus::Unauthenticated);

        assert!(
            coordinator
                .validate_two_factor("u7", TwoFactorCode::Recovery("abcd-efgh".into()))
                .await
                .unwrap()
        );

        let session_id = coordinator
            .complete_two_factor("u7", TwoFactorCode::Totp("123456".into()))
            .await
            .unwrap();
        assert!(store.is_authenticated());
        assert_eq!(store.snapshot().session_id.as_deref(), Some(session_id.as_str()));
    }

    #[tokio::test]
    async fn test_login_rejected() {
        let mut backend = MockAuthBackend::new();
        backend.expect_login().returning(|_| Err(BackendError::Unauthorized));

        let (coordinator, store) = setup(backend);
        let request = LoginRequest {
            email: "lee@example.com".into(),
            password: "wrong".into(),
        };

        let result = coordinator.login(&request).await;
        assert!(matches!(
            result,
            Err(SessionError::Backend(BackendError::Unauthorized))
        ));
        assert_eq!(store.status(), AuthStatus::Unauthenticated);
    }

    #[tokio::test]
    async fn test_passkey_login() {
        let mut backend = MockAuthBackend::new();
        backend
            .expect_passkey_options()
            .withf(|req| req.email.as_deref() == Some("lee@example.com"))
            .returning(|_| Ok(json!({ "challenge": "abc", "timeout": 60000 })));
        backend
            .expect_verify_passkey()
            .withf(|req| req.response["id"] == "cred-1")
            .returning(|_| {
                Ok(SessionResponse {
                    user: User::new("u1", "tenant"),
                    tokens: AuthTokens::new(token_expiring_in(3600), "r1"),
                })
            });

        let (coordinator, store) = setup(backend);

        let options = coordinator
            .passkey_options(Some("lee@example.com".into()))
            .await
            .unwrap();
        assert_eq!(options["challenge"], "abc");

        coordinator
            .login_with_passkey(json!({ "id": "cred-1" }))
            .await
            .unwrap();
        assert!(store.is_authenticated());
    }

    #[tokio::test]
    async fn test_sign_out_survives_remote_failure() {
        let mut backend = MockAuthBackend::new();
        backend
            .expect_logout()
            .times(1)
            .returning(|_| Err(BackendError::Transport("offline".into())));

        let (coordinator, store) = setup(backend);
        signed_in(&store, 3600);

        coordinator.sign_out().await;
        assert_eq!(store.status(), AuthStatus::Unauthenticated);
        assert!(store.snapshot().tokens.is_empty());
    }
}
