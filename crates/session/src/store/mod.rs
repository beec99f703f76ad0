//! Token store: the single source of truth for authentication state.
//!
//! Every mutation runs through [`Session::reduce`] under a writer lock, is
//! mirrored to durable storage, and is then published as one immutable
//! snapshot. Readers either take a [`TokenStore::snapshot`] or follow changes
//! through [`TokenStore::subscribe`].

mod persist;
mod session;

pub use persist::{
    AUTH_STORAGE_KEY, PersistedSession, SESSION_CACHE_KEY, SessionCacheEntry, auth_storage_key,
    session_cache_key,
};
pub use session::{RedirectState, Session};

use session::SessionAction;

use chrono::{DateTime, Utc};
use hearth_core::{AuthStatus, AuthTokens, User};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::storage::SessionStorage;
use crate::token::is_valid_token_format;

pub struct TokenStore {
    state: watch::Sender<Arc<Session>>,
    write_lock: Mutex<()>,
    storage: Arc<dyn SessionStorage>,
    prefix: String,
    idle_timeout: chrono::Duration,
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("prefix", &self.prefix)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl TokenStore {
    /// Create an empty store; nothing is read from `storage`
    pub fn new(config: &SessionConfig, storage: Arc<dyn SessionStorage>) -> Self {
        Self::with_session(config, storage, Session::default())
    }

    /// Create a store seeded from the snapshot persisted in `storage`.
    ///
    /// An unreadable snapshot is logged and discarded.
    pub fn hydrate(config: &SessionConfig, storage: Arc<dyn SessionStorage>) -> Self {
        let prefix = &config.storage.prefix;
        let session = match persist::load(storage.as_ref(), prefix) {
            Ok(Some(persisted)) => {
                debug!(
                    has_user = persisted.user.is_some(),
                    has_tokens = !persisted.tokens.is_empty(),
                    "Hydrated persisted session"
                );
                persisted.into_session()
            }
            Ok(None) => Session::default(),
            Err(e) => {
                warn!(error = %e, "Discarding unreadable persisted session");
                Session::default()
            }
        };
        Self::with_session(config, storage, session)
    }

    fn with_session(config: &SessionConfig, storage: Arc<dyn SessionStorage>, session: Session) -> Self {
        let idle_secs = i64::try_from(config.idle_timeout_secs).unwrap_or(i64::MAX);
        let (state, _) = watch::channel(Arc::new(session));
        Self {
            state,
            write_lock: Mutex::new(()),
            storage,
            prefix: config.storage.prefix.clone(),
            idle_timeout: chrono::Duration::try_seconds(idle_secs).unwrap_or(chrono::Duration::MAX),
        }
    }

    /// Current snapshot
    pub fn snapshot(&self) -> Arc<Session> {
        self.state.borrow().clone()
    }

    /// Receiver notified after every published transition
    pub fn subscribe(&self) -> watch::Receiver<Arc<Session>> {
        self.state.subscribe()
    }

    pub fn status(&self) -> AuthStatus {
        self.state.borrow().status
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    pub fn user(&self) -> Option<User> {
        self.state.borrow().user.clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.state.borrow().tokens.access_token.clone()
    }

    pub fn storage_prefix(&self) -> &str {
        &self.prefix
    }

    /// Replace the identity; `None` signs the session out
    pub fn set_user(&self, user: Option<User>) {
        self.dispatch(SessionAction::SetUser(user));
    }

    /// Store a new token pair and mark the session authenticated
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::MalformedToken`] and leaves the store untouched
    /// if the access token is not JWT-shaped
    pub fn set_tokens(&self, tokens: AuthTokens) -> Result<()> {
        check_format(&tokens)?;
        self.dispatch(SessionAction::SetTokens(tokens));
        Ok(())
    }

    /// Install a freshly authenticated user and token pair in one step.
    ///
    /// Returns the new session id.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::MalformedToken`] if the access token is not JWT-shaped
    pub fn initialize_session(&self, user: User, tokens: AuthTokens) -> Result<String> {
        check_format(&tokens)?;

        let session_id = Uuid::new_v4().to_string();
        let entry = SessionCacheEntry {
            session_id: session_id.clone(),
            user_id: user.id.clone(),
            created_at: Utc::now(),
        };

        let (previous, next) = self.apply(SessionAction::Initialize {
            user,
            tokens,
            session_id: session_id.clone(),
        });

        if let Some(replaced) = previous.session_id.as_deref()
            && let Err(e) = persist::remove_cache_entry(self.storage.as_ref(), &self.prefix, replaced)
        {
            warn!(error = %e, session_id = %replaced, "Failed to drop replaced session cache entry");
        }
        if let Err(e) = persist::save_cache_entry(self.storage.as_ref(), &self.prefix, &entry) {
            warn!(error = %e, "Failed to write session cache entry");
        }
        info!(
            session_id = %session_id,
            user_id = %entry.user_id,
            generation = next.generation,
            "Session initialized"
        );
        Ok(session_id)
    }

    /// Edit the signed-in user's record in place
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::UserMismatch`] unless `user` has the current user's id
    pub fn update_user(&self, user: User) -> Result<()> {
        let matches = self
            .state
            .borrow()
            .user
            .as_ref()
            .is_some_and(|current| current.id == user.id);
        if !matches {
            return Err(SessionError::UserMismatch(user.id));
        }
        self.dispatch(SessionAction::UpdateUser(user));
        Ok(())
    }

    pub fn set_loading(&self) {
        self.dispatch(SessionAction::SetLoading);
    }

    /// Record user activity without changing anything else
    pub fn touch(&self) {
        self.dispatch(SessionAction::Touch);
    }

    /// Clear the session and every persisted key under the app prefix.
    ///
    /// Safe to call repeatedly.
    pub fn logout(&self) {
        let (before, after) = self.apply(SessionAction::Logout);
        if !Arc::ptr_eq(&before, &after) {
            info!(generation = after.generation, "Logged out");
        }
    }

    /// True once the last recorded activity is older than the idle timeout
    pub fn is_idle_expired(&self, now: DateTime<Utc>) -> bool {
        self.state
            .borrow()
            .last_activity
            .is_some_and(|last| now.signed_duration_since(last) >= self.idle_timeout)
    }

    /// Enter `refreshing`, returning the snapshot the refresh starts from.
    ///
    /// `None` if a refresh is already running or there is no refresh token.
    pub(crate) fn begin_refresh(&self) -> Option<Arc<Session>> {
        let (before, after) = self.apply(SessionAction::BeginRefresh);
        (!Arc::ptr_eq(&before, &after)).then_some(after)
    }

    pub(crate) fn complete_refresh(&self, generation: u64, tokens: AuthTokens) -> bool {
        self.dispatch_checked(SessionAction::CompleteRefresh { generation, tokens })
    }

    pub(crate) fn apply_profile(&self, generation: u64, user: User) -> bool {
        self.dispatch_checked(SessionAction::ApplyProfile { generation, user })
    }

    /// Log out, unless the session has moved on since `generation`
    pub(crate) fn logout_if_current(&self, generation: u64) -> bool {
        let applied = self.dispatch_checked(SessionAction::LogoutIfCurrent { generation });
        if applied {
            info!(generation, "Logged out");
        }
        applied
    }

    pub(crate) fn restore_authenticated(&self) -> bool {
        self.dispatch_checked(SessionAction::Resume)
    }

    pub(crate) fn mark_unauthenticated(&self) {
        self.dispatch(SessionAction::MarkUnauthenticated);
    }

    pub(crate) fn set_return_url(&self, url: Option<String>) {
        self.dispatch(SessionAction::SetReturnUrl(url));
    }

    pub(crate) fn increment_redirect_attempts(&self) -> u32 {
        self.dispatch(SessionAction::IncrementRedirectAttempts)
            .redirect
            .attempts
    }

    pub(crate) fn reset_redirect_attempts(&self) {
        self.dispatch(SessionAction::ResetRedirectAttempts);
    }

    fn dispatch_checked(&self, action: SessionAction) -> bool {
        let (before, after) = self.apply(action);
        !Arc::ptr_eq(&before, &after)
    }

    /// Apply one action; returns the snapshot now current
    fn dispatch(&self, action: SessionAction) -> Arc<Session> {
        self.apply(action).1
    }

    /// Apply one action and publish the result, returning the snapshots
    /// before and after. Both are the same `Arc` when nothing changed.
    fn apply(&self, action: SessionAction) -> (Arc<Session>, Arc<Session>) {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let unconditional_logout = matches!(action, SessionAction::Logout);
        let conditional_logout = matches!(action, SessionAction::LogoutIfCurrent { .. });

        let current = self.snapshot();
        let next = current.clone().reduce(action, Utc::now());
        let changed = !Arc::ptr_eq(&current, &next);

        // An explicit logout clears storage even when memory was already empty
        if unconditional_logout || (conditional_logout && changed) {
            self.clear_storage();
        } else if changed {
            self.persist(&current, &next);
        }

        if !changed {
            return (current, next);
        }
        debug!(
            from = %current.status,
            to = %next.status,
            generation = next.generation,
            "Session transition"
        );
        self.state.send_replace(next.clone());
        (current, next)
    }

    fn clear_storage(&self) {
        match self.storage.remove_prefixed(&self.prefix) {
            Ok(removed) => debug!(removed, prefix = %self.prefix, "Cleared persisted session keys"),
            Err(e) => warn!(error = %e, "Failed to clear persisted session keys"),
        }
    }

    fn persist(&self, current: &Session, next: &Session) {
        let snapshot = PersistedSession::from(next);
        if PersistedSession::from(current) == snapshot {
            return;
        }
        if let Err(e) = persist::save(self.storage.as_ref(), &self.prefix, &snapshot) {
            warn!(error = %e, "Failed to persist session");
        }
    }
}

fn check_format(tokens: &AuthTokens) -> Result<()> {
    if is_valid_token_format(&tokens.access_token) {
        return Ok(());
    }
    error!(
        token_len = tokens.access_token.len(),
        segments = tokens.access_token.split('.').count(),
        "Rejected malformed access token"
    );
    Err(SessionError::MalformedToken)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use crate::token::test_tokens::token_expiring_in;

    fn store() -> (TokenStore, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        let store = TokenStore::new(&SessionConfig::default(), storage.clone());
        (store, storage)
    }

    fn tokens() -> AuthTokens {
        AuthTokens::new(token_expiring_in(3600), "r1")
    }

    #[test]
    fn test_starts_idle() {
        let (store, _) = store();
        assert_eq!(store.status(), AuthStatus::Idle);
        assert!(!store.is_authenticated());
        assert!(store.user().is_none());
    }

    #[test]
    fn test_initialize_session_persists_snapshot_and_cache_entry() {
        let (store, storage) = store();
        let session_id = store
            .initialize_session(User::new("u1", "tenant"), tokens())
            .unwrap();

        assert!(store.is_authenticated());
        assert_eq!(store.snapshot().session_id.as_deref(), Some(session_id.as_str()));

        let persisted = persist::load(storage.as_ref(), "hearth:").unwrap().unwrap();
        assert!(persisted.is_authenticated);
        assert_eq!(persisted.session_id.as_deref(), Some(session_id.as_str()));

        let cache = storage
            .get(&session_cache_key("hearth:", &session_id))
            .unwrap()
            .unwrap();
        let entry: SessionCacheEntry = serde_json::from_str(&cache).unwrap();
        assert_eq!(entry.user_id, "u1");
    }

    #[test]
    fn test_relogin_replaces_session_cache_entry() {
        let (store, storage) = store();
        let first = store
            .initialize_session(User::new("u1", "tenant"), tokens())
            .unwrap();
        let second = store
            .initialize_session(User::new("u2", "landlord"), tokens())
            .unwrap();
        assert_ne!(first, second);

        assert_eq!(storage.get(&session_cache_key("hearth:", &first)).unwrap(), None);
        assert!(storage
            .get(&session_cache_key("hearth:", &second))
            .unwrap()
            .is_some());

        let cache_keys: Vec<String> = storage
            .keys()
            .unwrap()
            .into_iter()
            .filter(|key| key.starts_with("hearth:session-cache:"))
            .collect();
        assert_eq!(cache_keys.len(), 1);
    }

    #[test]
    fn test_set_tokens_rejects_malformed_without_side_effects() {
        let (store, storage) = store();
        store.set_tokens(tokens()).unwrap();
        let before = store.snapshot();

        let result = store.set_tokens(AuthTokens::new("header.payload", "r2"));
        assert!(matches!(result, Err(SessionError::MalformedToken)));

        let after = store.snapshot();
        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(after.refresh_token(), Some("r1"));
        assert_eq!(after.status, AuthStatus::Authenticated);

        let persisted = persist::load(storage.as_ref(), "hearth:").unwrap().unwrap();
        assert_eq!(persisted.tokens.refresh_token.as_deref(), Some("r1"));
    }

    #[test]
    fn test_logout_clears_prefixed_keys_only() {
        let (store, storage) = store();
        storage.set("theme", "dark").unwrap();
        store
            .initialize_session(User::new("u1", "tenant"), tokens())
            .unwrap();

        store.logout();

        assert_eq!(store.status(), AuthStatus::Unauthenticated);
        assert!(store.snapshot().tokens.is_empty());
        assert_eq!(storage.keys().unwrap(), vec!["theme".to_string()]);
    }

    #[test]
    fn test_logout_twice_is_idempotent() {
        let (store, storage) = store();
        store
            .initialize_session(User::new("u1", "tenant"), tokens())
            .unwrap();

        store.logout();
        let first = store.snapshot();
        store.logout();
        let second = store.snapshot();

        assert_eq!(*first, *second);
        assert!(storage.keys().unwrap().is_empty());
    }

    #[test]
    fn test_logout_from_fresh_store_clears_stale_keys() {
        let (store, storage) = store();
        storage.set("hearth:auth-storage", "{}").unwrap();

        store.logout();

        assert_eq!(store.status(), AuthStatus::Unauthenticated);
        assert!(storage.keys().unwrap().is_empty());
    }

    #[test]
    fn test_update_user_rejects_other_id() {
        let (store, _) = store();
        store
            .initialize_session(User::new("u1", "tenant"), tokens())
            .unwrap();

        let result = store.update_user(User::new("u2", "tenant"));
        assert!(matches!(result, Err(SessionError::UserMismatch(id)) if id == "u2"));

        let mut renamed = User::new("u1", "tenant");
        renamed.name = Some("Ada".into());
        store.update_user(renamed).unwrap();
        assert_eq!(store.user().unwrap().name.as_deref(), Some("Ada"));
    }

    #[test]
    fn test_subscribers_see_each_transition() {
        let (store, _) = store();
        let mut rx = store.subscribe();

        store.set_loading();
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().status, AuthStatus::Loading);

        store
            .initialize_session(User::new("u1", "tenant"), tokens())
            .unwrap();
        assert_eq!(rx.borrow_and_update().status, AuthStatus::Authenticated);

        // No-op transitions are not published
        store.reset_redirect_attempts();
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_idle_expiry() {
        let (store, _) = store();
        let now = Utc::now();
        assert!(!store.is_idle_expired(now));

        store.touch();
        assert!(!store.is_idle_expired(Utc::now()));
        assert!(store.is_idle_expired(Utc::now() + chrono::Duration::minutes(31)));
    }

    #[test]
    fn test_begin_refresh_is_exclusive() {
        let (store, _) = store();
        assert!(store.begin_refresh().is_none());

        store
            .initialize_session(User::new("u1", "tenant"), tokens())
            .unwrap();
        let generation = store.begin_refresh().unwrap().generation;
        assert_eq!(store.status(), AuthStatus::Refreshing);
        assert!(store.begin_refresh().is_none());

        assert!(store.complete_refresh(generation, AuthTokens::new(token_expiring_in(7200), "r2")));
        assert!(store.is_authenticated());
    }

    #[test]
    fn test_hydrate_round_trip() {
        let storage = Arc::new(MemoryStorage::new());
        let config = SessionConfig::default();

        let store = TokenStore::new(&config, storage.clone());
        store
            .initialize_session(User::new("u1", "landlord"), tokens())
            .unwrap();
        let session_id = store.snapshot().session_id.clone();

        let hydrated = TokenStore::hydrate(&config, storage);
        let session = hydrated.snapshot();
        assert_eq!(session.status, AuthStatus::Idle);
        assert_eq!(session.user.as_ref().unwrap().id, "u1");
        assert_eq!(session.refresh_token(), Some("r1"));
        assert_eq!(session.session_id, session_id);
    }

    #[test]
    fn test_hydrate_discards_corrupt_snapshot() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set("hearth:auth-storage", "not json").unwrap();

        let store = TokenStore::hydrate(&SessionConfig::default(), storage);
        assert_eq!(store.status(), AuthStatus::Idle);
        assert!(store.snapshot().tokens.is_empty());
    }
}
