//! Durable mirror of the session snapshot.

use chrono::{DateTime, Utc};
use hearth_core::{AuthStatus, StoredTokens, User};
use serde::{Deserialize, Serialize};

use super::session::Session;
use crate::storage::{SessionStorage, StorageError};

/// Key suffix of the persisted snapshot
pub const AUTH_STORAGE_KEY: &str = "auth-storage";

/// Key suffix of per-session cache entries
pub const SESSION_CACHE_KEY: &str = "session-cache:";

pub fn auth_storage_key(prefix: &str) -> String {
    format!("{prefix}{AUTH_STORAGE_KEY}")
}

pub fn session_cache_key(prefix: &str, session_id: &str) -> String {
    format!("{prefix}{SESSION_CACHE_KEY}{session_id}")
}

/// Serialized form of the session written under [`AUTH_STORAGE_KEY`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSession {
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub status: AuthStatus,
    #[serde(default)]
    pub is_authenticated: bool,
    #[serde(default)]
    pub tokens: StoredTokens,
    #[serde(default)]
    pub session_id: Option<String>,
}

impl From<&Session> for PersistedSession {
    fn from(session: &Session) -> Self {
        Self {
            user: session.user.clone(),
            status: session.status,
            is_authenticated: session.is_authenticated(),
            tokens: session.tokens.clone(),
            session_id: session.session_id.clone(),
        }
    }
}

impl PersistedSession {
    /// Rebuild an in-memory session.
    ///
    /// Hydrated sessions always start `idle`; the status is re-derived from
    /// the tokens when the coordinator initializes.
    pub fn into_session(self) -> Session {
        Session {
            user: self.user,
            tokens: self.tokens,
            status: AuthStatus::Idle,
            session_id: self.session_id,
            ..Session::default()
        }
    }
}

/// Entry written per login, removed on logout with the rest of the prefix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCacheEntry {
    pub session_id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

pub fn load(storage: &dyn SessionStorage, prefix: &str) -> Result<Option<PersistedSession>, StorageError> {
    let Some(raw) = storage.get(&auth_storage_key(prefix))? else {
        return Ok(None);
    };
    Ok(Some(serde_json::from_str(&raw)?))
}

pub fn save(storage: &dyn SessionStorage, prefix: &str, snapshot: &PersistedSession) -> Result<(), StorageError> {
    storage.set(&auth_storage_key(prefix), &serde_json::to_string(snapshot)?)
}

pub fn save_cache_entry(
    storage: &dyn SessionStorage,
    prefix: &str,
    entry: &SessionCacheEntry,
) -> Result<(), StorageError> {
    storage.set(
        &session_cache_key(prefix, &entry.session_id),
        &serde_json::to_string(entry)?,
    )
}

pub fn remove_cache_entry(
    storage: &dyn SessionStorage,
    prefix: &str,
    session_id: &str,
) -> Result<(), StorageError> {
    storage.remove(&session_cache_key(prefix, session_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use serde_json::json;

    #[test]
    fn test_snapshot_layout() {
        let session = Session {
            user: Some(User::new("u1", "tenant")),
            tokens: StoredTokens {
                access_token: Some("a.b.c".into()),
                refresh_token: Some("r1".into()),
            },
            status: AuthStatus::Authenticated,
            session_id: Some("s1".into()),
            ..Session::default()
        };

        let value = serde_json::to_value(PersistedSession::from(&session)).unwrap();
        assert_eq!(value["status"], json!("authenticated"));
        assert_eq!(value["isAuthenticated"], json!(true));
        assert_eq!(value["sessionId"], json!("s1"));
        assert_eq!(value["tokens"]["access_token"], json!("a.b.c"));
        assert_eq!(value["tokens"]["refresh_token"], json!("r1"));
        assert_eq!(value["user"]["id"], json!("u1"));
    }

    #[test]
    fn test_transient_status_hydrates_as_idle() {
        for status in [AuthStatus::Refreshing, AuthStatus::Loading, AuthStatus::Authenticated] {
            let persisted = PersistedSession {
                status,
                is_authenticated: status == AuthStatus::Authenticated,
                ..PersistedSession::default()
            };
            assert_eq!(persisted.into_session().status, AuthStatus::Idle);
        }
    }

    #[test]
    fn test_load_and_save() {
        let storage = MemoryStorage::new();
        assert!(load(&storage, "hearth:").unwrap().is_none());

        let snapshot = PersistedSession {
            session_id: Some("s1".into()),
            ..PersistedSession::default()
        };
        save(&storage, "hearth:", &snapshot).unwrap();
        assert!(storage.get("hearth:auth-storage").unwrap().is_some());
        assert_eq!(load(&storage, "hearth:").unwrap(), Some(snapshot));
    }

    #[test]
    fn test_load_tolerates_missing_fields() {
        let storage = MemoryStorage::new();
        storage
            .set("hearth:auth-storage", r#"{"sessionId":"s9"}"#)
            .unwrap();

        let loaded = load(&storage, "hearth:").unwrap().unwrap();
        assert_eq!(loaded.session_id.as_deref(), Some("s9"));
        assert!(loaded.tokens.is_empty());
        assert_eq!(loaded.status, AuthStatus::Idle);
    }
}
