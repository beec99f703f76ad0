//! Hearth client session core
//!
//! Keeps the signed-in state of a Hearth client consistent: the token store
//! holds the session, the freshness checker reads token expiry, the refresh
//! coordinator keeps tokens alive against the backend, and the redirect guard
//! decides where navigation goes after every auth-state change.
//!
//! ```no_run
//! use std::sync::Arc;
//! use hearth_session::{
//!     FileStorage, HttpAuthBackend, RedirectGuard, RefreshCoordinator, SessionConfig, TokenStore,
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! hearth_core::tracing::init_default()?;
//! let config = SessionConfig::from_env()?;
//! let storage = Arc::new(FileStorage::new(config.storage.resolved_path()));
//! let store = Arc::new(TokenStore::hydrate(&config, storage));
//! let backend = Arc::new(HttpAuthBackend::from_config(&config)?);
//!
//! let coordinator = RefreshCoordinator::new(&config, store.clone(), backend);
//! coordinator.initialize().await;
//! let _background = coordinator.spawn_background_check();
//!
//! let guard = RedirectGuard::new(&config.redirect, store)?;
//! let decision = guard.evaluate("/dashboard", &[]);
//! # let _ = decision;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod redirect;
pub mod refresh;
pub mod storage;
pub mod store;
pub mod token;


pub use backend::{AuthBackend, BackendError, HttpAuthBackend};
pub use config::{RedirectConfig, RefreshConfig, SessionConfig, StorageConfig};
pub use error::{Result, SessionError};
pub use redirect::{RedirectGuard, RedirectPolicy, RouteDecision};
pub use refresh::{
    BackgroundCheck, CheckOutcome, LoginOutcome, RefreshCoordinator, RefreshOutcome, TwoFactorCode,
};
pub use storage::{FileStorage, MemoryStorage, SessionStorage, StorageError};
pub use store::{RedirectState, Session, TokenStore};
pub use token::{
    DEFAULT_REFRESH_WINDOW, TokenClaims, decode_token_payload, is_token_expired,
    is_valid_token_format, needs_refresh,
};

pub use hearth_core::{AuthStatus, AuthTokens, StoredTokens, User};
