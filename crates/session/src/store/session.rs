//! Session snapshot and its transition rules.
//!
//! `Session::reduce` is pure: it maps a snapshot and an action to the next
//! snapshot and never touches storage. A no-op returns the same `Arc`.

use chrono::{DateTime, Utc};
use hearth_core::{AuthStatus, AuthTokens, StoredTokens, User};
use std::sync::Arc;

use crate::token::is_valid_token_format;

/// Redirect bookkeeping, cleared together with the rest of the session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedirectState {
    /// Path captured when an unauthenticated user was sent to login
    pub return_url: Option<String>,
    /// Automatic redirects since the last reset
    pub attempts: u32,
}

/// Authenticated state held by the client
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub user: Option<User>,
    pub tokens: StoredTokens,
    pub status: AuthStatus,
    pub session_id: Option<String>,
    pub last_activity: Option<DateTime<Utc>>,
    pub redirect: RedirectState,
    /// Bumped whenever the identity behind the session changes (login, logout).
    /// Async results captured under an older generation are discarded.
    pub generation: u64,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.status == AuthStatus::Authenticated
    }

    pub fn access_token(&self) -> Option<&str> {
        self.tokens.access_token.as_deref()
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.tokens.refresh_token.as_deref()
    }

    /// True when nothing but the generation distinguishes this from a fresh session
    fn is_cleared(&self) -> bool {
        self.user.is_none()
            && self.tokens.is_empty()
            && self.session_id.is_none()
            && self.last_activity.is_none()
            && self.redirect == RedirectState::default()
            && self.status == AuthStatus::Unauthenticated
    }
}

/// Transitions accepted by [`Session::reduce`]
#[derive(Debug, Clone)]
pub(crate) enum SessionAction {
    SetUser(Option<User>),
    SetTokens(AuthTokens),
    Initialize {
        user: User,
        tokens: AuthTokens,
        session_id: String,
    },
    UpdateUser(User),
    SetLoading,
    Touch,
    /// Enter `refreshing`; only the refresh coordinator sends this
    BeginRefresh,
    CompleteRefresh {
        generation: u64,
        tokens: AuthTokens,
    },
    ApplyProfile {
        generation: u64,
        user: User,
    },
    /// Stored tokens and user are usable as they are
    Resume,
    MarkUnauthenticated,
    Logout,
    LogoutIfCurrent {
        generation: u64,
    },
    SetReturnUrl(Option<String>),
    IncrementRedirectAttempts,
    ResetRedirectAttempts,
}

impl Session {
    /// Apply `action`, returning the next snapshot
    pub(crate) fn reduce(self: Arc<Self>, action: SessionAction, now: DateTime<Utc>) -> Arc<Self> {
        match action {
            SessionAction::SetUser(user) => {
                let signed_out = user.is_none();
                Arc::new(Self {
                    status: if signed_out {
                        AuthStatus::Unauthenticated
                    } else {
                        AuthStatus::Authenticated
                    },
                    user,
                    last_activity: Some(now),
                    generation: self.generation + u64::from(signed_out),
                    ..(*self).clone()
                })
            }
            SessionAction::SetTokens(tokens) => {
                if !is_valid_token_format(&tokens.access_token) {
                    return self;
                }
                Arc::new(Self {
                    tokens: tokens.into(),
                    status: AuthStatus::Authenticated,
                    last_activity: Some(now),
                    ..(*self).clone()
                })
            }
            SessionAction::Initialize {
                user,
                tokens,
                session_id,
            } => {
                if !is_valid_token_format(&tokens.access_token) {
                    return self;
                }
                Arc::new(Self {
                    user: Some(user),
                    tokens: tokens.into(),
                    status: AuthStatus::Authenticated,
                    session_id: Some(session_id),
                    last_activity: Some(now),
                    redirect: self.redirect.clone(),
                    generation: self.generation + 1,
                })
            }
            SessionAction::UpdateUser(user) => match &self.user {
                Some(current) if current.id == user.id => Arc::new(Self {
                    user: Some(user),
                    last_activity: Some(now),
                    ..(*self).clone()
                }),
                _ => self,
            },
            SessionAction::SetLoading => {
                if self.status == AuthStatus::Refreshing {
                    return self;
                }
                Arc::new(Self {
                    status: AuthStatus::Loading,
                    ..(*self).clone()
                })
            }
            SessionAction::Touch => Arc::new(Self {
                last_activity: Some(now),
                ..(*self).clone()
            }),
            SessionAction::BeginRefresh => {
                if self.status == AuthStatus::Refreshing || self.refresh_token().is_none() {
                    return self;
                }
                Arc::new(Self {
                    status: AuthStatus::Refreshing,
                    ..(*self).clone()
                })
            }
            SessionAction::CompleteRefresh { generation, tokens } => {
                if generation != self.generation
                    || self.status != AuthStatus::Refreshing
                    || !is_valid_token_format(&tokens.access_token)
                {
                    return self;
                }
                Arc::new(Self {
                    tokens: tokens.into(),
                    status: AuthStatus::Authenticated,
                    ..(*self).clone()
                })
            }
            SessionAction::ApplyProfile { generation, user } => {
                let same_user = self.user.as_ref().is_none_or(|current| current.id == user.id);
                if generation != self.generation || !self.is_authenticated() || !same_user {
                    return self;
                }
                Arc::new(Self {
                    user: Some(user),
                    ..(*self).clone()
                })
            }
            SessionAction::Resume => {
                if self.user.is_none() || self.access_token().is_none() {
                    return self;
                }
                Arc::new(Self {
                    status: AuthStatus::Authenticated,
                    ..(*self).clone()
                })
            }
            SessionAction::MarkUnauthenticated => {
                if self.status == AuthStatus::Unauthenticated {
                    return self;
                }
                Arc::new(Self {
                    status: AuthStatus::Unauthenticated,
                    ..(*self).clone()
                })
            }
            SessionAction::Logout => self.cleared(),
            SessionAction::LogoutIfCurrent { generation } => {
                if generation != self.generation {
                    return self;
                }
                self.cleared()
            }
            SessionAction::SetReturnUrl(return_url) => {
                if self.redirect.return_url == return_url {
                    return self;
                }
                Arc::new(Self {
                    redirect: RedirectState {
                        return_url,
                        ..self.redirect.clone()
                    },
                    ..(*self).clone()
                })
            }
            SessionAction::IncrementRedirectAttempts => Arc::new(Self {
                redirect: RedirectState {
                    attempts: self.redirect.attempts.saturating_add(1),
                    ..self.redirect.clone()
                },
                ..(*self).clone()
            }),
            SessionAction::ResetRedirectAttempts => {
                if self.redirect.attempts == 0 {
                    return self;
                }
                Arc::new(Self {
                    redirect: RedirectState {
                        attempts: 0,
                        ..self.redirect.clone()
                    },
                    ..(*self).clone()
                })
            }
        }
    }

    fn cleared(self: Arc<Self>) -> Arc<Self> {
        if self.is_cleared() {
            return self;
        }
        Arc::new(Self {
            status: AuthStatus::Unauthenticated,
            generation: self.generation + 1,
            ..Self::default()
        })
    }
}
