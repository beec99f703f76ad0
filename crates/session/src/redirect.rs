//! Redirect guard.
//!
//! Decides where navigation goes after an auth-state change and stops
//! automatic redirects once the attempt limit is reached. Redirect targets are
//! validated as local, allow-listed paths; anything else is rejected.

use hearth_core::AuthStatus;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, warn};
use url::Url;

use crate::config::RedirectConfig;
use crate::error::{Result, SessionError};
use crate::store::TokenStore;

// Relative targets are resolved against this origin; anything that leaves it is rejected
const LOCAL_ORIGIN: &str = "http://hearth.invalid/";

/// What the view layer should do with the current route
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// The session has not settled yet
    Wait,
    Allow,
    Redirect { to: String },
    /// Signed in without the required role, already on the role's landing page
    Denied,
    /// The redirect attempt limit is reached; navigation must stop
    LoopDetected,
}

/// Compiled redirect rules
#[derive(Debug, Clone)]
pub struct RedirectPolicy {
    origin: Url,
    allowed: Regex,
    public_paths: Vec<String>,
    role_landing_paths: HashMap<String, String>,
    login_path: String,
    default_path: String,
    max_attempts: u32,
}

impl RedirectPolicy {
    /// Compile the policy
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidRedirect`] if the allow-list cannot be compiled
    pub fn new(config: &RedirectConfig) -> Result<Self> {
        let alternatives = config
            .allowed_prefixes
            .iter()
            .map(|prefix| regex::escape(prefix.trim_end_matches('/')))
            .collect::<Vec<_>>()
            .join("|");
        // An empty allow-list matches nothing
        let pattern = if alternatives.is_empty() {
            r"[^\s\S]".to_string()
        } else {
            format!(r"^(?:{alternatives})(?:[/?#]|$)")
        };

        let allowed = Regex::new(&pattern).map_err(|e| SessionError::InvalidRedirect(e.to_string()))?;
        let origin = Url::parse(LOCAL_ORIGIN).map_err(|e| SessionError::InvalidRedirect(e.to_string()))?;

        Ok(Self {
            origin,
            allowed,
            public_paths: config.public_paths.clone(),
            role_landing_paths: config
                .role_landing_paths
                .iter()
                .map(|(role, path)| (role.to_ascii_lowercase(), path.clone()))
                .collect(),
            login_path: config.login_path.clone(),
            default_path: config.default_path.clone(),
            max_attempts: config.max_attempts,
        })
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    pub fn default_path(&self) -> &str {
        &self.default_path
    }

    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Local path that stays on this origin and falls inside an allowed prefix
    /// or a public path. Everything else is rejected.
    pub fn is_valid_redirect_url(&self, url: &str) -> bool {
        if !url.starts_with('/') || url.starts_with("//") {
            return false;
        }
        if url.contains('\\') || url.chars().any(char::is_control) {
            return false;
        }

        let Ok(resolved) = self.origin.join(url) else {
            return false;
        };
        if resolved.origin() != self.origin.origin() {
            return false;
        }

        let path = resolved.path();
        self.allowed.is_match(path) || self.is_public_path(path)
    }

    /// Reachable without a session
    pub fn is_public_path(&self, path: &str) -> bool {
        let path = strip_query(path);
        self.public_paths.iter().any(|public| {
            path == public
                || (public != "/"
                    && path
                        .strip_prefix(public.as_str())
                        .is_some_and(|rest| rest.starts_with('/')))
        })
    }

    /// Landing page for `role`, or the default path
    pub fn landing_path(&self, role: Option<&str>) -> &str {
        role.and_then(|role| self.role_landing_paths.get(&role.to_ascii_lowercase()))
            .map_or(self.default_path.as_str(), String::as_str)
    }
}

fn strip_query(path: &str) -> &str {
    path.split(['?', '#']).next().unwrap_or(path)
}

/// Route guard over the shared token store
#[derive(Debug, Clone)]
pub struct RedirectGuard {
    store: Arc<TokenStore>,
    policy: Arc<RedirectPolicy>,
}

impl RedirectGuard {
    /// # Errors
    ///
    /// Returns an error if the policy cannot be compiled
    pub fn new(config: &RedirectConfig, store: Arc<TokenStore>) -> Result<Self> {
        Ok(Self::with_policy(RedirectPolicy::new(config)?, store))
    }

    pub fn with_policy(policy: RedirectPolicy, store: Arc<TokenStore>) -> Self {
        Self {
            store,
            policy: Arc::new(policy),
        }
    }

    pub fn policy(&self) -> &RedirectPolicy {
        &self.policy
    }

    pub fn is_valid_redirect_url(&self, url: &str) -> bool {
        self.policy.is_valid_redirect_url(url)
    }

    /// Remember where to return after login
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidRedirect`] if `url` is not a safe local target;
    /// the stored value is left unchanged
    pub fn set_return_url(&self, url: &str) -> Result<()> {
        if !self.policy.is_valid_redirect_url(url) {
            warn!(url, "Rejected redirect target");
            return Err(SessionError::InvalidRedirect(url.to_string()));
        }
        self.store.set_return_url(Some(url.to_string()));
        Ok(())
    }

    /// The stored return url, if it still passes validation
    pub fn return_url(&self) -> Option<String> {
        let url = self.store.snapshot().redirect.return_url.clone()?;
        if self.policy.is_valid_redirect_url(&url) {
            Some(url)
        } else {
            warn!(url = %url, "Ignoring stored redirect target");
            None
        }
    }

    pub fn clear_return_url(&self) {
        self.store.set_return_url(None);
    }

    pub fn redirect_attempts(&self) -> u32 {
        self.store.snapshot().redirect.attempts
    }

    pub fn can_redirect(&self) -> bool {
        self.redirect_attempts() < self.policy.max_attempts
    }

    pub fn increment_redirect_attempts(&self) -> u32 {
        self.store.increment_redirect_attempts()
    }

    pub fn reset_redirect_attempts(&self) {
        self.store.reset_redirect_attempts();
    }

    /// Decide what to do with `path` given the current session.
    ///
    /// `required_roles` empty means any signed-in user may enter.
    pub fn evaluate(&self, path: &str, required_roles: &[String]) -> RouteDecision {
        let session = self.store.snapshot();

        match session.status {
            AuthStatus::Idle | AuthStatus::Loading | AuthStatus::Refreshing => RouteDecision::Wait,
            AuthStatus::Unauthenticated => {
                if self.policy.is_public_path(path) {
                    return RouteDecision::Allow;
                }
                if !self.can_redirect() {
                    return self.loop_detected(path);
                }
                if self.set_return_url(path).is_err() {
                    self.clear_return_url();
                }
                self.increment_redirect_attempts();
                debug!(from = path, to = %self.policy.login_path, "Redirecting to login");
                RouteDecision::Redirect {
                    to: self.policy.login_path.clone(),
                }
            }
            AuthStatus::Authenticated => {
                let authorized = required_roles.is_empty()
                    || session
                        .user
                        .as_ref()
                        .is_some_and(|user| user.has_any_role(required_roles));
                if authorized {
                    self.clear_return_url();
                    self.reset_redirect_attempts();
                    return RouteDecision::Allow;
                }

                let landing = self
                    .policy
                    .landing_path(session.user.as_ref().map(|user| user.role.as_str()));
                if strip_query(path) == landing {
                    debug!(path, "Missing role on the landing page itself");
                    return RouteDecision::Denied;
                }
                if !self.can_redirect() {
                    return self.loop_detected(path);
                }
                self.increment_redirect_attempts();
                debug!(from = path, to = landing, "Redirecting to role landing page");
                RouteDecision::Redirect {
                    to: landing.to_string(),
                }
            }
        }
    }

    /// Where to go right after a successful login.
    ///
    /// Consumes the return url and resets the attempt counter.
    pub fn post_login_target(&self) -> String {
        let role = self.store.user().map(|user| user.role);
        let target = self
            .return_url()
            .unwrap_or_else(|| self.policy.landing_path(role.as_deref()).to_string());

        self.clear_return_url();
        self.reset_redirect_attempts();
        target
    }

    fn loop_detected(&self, path: &str) -> RouteDecision {
        let attempts = self.redirect_attempts();
        error!(
            path,
            error = %SessionError::RedirectLoop { attempts },
            "Stopping automatic navigation"
        );
        RouteDecision::LoopDetected
    }
}
