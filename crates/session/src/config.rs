//! Session configuration

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Base URL of the backend API
    pub api_base_url: String,

    /// Durable storage settings
    pub storage: StorageConfig,

    /// Token refresh settings
    pub refresh: RefreshConfig,

    /// Inactivity after which the session is ended regardless of token expiry
    pub idle_timeout_secs: u64,

    /// Route guard settings
    pub redirect: RedirectConfig,
}

/// Durable storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// App-specific prefix of every persisted key
    pub prefix: String,

    /// File backing the durable store; defaults to the platform data dir
    pub path: Option<PathBuf>,
}

/// Token refresh settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// How often the background check inspects the access token
    pub poll_interval_secs: u64,

    /// Remaining lifetime at or below which a token is refreshed proactively
    pub lookahead_secs: u64,
}

/// Route guard settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedirectConfig {
    /// Automatic redirects allowed before the guard reports a loop
    pub max_attempts: u32,

    /// Where unauthenticated users are sent
    pub login_path: String,

    /// Fallback destination after login
    pub default_path: String,

    /// Path prefixes a return url may point into
    pub allowed_prefixes: Vec<String>,

    /// Paths reachable without a session
    pub public_paths: Vec<String>,

    /// Default landing page per role
    pub role_landing_paths: HashMap<String, String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:3001/api".to_string(),
            storage: StorageConfig::default(),
            refresh: RefreshConfig::default(),
            idle_timeout_secs: 30 * 60,
            redirect: RedirectConfig::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            prefix: "hearth:".to_string(),
            path: None,
        }
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 60,
            lookahead_secs: 120,
        }
    }
}

impl Default for RedirectConfig {
    fn default() -> Self {
        let to_strings = |items: &[&str]| items.iter().map(ToString::to_string).collect();

        Self {
            max_attempts: 3,
            login_path: "/login".to_string(),
            default_path: "/dashboard".to_string(),
            allowed_prefixes: to_strings(&[
                "/dashboard",
                "/properties",
                "/units",
                "/leases",
                "/tenants",
                "/tenant",
                "/payments",
                "/maintenance",
                "/messages",
                "/documents",
                "/reports",
                "/settings",
                "/profile",
                "/admin",
            ]),
            public_paths: to_strings(&[
                "/",
                "/login",
                "/register",
                "/forgot-password",
                "/reset-password",
                "/verify-email",
                "/auth/2fa",
                "/auth/passkey",
                "/auth/callback",
            ]),
            role_landing_paths: [
                ("admin", "/admin/dashboard"),
                ("landlord", "/dashboard"),
                ("property_manager", "/dashboard"),
                ("tenant", "/tenant/dashboard"),
            ]
            .into_iter()
            .map(|(role, path)| (role.to_string(), path.to_string()))
            .collect(),
        }
    }
}

impl StorageConfig {
    /// File used by the durable store
    pub fn resolved_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("hearth")
                .join("session.json")
        })
    }
}

impl RefreshConfig {
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub const fn lookahead(&self) -> Duration {
        Duration::from_secs(self.lookahead_secs)
    }
}

impl SessionConfig {
    /// Load configuration from a file, with `HEARTH_` environment overrides
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or the result is invalid
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(Self::environment())
            .build()?;

        Self::finish(settings)
    }

    /// Load configuration from defaults and environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables cannot be parsed
    pub fn from_env() -> Result<Self, ConfigError> {
        let settings = Config::builder().add_source(Self::environment()).build()?;
        Self::finish(settings)
    }

    /// Load configuration from an inline TOML document
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be parsed or the result is invalid
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?;

        Self::finish(settings)
    }

    fn environment() -> Environment {
        Environment::with_prefix("HEARTH")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
    }

    fn finish(settings: Config) -> Result<Self, ConfigError> {
        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check the invariants the session core relies on
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Message` describing the first violated rule
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_base_url.trim().is_empty() {
            return Err(ConfigError::Message("api_base_url must not be empty".into()));
        }
        if self.refresh.poll_interval_secs == 0 {
            return Err(ConfigError::Message(
                "refresh.poll_interval_secs must be greater than zero".into(),
            ));
        }
        if self.refresh.lookahead_secs == 0 {
            return Err(ConfigError::Message(
                "refresh.lookahead_secs must be greater than zero".into(),
            ));
        }
        if self.idle_timeout_secs == 0 {
            return Err(ConfigError::Message(
                "idle_timeout_secs must be greater than zero".into(),
            ));
        }
        if self.redirect.max_attempts == 0 {
            return Err(ConfigError::Message(
                "redirect.max_attempts must be greater than zero".into(),
            ));
        }

        let local_paths = [
            ("redirect.login_path", &self.redirect.login_path),
            ("redirect.default_path", &self.redirect.default_path),
        ];
        let landing_paths = self
            .redirect
            .role_landing_paths
            .values()
            .map(|path| ("redirect.role_landing_paths", path));
        let prefixes = self
            .redirect
            .allowed_prefixes
            .iter()
            .map(|path| ("redirect.allowed_prefixes", path));

        for (field, path) in local_paths.into_iter().chain(landing_paths).chain(prefixes) {
            if !is_local_path(path) {
                return Err(ConfigError::Message(format!(
                    "{field} must be a local path, got '{path}'"
                )));
            }
        }

        Ok(())
    }
}

fn is_local_path(path: &str) -> bool {
    path.starts_with('/') && !path.starts_with("//")
}
