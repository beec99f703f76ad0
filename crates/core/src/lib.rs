//! Hearth core types and utilities

pub mod types;

#[cfg(feature = "tracing")]
pub mod tracing;

pub use types::{AuthStatus, AuthTokens, StoredTokens, User, UserContext};
