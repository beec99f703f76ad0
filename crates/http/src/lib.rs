//! Hearth HTTP client for the backend auth, two-factor, passkey and RBAC API
//!
//! The session core talks to the backend only through this crate; the
//! backend owns every security decision.

pub mod client;
pub mod types;

pub use client::{AuthenticatedClient, ClientBuilder, ClientError, PublicClient};
