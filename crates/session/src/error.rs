use crate::backend::BackendError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Malformed access token")]
    MalformedToken,

    #[error("No refresh token available")]
    MissingRefreshToken,

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Invalid redirect target: {0}")]
    InvalidRedirect(String),

    #[error("Redirect loop detected after {attempts} attempts")]
    RedirectLoop { attempts: u32 },

    #[error("Profile belongs to a different user: {0}")]
    UserMismatch(String),
}

pub type Result<T> = std::result::Result<T, SessionError>;
