//! Error types for the relay.
//!
//! Every failure ends up as a flat message in a `{success:false, error}`
//! body; the variants only exist so the cause survives until it is logged.

use axum::http::StatusCode;

/// Why a session could not be scraped from the upstream page.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionFailure {
    #[error("page request failed: {0}")]
    Transport(String),

    #[error("page returned HTTP {0}")]
    Status(u16),

    #[error("no session token found in page")]
    TokenNotFound,
}

/// All errors a relayed call can end with.
#[derive(thiserror::Error, Debug)]
pub enum RelayError {
    /// Page fetch failed, returned a non-success status, or had no token.
    /// The caller sees the same message for all three.
    #[error("Failed to establish session")]
    SessionUnavailable {
        #[source]
        cause: SessionFailure,
    },

    #[error("HTTP {0}")]
    UpstreamRejected(u16),

    #[error("{0}")]
    Network(String),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("Failed to encode request: {0}")]
    Payload(#[from] serde_json::Error),
}

impl RelayError {
    /// HTTP status returned to the relay's own caller.
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            RelayError::SessionUnavailable { .. }
            | RelayError::UpstreamRejected(_)
            | RelayError::Network(_)
            | RelayError::Payload(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<SessionFailure> for RelayError {
    fn from(cause: SessionFailure) -> Self {
        RelayError::SessionUnavailable { cause }
    }
}

pub type RelayResult<T> = Result<T, RelayError>;
