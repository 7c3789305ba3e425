//! Error types for panel-link.
//!
//! Every fallible operation in the crate returns [`Result<T>`]. Grid fetch
//! failures are additionally folded into a cloneable [`FetchError`] so the
//! grid state can keep showing its last good page.

use thiserror::Error;

/// Result type for panel-link operations
pub type Result<T> = std::result::Result<T, PanelLinkError>;

/// Errors that can occur in panel-link
#[derive(Error, Debug)]
pub enum PanelLinkError {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Server error ({status_code}): {message}")]
    ServerError { status_code: u16, message: String },

    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Timeout: {0}")]
    TimeoutError(String),

    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    #[error("Join rejected for topic '{topic}': {reason}")]
    JoinRejected { topic: String, reason: String },

    #[error("Heartbeat timeout after {0:?}")]
    HeartbeatTimeout(std::time::Duration),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl PanelLinkError {
    /// Whether re-running the triggering action may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::NetworkError(_)
            | Self::TimeoutError(_)
            | Self::WebSocketError(_)
            | Self::HeartbeatTimeout(_) => true,
            Self::ServerError { status_code, .. } => *status_code >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for PanelLinkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            PanelLinkError::TimeoutError(err.to_string())
        } else if err.is_decode() {
            PanelLinkError::MalformedResponse(err.to_string())
        } else {
            PanelLinkError::NetworkError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for PanelLinkError {
    fn from(err: serde_json::Error) -> Self {
        PanelLinkError::SerializationError(err.to_string())
    }
}

/// Category of a failed grid fetch, as surfaced to presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// The server answered with an envelope we do not recognize.
    MalformedResponse,
    /// Transport failure, timeout, or a non-success HTTP status.
    NetworkFailure,
}

/// Recoverable grid fetch error.
///
/// Stored in the grid state next to the last good page; cleared by the next
/// successful fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub message: String,
}

impl FetchError {
    /// Generic retryable message shown in the grid's error banner.
    pub const USER_MESSAGE: &'static str = "Failed to fetch data. Please try again.";

    pub fn user_message(&self) -> &'static str {
        Self::USER_MESSAGE
    }
}

impl From<&PanelLinkError> for FetchError {
    fn from(err: &PanelLinkError) -> Self {
        let kind = match err {
            PanelLinkError::MalformedResponse(_) | PanelLinkError::SerializationError(_) => {
                FetchErrorKind::MalformedResponse
            },
            _ => FetchErrorKind::NetworkFailure,
        };
        Self {
            kind,
            message: err.to_string(),
        }
    }
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}
