//! Authentication boundary for the panel backend.
//!
//! The client never exchanges credentials itself: the session collaborator
//! hands over an opaque token (bearer or basic) and a logout callback. The
//! token is attached to every HTTP call; the callback fires when the backend
//! rejects it.

use crate::error::Result;
use base64::{engine::general_purpose, Engine as _};
use std::fmt;
use std::sync::Arc;

/// Authentication credentials for the panel backend.
///
/// # Examples
///
/// ```rust
/// use panel_link::AuthProvider;
///
/// let auth = AuthProvider::bearer_token("eyJhbGc...".to_string());
/// let auth = AuthProvider::basic_auth("ops".to_string(), "secret".to_string());
/// let auth = AuthProvider::none();
/// ```
#[derive(Debug, Clone)]
pub enum AuthProvider {
    /// Username and password, sent as `Basic`.
    BasicAuth(String, String),

    /// Opaque bearer token issued by the session collaborator
    BearerToken(String),

    /// Anonymous requests.
    None,
}

impl AuthProvider {
    /// Create HTTP Basic Auth.
    pub fn basic_auth(username: String, password: String) -> Self {
        Self::BasicAuth(username, password)
    }

    /// Create bearer token authentication.
    pub fn bearer_token(token: String) -> Self {
        Self::BearerToken(token)
    }

    pub fn none() -> Self {
        Self::None
    }

    /// Adds the `Authorization` header for this provider, if it has one.
    pub fn apply_to_request(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder> {
        match self {
            Self::BasicAuth(username, password) => {
                Ok(request.header("Authorization", self.basic_header_value(username, password)))
            },
            Self::BearerToken(token) => Ok(request.bearer_auth(token)),
            Self::None => Ok(request),
        }
    }

    /// Value of the `Authorization` header, if any.
    pub fn header_value(&self) -> Option<String> {
        match self {
            Self::BasicAuth(username, password) => {
                Some(self.basic_header_value(username, password))
            },
            Self::BearerToken(token) => Some(format!("Bearer {}", token)),
            Self::None => None,
        }
    }

    fn basic_header_value(&self, username: &str, password: &str) -> String {
        // RFC 7617
        let pair = format!("{}:{}", username, password);
        format!("Basic {}", general_purpose::STANDARD.encode(pair))
    }

    /// `false` for [`AuthProvider::None`].
    pub fn is_authenticated(&self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Callback invoked when the backend rejects the session's credentials.
pub type LogoutCallback = Arc<dyn Fn() + Send + Sync>;

/// Credentials plus the logout hook supplied by the session collaborator.
#[derive(Clone)]
pub struct AuthSession {
    provider: AuthProvider,
    on_logout: Option<LogoutCallback>,
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSession")
            .field("authenticated", &self.provider.is_authenticated())
            .field("on_logout", &self.on_logout.is_some())
            .finish()
    }
}

impl Default for AuthSession {
    fn default() -> Self {
        Self::new(AuthProvider::None)
    }
}

impl AuthSession {
    pub fn new(provider: AuthProvider) -> Self {
        Self {
            provider,
            on_logout: None,
        }
    }

    /// Register the callback fired on a 401 from the backend.
    pub fn on_logout(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_logout = Some(Arc::new(f));
        self
    }

    /// Swap the credentials, keeping the logout callback.
    pub fn with_provider(mut self, provider: AuthProvider) -> Self {
        self.provider = provider;
        self
    }

    pub fn provider(&self) -> &AuthProvider {
        &self.provider
    }

    pub(crate) fn logout(&self) {
        log::warn!("[panel-link] Credentials rejected by server, invoking logout");
        if let Some(cb) = &self.on_logout {
            cb();
        }
    }
}
