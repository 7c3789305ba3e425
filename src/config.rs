//! Configuration file support.
//!
//! # Configuration Format
//!
//! ```toml
//! [server]
//! url = "http://localhost:4000"     # panel backend
//! ws_url = "ws://localhost:4000"    # optional socket base
//! timeout = 30                      # HTTP request timeout, seconds
//! max_retries = 3
//! http_version = "http1"            # http1, http2, auto
//!
//! [connection]
//! api_prefix = "api"
//! socket_path = "/socket"
//! protocol_version = "2.0.0"
//!
//! [auth]
//! bearer_token = "..."
//!
//! [timeouts]
//! join_debounce_ms = 2000
//! heartbeat_interval_ms = 30000
//! heartbeat_timeout_ms = 10000
//!
//! [grid]
//! page_size = 20
//! ```

use crate::auth::AuthProvider;
use crate::client::PanelLinkClientBuilder;
use crate::error::{PanelLinkError, Result};
use crate::grid::{GridConfig, DEFAULT_PAGE_SIZE};
use crate::models::{ConnectionOptions, HttpVersion};
use crate::timeouts::PanelLinkTimeouts;
use crate::PanelLinkClient;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PanelLinkConfig {
    pub server: Option<ServerConfig>,
    pub connection: Option<ConnectionOptions>,
    pub auth: Option<AuthConfig>,
    pub timeouts: Option<TimeoutsConfig>,
    pub grid: Option<GridDefaults>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub url: Option<String>,

    /// Socket base URL when it differs from `url`
    pub ws_url: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default = "default_retries")]
    pub max_retries: u32,

    /// "http1", "http2" or "auto"
    #[serde(default = "default_http_version")]
    pub http_version: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    pub bearer_token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Millisecond overrides for [`PanelLinkTimeouts`]; unset keys keep defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    pub connection_timeout_ms: Option<u64>,
    pub receive_timeout_ms: Option<u64>,
    pub join_debounce_ms: Option<u64>,
    pub join_timeout_ms: Option<u64>,
    pub heartbeat_interval_ms: Option<u64>,
    pub heartbeat_timeout_ms: Option<u64>,
    pub socket_heartbeat_interval_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridDefaults {
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_timeout() -> u64 {
    30
}

fn default_retries() -> u32 {
    3
}

fn default_http_version() -> String {
    "http1".to_string()
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl PanelLinkConfig {
    /// Load configuration from a TOML file. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("[panel-link] No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(|e| {
            PanelLinkError::ConfigurationError(format!("Failed to read config file: {}", e))
        })?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| {
            PanelLinkError::ConfigurationError(format!("Invalid config file: {}", e))
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                PanelLinkError::ConfigurationError(format!("Failed to create config dir: {}", e))
            })?;
        }
        let contents = toml::to_string_pretty(self)
            .map_err(|e| PanelLinkError::ConfigurationError(format!("Failed to serialize: {}", e)))?;
        std::fs::write(path, contents).map_err(|e| {
            PanelLinkError::ConfigurationError(format!("Failed to write config file: {}", e))
        })
    }

    pub fn http_version(&self) -> HttpVersion {
        self.server
            .as_ref()
            .map(|s| match s.http_version.to_lowercase().as_str() {
                "http2" | "http/2" => HttpVersion::Http2,
                "auto" => HttpVersion::Auto,
                _ => HttpVersion::Http1,
            })
            .unwrap_or_default()
    }

    pub fn to_timeouts(&self) -> PanelLinkTimeouts {
        let mut timeouts = PanelLinkTimeouts::default();
        let Some(t) = &self.timeouts else {
            return timeouts;
        };
        let ms = Duration::from_millis;
        if let Some(v) = t.connection_timeout_ms {
            timeouts.connection_timeout = ms(v);
        }
        if let Some(v) = t.receive_timeout_ms {
            timeouts.receive_timeout = ms(v);
        }
        if let Some(v) = t.join_debounce_ms {
            timeouts.join_debounce = ms(v);
        }
        if let Some(v) = t.join_timeout_ms {
            timeouts.join_timeout = ms(v);
        }
        if let Some(v) = t.heartbeat_interval_ms {
            timeouts.heartbeat_interval = ms(v);
        }
        if let Some(v) = t.heartbeat_timeout_ms {
            timeouts.heartbeat_timeout = ms(v);
        }
        if let Some(v) = t.socket_heartbeat_interval_ms {
            timeouts.socket_heartbeat_interval = ms(v);
        }
        timeouts
    }

    pub fn to_connection_options(&self) -> ConnectionOptions {
        let options = self.connection.clone().unwrap_or_default();
        let socket_path = options.socket_path.clone();
        let api_prefix = options.api_prefix.clone();
        options
            .with_socket_path(socket_path)
            .with_api_prefix(api_prefix)
            .with_http_version(self.http_version())
    }

    pub fn to_auth(&self) -> AuthProvider {
        match &self.auth {
            Some(AuthConfig {
                bearer_token: Some(token),
                ..
            }) => AuthProvider::bearer_token(token.clone()),
            Some(AuthConfig {
                username: Some(user),
                password,
                ..
            }) => AuthProvider::basic_auth(user.clone(), password.clone().unwrap_or_default()),
            _ => AuthProvider::none(),
        }
    }

    /// A client builder carrying every setting from this file.
    pub fn client_builder(&self) -> PanelLinkClientBuilder {
        let mut builder = PanelLinkClient::builder()
            .auth(self.to_auth())
            .connection_options(self.to_connection_options());
        let timeouts = self.to_timeouts();
        if let Some(server) = &self.server {
            if let Some(url) = &server.url {
                builder = builder.base_url(url.clone());
            }
            if let Some(ws_url) = &server.ws_url {
                builder = builder.ws_url(ws_url.clone());
            }
            builder = builder.max_retries(server.max_retries).timeouts(timeouts.clone());
            if self.timeouts.as_ref().and_then(|t| t.receive_timeout_ms).is_none() {
                builder = builder.timeout(Duration::from_secs(server.timeout));
            }
        } else {
            builder = builder.timeouts(timeouts);
        }
        builder
    }

    /// Grid description for `model` using the configured page size.
    pub fn grid(&self, model: impl Into<String>) -> GridConfig {
        let page_size = self.grid.as_ref().map_or(DEFAULT_PAGE_SIZE, |g| g.page_size);
        GridConfig::new(model).page_size(page_size)
    }
}
