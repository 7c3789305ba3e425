use serde::{Deserialize, Serialize};

/// HTTP protocol version to use for data API calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HttpVersion {
    /// HTTP/1.1 (default) - widely compatible
    #[default]
    #[serde(rename = "http1", alias = "http/1.1", alias = "1.1")]
    Http1,

    /// HTTP/2 with prior knowledge
    #[serde(rename = "http2", alias = "http/2", alias = "2")]
    Http2,

    /// Let the client negotiate the version with the server
    #[serde(rename = "auto")]
    Auto,
}

/// Connection-level options for the HTTP data API and the channel socket.
///
/// # Example
///
/// ```rust
/// use panel_link::{ConnectionOptions, HttpVersion};
///
/// let options = ConnectionOptions::new()
///     .with_api_prefix("svt_api")
///     .with_http_version(HttpVersion::Http2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionOptions {
    /// HTTP protocol version for data API calls.
    #[serde(default)]
    pub http_version: HttpVersion,

    /// Path segment between the base URL and the model name.
    /// Default: `api` (`{base}/api/{model}`)
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// Socket mount path on the realtime endpoint.
    /// Default: `/socket`
    #[serde(default = "default_socket_path")]
    pub socket_path: String,

    /// Serializer version requested from the push backend.
    /// Default: `2.0.0`
    #[serde(default = "default_protocol_version")]
    pub protocol_version: String,
}

fn default_api_prefix() -> String {
    "api".to_string()
}

fn default_socket_path() -> String {
    "/socket".to_string()
}

fn default_protocol_version() -> String {
    "2.0.0".to_string()
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            http_version: HttpVersion::default(),
            api_prefix: default_api_prefix(),
            socket_path: default_socket_path(),
            protocol_version: default_protocol_version(),
        }
    }
}

impl ConnectionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// HTTP/1.1 or HTTP/2 for data API calls.
    pub fn with_http_version(mut self, version: HttpVersion) -> Self {
        self.http_version = version;
        self
    }

    /// Set the data API path prefix (leading/trailing slashes are ignored).
    pub fn with_api_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.api_prefix = prefix.into().trim_matches('/').to_string();
        self
    }

    /// Set the socket mount path.
    pub fn with_socket_path(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        self.socket_path = if path.starts_with('/') {
            path
        } else {
            format!("/{}", path)
        };
        self
    }

    /// Set the serializer version sent as `vsn`.
    pub fn with_protocol_version(mut self, vsn: impl Into<String>) -> Self {
        self.protocol_version = vsn.into();
        self
    }
}
