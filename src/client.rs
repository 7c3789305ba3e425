//! Main panel-link client with builder pattern.
//!
//! One client holds the HTTP connection pool, credentials and timeouts. It
//! serves as the [`GridDataSource`] for grids and builds the shared channel
//! session.

use crate::{
    auth::{AuthProvider, AuthSession},
    channel::{ChannelSession, PhoenixConnector},
    error::{PanelLinkError, Result},
    event_handlers::ChannelEventHandlers,
    grid::{GridConfig, GridController, GridDataSource},
    http::HttpExecutor,
    models::{ConnectionOptions, GridResult, HttpVersion, QueryDescription, RecordForm, SaveResponse},
    reconcile::{reconcile_page, ReconciledPage},
    timeouts::PanelLinkTimeouts,
};
use async_trait::async_trait;
use std::{
    sync::{Arc, OnceLock},
    time::Duration,
};

/// Main panel-link client.
///
/// # Examples
///
/// ```rust,no_run
/// use panel_link::{GridConfig, PanelLinkClient};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = PanelLinkClient::builder()
///     .base_url("http://localhost:4000")
///     .bearer_token("eyJhbGc...")
///     .build()?;
///
/// let grid = client.grid(GridConfig::new("devices"))?;
/// grid.mount().wait().await;
/// println!("{} devices", grid.view().total_count);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct PanelLinkClient {
    base_url: String,
    ws_url: Option<String>,
    auth: AuthSession,
    executor: HttpExecutor,
    timeouts: PanelLinkTimeouts,
    connection_options: ConnectionOptions,
    event_handlers: ChannelEventHandlers,
    channel: Arc<OnceLock<ChannelSession>>,
}

impl PanelLinkClient {
    pub fn builder() -> PanelLinkClientBuilder {
        PanelLinkClientBuilder::new()
    }

    /// Fetch and reconcile one page described by `query`.
    pub async fn fetch_page(&self, query: &QueryDescription) -> Result<ReconciledPage> {
        let raw = self.executor.fetch_grid(query).await?;
        reconcile_page(&raw, query.pagination.page_size)
    }

    pub async fn delete_record(&self, model: &str, id: &str) -> Result<()> {
        self.executor.delete_record(model, id).await
    }

    pub async fn save_record(&self, model: &str, form: &RecordForm) -> Result<SaveResponse> {
        self.executor.save_record(model, form).await
    }

    /// Grid controller backed by this client.
    pub fn grid(&self, config: GridConfig) -> Result<GridController<PanelLinkClient>> {
        GridController::new(Arc::new(self.clone()), config)
    }

    /// Connector for the Phoenix socket, configured from this client.
    pub fn connector(&self) -> PhoenixConnector {
        PhoenixConnector::new(self.base_url.clone())
            .ws_url(self.ws_url.clone())
            .auth(self.auth.provider().clone())
            .timeouts(self.timeouts.clone())
            .connection_options(self.connection_options.clone())
            .event_handlers(self.event_handlers.clone())
    }

    /// Shared session on the sidebar topic. Created on first call and
    /// reused by every clone of this client afterwards. The first call
    /// spawns the session task, so it must happen inside a tokio runtime.
    pub fn channel_session(&self) -> ChannelSession {
        self.channel
            .get_or_init(|| {
                log::debug!("[panel-link] Starting channel session");
                ChannelSession::builder(Arc::new(self.connector()))
                    .timeouts(self.timeouts.clone())
                    .event_handlers(self.event_handlers.clone())
                    .build()
            })
            .clone()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeouts(&self) -> &PanelLinkTimeouts {
        &self.timeouts
    }

    pub fn connection_options(&self) -> &ConnectionOptions {
        &self.connection_options
    }
}

#[async_trait]
impl GridDataSource for PanelLinkClient {
    async fn fetch_grid(&self, query: &QueryDescription) -> Result<GridResult> {
        Ok(self.fetch_page(query).await?.result)
    }

    async fn delete_record(&self, model: &str, id: &str) -> Result<()> {
        PanelLinkClient::delete_record(self, model, id).await
    }

    async fn save_record(&self, model: &str, form: &RecordForm) -> Result<SaveResponse> {
        PanelLinkClient::save_record(self, model, form).await
    }
}

/// Builder for configuring [`PanelLinkClient`] instances.
pub struct PanelLinkClientBuilder {
    base_url: Option<String>,
    ws_url: Option<String>,
    timeout: Duration,
    auth: AuthSession,
    max_retries: u32,
    timeouts: PanelLinkTimeouts,
    connection_options: ConnectionOptions,
    event_handlers: ChannelEventHandlers,
}

impl PanelLinkClientBuilder {
    fn new() -> Self {
        Self {
            base_url: None,
            ws_url: None,
            timeout: Duration::from_secs(30),
            auth: AuthSession::default(),
            max_retries: 3,
            timeouts: PanelLinkTimeouts::default(),
            connection_options: ConnectionOptions::default(),
            event_handlers: ChannelEventHandlers::default(),
        }
    }

    /// Base URL of the panel backend, e.g. `http://localhost:4000`.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Socket base URL when it differs from the HTTP base.
    pub fn ws_url(mut self, url: impl Into<String>) -> Self {
        self.ws_url = Some(url.into());
        self
    }

    /// HTTP request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.auth = self.auth.with_provider(AuthProvider::bearer_token(token.into()));
        self
    }

    /// Set the credentials, keeping any logout callback already registered.
    pub fn auth(mut self, auth: AuthProvider) -> Self {
        self.auth = self.auth.with_provider(auth);
        self
    }

    /// Set credentials and logout callback together.
    pub fn auth_session(mut self, session: AuthSession) -> Self {
        self.auth = session;
        self
    }

    /// Callback fired when the backend answers 401.
    pub fn on_logout(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.auth = self.auth.on_logout(f);
        self
    }

    /// Retries for idempotent reads on connect errors and timeouts.
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Overrides `timeout()` with `timeouts.receive_timeout`.
    pub fn timeouts(mut self, timeouts: PanelLinkTimeouts) -> Self {
        self.timeout = timeouts.receive_timeout;
        self.timeouts = timeouts;
        self
    }

    pub fn connection_options(mut self, options: ConnectionOptions) -> Self {
        self.connection_options = options;
        self
    }

    pub fn http_version(mut self, version: HttpVersion) -> Self {
        self.connection_options.http_version = version;
        self
    }

    pub fn event_handlers(mut self, handlers: ChannelEventHandlers) -> Self {
        self.event_handlers = handlers;
        self
    }

    pub fn build(self) -> Result<PanelLinkClient> {
        let base_url = self
            .base_url
            .ok_or_else(|| PanelLinkError::ConfigurationError("base_url is required".into()))?;
        reqwest::Url::parse(base_url.trim()).map_err(|e| {
            PanelLinkError::ConfigurationError(format!("Invalid base_url '{}': {}", base_url, e))
        })?;

        let mut client_builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.timeouts.connection_timeout)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90));

        client_builder = match self.connection_options.http_version {
            HttpVersion::Http1 => {
                log::debug!("[panel-link] Using HTTP/1.1 only");
                client_builder.http1_only()
            },
            HttpVersion::Http2 => {
                log::debug!("[panel-link] Using HTTP/2 with prior knowledge");
                client_builder.http2_prior_knowledge()
            },
            HttpVersion::Auto => {
                log::debug!("[panel-link] Using automatic HTTP version negotiation");
                client_builder
            },
        };

        let http_client = client_builder
            .build()
            .map_err(|e| PanelLinkError::ConfigurationError(e.to_string()))?;

        let executor = HttpExecutor::new(
            base_url.clone(),
            self.connection_options.api_prefix.clone(),
            http_client,
            self.auth.clone(),
            self.max_retries,
        );

        Ok(PanelLinkClient {
            base_url,
            ws_url: self.ws_url,
            auth: self.auth,
            executor,
            timeouts: self.timeouts,
            connection_options: self.connection_options,
            event_handlers: self.event_handlers,
            channel: Arc::new(OnceLock::new()),
        })
    }
}
