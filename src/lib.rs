//! # panel-link: Admin Panel Client Library
//!
//! Client-side engine for the panel admin console. Provides paginated,
//! sorted and filtered grid reads against the panel data API plus a shared
//! realtime channel carrying sidebar counts.
//!
//! ## Features
//!
//! - **Grid Queries**: Deterministic query-string serialization with nested
//!   joins, preloads and predicates
//! - **Grid Controller**: Page, sort, filter and edit state with stale-result
//!   discard
//! - **Realtime Channel**: Phoenix socket with ref-counted topic membership,
//!   join debounce and heartbeat
//! - **Authentication**: Bearer token and basic auth with logout on 401
//! - **Configurable Timeouts**: Connect, join, heartbeat and request timeouts
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use panel_link::{ColumnSpec, GridConfig, PanelLinkClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = PanelLinkClient::builder()
//!         .base_url("http://localhost:4000")
//!         .bearer_token("eyJhbGc...")
//!         .build()?;
//!
//!     let grid = client.grid(
//!         GridConfig::new("devices")
//!             .page_size(25)
//!             .column(ColumnSpec::new("Name", "name"))
//!             .column(ColumnSpec::new("Site", "name").through("site"))
//!             .join(serde_json::json!("site")),
//!     )?;
//!     grid.mount().wait().await;
//!     if let Some(fetch) = grid.set_sort("name") {
//!         fetch.wait().await;
//!     }
//!     println!("{} devices", grid.view().total_count);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Sidebar Counts
//!
//! ```rust,no_run
//! use panel_link::PanelLinkClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = PanelLinkClient::builder()
//!     .base_url("http://localhost:4000")
//!     .build()?;
//!
//! let session = client.channel_session();
//! let handle = session.acquire()?;
//! let mut counts = handle.watch_counts();
//! while counts.changed().await.is_ok() {
//!     println!("alerts: {:?}", handle.count("alerts"));
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod channel;
pub mod client;
pub mod config;
pub mod error;
pub mod event_handlers;
pub mod grid;
pub mod http;
pub mod models;
pub mod pagination;
pub mod query;
pub mod reconcile;
pub mod record;
pub mod timeouts;

// Re-export main types for convenience
pub use auth::{AuthProvider, AuthSession};
pub use channel::{
    ChannelHandle, ChannelSession, ChannelSessionBuilder, ChannelTransport, ChannelView,
    HeartbeatMonitor, PhoenixConnector, PhoenixTransport, TransportConnector, SIDEBAR_TOPIC,
};
pub use client::{PanelLinkClient, PanelLinkClientBuilder};
pub use config::PanelLinkConfig;
pub use error::{FetchError, FetchErrorKind, PanelLinkError, Result};
pub use event_handlers::{
    ChannelError, ChannelErrorKind, ChannelEventHandlers, DisconnectReason, FrameDirection,
};
pub use grid::{
    ApplyOutcome, FetchHandle, GridConfig, GridController, GridDataSource, GridState, GridView,
};
pub use models::{
    ColumnSpec, ConnectionOptions, CountsSnapshot, GridResult, HttpVersion, Pagination, PhxMessage,
    QueryDescription, Record, RecordForm, Reply, ReplyStatus, SaveResponse, SortDirection, SortSpec,
    TopicState,
};
pub use pagination::{PageItem, PagePlan};
pub use query::serialize;
pub use reconcile::{reconcile, reconcile_page, ReconciledPage};
pub use timeouts::{PanelLinkTimeouts, PanelLinkTimeoutsBuilder};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
