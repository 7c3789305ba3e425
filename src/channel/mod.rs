//! Realtime channel client.
//!
//! This module contains:
//! - [`transport`]: the `ChannelTransport` / `TransportConnector` seam
//! - [`phoenix`]: Phoenix socket implementation over tokio-tungstenite
//! - [`session`]: shared session with ref-counted topic membership
//! - [`heartbeat`]: topic-level liveness probe

pub mod heartbeat;
pub mod phoenix;
pub mod session;
pub mod transport;

pub use heartbeat::{HeartbeatMonitor, PING_EVENT};
pub use phoenix::{resolve_ws_url, PhoenixConnector, PhoenixTransport};
pub use session::{
    ChannelHandle, ChannelSession, ChannelSessionBuilder, ChannelView, SIDEBAR_TOPIC,
    UPDATE_COUNTS_EVENT,
};
pub use transport::{ChannelTransport, TransportConnector, EVENT_CHANNEL_CAPACITY};
