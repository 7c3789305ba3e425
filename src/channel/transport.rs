//! Seam between the channel session and the wire.
//!
//! [`ChannelTransport`] is one open socket able to join, leave and push on
//! topics. [`TransportConnector`] opens one. The session only ever talks to
//! these traits, so tests run against in-memory fakes.

use crate::error::Result;
use crate::models::{PhxMessage, Reply};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Capacity of the inbound push broadcast.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

#[async_trait]
pub trait ChannelTransport: Send + Sync + 'static {
    /// Send `phx_join` and wait for the server's reply.
    async fn join(&self, topic: &str, payload: Value) -> Result<Reply>;

    /// Send `phx_leave`. The socket stays open.
    async fn leave(&self, topic: &str) -> Result<()>;

    /// Push `event` on a joined topic and wait for the reply.
    async fn push(&self, topic: &str, event: &str, payload: Value) -> Result<Reply>;

    /// Server pushes other than replies.
    ///
    /// A `phx_close` on the `phoenix` topic means the socket itself went
    /// away.
    fn subscribe(&self) -> broadcast::Receiver<PhxMessage>;

    /// Close the socket.
    async fn close(&self);
}

#[async_trait]
pub trait TransportConnector: Send + Sync + 'static {
    async fn connect(&self) -> Result<Arc<dyn ChannelTransport>>;
}
