//! Topic-level liveness probe.
//!
//! While the topic is joined a `ping` is pushed every `interval`. An `ok`
//! reply within `timeout` counts as alive; anything else counts as dead.
//! The monitor only reports. It never rejoins.

use crate::channel::transport::ChannelTransport;
use crate::error::{PanelLinkError, Result};
use serde_json::json;
use std::time::Duration;
use tokio::time::Instant;

/// Outbound liveness event.
pub const PING_EVENT: &str = "ping";

/// Deadline used while the monitor is stopped.
pub(crate) const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 3600);

#[derive(Debug, Clone)]
pub struct HeartbeatMonitor {
    interval: Duration,
    timeout: Duration,
    deadline: Instant,
    running: bool,
}

impl HeartbeatMonitor {
    /// A zero `interval` disables probing.
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval,
            timeout,
            deadline: Instant::now() + FAR_FUTURE,
            running: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.interval.is_zero()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Arm the first probe one interval from now.
    pub fn start(&mut self) {
        if !self.is_enabled() {
            return;
        }
        self.running = true;
        self.deadline = Instant::now() + self.interval;
    }

    pub fn stop(&mut self) {
        self.running = false;
        self.deadline = Instant::now() + FAR_FUTURE;
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Push one `ping` and re-arm the timer.
    pub async fn probe(&mut self, transport: &dyn ChannelTransport, topic: &str) -> Result<()> {
        let result = probe_once(transport, topic, self.timeout).await;
        if self.running {
            self.deadline = Instant::now() + self.interval;
        }
        match &result {
            Ok(()) => log::debug!("[HEARTBEAT] '{}' acknowledged ping", topic),
            Err(e) => log::warn!("[HEARTBEAT] '{}' missed heartbeat: {}", topic, e),
        }
        result
    }
}

async fn probe_once(transport: &dyn ChannelTransport, topic: &str, timeout: Duration) -> Result<()> {
    let push = transport.push(topic, PING_EVENT, json!({}));
    let reply = if timeout.is_zero() {
        push.await?
    } else {
        tokio::time::timeout(timeout, push)
            .await
            .map_err(|_| PanelLinkError::HeartbeatTimeout(timeout))??
    };
    if reply.is_ok() {
        Ok(())
    } else {
        Err(PanelLinkError::WebSocketError(format!(
            "ping rejected: {}",
            reply.reason()
        )))
    }
}
