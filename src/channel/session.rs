//! Shared channel session.
//!
//! One background task owns the transport and the topic lifecycle:
//!
//! ```text
//! Idle --acquire, debounce--> Joining --ok reply--> Joined
//!                               |                     |
//!                         rejected/error        last release
//!                               v                     v
//!                             Failed --acquire-->  Idle (topic left, socket kept)
//! ```
//!
//! Consumers hold a [`ChannelHandle`] per mount. Handles acquired while the
//! topic is `Joining` or `Joined` share the existing join and never touch
//! the network. Dropping the last handle leaves the topic.

use crate::channel::heartbeat::{HeartbeatMonitor, FAR_FUTURE};
use crate::channel::transport::{ChannelTransport, TransportConnector};
use crate::error::{PanelLinkError, Result};
use crate::event_handlers::{ChannelError, ChannelErrorKind, ChannelEventHandlers, DisconnectReason};
use crate::models::phx_message::{PHOENIX_TOPIC, PHX_CLOSE, PHX_ERROR};
use crate::models::{counts_from_payload, CountsSnapshot, PhxMessage, TopicState};
use crate::timeouts::PanelLinkTimeouts;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Topic carrying the sidebar counters.
pub const SIDEBAR_TOPIC: &str = "user:sidebar";

/// Inbound event holding the full counts mapping.
pub const UPDATE_COUNTS_EVENT: &str = "update_counts";

enum SessionCmd {
    Acquire,
    Release,
    Reconnect,
    Shutdown,
}

/// What presentation renders for the channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelView {
    pub counts: CountsSnapshot,
    pub is_connected: bool,
}

struct SessionInner {
    topic: String,
    cmd_tx: mpsc::UnboundedSender<SessionCmd>,
    state_rx: watch::Receiver<TopicState>,
    counts_rx: watch::Receiver<CountsSnapshot>,
    connected_rx: watch::Receiver<bool>,
    _task: JoinHandle<()>,
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(SessionCmd::Shutdown);
    }
}

/// Cloneable handle on the session task.
#[derive(Clone)]
pub struct ChannelSession {
    inner: Arc<SessionInner>,
}

impl ChannelSession {
    pub fn builder(connector: Arc<dyn TransportConnector>) -> ChannelSessionBuilder {
        ChannelSessionBuilder::new(connector)
    }

    /// Register one subscriber. The first one schedules the join.
    pub fn acquire(&self) -> Result<ChannelHandle> {
        self.send(SessionCmd::Acquire)?;
        Ok(ChannelHandle {
            session: self.clone(),
            released: false,
        })
    }

    /// Drop the socket and, if anyone is subscribed, join again on a fresh
    /// one.
    pub fn reconnect(&self) -> Result<()> {
        self.send(SessionCmd::Reconnect)
    }

    /// Leave the topic and close the socket. Outstanding handles become
    /// inert.
    pub fn shutdown(&self) {
        let _ = self.inner.cmd_tx.send(SessionCmd::Shutdown);
    }

    pub fn topic(&self) -> &str {
        &self.inner.topic
    }

    pub fn state(&self) -> TopicState {
        *self.inner.state_rx.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<TopicState> {
        self.inner.state_rx.clone()
    }

    pub fn counts(&self) -> CountsSnapshot {
        self.inner.counts_rx.borrow().clone()
    }

    pub fn watch_counts(&self) -> watch::Receiver<CountsSnapshot> {
        self.inner.counts_rx.clone()
    }

    pub fn is_connected(&self) -> bool {
        *self.inner.connected_rx.borrow()
    }

    pub fn watch_connected(&self) -> watch::Receiver<bool> {
        self.inner.connected_rx.clone()
    }

    fn send(&self, cmd: SessionCmd) -> Result<()> {
        self.inner.cmd_tx.send(cmd).map_err(|_| {
            PanelLinkError::WebSocketError("Channel session task is not running".to_string())
        })
    }
}

/// One subscriber's claim on the session. Releases on drop.
pub struct ChannelHandle {
    session: ChannelSession,
    released: bool,
}

impl ChannelHandle {
    pub fn counts(&self) -> CountsSnapshot {
        self.session.counts()
    }

    /// Latest value of one counter.
    pub fn count(&self, key: &str) -> Option<i64> {
        self.session.inner.counts_rx.borrow().get(key).copied()
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    pub fn state(&self) -> TopicState {
        self.session.state()
    }

    pub fn view(&self) -> ChannelView {
        ChannelView {
            counts: self.counts(),
            is_connected: self.is_connected(),
        }
    }

    pub fn watch_counts(&self) -> watch::Receiver<CountsSnapshot> {
        self.session.watch_counts()
    }

    pub fn watch_connected(&self) -> watch::Receiver<bool> {
        self.session.watch_connected()
    }

    pub fn session(&self) -> &ChannelSession {
        &self.session
    }

    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if !self.released {
            self.released = true;
            let _ = self.session.inner.cmd_tx.send(SessionCmd::Release);
        }
    }
}

impl Drop for ChannelHandle {
    fn drop(&mut self) {
        self.release_inner();
    }
}

pub struct ChannelSessionBuilder {
    connector: Arc<dyn TransportConnector>,
    topic: String,
    timeouts: PanelLinkTimeouts,
    event_handlers: ChannelEventHandlers,
}

impl ChannelSessionBuilder {
    fn new(connector: Arc<dyn TransportConnector>) -> Self {
        Self {
            connector,
            topic: SIDEBAR_TOPIC.to_string(),
            timeouts: PanelLinkTimeouts::default(),
            event_handlers: ChannelEventHandlers::default(),
        }
    }

    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    pub fn timeouts(mut self, timeouts: PanelLinkTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn event_handlers(mut self, handlers: ChannelEventHandlers) -> Self {
        self.event_handlers = handlers;
        self
    }

    /// Spawn the session task. Must run inside a tokio runtime.
    pub fn build(self) -> ChannelSession {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(TopicState::Idle);
        let (counts_tx, counts_rx) = watch::channel(CountsSnapshot::new());
        let (connected_tx, connected_rx) = watch::channel(false);

        let task = SessionTask {
            topic: self.topic.clone(),
            connector: self.connector,
            heartbeat: HeartbeatMonitor::new(
                self.timeouts.heartbeat_interval,
                self.timeouts.heartbeat_timeout,
            ),
            timeouts: self.timeouts,
            handlers: self.event_handlers,
            transport: None,
            events: None,
            subscribers: 0,
            join_deadline: None,
            state_tx,
            counts_tx,
            connected_tx,
        };
        let handle = tokio::spawn(task.run(cmd_rx));

        ChannelSession {
            inner: Arc::new(SessionInner {
                topic: self.topic,
                cmd_tx,
                state_rx,
                counts_rx,
                connected_rx,
                _task: handle,
            }),
        }
    }
}

// ── Background session task ─────────────────────────────────────────────────

struct SessionTask {
    topic: String,
    connector: Arc<dyn TransportConnector>,
    timeouts: PanelLinkTimeouts,
    handlers: ChannelEventHandlers,
    transport: Option<Arc<dyn ChannelTransport>>,
    events: Option<broadcast::Receiver<PhxMessage>>,
    subscribers: usize,
    join_deadline: Option<Instant>,
    heartbeat: HeartbeatMonitor,
    state_tx: watch::Sender<TopicState>,
    counts_tx: watch::Sender<CountsSnapshot>,
    connected_tx: watch::Sender<bool>,
}

async fn next_event(
    events: &mut Option<broadcast::Receiver<PhxMessage>>,
) -> std::result::Result<PhxMessage, RecvError> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

impl SessionTask {
    async fn run(mut self, mut cmd_rx: mpsc::UnboundedReceiver<SessionCmd>) {
        loop {
            let join_sleep =
                tokio::time::sleep_until(self.join_deadline.unwrap_or_else(|| Instant::now() + FAR_FUTURE));
            tokio::pin!(join_sleep);
            let heartbeat_sleep = tokio::time::sleep_until(self.heartbeat.deadline());
            tokio::pin!(heartbeat_sleep);

            let joining = self.join_deadline.is_some();
            let beating = self.heartbeat.is_running();

            tokio::select! {
                biased;

                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(SessionCmd::Acquire) => self.on_acquire(),
                        Some(SessionCmd::Release) => self.on_release().await,
                        Some(SessionCmd::Reconnect) => self.on_reconnect().await,
                        Some(SessionCmd::Shutdown) | None => {
                            self.on_shutdown().await;
                            return;
                        },
                    }
                }

                event = next_event(&mut self.events) => {
                    self.on_event(event);
                }

                _ = &mut join_sleep, if joining => {
                    self.join_deadline = None;
                    self.join().await;
                }

                _ = &mut heartbeat_sleep, if beating => {
                    self.beat().await;
                }
            }
        }
    }

    fn state(&self) -> TopicState {
        *self.state_tx.borrow()
    }

    fn set_state(&self, state: TopicState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            log::debug!("[CHANNEL] '{}' {} -> {}", self.topic, previous, state);
            self.handlers.state_changed(previous, state);
        }
    }

    fn set_connected(&self, connected: bool) {
        self.connected_tx.send_replace(connected);
    }

    fn on_acquire(&mut self) {
        self.subscribers += 1;
        match self.state() {
            TopicState::Idle | TopicState::Failed if self.join_deadline.is_none() => {
                self.set_state(TopicState::Joining);
                self.join_deadline = Some(Instant::now() + self.timeouts.join_debounce);
                log::debug!(
                    "[CHANNEL] Join of '{}' scheduled in {:?}",
                    self.topic,
                    self.timeouts.join_debounce
                );
            },
            state => {
                log::debug!(
                    "[CHANNEL] '{}' already {}, sharing (subscribers={})",
                    self.topic,
                    state,
                    self.subscribers
                );
            },
        }
    }

    async fn on_release(&mut self) {
        if self.subscribers == 0 {
            log::warn!("[CHANNEL] Release without subscriber on '{}'", self.topic);
            return;
        }
        self.subscribers -= 1;
        if self.subscribers > 0 {
            return;
        }

        self.join_deadline = None;
        self.heartbeat.stop();
        if self.state() == TopicState::Joined {
            if let Some(transport) = &self.transport {
                if let Err(e) = transport.leave(&self.topic).await {
                    log::warn!("[CHANNEL] Failed to leave '{}': {}", self.topic, e);
                }
            }
            self.handlers.disconnected(&DisconnectReason::TopicLeft {
                topic: self.topic.clone(),
            });
        }
        self.set_connected(false);
        self.set_state(TopicState::Idle);
    }

    async fn on_reconnect(&mut self) {
        log::info!("[CHANNEL] Reconnect requested for '{}'", self.topic);
        if let Some(transport) = self.transport.take() {
            transport.close().await;
            self.transport_lost(DisconnectReason::Reconnect);
        }
        if self.subscribers > 0 && self.join_deadline.is_none() {
            self.set_state(TopicState::Joining);
            self.join_deadline = Some(Instant::now() + self.timeouts.join_debounce);
        }
    }

    async fn on_shutdown(&mut self) {
        self.join_deadline = None;
        self.heartbeat.stop();
        if let Some(transport) = self.transport.take() {
            if self.state() == TopicState::Joined {
                let _ = transport.leave(&self.topic).await;
            }
            transport.close().await;
            self.handlers.disconnected(&DisconnectReason::Shutdown);
        }
        self.events = None;
        self.set_connected(false);
        self.set_state(TopicState::Idle);
    }

    async fn ensure_transport(&mut self) -> Result<Arc<dyn ChannelTransport>> {
        if let Some(transport) = &self.transport {
            return Ok(Arc::clone(transport));
        }

        let connect = self.connector.connect();
        let transport = if PanelLinkTimeouts::is_no_timeout(self.timeouts.connection_timeout) {
            connect.await?
        } else {
            tokio::time::timeout(self.timeouts.connection_timeout, connect)
                .await
                .map_err(|_| {
                    PanelLinkError::TimeoutError(format!(
                        "Connection timeout ({:?})",
                        self.timeouts.connection_timeout
                    ))
                })??
        };

        log::info!("[CHANNEL] Transport connected");
        self.events = Some(transport.subscribe());
        self.transport = Some(Arc::clone(&transport));
        self.handlers.connected();
        Ok(transport)
    }

    async fn join(&mut self) {
        if self.subscribers == 0 {
            self.set_state(TopicState::Idle);
            return;
        }

        let transport = match self.ensure_transport().await {
            Ok(transport) => transport,
            Err(e) => {
                self.fail(ChannelErrorKind::Connect, e);
                return;
            },
        };

        log::debug!("[CHANNEL] Joining '{}'", self.topic);
        let join = transport.join(&self.topic, json!({}));
        let result = if PanelLinkTimeouts::is_no_timeout(self.timeouts.join_timeout) {
            join.await
        } else {
            tokio::time::timeout(self.timeouts.join_timeout, join)
                .await
                .unwrap_or_else(|_| {
                    Err(PanelLinkError::TimeoutError(format!(
                        "Join of '{}' timed out ({:?})",
                        self.topic, self.timeouts.join_timeout
                    )))
                })
        };

        match result {
            Ok(reply) if reply.is_ok() => {
                log::info!("[CHANNEL] Joined '{}'", self.topic);
                self.set_state(TopicState::Joined);
                self.set_connected(true);
                self.heartbeat.start();
            },
            Ok(reply) => self.fail(
                ChannelErrorKind::JoinRejected,
                PanelLinkError::JoinRejected {
                    topic: self.topic.clone(),
                    reason: reply.reason(),
                },
            ),
            Err(e) => self.fail(ChannelErrorKind::Join, e),
        }
    }

    async fn beat(&mut self) {
        let transport = match &self.transport {
            Some(transport) => Arc::clone(transport),
            None => {
                self.heartbeat.stop();
                return;
            },
        };
        match self.heartbeat.probe(transport.as_ref(), &self.topic).await {
            Ok(()) => self.set_connected(true),
            Err(e) => {
                self.set_connected(false);
                let error =
                    ChannelError::from_error(ChannelErrorKind::Heartbeat, &e).on_topic(&self.topic);
                self.handlers.failed(&error);
            },
        }
    }

    fn on_event(&mut self, event: std::result::Result<PhxMessage, RecvError>) {
        let message = match event {
            Ok(message) => message,
            Err(RecvError::Lagged(skipped)) => {
                log::warn!("[CHANNEL] Dropped {} inbound message(s)", skipped);
                return;
            },
            Err(RecvError::Closed) => {
                self.transport = None;
                self.transport_lost(DisconnectReason::socket("Transport closed"));
                return;
            },
        };

        if message.topic == PHOENIX_TOPIC && message.event == PHX_CLOSE {
            self.transport = None;
            let text = message
                .payload
                .get("reason")
                .and_then(|r| r.as_str())
                .unwrap_or("Socket closed")
                .to_string();
            let reason = match message.payload.get("code").and_then(|c| c.as_u64()) {
                Some(code) => DisconnectReason::socket_with_code(text, code as u16),
                None => DisconnectReason::socket(text),
            };
            self.transport_lost(reason);
            return;
        }

        if message.topic != self.topic {
            return;
        }

        match message.event.as_str() {
            UPDATE_COUNTS_EVENT => {
                let counts = counts_from_payload(&message.payload);
                log::debug!("[CHANNEL] Received {} count(s)", counts.len());
                self.counts_tx.send_replace(counts.clone());
                self.handlers.counts_updated(&counts);
            },
            PHX_ERROR | PHX_CLOSE if self.state().is_active() => {
                self.fail(
                    ChannelErrorKind::TopicClosed,
                    PanelLinkError::WebSocketError(format!(
                        "Topic '{}' closed by server ({})",
                        self.topic, message.event
                    )),
                );
            },
            other => {
                log::debug!("[CHANNEL] Ignoring '{}' on '{}'", other, self.topic);
            },
        }
    }

    /// Socket is gone. Topic state degrades to `Failed`; rejoin waits for an
    /// explicit acquire or reconnect.
    fn transport_lost(&mut self, reason: DisconnectReason) {
        self.events = None;
        self.heartbeat.stop();
        self.join_deadline = None;
        self.set_connected(false);
        if self.state().is_active() {
            self.set_state(TopicState::Failed);
        }
        log::warn!("[CHANNEL] Transport lost: {}", reason);
        self.handlers.disconnected(&reason);
    }

    fn fail(&mut self, kind: ChannelErrorKind, err: PanelLinkError) {
        log::warn!("[CHANNEL] '{}' failed: {}", self.topic, err);
        self.heartbeat.stop();
        self.set_connected(false);
        self.set_state(TopicState::Failed);
        let error = ChannelError::from_error(kind, &err).on_topic(&self.topic);
        self.handlers.failed(&error);
    }
}
