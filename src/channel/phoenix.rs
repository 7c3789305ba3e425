//! Phoenix socket transport over tokio-tungstenite.
//!
//! One background task owns the WebSocket. Pushes go in over a command
//! channel; replies are matched back to their push by `ref`; every other
//! server frame is broadcast to subscribers. The socket-level heartbeat
//! (`phoenix`/`heartbeat`) runs here too: if the previous heartbeat is still
//! unanswered when the next one is due the socket is considered dead.
//!
//! When the socket closes, a `phx_close` frame on the `phoenix` topic is
//! broadcast so the session can degrade its state. Lifecycle callbacks are
//! the session's job; the transport only reports raw frames and stream
//! errors.

use crate::auth::AuthProvider;
use crate::channel::heartbeat::FAR_FUTURE;
use crate::channel::transport::{ChannelTransport, TransportConnector, EVENT_CHANNEL_CAPACITY};
use crate::error::{PanelLinkError, Result};
use crate::event_handlers::{
    ChannelError, ChannelErrorKind, ChannelEventHandlers, DisconnectReason, FrameDirection,
};
use crate::models::phx_message::{HEARTBEAT_EVENT, PHOENIX_TOPIC, PHX_CLOSE, PHX_ERROR, PHX_JOIN, PHX_LEAVE};
use crate::models::{ConnectionOptions, PhxMessage, Reply};
use crate::timeouts::PanelLinkTimeouts;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use reqwest::Url;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        client::IntoClientRequest,
        http::header::{HeaderValue, AUTHORIZATION},
        protocol::Message,
    },
    MaybeTlsStream,
};

type WebSocketStream = tokio_tungstenite::WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Build `{ws_base}{socket_path}/websocket?vsn={protocol_version}`.
///
/// `ws_override` takes precedence over `base_url`; `http(s)` schemes are
/// mapped to `ws(s)`.
pub fn resolve_ws_url(
    base_url: &str,
    ws_override: Option<&str>,
    options: &ConnectionOptions,
) -> Result<String> {
    let source = ws_override.unwrap_or(base_url).trim();
    let mut url = Url::parse(source).map_err(|e| {
        PanelLinkError::ConfigurationError(format!("Invalid socket base url '{}': {}", source, e))
    })?;

    if url.host_str().is_none() {
        return Err(PanelLinkError::ConfigurationError(format!(
            "Socket base url '{}' must include a host",
            source
        )));
    }

    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(PanelLinkError::ConfigurationError(format!(
                "Unsupported socket url scheme '{}'; expected http(s) or ws(s)",
                other
            )));
        },
    };
    url.set_scheme(scheme).map_err(|_| {
        PanelLinkError::ConfigurationError("Failed to set WebSocket URL scheme".to_string())
    })?;

    let base_path = url.path().trim_end_matches('/').to_string();
    url.set_path(&format!("{}{}/websocket", base_path, options.socket_path));
    url.set_query(Some(&format!("vsn={}", options.protocol_version)));
    url.set_fragment(None);
    Ok(url.to_string())
}

// ── Commands ────────────────────────────────────────────────────────────────

enum PhxCmd {
    Push {
        topic: String,
        event: String,
        payload: Value,
        reply_tx: oneshot::Sender<Result<Reply>>,
    },
    Leave {
        topic: String,
    },
    Shutdown,
}

// ── Connector ───────────────────────────────────────────────────────────────

/// Opens [`PhoenixTransport`]s against a configured server.
#[derive(Debug, Clone)]
pub struct PhoenixConnector {
    base_url: String,
    ws_url: Option<String>,
    auth: AuthProvider,
    timeouts: PanelLinkTimeouts,
    options: ConnectionOptions,
    handlers: ChannelEventHandlers,
}

impl PhoenixConnector {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ws_url: None,
            auth: AuthProvider::None,
            timeouts: PanelLinkTimeouts::default(),
            options: ConnectionOptions::default(),
            handlers: ChannelEventHandlers::default(),
        }
    }

    pub fn ws_url(mut self, url: Option<String>) -> Self {
        self.ws_url = url;
        self
    }

    pub fn auth(mut self, auth: AuthProvider) -> Self {
        self.auth = auth;
        self
    }

    pub fn timeouts(mut self, timeouts: PanelLinkTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn connection_options(mut self, options: ConnectionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn event_handlers(mut self, handlers: ChannelEventHandlers) -> Self {
        self.handlers = handlers;
        self
    }

    pub fn socket_url(&self) -> Result<String> {
        resolve_ws_url(&self.base_url, self.ws_url.as_deref(), &self.options)
    }
}

#[async_trait]
impl TransportConnector for PhoenixConnector {
    async fn connect(&self) -> Result<Arc<dyn ChannelTransport>> {
        let transport = PhoenixTransport::connect(
            &self.socket_url()?,
            &self.auth,
            &self.timeouts,
            self.handlers.clone(),
        )
        .await?;
        Ok(Arc::new(transport))
    }
}

// ── Transport (public handle) ───────────────────────────────────────────────

pub struct PhoenixTransport {
    cmd_tx: mpsc::Sender<PhxCmd>,
    events_tx: broadcast::Sender<PhxMessage>,
    connected: Arc<AtomicBool>,
    _task: JoinHandle<()>,
}

impl PhoenixTransport {
    pub async fn connect(
        url: &str,
        auth: &AuthProvider,
        timeouts: &PanelLinkTimeouts,
        handlers: ChannelEventHandlers,
    ) -> Result<Self> {
        let ws = establish_ws(url, auth, timeouts).await?;

        let (cmd_tx, cmd_rx) = mpsc::channel::<PhxCmd>(256);
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let connected = Arc::new(AtomicBool::new(true));

        let task = tokio::spawn(socket_task(
            ws,
            cmd_rx,
            events_tx.clone(),
            handlers,
            Arc::clone(&connected),
            timeouts.socket_heartbeat_interval,
        ));

        Ok(Self {
            cmd_tx,
            events_tx,
            connected,
            _task: task,
        })
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    async fn push_cmd(&self, topic: &str, event: &str, payload: Value) -> Result<Reply> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(PhxCmd::Push {
                topic: topic.to_string(),
                event: event.to_string(),
                payload,
                reply_tx,
            })
            .await
            .map_err(|_| PanelLinkError::WebSocketError("Socket task is not running".to_string()))?;
        reply_rx.await.map_err(|_| {
            PanelLinkError::WebSocketError(format!("Socket closed before '{}' was answered", event))
        })?
    }
}

impl Drop for PhoenixTransport {
    fn drop(&mut self) {
        let _ = self.cmd_tx.try_send(PhxCmd::Shutdown);
    }
}

#[async_trait]
impl ChannelTransport for PhoenixTransport {
    async fn join(&self, topic: &str, payload: Value) -> Result<Reply> {
        self.push_cmd(topic, PHX_JOIN, payload).await
    }

    async fn leave(&self, topic: &str) -> Result<()> {
        self.cmd_tx
            .send(PhxCmd::Leave {
                topic: topic.to_string(),
            })
            .await
            .map_err(|_| PanelLinkError::WebSocketError("Socket task is not running".to_string()))
    }

    async fn push(&self, topic: &str, event: &str, payload: Value) -> Result<Reply> {
        self.push_cmd(topic, event, payload).await
    }

    fn subscribe(&self) -> broadcast::Receiver<PhxMessage> {
        self.events_tx.subscribe()
    }

    async fn close(&self) {
        let _ = self.cmd_tx.send(PhxCmd::Shutdown).await;
    }
}

// ── Background socket task ──────────────────────────────────────────────────

async fn establish_ws(
    url: &str,
    auth: &AuthProvider,
    timeouts: &PanelLinkTimeouts,
) -> Result<WebSocketStream> {
    log::debug!("[panel-link] Establishing WebSocket connection to {}", url);

    let mut request = url.into_client_request().map_err(|e| {
        PanelLinkError::WebSocketError(format!("Failed to build WebSocket request: {}", e))
    })?;
    if let Some(value) = auth.header_value() {
        let header = HeaderValue::from_str(&value).map_err(|e| {
            PanelLinkError::ConfigurationError(format!("Invalid Authorization header: {}", e))
        })?;
        request.headers_mut().insert(AUTHORIZATION, header);
    }

    let connect_result = if PanelLinkTimeouts::is_no_timeout(timeouts.connection_timeout) {
        Ok(connect_async(request).await)
    } else {
        tokio::time::timeout(timeouts.connection_timeout, connect_async(request)).await
    };

    match connect_result {
        Ok(Ok((stream, _))) => Ok(stream),
        Ok(Err(tokio_tungstenite::tungstenite::Error::Http(response))) => {
            let message = match response.status().as_u16() {
                401 => "Unauthorized: socket requires valid credentials".to_string(),
                403 => "Forbidden: socket access denied".to_string(),
                code => format!("WebSocket HTTP error: {}", code),
            };
            if response.status().as_u16() == 401 {
                return Err(PanelLinkError::AuthenticationError(message));
            }
            Err(PanelLinkError::WebSocketError(message))
        },
        Ok(Err(e)) => {
            Err(PanelLinkError::WebSocketError(format!("Connection failed: {}", e)))
        },
        Err(_) => {
            Err(PanelLinkError::TimeoutError(format!(
                "Connection timeout ({:?})",
                timeouts.connection_timeout
            )))
        },
    }
}

async fn send_frame(
    ws: &mut WebSocketStream,
    frame: &PhxMessage,
    handlers: &ChannelEventHandlers,
) -> Result<()> {
    let text = frame.encode()?;
    handlers.frame(FrameDirection::Outbound, &text);
    ws.send(Message::Text(text.into())).await.map_err(|e| {
        PanelLinkError::WebSocketError(format!("Failed to send '{}': {}", frame.event, e))
    })
}

/// Reply bookkeeping for one socket.
#[derive(Default)]
struct Refs {
    next: u64,
    pending: HashMap<String, oneshot::Sender<Result<Reply>>>,
    joins: HashMap<String, String>,
    heartbeat: Option<String>,
}

impl Refs {
    fn next_ref(&mut self) -> String {
        self.next += 1;
        self.next.to_string()
    }

    /// Route one inbound frame. Returns it back if it is not a reply.
    fn route(&mut self, message: PhxMessage) -> Option<PhxMessage> {
        if message.is_reply() {
            let msg_ref = message.msg_ref.clone().unwrap_or_default();
            if self.heartbeat.as_deref() == Some(msg_ref.as_str()) {
                self.heartbeat = None;
            } else if let (Some(tx), Some(reply)) = (self.pending.remove(&msg_ref), message.reply()) {
                let _ = tx.send(Ok(reply));
            } else {
                log::debug!("[panel-link] Unmatched reply ref={} topic={}", msg_ref, message.topic);
            }
            return None;
        }
        if message.event == PHX_CLOSE || message.event == PHX_ERROR {
            self.joins.remove(&message.topic);
        }
        Some(message)
    }

    fn fail_all(&mut self, reason: &str) {
        for (_, tx) in self.pending.drain() {
            let _ = tx.send(Err(PanelLinkError::WebSocketError(reason.to_string())));
        }
    }
}

async fn socket_task(
    mut ws: WebSocketStream,
    mut cmd_rx: mpsc::Receiver<PhxCmd>,
    events_tx: broadcast::Sender<PhxMessage>,
    handlers: ChannelEventHandlers,
    connected: Arc<AtomicBool>,
    heartbeat_interval: Duration,
) {
    let mut refs = Refs::default();
    let has_heartbeat = !heartbeat_interval.is_zero();
    let heartbeat_every = if has_heartbeat { heartbeat_interval } else { FAR_FUTURE };
    let mut heartbeat_deadline = Instant::now() + heartbeat_every;

    let reason = loop {
        let heartbeat_sleep = tokio::time::sleep_until(heartbeat_deadline);
        tokio::pin!(heartbeat_sleep);

        tokio::select! {
            biased;

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(PhxCmd::Push { topic, event, payload, reply_tx }) => {
                        let msg_ref = refs.next_ref();
                        let join_ref = if event == PHX_JOIN {
                            refs.joins.insert(topic.clone(), msg_ref.clone());
                            Some(msg_ref.clone())
                        } else {
                            refs.joins.get(&topic).cloned()
                        };
                        let frame = PhxMessage::new(topic, event, payload)
                            .with_refs(join_ref, Some(msg_ref.clone()));
                        refs.pending.retain(|_, tx| !tx.is_closed());
                        match send_frame(&mut ws, &frame, &handlers).await {
                            Ok(()) => {
                                refs.pending.insert(msg_ref, reply_tx);
                            },
                            Err(e) => {
                                let _ = reply_tx.send(Err(e));
                            },
                        }
                    },
                    Some(PhxCmd::Leave { topic }) => {
                        if let Some(join_ref) = refs.joins.remove(&topic) {
                            let msg_ref = refs.next_ref();
                            let frame = PhxMessage::new(topic, PHX_LEAVE, json!({}))
                                .with_refs(Some(join_ref), Some(msg_ref));
                            if let Err(e) = send_frame(&mut ws, &frame, &handlers).await {
                                log::warn!("[panel-link] Failed to leave '{}': {}", frame.topic, e);
                            }
                        }
                    },
                    Some(PhxCmd::Shutdown) | None => {
                        let _ = ws.close(None).await;
                        break DisconnectReason::Shutdown;
                    },
                }
            }

            _ = &mut heartbeat_sleep, if has_heartbeat => {
                if refs.heartbeat.is_some() {
                    log::warn!(
                        "[panel-link] Socket heartbeat unanswered after {:?}, closing",
                        heartbeat_interval
                    );
                    let _ = ws.close(None).await;
                    break DisconnectReason::socket("Socket heartbeat timeout");
                }
                let msg_ref = refs.next_ref();
                let frame = PhxMessage::new(PHOENIX_TOPIC, HEARTBEAT_EVENT, json!({}))
                    .with_refs(None, Some(msg_ref.clone()));
                if let Err(e) = send_frame(&mut ws, &frame, &handlers).await {
                    break DisconnectReason::socket(format!("Socket heartbeat failed: {}", e));
                }
                refs.heartbeat = Some(msg_ref);
                heartbeat_deadline = Instant::now() + heartbeat_every;
            }

            frame = ws.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        handlers.frame(FrameDirection::Inbound, &text);
                        match PhxMessage::decode(&text) {
                            Ok(message) => {
                                if let Some(push) = refs.route(message) {
                                    let _ = events_tx.send(push);
                                }
                            },
                            Err(e) => log::warn!("[panel-link] Failed to parse frame: {}", e),
                        }
                    },
                    Some(Ok(Message::Close(frame))) => {
                        break match frame {
                            Some(f) => DisconnectReason::socket_with_code(f.reason.to_string(), f.code.into()),
                            None => DisconnectReason::socket("Server closed connection"),
                        };
                    },
                    Some(Ok(Message::Ping(payload))) => {
                        let _ = ws.send(Message::Pong(payload)).await;
                    },
                    Some(Ok(_)) => {},
                    Some(Err(e)) => {
                        let message = e.to_string();
                        handlers.failed(&ChannelError::new(ChannelErrorKind::Socket, &message));
                        break DisconnectReason::socket(format!("WebSocket error: {}", message));
                    },
                    None => break DisconnectReason::socket("WebSocket stream ended"),
                }
            }
        }
    };

    connected.store(false, Ordering::SeqCst);
    let message = match &reason {
        DisconnectReason::SocketClosed { message, .. } => message.clone(),
        other => other.to_string(),
    };
    refs.fail_all(&message);
    let _ = events_tx.send(PhxMessage::new(
        PHOENIX_TOPIC,
        PHX_CLOSE,
        json!({ "reason": message, "code": reason.code() }),
    ));
    log::info!("[panel-link] Socket closed: {}", reason);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_ws_url_from_http_base() {
        let url = resolve_ws_url("http://localhost:4000", None, &ConnectionOptions::default()).unwrap();
        assert_eq!(url, "ws://localhost:4000/socket/websocket?vsn=2.0.0");
    }

    #[test]
    fn test_resolve_ws_url_override_and_https() {
        let url = resolve_ws_url(
            "https://admin.example.com/",
            Some("https://rt.example.com/"),
            &ConnectionOptions::default(),
        )
        .unwrap();
        assert_eq!(url, "wss://rt.example.com/socket/websocket?vsn=2.0.0");
    }

    #[test]
    fn test_resolve_ws_url_keeps_base_path() {
        let options = ConnectionOptions::new().with_socket_path("live");
        let url = resolve_ws_url("http://host/panel/", None, &options).unwrap();
        assert_eq!(url, "ws://host/panel/live/websocket?vsn=2.0.0");
    }

    #[test]
    fn test_resolve_ws_url_rejects_bad_scheme() {
        assert!(resolve_ws_url("ftp://host", None, &ConnectionOptions::default()).is_err());
        assert!(resolve_ws_url("not a url", None, &ConnectionOptions::default()).is_err());
    }

    #[test]
    fn test_refs_route_reply_to_pending() {
        let mut refs = Refs::default();
        let (tx, mut rx) = oneshot::channel();
        let r = refs.next_ref();
        refs.pending.insert(r.clone(), tx);

        let reply = PhxMessage::new("user:sidebar", "phx_reply", json!({"status": "ok", "response": {}}))
            .with_refs(Some(r.clone()), Some(r));
        assert!(refs.route(reply).is_none());
        assert!(rx.try_recv().unwrap().unwrap().is_ok());
    }

    #[test]
    fn test_refs_heartbeat_ack_and_push_passthrough() {
        let mut refs = Refs::default();
        let r = refs.next_ref();
        refs.heartbeat = Some(r.clone());
        let ack = PhxMessage::new(PHOENIX_TOPIC, "phx_reply", json!({"status": "ok"}))
            .with_refs(None, Some(r));
        assert!(refs.route(ack).is_none());
        assert!(refs.heartbeat.is_none());

        let push = PhxMessage::new("user:sidebar", "update_counts", json!({"a": 1}));
        assert_eq!(refs.route(push.clone()), Some(push));
    }

    #[test]
    fn test_refs_fail_all() {
        let mut refs = Refs::default();
        let (tx, mut rx) = oneshot::channel();
        refs.pending.insert("1".into(), tx);
        refs.fail_all("gone");
        assert!(rx.try_recv().unwrap().is_err());
    }
}
