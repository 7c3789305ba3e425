//! Observer hooks for the realtime channel.
//!
//! The session and socket tasks report what happens to the shared socket
//! and the topic through a [`ChannelEventHandlers`] value. Every hook is
//! optional and runs inline on the task that fired it, so it must not
//! block.
//!
//! ```rust
//! use panel_link::{ChannelEventHandlers, DisconnectReason};
//!
//! let handlers = ChannelEventHandlers::new()
//!     .on_state_change(|from, to| println!("sidebar {} -> {}", from, to))
//!     .on_disconnect(|reason| {
//!         if reason.is_socket_loss() {
//!             eprintln!("socket lost: {}", reason);
//!         }
//!     })
//!     .on_error(|err| eprintln!("[{:?}] {}", err.kind, err));
//! ```

use crate::error::PanelLinkError;
use crate::models::{CountsSnapshot, TopicState};
use std::fmt;
use std::sync::Arc;

/// Why the channel stopped delivering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The last subscriber released the topic. The socket stays open.
    TopicLeft { topic: String },
    /// The socket itself went away.
    SocketClosed { message: String, code: Option<u16> },
    /// `reconnect()` dropped the socket on purpose.
    Reconnect,
    /// The session was shut down.
    Shutdown,
}

impl DisconnectReason {
    pub fn socket(message: impl Into<String>) -> Self {
        Self::SocketClosed {
            message: message.into(),
            code: None,
        }
    }

    pub fn socket_with_code(message: impl Into<String>, code: u16) -> Self {
        Self::SocketClosed {
            message: message.into(),
            code: Some(code),
        }
    }

    /// Close code sent by the server, if any.
    pub fn code(&self) -> Option<u16> {
        match self {
            Self::SocketClosed { code, .. } => *code,
            _ => None,
        }
    }

    /// `true` unless the client asked for the disconnect.
    pub fn is_socket_loss(&self) -> bool {
        matches!(self, Self::SocketClosed { .. })
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TopicLeft { topic } => write!(f, "left topic '{}'", topic),
            Self::SocketClosed {
                message,
                code: Some(code),
            } => write!(f, "{} (code: {})", message, code),
            Self::SocketClosed { message, code: None } => f.write_str(message),
            Self::Reconnect => f.write_str("reconnect requested"),
            Self::Shutdown => f.write_str("session shut down"),
        }
    }
}

/// Stage of the channel lifecycle an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelErrorKind {
    /// Opening the socket failed or timed out.
    Connect,
    /// The server refused the socket's credentials.
    Unauthorized,
    /// The server answered the join with `error`.
    JoinRejected,
    /// The join got no reply in time or the socket failed mid-join.
    Join,
    /// A `ping` went unanswered or was refused.
    Heartbeat,
    /// The server closed or errored the joined topic.
    TopicClosed,
    /// The socket failed while open.
    Socket,
}

/// Error passed to `on_error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelError {
    pub kind: ChannelErrorKind,
    pub topic: Option<String>,
    pub message: String,
}

impl ChannelError {
    pub fn new(kind: ChannelErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            topic: None,
            message: message.into(),
        }
    }

    pub fn on_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub(crate) fn from_error(kind: ChannelErrorKind, err: &PanelLinkError) -> Self {
        let kind = match err {
            PanelLinkError::AuthenticationError(_) => ChannelErrorKind::Unauthorized,
            PanelLinkError::JoinRejected { .. } => ChannelErrorKind::JoinRejected,
            _ => kind,
        };
        Self::new(kind, err.to_string())
    }

    /// `false` when retrying with the same credentials cannot help.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self.kind,
            ChannelErrorKind::JoinRejected | ChannelErrorKind::Unauthorized
        )
    }
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.topic {
            Some(topic) => write!(f, "{}: {}", topic, self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Direction of a raw frame passed to `on_frame`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDirection {
    Inbound,
    Outbound,
}

type ConnectHook = Arc<dyn Fn() + Send + Sync>;
type DisconnectHook = Arc<dyn Fn(&DisconnectReason) + Send + Sync>;
type ErrorHook = Arc<dyn Fn(&ChannelError) + Send + Sync>;
type StateHook = Arc<dyn Fn(TopicState, TopicState) + Send + Sync>;
type CountsHook = Arc<dyn Fn(&CountsSnapshot) + Send + Sync>;
type FrameHook = Arc<dyn Fn(FrameDirection, &str) + Send + Sync>;

/// Optional channel observers. Cheap to clone.
#[derive(Clone, Default)]
pub struct ChannelEventHandlers {
    connect: Option<ConnectHook>,
    disconnect: Option<DisconnectHook>,
    error: Option<ErrorHook>,
    state_change: Option<StateHook>,
    counts: Option<CountsHook>,
    frame: Option<FrameHook>,
}

impl fmt::Debug for ChannelEventHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registered: Vec<&str> = [
            ("connect", self.connect.is_some()),
            ("disconnect", self.disconnect.is_some()),
            ("error", self.error.is_some()),
            ("state_change", self.state_change.is_some()),
            ("counts", self.counts.is_some()),
            ("frame", self.frame.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, set)| set.then_some(name))
        .collect();
        f.debug_struct("ChannelEventHandlers")
            .field("registered", &registered)
            .finish()
    }
}

impl ChannelEventHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Socket opened.
    pub fn on_connect(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.connect = Some(Arc::new(f));
        self
    }

    /// Topic left or socket gone.
    pub fn on_disconnect(mut self, f: impl Fn(&DisconnectReason) + Send + Sync + 'static) -> Self {
        self.disconnect = Some(Arc::new(f));
        self
    }

    pub fn on_error(mut self, f: impl Fn(&ChannelError) + Send + Sync + 'static) -> Self {
        self.error = Some(Arc::new(f));
        self
    }

    /// Topic state transitions, as `(from, to)`.
    pub fn on_state_change(
        mut self,
        f: impl Fn(TopicState, TopicState) + Send + Sync + 'static,
    ) -> Self {
        self.state_change = Some(Arc::new(f));
        self
    }

    /// Every `update_counts` snapshot, after it replaced the previous one.
    pub fn on_counts(mut self, f: impl Fn(&CountsSnapshot) + Send + Sync + 'static) -> Self {
        self.counts = Some(Arc::new(f));
        self
    }

    /// Raw text frames, for tracing.
    pub fn on_frame(mut self, f: impl Fn(FrameDirection, &str) + Send + Sync + 'static) -> Self {
        self.frame = Some(Arc::new(f));
        self
    }

    pub(crate) fn connected(&self) {
        if let Some(hook) = &self.connect {
            hook();
        }
    }

    pub(crate) fn disconnected(&self, reason: &DisconnectReason) {
        if let Some(hook) = &self.disconnect {
            hook(reason);
        }
    }

    pub(crate) fn failed(&self, error: &ChannelError) {
        if let Some(hook) = &self.error {
            hook(error);
        }
    }

    pub(crate) fn state_changed(&self, from: TopicState, to: TopicState) {
        if let Some(hook) = &self.state_change {
            hook(from, to);
        }
    }

    pub(crate) fn counts_updated(&self, counts: &CountsSnapshot) {
        if let Some(hook) = &self.counts {
            hook(counts);
        }
    }

    pub(crate) fn frame(&self, direction: FrameDirection, raw: &str) {
        if let Some(hook) = &self.frame {
            hook(direction, raw);
        }
    }
}
