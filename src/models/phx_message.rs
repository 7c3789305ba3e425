//! Phoenix socket frames (serializer `vsn=2.0.0`).
//!
//! Every frame is a JSON array `[join_ref, ref, topic, event, payload]`.
//! Server pushes carry `null` refs; replies echo the `ref` of the push they
//! answer.
//!
//! ```json
//! ["1", "1", "user:sidebar", "phx_join", {}]
//! ["1", "1", "user:sidebar", "phx_reply", {"status": "ok", "response": {}}]
//! [null, null, "user:sidebar", "update_counts", {"devices": 4}]
//! ```

use crate::error::{PanelLinkError, Result};
use serde_json::Value;

pub const PHX_JOIN: &str = "phx_join";
pub const PHX_LEAVE: &str = "phx_leave";
pub const PHX_REPLY: &str = "phx_reply";
pub const PHX_ERROR: &str = "phx_error";
pub const PHX_CLOSE: &str = "phx_close";
pub const PHOENIX_TOPIC: &str = "phoenix";
pub const HEARTBEAT_EVENT: &str = "heartbeat";

#[derive(Debug, Clone, PartialEq)]
pub struct PhxMessage {
    pub join_ref: Option<String>,
    pub msg_ref: Option<String>,
    pub topic: String,
    pub event: String,
    pub payload: Value,
}

impl PhxMessage {
    pub fn new(topic: impl Into<String>, event: impl Into<String>, payload: Value) -> Self {
        Self {
            join_ref: None,
            msg_ref: None,
            topic: topic.into(),
            event: event.into(),
            payload,
        }
    }

    pub fn with_refs(mut self, join_ref: Option<String>, msg_ref: Option<String>) -> Self {
        self.join_ref = join_ref;
        self.msg_ref = msg_ref;
        self
    }

    pub fn encode(&self) -> Result<String> {
        let frame = (
            &self.join_ref,
            &self.msg_ref,
            &self.topic,
            &self.event,
            &self.payload,
        );
        serde_json::to_string(&frame).map_err(|e| {
            PanelLinkError::SerializationError(format!("Failed to encode frame: {}", e))
        })
    }

    pub fn decode(text: &str) -> Result<Self> {
        let (join_ref, msg_ref, topic, event, payload): (
            Option<String>,
            Option<String>,
            String,
            String,
            Value,
        ) = serde_json::from_str(text).map_err(|e| {
            PanelLinkError::SerializationError(format!("Invalid frame '{}': {}", text, e))
        })?;
        Ok(Self {
            join_ref,
            msg_ref,
            topic,
            event,
            payload,
        })
    }

    pub fn is_reply(&self) -> bool {
        self.event == PHX_REPLY
    }

    /// Interpret a `phx_reply` payload.
    pub fn reply(&self) -> Option<Reply> {
        if !self.is_reply() {
            return None;
        }
        let status = match self.payload.get("status").and_then(Value::as_str) {
            Some("ok") => ReplyStatus::Ok,
            Some("timeout") => ReplyStatus::Timeout,
            _ => ReplyStatus::Error,
        };
        let response = self.payload.get("response").cloned().unwrap_or(Value::Null);
        Some(Reply { status, response })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyStatus {
    Ok,
    Error,
    Timeout,
}

/// Server acknowledgment of a push.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: ReplyStatus,
    pub response: Value,
}

impl Reply {
    pub fn ok(response: Value) -> Self {
        Self {
            status: ReplyStatus::Ok,
            response,
        }
    }

    pub fn error(response: Value) -> Self {
        Self {
            status: ReplyStatus::Error,
            response,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ReplyStatus::Ok
    }

    /// Best-effort human readable reason from an error reply.
    pub fn reason(&self) -> String {
        match self.response.get("reason").and_then(Value::as_str) {
            Some(reason) => reason.to_string(),
            None => self.response.to_string(),
        }
    }
}
