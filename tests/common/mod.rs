//! In-memory fakes shared by the integration tests.
//!
//! `FakeTransport` answers joins with a scripted reply and pings with
//! `ok` or `error`, can leave either unanswered, and lets a test inject
//! server pushes. `FakeSource`
//! serves grid pages after a per-page delay so tests can race fetches on
//! a paused clock.

#![allow(dead_code)]

use async_trait::async_trait;
use panel_link::{
    ChannelTransport, GridDataSource, GridResult, PanelLinkError, PhxMessage, QueryDescription,
    Record, RecordForm, Reply, Result, SaveResponse, TransportConnector,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

// ── channel fakes ─────────────────────────────────────────────────────────────

pub struct FakeTransport {
    pub joins: AtomicUsize,
    pub leaves: AtomicUsize,
    pub pings: AtomicUsize,
    pub closed: AtomicBool,
    join_reply: Mutex<Reply>,
    ping_ok: AtomicBool,
    silent_joins: AtomicBool,
    silent_pings: AtomicBool,
    events: broadcast::Sender<PhxMessage>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            joins: AtomicUsize::new(0),
            leaves: AtomicUsize::new(0),
            pings: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            join_reply: Mutex::new(Reply::ok(json!({}))),
            ping_ok: AtomicBool::new(true),
            silent_joins: AtomicBool::new(false),
            silent_pings: AtomicBool::new(false),
            events,
        })
    }

    pub fn reject_joins(&self, reason: &str) {
        *self.join_reply.lock().unwrap() = Reply::error(json!({ "reason": reason }));
    }

    pub fn accept_joins(&self) {
        *self.join_reply.lock().unwrap() = Reply::ok(json!({}));
    }

    pub fn set_ping_ok(&self, ok: bool) {
        self.ping_ok.store(ok, Ordering::SeqCst);
    }

    /// Never reply to joins while set.
    pub fn set_silent_joins(&self, silent: bool) {
        self.silent_joins.store(silent, Ordering::SeqCst);
    }

    /// Never reply to pings while set.
    pub fn set_silent_pings(&self, silent: bool) {
        self.silent_pings.store(silent, Ordering::SeqCst);
    }

    /// Deliver a server push to every subscriber.
    pub fn push_from_server(&self, topic: &str, event: &str, payload: Value) {
        let _ = self.events.send(PhxMessage::new(topic, event, payload));
    }

    pub fn join_count(&self) -> usize {
        self.joins.load(Ordering::SeqCst)
    }

    pub fn leave_count(&self) -> usize {
        self.leaves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChannelTransport for FakeTransport {
    async fn join(&self, _topic: &str, _payload: Value) -> Result<Reply> {
        self.joins.fetch_add(1, Ordering::SeqCst);
        if self.silent_joins.load(Ordering::SeqCst) {
            return std::future::pending().await;
        }
        Ok(self.join_reply.lock().unwrap().clone())
    }

    async fn leave(&self, _topic: &str) -> Result<()> {
        self.leaves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn push(&self, _topic: &str, event: &str, _payload: Value) -> Result<Reply> {
        if event == "ping" {
            self.pings.fetch_add(1, Ordering::SeqCst);
            if self.silent_pings.load(Ordering::SeqCst) {
                return std::future::pending().await;
            }
            if self.ping_ok.load(Ordering::SeqCst) {
                return Ok(Reply::ok(json!({})));
            }
            return Ok(Reply::error(json!({ "reason": "unmatched topic" })));
        }
        Ok(Reply::ok(Value::Null))
    }

    fn subscribe(&self) -> broadcast::Receiver<PhxMessage> {
        self.events.subscribe()
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

pub struct FakeConnector {
    pub transport: Arc<FakeTransport>,
    pub connects: AtomicUsize,
    pub refuse: AtomicBool,
}

impl FakeConnector {
    pub fn new(transport: Arc<FakeTransport>) -> Arc<Self> {
        Arc::new(Self {
            transport,
            connects: AtomicUsize::new(0),
            refuse: AtomicBool::new(false),
        })
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransportConnector for FakeConnector {
    async fn connect(&self) -> Result<Arc<dyn ChannelTransport>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.refuse.load(Ordering::SeqCst) {
            return Err(PanelLinkError::WebSocketError("connection refused".to_string()));
        }
        Ok(Arc::clone(&self.transport) as Arc<dyn ChannelTransport>)
    }
}

// ── grid fakes ────────────────────────────────────────────────────────────────

pub fn record(value: Value) -> Record {
    value.as_object().cloned().unwrap_or_default()
}

/// Serves `total` rows split into pages; page N answers after `delays[N]`.
pub struct FakeSource {
    pub total: u64,
    pub delays: HashMap<u32, Duration>,
    pub queries: Mutex<Vec<QueryDescription>>,
    pub deletes: Mutex<Vec<String>>,
    pub saves: Mutex<Vec<RecordForm>>,
    pub fail: AtomicBool,
}

impl FakeSource {
    pub fn new(total: u64) -> Arc<Self> {
        Self::with_delays(total, HashMap::new())
    }

    pub fn with_delays(total: u64, delays: HashMap<u32, Duration>) -> Arc<Self> {
        Arc::new(Self {
            total,
            delays,
            queries: Mutex::new(Vec::new()),
            deletes: Mutex::new(Vec::new()),
            saves: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        })
    }

    pub fn last_query(&self) -> Option<QueryDescription> {
        self.queries.lock().unwrap().last().cloned()
    }

    pub fn fetch_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }
}

#[async_trait]
impl GridDataSource for FakeSource {
    async fn fetch_grid(&self, query: &QueryDescription) -> Result<GridResult> {
        self.queries.lock().unwrap().push(query.clone());
        let page = query.pagination.page_number;
        if let Some(delay) = self.delays.get(&page) {
            tokio::time::sleep(*delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(PanelLinkError::NetworkError("connection reset".to_string()));
        }
        let size = u64::from(query.pagination.page_size);
        let start = query.pagination.start();
        let records = (start..(start + size).min(self.total))
            .map(|i| record(json!({ "id": i + 1, "name": format!("device-{}", i + 1), "page": page })))
            .collect();
        Ok(GridResult::new(records, self.total))
    }

    async fn delete_record(&self, _model: &str, id: &str) -> Result<()> {
        self.deletes.lock().unwrap().push(id.to_string());
        Ok(())
    }

    async fn save_record(&self, _model: &str, form: &RecordForm) -> Result<SaveResponse> {
        self.saves.lock().unwrap().push(form.clone());
        Ok(SaveResponse {
            status_code: 200,
            body: json!({ "ok": true }),
        })
    }
}
