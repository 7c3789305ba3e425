use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Latest counters pushed by the backend, keyed by counter name.
pub type CountsSnapshot = BTreeMap<String, i64>;

/// Lifecycle of one topic on the shared socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TopicState {
    /// No subscriber, or the topic was left.
    #[default]
    Idle,
    /// Join scheduled or sent, no reply yet.
    Joining,
    /// Server acknowledged the join.
    Joined,
    /// Join rejected or transport failed while joining.
    Failed,
}

impl TopicState {
    /// States in which another subscriber must not touch the network.
    pub fn is_active(self) -> bool {
        matches!(self, TopicState::Joining | TopicState::Joined)
    }
}

impl fmt::Display for TopicState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TopicState::Idle => "idle",
            TopicState::Joining => "joining",
            TopicState::Joined => "joined",
            TopicState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Parse an `update_counts` payload into a snapshot.
///
/// Non-integer values are skipped, including fractional numbers and numbers
/// outside the `i64` range. The snapshot is always the full set the server
/// sent.
fn integral(f: f64) -> Option<i64> {
    // 2^63 is exact as f64; anything at or past it overflows.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    (f.fract() == 0.0 && (-LIMIT..LIMIT).contains(&f)).then(|| f as i64)
}

pub fn counts_from_payload(payload: &serde_json::Value) -> CountsSnapshot {
    payload
        .as_object()
        .map(|obj| {
            obj.iter()
                .filter_map(|(k, v)| {
                    v.as_i64()
                        .or_else(|| v.as_f64().and_then(integral))
                        .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
                        .map(|n| (k.clone(), n))
                })
                .collect()
        })
        .unwrap_or_default()
}
