//! Timeout configuration for panel-link operations.
//!
//! Centralizes every fixed delay the client uses: HTTP connect/receive,
//! channel join debounce and acknowledgment, and both heartbeat loops.
//! None of these are computed at runtime and none back off.

use std::time::Duration;

/// Timeout configuration for panel-link operations.
///
/// # Examples
///
/// ```rust
/// use panel_link::PanelLinkTimeouts;
/// use std::time::Duration;
///
/// // Defaults: 2s join debounce, 30s ping interval
/// let timeouts = PanelLinkTimeouts::default();
///
/// // Slower backend, longer heartbeat window
/// let timeouts = PanelLinkTimeouts::builder()
///     .heartbeat_interval(Duration::from_secs(45))
///     .heartbeat_timeout(Duration::from_secs(15))
///     .build();
///
/// // Short delays for a backend on localhost
/// let timeouts = PanelLinkTimeouts::fast();
/// ```
#[derive(Debug, Clone)]
pub struct PanelLinkTimeouts {
    /// Bound on opening a connection, for both the HTTP pool and the socket.
    /// Default: 10 seconds
    pub connection_timeout: Duration,

    /// Timeout for receiving an HTTP response after a request is sent.
    /// Default: 30 seconds
    pub receive_timeout: Duration,

    /// Delay between the first subscriber asking for a topic and the join
    /// being sent. Subscribers arriving inside this window share the join.
    /// Default: 2 seconds
    pub join_debounce: Duration,

    /// Maximum wait for the `phx_reply` to a topic join.
    /// Default: 10 seconds
    pub join_timeout: Duration,

    /// Interval between channel-level `ping` probes on a joined topic.
    /// Keep this below the server's own idle timeout (60s for Phoenix).
    /// Set to 0 to disable the liveness monitor.
    /// Default: 30 seconds
    pub heartbeat_interval: Duration,

    /// Maximum wait for the reply to a `ping` probe.
    /// Default: 10 seconds
    pub heartbeat_timeout: Duration,

    /// Interval of the socket-level `phoenix`/`heartbeat` frames.
    /// Set to 0 to disable.
    /// Default: 30 seconds
    pub socket_heartbeat_interval: Duration,
}

impl Default for PanelLinkTimeouts {
    fn default() -> Self {
        Self {
            connection_timeout: Duration::from_secs(10),
            receive_timeout: Duration::from_secs(30),
            join_debounce: Duration::from_secs(2),
            join_timeout: Duration::from_secs(10),
            heartbeat_interval: Duration::from_secs(30),
            heartbeat_timeout: Duration::from_secs(10),
            socket_heartbeat_interval: Duration::from_secs(30),
        }
    }
}

impl PanelLinkTimeouts {
    /// Start from the defaults and override selected values.
    pub fn builder() -> PanelLinkTimeoutsBuilder {
        PanelLinkTimeoutsBuilder::new()
    }

    /// Short delays for a backend on localhost.
    pub fn fast() -> Self {
        Self {
            connection_timeout: Duration::from_secs(2),
            receive_timeout: Duration::from_secs(5),
            join_debounce: Duration::from_millis(250),
            join_timeout: Duration::from_secs(2),
            heartbeat_interval: Duration::from_secs(10),
            heartbeat_timeout: Duration::from_secs(3),
            socket_heartbeat_interval: Duration::from_secs(10),
        }
    }

    /// Create timeouts for high-latency or unreliable networks.
    pub fn relaxed() -> Self {
        Self {
            connection_timeout: Duration::from_secs(30),
            receive_timeout: Duration::from_secs(120),
            join_debounce: Duration::from_secs(3),
            join_timeout: Duration::from_secs(30),
            heartbeat_interval: Duration::from_secs(45),
            heartbeat_timeout: Duration::from_secs(15),
            socket_heartbeat_interval: Duration::from_secs(45),
        }
    }

    /// Create timeouts for tests driven by a paused tokio clock.
    pub fn for_testing(join_debounce_ms: u64) -> Self {
        Self {
            connection_timeout: Duration::from_secs(1),
            receive_timeout: Duration::from_secs(1),
            join_debounce: Duration::from_millis(join_debounce_ms),
            join_timeout: Duration::from_secs(1),
            heartbeat_interval: Duration::from_secs(5),
            heartbeat_timeout: Duration::from_secs(1),
            socket_heartbeat_interval: Duration::ZERO,
        }
    }

    /// Zero, or longer than a year, means "wait forever".
    pub fn is_no_timeout(duration: Duration) -> bool {
        const YEAR: Duration = Duration::from_secs(365 * 24 * 3600);
        duration.is_zero() || duration > YEAR
    }
}

/// Builder for creating custom [`PanelLinkTimeouts`] configurations.
#[derive(Debug, Clone)]
pub struct PanelLinkTimeoutsBuilder {
    timeouts: PanelLinkTimeouts,
}

impl PanelLinkTimeoutsBuilder {
    fn new() -> Self {
        Self {
            timeouts: PanelLinkTimeouts::default(),
        }
    }

    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.connection_timeout = timeout;
        self
    }

    /// Whole-request bound for data API calls.
    pub fn receive_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.receive_timeout = timeout;
        self
    }

    /// Set the topic join debounce window.
    pub fn join_debounce(mut self, delay: Duration) -> Self {
        self.timeouts.join_debounce = delay;
        self
    }

    /// Set the topic join debounce window in milliseconds.
    pub fn join_debounce_ms(self, ms: u64) -> Self {
        self.join_debounce(Duration::from_millis(ms))
    }

    /// Set the join acknowledgment timeout.
    pub fn join_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.join_timeout = timeout;
        self
    }

    /// Set the join acknowledgment timeout in seconds.
    pub fn join_timeout_secs(self, secs: u64) -> Self {
        self.join_timeout(Duration::from_secs(secs))
    }

    /// Set the liveness probe interval.
    /// Set to 0 to disable the monitor.
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.timeouts.heartbeat_interval = interval;
        self
    }

    /// Set the liveness probe interval in seconds.
    pub fn heartbeat_interval_secs(self, secs: u64) -> Self {
        self.heartbeat_interval(Duration::from_secs(secs))
    }

    /// Set the liveness probe reply timeout.
    pub fn heartbeat_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.heartbeat_timeout = timeout;
        self
    }

    /// Set the liveness probe reply timeout in seconds.
    pub fn heartbeat_timeout_secs(self, secs: u64) -> Self {
        self.heartbeat_timeout(Duration::from_secs(secs))
    }

    /// Set the socket-level heartbeat interval.
    /// Set to 0 to disable.
    pub fn socket_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.timeouts.socket_heartbeat_interval = interval;
        self
    }

    pub fn build(self) -> PanelLinkTimeouts {
        self.timeouts
    }
}
