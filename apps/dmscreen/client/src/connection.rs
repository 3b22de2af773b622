use std::time::Duration;

/// Delay between reconnect attempts unless configured otherwise.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(3000);

/// Lifecycle of the single relay connection a client keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Things that happen to the underlying transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// A connection attempt starts.
    Dial,
    /// The transport finished its handshake.
    Opened,
    /// The attempt failed before opening.
    Failed,
    /// An open (or opening) transport went away.
    Closed,
}

impl ConnectionState {
    /// Applies one transport event. Events that make no sense in the current
    /// state leave it unchanged.
    pub fn on(self, event: LinkEvent) -> ConnectionState {
        use ConnectionState::*;
        match (self, event) {
            (Disconnected, LinkEvent::Dial) => Connecting,
            (Connecting, LinkEvent::Opened) => Connected,
            (Connecting, LinkEvent::Failed | LinkEvent::Closed) => Disconnected,
            (Connected, LinkEvent::Closed | LinkEvent::Failed) => Disconnected,
            (state, _) => state,
        }
    }

    pub fn is_connected(self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

/// Retry schedule after the transport drops: the same delay every time, for
/// as many attempts as it takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    delay: Duration,
}

impl ReconnectPolicy {
    pub fn fixed(delay: Duration) -> Self {
        Self { delay }
    }

    /// Wait before dialing again after `failures` consecutive failed or
    /// closed connections. The count is informational only.
    pub fn delay_after(&self, _failures: u64) -> Duration {
        self.delay
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::fixed(DEFAULT_RECONNECT_DELAY)
    }
}
