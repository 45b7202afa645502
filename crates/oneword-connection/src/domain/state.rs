//! Connection state and reconnection policy.

use std::time::Duration;

use oneword_core::event::PushEnvelope;
use serde::Serialize;

/// State of the push channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    /// Opening, or waiting to retry.
    Connecting,
    /// Open and delivering frames.
    Open,
    /// Not connected and not retrying.
    #[default]
    Closed,
}

/// Fixed-interval reconnection bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay between consecutive attempts.
    pub polling_interval: Duration,
    /// Attempts per cycle before giving up. At least 1.
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            polling_interval: Duration::from_millis(3000),
            max_attempts: 10,
        }
    }
}

/// Snapshot of the manager for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    /// Current state.
    pub state: ConnectionState,
    /// Failed attempts in the current cycle.
    pub attempts: u32,
}

/// What the manager reports to its consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionSignal {
    /// The state changed.
    StateChanged(ConnectionState),
    /// A frame arrived.
    Push(PushEnvelope),
    /// An open channel closed unexpectedly. Any identity issued on it is
    /// void.
    Lost,
    /// Reconnection gave up.
    UnableToConnect {
        /// Attempts made in the failed cycle.
        attempts: u32,
    },
}
