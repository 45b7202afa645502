//! Connection manager.
//!
//! A single driver task owns the push channel. It opens the channel, pumps
//! frames to the registered consumer, and on unexpected close retries at a
//! fixed interval until it succeeds or runs out of attempts. Each `connect`
//! or `disconnect` starts a new epoch; a driver from an older epoch stops
//! touching shared state as soon as it notices.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use oneword_core::error::DomainError;
use oneword_core::event::{OutboundMessage, PushEnvelope};
use oneword_core::transport::{PushChannel, PushTransport};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info, warn};

use crate::domain::state::{ConnectionSignal, ConnectionState, ConnectionStatus, ReconnectPolicy};

#[derive(Debug, Default)]
struct Shared {
    state: ConnectionState,
    attempts: u32,
    epoch: u64,
    driving: bool,
    driver: Option<JoinHandle<()>>,
    outbound: Option<mpsc::Sender<OutboundMessage>>,
    sink: Option<mpsc::UnboundedSender<ConnectionSignal>>,
}

impl Shared {
    fn emit(&self, signal: ConnectionSignal) {
        if let Some(sink) = &self.sink
            && sink.send(signal).is_err()
        {
            debug!("connection consumer has gone away");
        }
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            self.state = state;
            self.emit(ConnectionSignal::StateChanged(state));
        }
    }
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns the push channel to the session service.
pub struct ConnectionManager {
    transport: Arc<dyn PushTransport>,
    policy: ReconnectPolicy,
    shared: Arc<Mutex<Shared>>,
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("policy", &self.policy)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl ConnectionManager {
    /// Create a closed manager.
    #[must_use]
    pub fn new(transport: Arc<dyn PushTransport>, policy: ReconnectPolicy) -> Self {
        Self {
            transport,
            policy,
            shared: Arc::new(Mutex::new(Shared::default())),
        }
    }

    /// Registers the single consumer of connection signals, replacing any
    /// previous one.
    pub fn on_message(&self, sink: mpsc::UnboundedSender<ConnectionSignal>) {
        lock(&self.shared).sink = Some(sink);
    }

    /// Current state of the channel.
    #[must_use]
    pub fn current_state(&self) -> ConnectionState {
        lock(&self.shared).state
    }

    /// State plus failed attempts in the current cycle.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        let shared = lock(&self.shared);
        ConnectionStatus {
            state: shared.state,
            attempts: shared.attempts,
        }
    }

    /// Opens the channel, starting a fresh cycle of attempts.
    ///
    /// Does nothing while a driver is already connecting, open or
    /// retrying. Must be called from within a tokio runtime.
    pub fn connect(&self) {
        let mut shared = lock(&self.shared);
        if shared.driving {
            debug!(epoch = shared.epoch, "connect ignored; driver already running");
            return;
        }
        if let Some(old) = shared.driver.take() {
            old.abort();
        }
        shared.epoch += 1;
        shared.attempts = 0;
        shared.driving = true;
        let driver = Driver {
            transport: Arc::clone(&self.transport),
            policy: self.policy,
            shared: Arc::clone(&self.shared),
            epoch: shared.epoch,
        };
        info!(epoch = shared.epoch, "connecting push channel");
        shared.driver = Some(tokio::spawn(driver.run()));
    }

    /// Closes the channel and stops any retrying.
    pub fn disconnect(&self) {
        let mut shared = lock(&self.shared);
        shared.epoch += 1;
        shared.driving = false;
        shared.outbound = None;
        if let Some(driver) = shared.driver.take() {
            driver.abort();
        }
        shared.set_state(ConnectionState::Closed);
    }

    /// Sends a best-effort broadcast.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Transient` if the channel is not open or its
    /// buffer is full.
    pub fn send(&self, message: OutboundMessage) -> Result<(), DomainError> {
        let outbound = {
            let shared = lock(&self.shared);
            match (&shared.outbound, shared.state) {
                (Some(outbound), ConnectionState::Open) => outbound.clone(),
                _ => return Err(DomainError::Transient("push channel is not open".into())),
            }
        };
        outbound
            .try_send(message)
            .map_err(|e| DomainError::Transient(format!("push channel send failed: {e}")))
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(driver) = lock(&self.shared).driver.take() {
            driver.abort();
        }
    }
}

struct Driver {
    transport: Arc<dyn PushTransport>,
    policy: ReconnectPolicy,
    shared: Arc<Mutex<Shared>>,
    epoch: u64,
}

impl Driver {
    /// Runs `f` against shared state if this driver is still current.
    fn with_current<R>(&self, f: impl FnOnce(&mut Shared) -> R) -> Option<R> {
        let mut shared = lock(&self.shared);
        (shared.epoch == self.epoch).then(|| f(&mut shared))
    }

    async fn run(self) {
        let mut after_loss = false;
        loop {
            let Some(inbound) = self.establish(after_loss).await else {
                return;
            };
            self.pump(inbound).await;
            let still_current = self.with_current(|s| {
                s.outbound = None;
                s.emit(ConnectionSignal::Lost);
                s.set_state(ConnectionState::Connecting);
            });
            if still_current.is_none() {
                return;
            }
            warn!(epoch = self.epoch, "push channel lost; reconnecting");
            after_loss = true;
        }
    }

    async fn establish(&self, after_loss: bool) -> Option<mpsc::Receiver<PushEnvelope>> {
        self.with_current(|s| {
            s.attempts = 0;
            s.set_state(ConnectionState::Connecting);
        })?;

        for attempt in 1..=self.policy.max_attempts {
            if attempt > 1 || after_loss {
                time::sleep(self.policy.polling_interval).await;
            }
            self.with_current(|_| ())?;

            match self.transport.open().await {
                Ok(PushChannel { inbound, outbound }) => {
                    self.with_current(|s| {
                        s.attempts = 0;
                        s.outbound = Some(outbound);
                        s.set_state(ConnectionState::Open);
                    })?;
                    info!(epoch = self.epoch, attempt, "push channel open");
                    return Some(inbound);
                }
                Err(err) => {
                    warn!(
                        epoch = self.epoch,
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        error = %err,
                        "connection attempt failed"
                    );
                    self.with_current(|s| s.attempts = attempt)?;
                }
            }
        }

        warn!(
            epoch = self.epoch,
            attempts = self.policy.max_attempts,
            "giving up on push channel"
        );
        self.with_current(|s| {
            s.driving = false;
            s.set_state(ConnectionState::Closed);
            s.emit(ConnectionSignal::UnableToConnect {
                attempts: self.policy.max_attempts,
            });
        });
        None
    }

    async fn pump(&self, mut inbound: mpsc::Receiver<PushEnvelope>) {
        while let Some(envelope) = inbound.recv().await {
            debug!(event = envelope.event.kind(), "push frame received");
            if self
                .with_current(|s| s.emit(ConnectionSignal::Push(envelope)))
                .is_none()
            {
                return;
            }
        }
    }
}
