//! Scripted push transport.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use oneword_core::error::DomainError;
use oneword_core::event::{OutboundMessage, PushEnvelope};
use oneword_core::transport::{PushChannel, PushTransport};
use tokio::sync::mpsc;

#[derive(Debug)]
struct ServerEnd {
    to_client: Option<mpsc::Sender<PushEnvelope>>,
    from_client: mpsc::Receiver<OutboundMessage>,
}

#[derive(Debug)]
struct Inner {
    script: VecDeque<bool>,
    accept_by_default: bool,
    open_calls: u32,
    connections: Vec<ServerEnd>,
}

/// A transport whose `open` results follow a script.
///
/// Each scripted `true` accepts one `open` call and `false` refuses it; once
/// the script runs out the default applies. The test keeps the server end
/// of every accepted channel so it can push frames, drop the connection, or
/// read what the client sent.
#[derive(Debug)]
pub struct ScriptedTransport {
    inner: Mutex<Inner>,
}

impl ScriptedTransport {
    fn with_default(accept_by_default: bool) -> Self {
        Self {
            inner: Mutex::new(Inner {
                script: VecDeque::new(),
                accept_by_default,
                open_calls: 0,
                connections: Vec::new(),
            }),
        }
    }

    /// Accepts every `open` call.
    #[must_use]
    pub fn accepting() -> Self {
        Self::with_default(true)
    }

    /// Refuses every `open` call.
    #[must_use]
    pub fn refusing() -> Self {
        Self::with_default(false)
    }

    /// Queues explicit results for the next `open` calls.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn then(self, outcomes: &[bool]) -> Self {
        self.inner.lock().unwrap().script.extend(outcomes);
        self
    }

    /// Changes the result used once the script is exhausted.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn set_accepting(&self, accept: bool) {
        self.inner.lock().unwrap().accept_by_default = accept;
    }

    /// Number of `open` calls so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn open_calls(&self) -> u32 {
        self.inner.lock().unwrap().open_calls
    }

    /// Pushes a frame down the most recently opened channel. Returns `false`
    /// if there is no live channel.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn push(&self, envelope: PushEnvelope) -> bool {
        let inner = self.inner.lock().unwrap();
        inner
            .connections
            .last()
            .and_then(|c| c.to_client.as_ref())
            .is_some_and(|tx| tx.try_send(envelope).is_ok())
    }

    /// Drops the server side of the most recent channel, which the client
    /// observes as an unexpected close.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn drop_connection(&self) {
        if let Some(conn) = self.inner.lock().unwrap().connections.last_mut() {
            conn.to_client = None;
        }
    }

    /// Drains everything clients have sent on any channel.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn sent(&self) -> Vec<OutboundMessage> {
        let mut inner = self.inner.lock().unwrap();
        let mut out = Vec::new();
        for conn in &mut inner.connections {
            while let Ok(message) = conn.from_client.try_recv() {
                out.push(message);
            }
        }
        out
    }
}

#[async_trait]
impl PushTransport for ScriptedTransport {
    async fn open(&self) -> Result<PushChannel, DomainError> {
        let mut inner = self.inner.lock().unwrap();
        inner.open_calls += 1;
        let accept = inner
            .script
            .pop_front()
            .unwrap_or(inner.accept_by_default);
        if !accept {
            return Err(DomainError::Transient("connection refused".into()));
        }
        let (to_client, inbound) = mpsc::channel(64);
        let (outbound, from_client) = mpsc::channel(64);
        inner.connections.push(ServerEnd {
            to_client: Some(to_client),
            from_client,
        });
        Ok(PushChannel { inbound, outbound })
    }
}
