//! Push-channel transport abstraction.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::DomainError;
use crate::event::{OutboundMessage, PushEnvelope};

/// An open push channel.
///
/// The channel is considered lost as soon as `inbound` yields `None`.
#[derive(Debug)]
pub struct PushChannel {
    /// Frames from the service.
    pub inbound: mpsc::Receiver<PushEnvelope>,
    /// Frames to the service.
    pub outbound: mpsc::Sender<OutboundMessage>,
}

/// Opens push channels to the session service.
#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Attempts to open a fresh channel.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Transient` when the service cannot be reached.
    async fn open(&self) -> Result<PushChannel, DomainError>;
}
