//! Local participant identity persistence.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// What a participant remembers across process restarts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantIdentity {
    /// Participant id most recently issued by the service.
    #[serde(default)]
    pub participant_id: Option<Uuid>,
    /// Last confirmed display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Session the participant is currently writing in.
    #[serde(default)]
    pub current_session_id: Option<Uuid>,
}

/// Durable storage for a [`ParticipantIdentity`].
pub trait IdentityStore: Send + Sync {
    /// Loads the stored identity, or the default when nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if storage cannot be read.
    fn load(&self) -> Result<ParticipantIdentity, DomainError>;

    /// Replaces the stored identity.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if storage cannot be written.
    fn save(&self, identity: &ParticipantIdentity) -> Result<(), DomainError>;

    /// Removes everything stored.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if storage cannot be written.
    fn clear(&self) -> Result<(), DomainError>;

    /// Loads, applies `change`, and saves.
    ///
    /// # Errors
    ///
    /// Propagates `load` and `save` failures.
    fn update(&self, change: &dyn Fn(&mut ParticipantIdentity)) -> Result<(), DomainError> {
        let mut identity = self.load()?;
        change(&mut identity);
        self.save(&identity)
    }
}
