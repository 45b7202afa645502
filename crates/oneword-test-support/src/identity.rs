//! In-memory identity store.

use std::sync::Mutex;

use oneword_core::error::DomainError;
use oneword_core::identity::{IdentityStore, ParticipantIdentity};

/// An identity store held in memory.
#[derive(Debug, Default)]
pub struct InMemoryIdentityStore {
    identity: Mutex<ParticipantIdentity>,
}

impl InMemoryIdentityStore {
    /// Create a store pre-populated with `identity`.
    #[must_use]
    pub fn with(identity: ParticipantIdentity) -> Self {
        Self {
            identity: Mutex::new(identity),
        }
    }

    /// Returns a copy of what is currently stored.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn current(&self) -> ParticipantIdentity {
        self.identity.lock().unwrap().clone()
    }
}

impl IdentityStore for InMemoryIdentityStore {
    fn load(&self) -> Result<ParticipantIdentity, DomainError> {
        Ok(self.identity.lock().unwrap().clone())
    }

    fn save(&self, identity: &ParticipantIdentity) -> Result<(), DomainError> {
        *self.identity.lock().unwrap() = identity.clone();
        Ok(())
    }

    fn clear(&self) -> Result<(), DomainError> {
        *self.identity.lock().unwrap() = ParticipantIdentity::default();
        Ok(())
    }
}
