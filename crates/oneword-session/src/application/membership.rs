//! Membership manager.
//!
//! Tracks who the local participant is: the participant id issued by the
//! service, the display name, and whether that name is confirmed as an
//! author of the current session. Persists what it learns through the
//! [`IdentityStore`] it is constructed with.

use std::sync::Arc;

use oneword_core::command::{JoinSession, LeaveSession, SetSessionState};
use oneword_core::error::DomainError;
use oneword_core::identity::IdentityStore;
use oneword_core::model::{Session, SessionState};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::validation::validate_name;
use crate::domain::views::{self, MIN_AUTHORS};

/// Why the local participant must pick a name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PromptReason {
    /// Not an author of this session yet.
    NotJoined,
    /// The confirmed name is no longer among the authors.
    Evicted,
    /// Another participant now holds the confirmed name.
    Clash,
}

/// Request to ask the user for a display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamePrompt {
    /// Why the prompt is raised.
    pub reason: PromptReason,
    /// Name to pre-fill, from the last confirmed identity.
    pub suggested: Option<String>,
}

/// Join, leave and creator-privilege checks for the local participant.
pub struct MembershipManager {
    identity: Arc<dyn IdentityStore>,
    participant_id: Option<Uuid>,
    local_name: Option<String>,
    joined_as: Option<Uuid>,
    confirmed: bool,
    prompt_outstanding: bool,
}

impl std::fmt::Debug for MembershipManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MembershipManager")
            .field("participant_id", &self.participant_id)
            .field("local_name", &self.local_name)
            .field("confirmed", &self.confirmed)
            .finish_non_exhaustive()
    }
}

impl MembershipManager {
    /// Loads the remembered identity. The remembered name only pre-fills
    /// prompts; it is not confirmed until a join succeeds.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the identity cannot be read.
    pub fn new(identity: Arc<dyn IdentityStore>) -> Result<Self, DomainError> {
        let stored = identity.load()?;
        Ok(Self {
            identity,
            participant_id: stored.participant_id,
            local_name: stored.name,
            joined_as: None,
            confirmed: false,
            prompt_outstanding: false,
        })
    }

    /// The participant id to join with, if one has been issued.
    #[must_use]
    pub fn participant_id(&self) -> Option<Uuid> {
        self.participant_id
    }

    /// The local display name, confirmed or remembered.
    #[must_use]
    pub fn local_name(&self) -> Option<&str> {
        self.local_name.as_deref()
    }

    /// The local name if it is confirmed as an author of the session.
    #[must_use]
    pub fn confirmed_name(&self) -> Option<&str> {
        self.local_name.as_deref().filter(|_| self.confirmed)
    }

    /// Whether the local name is confirmed.
    #[must_use]
    pub fn is_confirmed(&self) -> bool {
        self.confirmed
    }

    /// Whether the local author created `session`.
    #[must_use]
    pub fn is_creator(&self, session: &Session) -> bool {
        self.confirmed_name()
            .is_some_and(|name| views::creator_name(session) == Some(name))
    }

    /// Checks a join request locally and builds the command.
    ///
    /// # Errors
    ///
    /// - `Validation` if the name length is outside 1..=10 characters.
    /// - `NameClash` if an author already uses the name.
    /// - `InvalidState` if the session is completed.
    /// - `IdentityUnavailable` if no participant id has been issued.
    pub fn validate_join(&self, session: &Session, name: &str) -> Result<JoinSession, DomainError> {
        validate_name(name)?;
        if session.author_named(name).is_some() {
            return Err(DomainError::NameClash(name.to_owned()));
        }
        if !views::is_joinable(session) {
            return Err(DomainError::InvalidState(session.state));
        }
        let participant_id = self.participant_id.ok_or(DomainError::IdentityUnavailable)?;
        Ok(JoinSession {
            correlation_id: Uuid::new_v4(),
            session_id: session.id,
            participant_id,
            name: name.to_owned(),
        })
    }

    /// Records a successful join and persists it for recovery.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the identity cannot be saved.
    /// The join is still recorded in memory.
    pub fn confirm_join(&mut self, command: &JoinSession) -> Result<(), DomainError> {
        info!(
            session_id = %command.session_id,
            name = %command.name,
            "joined session"
        );
        self.local_name = Some(command.name.clone());
        self.joined_as = Some(command.participant_id);
        self.confirmed = true;
        self.prompt_outstanding = false;
        self.identity.update(&|identity| {
            identity.name = Some(command.name.clone());
            identity.current_session_id = Some(command.session_id);
        })
    }

    /// The leave command for the confirmed author, if any.
    #[must_use]
    pub fn leave_command(&self, session_id: Uuid) -> Option<LeaveSession> {
        self.confirmed_name().map(|name| LeaveSession {
            correlation_id: Uuid::new_v4(),
            session_id,
            author_name: name.to_owned(),
        })
    }

    /// Forgets the current session locally. Called whether or not the
    /// leave command succeeded.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the identity cannot be saved.
    pub fn complete_leave(&mut self) -> Result<(), DomainError> {
        self.confirmed = false;
        self.joined_as = None;
        self.prompt_outstanding = false;
        self.forget_session()
    }

    /// Drops the stored session id, keeping the name.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the identity cannot be saved.
    pub fn forget_session(&self) -> Result<(), DomainError> {
        self.identity.update(&|identity| identity.current_session_id = None)
    }

    /// Starts the story.
    ///
    /// # Errors
    ///
    /// - `NotCreator` unless the local author created the session.
    /// - `InvalidState` unless the session is awaiting authors.
    /// - `NotEnoughAuthors` with fewer than two authors.
    pub fn begin_command(&self, session: &Session) -> Result<SetSessionState, DomainError> {
        if !self.is_creator(session) {
            return Err(DomainError::NotCreator);
        }
        if session.state != SessionState::AwaitingAuthors {
            return Err(DomainError::InvalidState(session.state));
        }
        if session.authors.len() < MIN_AUTHORS {
            return Err(DomainError::NotEnoughAuthors {
                required: MIN_AUTHORS,
                found: session.authors.len(),
            });
        }
        Ok(SetSessionState {
            correlation_id: Uuid::new_v4(),
            session_id: session.id,
            state: SessionState::InProgress,
        })
    }

    /// The push channel dropped. The issued id can no longer be trusted.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the identity cannot be saved.
    pub fn invalidate_identity(&mut self) -> Result<(), DomainError> {
        if self.participant_id.take().is_some() {
            warn!("participant identity invalidated by connection loss");
        }
        self.identity.update(&|identity| identity.participant_id = None)
    }

    /// The service issued a participant id.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the identity cannot be saved.
    pub fn reissue_identity(&mut self, participant_id: Uuid) -> Result<(), DomainError> {
        info!(%participant_id, "participant identity issued");
        self.participant_id = Some(participant_id);
        self.identity
            .update(&|identity| identity.participant_id = Some(participant_id))
    }

    /// Checks the local identity against a fresh snapshot.
    ///
    /// Returns a prompt when the user must (re)enter a name: not joined
    /// yet, evicted while disconnected, or the confirmed name now belongs
    /// to a different participant. A prompt is raised at most once until
    /// the next successful join. Completed sessions never prompt.
    pub fn reconcile(&mut self, session: &Session) -> Option<NamePrompt> {
        if !views::is_joinable(session) {
            return None;
        }
        let reason = if self.confirmed {
            let name = self.local_name.as_deref()?;
            match session.author_named(name) {
                None => PromptReason::Evicted,
                Some(author) if self.joined_as.is_some_and(|id| id != author.id) => {
                    PromptReason::Clash
                }
                Some(_) => return None,
            }
        } else {
            PromptReason::NotJoined
        };

        if reason != PromptReason::NotJoined {
            warn!(session_id = %session.id, ?reason, "local author no longer confirmed");
            self.confirmed = false;
            self.joined_as = None;
        }
        if self.prompt_outstanding {
            return None;
        }
        self.prompt_outstanding = true;
        Some(NamePrompt {
            reason,
            suggested: self.local_name.clone(),
        })
    }
}
