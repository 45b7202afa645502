//! Test session services — `SessionService` implementations for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use oneword_core::command::{
    AppendWord, CastVote, ConcludeVote, JoinSession, LeaveSession, ProposeVote, SetSessionState,
    SkipTurn,
};
use oneword_core::error::DomainError;
use oneword_core::model::{
    Author, Ballot, Session, SessionState, StoryWord, VoteDetails, VoteOutcome, VoteType,
    VotingScheme,
};
use oneword_core::service::SessionService;
use uuid::Uuid;

#[derive(Debug)]
struct StoredSession {
    session: Session,
    creator_participant_id: Uuid,
}

#[derive(Debug, Default)]
struct Inner {
    sessions: HashMap<Uuid, StoredSession>,
    calls: Vec<&'static str>,
    fail_commands: bool,
    fail_fetches: bool,
}

/// An in-memory stand-in for the authoritative session service.
///
/// Enforces the same rules the real service does: duplicate names are
/// rejected, stale skips and repeated conclusions are no-ops, and each
/// mutation bumps `version`. Every call is recorded by type.
#[derive(Debug, Default)]
pub struct InMemorySessionService {
    inner: Mutex<Inner>,
}

fn advance_turn(session: &mut Session) {
    if session.authors.is_empty() {
        session.turn_index = 0;
    } else {
        session.turn_index = (session.turn_index + 1) % session.authors.len();
    }
}

impl InMemorySessionService {
    /// Create an empty service.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session awaiting authors. The author who later joins with
    /// `creator_participant_id` becomes the creator.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn create_session(
        &self,
        title: &str,
        creator_participant_id: Uuid,
        word_limit: u32,
        turn_time_limit_seconds: u32,
    ) -> Session {
        let session = Session {
            id: Uuid::new_v4(),
            title: title.to_owned(),
            genre: None,
            word_limit,
            turn_time_limit_seconds,
            state: SessionState::AwaitingAuthors,
            authors: Vec::new(),
            words: Vec::new(),
            turn_index: 0,
            voting_scheme: VotingScheme::Majority,
            vote_details: None,
            version: 1,
        };
        self.inner.lock().unwrap().sessions.insert(
            session.id,
            StoredSession {
                session: session.clone(),
                creator_participant_id,
            },
        );
        session
    }

    /// Seed an arbitrary session. The creator flag of its authors is kept.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn insert(&self, session: Session) {
        let creator_participant_id = session.creator().map_or_else(Uuid::new_v4, |a| a.id);
        self.inner.lock().unwrap().sessions.insert(
            session.id,
            StoredSession {
                session,
                creator_participant_id,
            },
        );
    }

    /// Remove a session so later calls report it as not found.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn delete(&self, session_id: Uuid) {
        self.inner.lock().unwrap().sessions.remove(&session_id);
    }

    /// Current authoritative copy of a session.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn snapshot(&self, session_id: Uuid) -> Option<Session> {
        self.inner
            .lock()
            .unwrap()
            .sessions
            .get(&session_id)
            .map(|s| s.session.clone())
    }

    /// Every call received, by command type (`session.fetch` for fetches).
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn calls(&self) -> Vec<&'static str> {
        self.inner.lock().unwrap().calls.clone()
    }

    /// Calls received, excluding fetches.
    #[must_use]
    pub fn command_calls(&self) -> Vec<&'static str> {
        self.calls()
            .into_iter()
            .filter(|c| *c != "session.fetch")
            .collect()
    }

    /// Make every mutating command fail with a transient error.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn set_fail_commands(&self, fail: bool) {
        self.inner.lock().unwrap().fail_commands = fail;
    }

    /// Make every fetch fail with a transient error.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn set_fail_fetches(&self, fail: bool) {
        self.inner.lock().unwrap().fail_fetches = fail;
    }

    fn mutate(
        &self,
        call: &'static str,
        session_id: Uuid,
        change: impl FnOnce(&mut StoredSession) -> Result<bool, DomainError>,
    ) -> Result<Session, DomainError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(call);
        if inner.fail_commands {
            return Err(DomainError::Transient("connection refused".into()));
        }
        let stored = inner
            .sessions
            .get_mut(&session_id)
            .ok_or(DomainError::SessionNotFound(session_id))?;
        if change(stored)? {
            stored.session.version += 1;
        }
        Ok(stored.session.clone())
    }
}

#[async_trait]
impl SessionService for InMemorySessionService {
    async fn fetch_session(&self, session_id: Uuid) -> Result<Session, DomainError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push("session.fetch");
        if inner.fail_fetches {
            return Err(DomainError::Transient("connection refused".into()));
        }
        inner
            .sessions
            .get(&session_id)
            .map(|s| s.session.clone())
            .ok_or(DomainError::SessionNotFound(session_id))
    }

    async fn join_session(&self, command: &JoinSession) -> Result<Session, DomainError> {
        self.mutate("session.join", command.session_id, |stored| {
            let session = &mut stored.session;
            if session.is_completed() {
                return Err(DomainError::InvalidState(session.state));
            }
            if session.author_named(&command.name).is_some() {
                return Err(DomainError::NameClash(command.name.clone()));
            }
            let is_creator = command.participant_id == stored.creator_participant_id
                && session.creator().is_none();
            session.authors.push(Author {
                id: command.participant_id,
                name: command.name.clone(),
                is_creator,
            });
            Ok(true)
        })
    }

    async fn leave_session(&self, command: &LeaveSession) -> Result<Session, DomainError> {
        self.mutate("session.leave", command.session_id, |stored| {
            let session = &mut stored.session;
            let Some(index) = session
                .authors
                .iter()
                .position(|a| a.name == command.author_name)
            else {
                return Err(DomainError::Rejected(format!(
                    "{} is not an author",
                    command.author_name
                )));
            };
            session.authors.remove(index);
            if index < session.turn_index {
                session.turn_index -= 1;
            }
            if session.turn_index >= session.authors.len() {
                session.turn_index = 0;
            }
            Ok(true)
        })
    }

    async fn append_word(&self, command: &AppendWord) -> Result<Session, DomainError> {
        self.mutate("session.append_word", command.session_id, |stored| {
            let session = &mut stored.session;
            if session.state != SessionState::InProgress {
                return Err(DomainError::InvalidState(session.state));
            }
            if session.vote_is_active() {
                return Err(DomainError::VoteAlreadyActive);
            }
            let current = session
                .current_turn_author()
                .map(|a| a.name.clone())
                .unwrap_or_default();
            if current != command.author_name {
                return Err(DomainError::NotYourTurn {
                    attempted: command.author_name.clone(),
                    current,
                });
            }
            session.words.push(StoryWord {
                author_name: command.author_name.clone(),
                word: command.word.clone(),
            });
            advance_turn(session);
            if session.word_limit_reached() {
                session.state = SessionState::Completed;
            }
            Ok(true)
        })
    }

    async fn skip_turn(&self, command: &SkipTurn) -> Result<Session, DomainError> {
        self.mutate("session.skip_turn", command.session_id, |stored| {
            let session = &mut stored.session;
            let still_current = session
                .current_turn_author()
                .is_some_and(|a| a.name == command.author_name);
            if session.state != SessionState::InProgress || !still_current {
                return Ok(false);
            }
            advance_turn(session);
            Ok(true)
        })
    }

    async fn set_session_state(&self, command: &SetSessionState) -> Result<Session, DomainError> {
        self.mutate("session.set_state", command.session_id, |stored| {
            let session = &mut stored.session;
            match (session.state, command.state) {
                (from, to) if from == to => Ok(false),
                (SessionState::AwaitingAuthors, SessionState::InProgress) => {
                    if session.authors.len() < 2 {
                        return Err(DomainError::NotEnoughAuthors {
                            required: 2,
                            found: session.authors.len(),
                        });
                    }
                    session.state = SessionState::InProgress;
                    session.turn_index = 0;
                    Ok(true)
                }
                (SessionState::AwaitingAuthors | SessionState::InProgress, SessionState::Completed) => {
                    session.state = SessionState::Completed;
                    Ok(true)
                }
                (from, _) => Err(DomainError::InvalidState(from)),
            }
        })
    }

    async fn propose_vote(&self, command: &ProposeVote) -> Result<Session, DomainError> {
        self.mutate("vote.propose", command.session_id, |stored| {
            let session = &mut stored.session;
            if session.state != SessionState::InProgress {
                return Err(DomainError::InvalidState(session.state));
            }
            if session.vote_is_active() {
                return Err(DomainError::VoteAlreadyActive);
            }
            if session.previous_vote_proposer() == Some(command.proposer.as_str()) {
                return Err(DomainError::ConsecutiveProposalNotAllowed(
                    command.proposer.clone(),
                ));
            }
            session.vote_details = Some(VoteDetails {
                vote_is_active: true,
                vote_proposed_by: Some(command.proposer.clone()),
                previous_vote_proposed_by: None,
                vote_type: Some(command.vote_type),
                votes: Vec::new(),
            });
            Ok(true)
        })
    }

    async fn cast_vote(&self, command: &CastVote) -> Result<Session, DomainError> {
        self.mutate("vote.cast", command.session_id, |stored| {
            let session = &mut stored.session;
            if session.author_named(&command.voter).is_none() {
                return Err(DomainError::Rejected(format!(
                    "{} is not an author",
                    command.voter
                )));
            }
            let Some(details) = session.vote_details.as_mut().filter(|v| v.vote_is_active) else {
                return Err(DomainError::NoActiveVote);
            };
            if details.votes.iter().any(|b| b.author_name == command.voter) {
                return Err(DomainError::AlreadyVoted(command.voter.clone()));
            }
            details.votes.push(Ballot {
                author_name: command.voter.clone(),
                decision: command.decision,
            });
            Ok(true)
        })
    }

    async fn conclude_vote(&self, command: &ConcludeVote) -> Result<Session, DomainError> {
        self.mutate("vote.conclude", command.session_id, |stored| {
            let session = &mut stored.session;
            let Some(details) = session.vote_details.as_mut().filter(|v| v.vote_is_active) else {
                return Ok(false);
            };
            details.vote_is_active = false;
            details.previous_vote_proposed_by = details.vote_proposed_by.clone();
            let vote_type = details.vote_type;
            if command.outcome == VoteOutcome::Carried {
                match vote_type {
                    Some(VoteType::EndStory) => session.state = SessionState::Completed,
                    Some(VoteType::EditWord) => {
                        session.words.pop();
                    }
                    None => {}
                }
            }
            Ok(true)
        })
    }
}

/// A session service that always returns a transient error. Useful for
/// testing error-handling paths.
#[derive(Debug)]
pub struct FailingSessionService;

fn refused() -> DomainError {
    DomainError::Transient("connection refused".into())
}

#[async_trait]
impl SessionService for FailingSessionService {
    async fn fetch_session(&self, _session_id: Uuid) -> Result<Session, DomainError> {
        Err(refused())
    }

    async fn join_session(&self, _command: &JoinSession) -> Result<Session, DomainError> {
        Err(refused())
    }

    async fn leave_session(&self, _command: &LeaveSession) -> Result<Session, DomainError> {
        Err(refused())
    }

    async fn append_word(&self, _command: &AppendWord) -> Result<Session, DomainError> {
        Err(refused())
    }

    async fn skip_turn(&self, _command: &SkipTurn) -> Result<Session, DomainError> {
        Err(refused())
    }

    async fn set_session_state(&self, _command: &SetSessionState) -> Result<Session, DomainError> {
        Err(refused())
    }

    async fn propose_vote(&self, _command: &ProposeVote) -> Result<Session, DomainError> {
        Err(refused())
    }

    async fn cast_vote(&self, _command: &CastVote) -> Result<Session, DomainError> {
        Err(refused())
    }

    async fn conclude_vote(&self, _command: &ConcludeVote) -> Result<Session, DomainError> {
        Err(refused())
    }
}
