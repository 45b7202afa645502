//! Session service abstraction.
//!
//! The session service owns the authoritative copy of every session and
//! arbitrates all mutations. Each call returns the post-command snapshot.

use async_trait::async_trait;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::command::{
    AppendWord, CastVote, Command, ConcludeVote, JoinSession, LeaveSession, ProposeVote,
    SessionCommand, SetSessionState, SkipTurn,
};
use crate::error::DomainError;
use crate::model::Session;

/// Contract of the authoritative session service.
///
/// Implementations must return [`DomainError::SessionNotFound`] when the
/// session id no longer resolves, and must treat [`SkipTurn`] for a turn
/// that already advanced and [`ConcludeVote`] for an already concluded vote
/// as successful no-ops.
#[async_trait]
pub trait SessionService: Send + Sync {
    /// Fetch the latest snapshot.
    async fn fetch_session(&self, session_id: Uuid) -> Result<Session, DomainError>;

    /// Add an author. Rejects duplicate names.
    async fn join_session(&self, command: &JoinSession) -> Result<Session, DomainError>;

    /// Remove an author by name.
    async fn leave_session(&self, command: &LeaveSession) -> Result<Session, DomainError>;

    /// Append a word and advance the turn.
    async fn append_word(&self, command: &AppendWord) -> Result<Session, DomainError>;

    /// Advance past an expired turn.
    async fn skip_turn(&self, command: &SkipTurn) -> Result<Session, DomainError>;

    /// Change the lifecycle state.
    async fn set_session_state(&self, command: &SetSessionState) -> Result<Session, DomainError>;

    /// Open a vote.
    async fn propose_vote(&self, command: &ProposeVote) -> Result<Session, DomainError>;

    /// Record a ballot.
    async fn cast_vote(&self, command: &CastVote) -> Result<Session, DomainError>;

    /// Close the active vote with the given outcome.
    async fn conclude_vote(&self, command: &ConcludeVote) -> Result<Session, DomainError>;
}

/// Sends one command to the service and returns the resulting snapshot.
///
/// Failures are logged and returned to the caller unchanged; nothing is
/// retried here.
///
/// # Errors
///
/// Returns whatever the service returned.
#[instrument(
    skip(service, command),
    fields(
        command_type = command.command_type(),
        correlation_id = %command.correlation_id(),
        session_id = %command.session_id(),
    )
)]
pub async fn execute(
    service: &dyn SessionService,
    command: &SessionCommand,
) -> Result<Session, DomainError> {
    debug!("issuing command");
    let result = match command {
        SessionCommand::Join(c) => service.join_session(c).await,
        SessionCommand::Leave(c) => service.leave_session(c).await,
        SessionCommand::AppendWord(c) => service.append_word(c).await,
        SessionCommand::SkipTurn(c) => service.skip_turn(c).await,
        SessionCommand::SetState(c) => service.set_session_state(c).await,
        SessionCommand::ProposeVote(c) => service.propose_vote(c).await,
        SessionCommand::CastVote(c) => service.cast_vote(c).await,
        SessionCommand::ConcludeVote(c) => service.conclude_vote(c).await,
    };
    if let Err(err) = &result {
        warn!(error = %err, "command failed");
    }
    result
}
