//! Commands a client issues to the session service.
//!
//! Commands express intent only. The session service decides whether each
//! one still applies; clients never mutate session state themselves.

use uuid::Uuid;

use crate::model::{SessionState, VoteOutcome, VoteType};

/// Trait that all commands implement.
pub trait Command: Send + Sync + std::fmt::Debug {
    /// The type name for this command (for logging/routing).
    fn command_type(&self) -> &'static str;

    /// Correlation ID to trace this command through the system.
    fn correlation_id(&self) -> Uuid;

    /// The session the command targets.
    fn session_id(&self) -> Uuid;
}

macro_rules! impl_command {
    ($ty:ty, $name:literal) => {
        impl Command for $ty {
            fn command_type(&self) -> &'static str {
                $name
            }

            fn correlation_id(&self) -> Uuid {
                self.correlation_id
            }

            fn session_id(&self) -> Uuid {
                self.session_id
            }
        }
    };
}

/// Join a session under a display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinSession {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Target session.
    pub session_id: Uuid,
    /// The participant id issued for this connection.
    pub participant_id: Uuid,
    /// Requested display name.
    pub name: String,
}

impl_command!(JoinSession, "session.join");

/// Leave a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaveSession {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Target session.
    pub session_id: Uuid,
    /// Name of the departing author.
    pub author_name: String,
}

impl_command!(LeaveSession, "session.leave");

/// Append a word on the author's turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendWord {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Target session.
    pub session_id: Uuid,
    /// Author holding the turn.
    pub author_name: String,
    /// Validated word.
    pub word: String,
}

impl_command!(AppendWord, "session.append_word");

/// Give up the current turn after the countdown expired.
///
/// Stale skips (the turn already moved on) are no-ops on the service side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipTurn {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Target session.
    pub session_id: Uuid,
    /// Author whose turn expired.
    pub author_name: String,
}

impl_command!(SkipTurn, "session.skip_turn");

/// Move the session to a new lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetSessionState {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Target session.
    pub session_id: Uuid,
    /// Requested state.
    pub state: SessionState,
}

impl_command!(SetSessionState, "session.set_state");

/// Open a vote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposeVote {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Target session.
    pub session_id: Uuid,
    /// What the vote decides.
    pub vote_type: VoteType,
    /// Proposing author.
    pub proposer: String,
}

impl_command!(ProposeVote, "vote.propose");

/// Cast a ballot in the active vote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CastVote {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Target session.
    pub session_id: Uuid,
    /// Voting author.
    pub voter: String,
    /// `true` to carry the proposal.
    pub decision: bool,
}

impl_command!(CastVote, "vote.cast");

/// Conclude the active vote. Idempotent on the service side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcludeVote {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Target session.
    pub session_id: Uuid,
    /// Resolved outcome.
    pub outcome: VoteOutcome,
}

impl_command!(ConcludeVote, "vote.conclude");

/// Any command that mutates a session, as one value.
///
/// The client engine runs these on spawned tasks and routes the returned
/// snapshot back into the session store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    /// See [`JoinSession`].
    Join(JoinSession),
    /// See [`LeaveSession`].
    Leave(LeaveSession),
    /// See [`AppendWord`].
    AppendWord(AppendWord),
    /// See [`SkipTurn`].
    SkipTurn(SkipTurn),
    /// See [`SetSessionState`].
    SetState(SetSessionState),
    /// See [`ProposeVote`].
    ProposeVote(ProposeVote),
    /// See [`CastVote`].
    CastVote(CastVote),
    /// See [`ConcludeVote`].
    ConcludeVote(ConcludeVote),
}

impl SessionCommand {
    fn inner(&self) -> &dyn Command {
        match self {
            Self::Join(c) => c,
            Self::Leave(c) => c,
            Self::AppendWord(c) => c,
            Self::SkipTurn(c) => c,
            Self::SetState(c) => c,
            Self::ProposeVote(c) => c,
            Self::CastVote(c) => c,
            Self::ConcludeVote(c) => c,
        }
    }
}

impl Command for SessionCommand {
    fn command_type(&self) -> &'static str {
        self.inner().command_type()
    }

    fn correlation_id(&self) -> Uuid {
        self.inner().correlation_id()
    }

    fn session_id(&self) -> Uuid {
        self.inner().session_id()
    }
}
