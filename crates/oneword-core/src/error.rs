//! Domain error types.

use thiserror::Error;
use uuid::Uuid;

use crate::model::SessionState;

/// Local input validation failures. These are detected before any command
/// is sent and are always immediately correctable by the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// An author name was empty.
    #[error("name must be at least {min} character long")]
    NameTooShort {
        /// Minimum accepted length.
        min: usize,
    },

    /// An author name exceeded the maximum length.
    #[error("name must be at most {max} characters long")]
    NameTooLong {
        /// Maximum accepted length.
        max: usize,
    },

    /// A word submission was empty.
    #[error("no passes allowed, please add a word")]
    EmptyWord,

    /// A word exceeded the maximum length.
    #[error("words are limited to {max} characters")]
    WordTooLong {
        /// Maximum accepted length.
        max: usize,
    },

    /// A word contained whitespace between characters.
    #[error("a word may not contain spaces")]
    WordContainsWhitespace,

    /// An edit vote was proposed for a story with no words.
    #[error("there is no word to retract")]
    NothingToRetract,
}

/// Coarse classification of a [`DomainError`], used by callers to decide
/// how to present or recover from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad local input; fix and resubmit.
    Validation,
    /// Rejected because of the current session state; change input or wait.
    Conflict,
    /// A command or channel failed; the user may try again.
    Transient,
    /// The session no longer exists.
    NotFound,
    /// Reconnection gave up; only an explicit reconnect helps.
    TerminalConnectivity,
    /// Local storage or wiring failure.
    Infrastructure,
}

/// Top-level domain error type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// Local input validation failed.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Another author in the session already uses the name.
    #[error("the name {0:?} is already taken in this session")]
    NameClash(String),

    /// The author proposed the previous vote and must let someone else go.
    #[error("{0} proposed the previous vote; multiple consecutive votes are not allowed")]
    ConsecutiveProposalNotAllowed(String),

    /// A vote is already collecting ballots.
    #[error("a vote is already in progress")]
    VoteAlreadyActive,

    /// A ballot or conclusion was attempted with no vote in flight.
    #[error("no vote is in progress")]
    NoActiveVote,

    /// The author already has a ballot in the active vote.
    #[error("{0} has already voted")]
    AlreadyVoted(String),

    /// The local author does not hold the turn.
    #[error("it is {current}'s turn, not {attempted}'s")]
    NotYourTurn {
        /// Who attempted to act.
        attempted: String,
        /// Who holds the turn.
        current: String,
    },

    /// A creator-only action was attempted by another author.
    #[error("only the session creator may do that")]
    NotCreator,

    /// Too few authors for the requested action.
    #[error("at least {required} authors are needed, found {found}")]
    NotEnoughAuthors {
        /// Minimum needed.
        required: usize,
        /// Currently present.
        found: usize,
    },

    /// The session is not in a state that allows the action.
    #[error("cannot do that while the session is {0:?}")]
    InvalidState(SessionState),

    /// The local participant has not joined the session.
    #[error("not joined to this session")]
    NotJoined,

    /// No participant id has been issued for this connection yet.
    #[error("participant identity has not been issued yet")]
    IdentityUnavailable,

    /// The session id no longer resolves.
    #[error("session not found: {0}")]
    SessionNotFound(Uuid),

    /// The session service refused the command.
    #[error("rejected by session service: {0}")]
    Rejected(String),

    /// A command or the push channel failed.
    #[error("transient failure: {0}")]
    Transient(String),

    /// Bounded reconnection gave up.
    #[error("unable to connect after {attempts} attempts")]
    UnableToConnect {
        /// Attempts made before giving up.
        attempts: u32,
    },

    /// Local storage or wiring error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl DomainError {
    /// Classifies the error.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation(_) => ErrorCategory::Validation,
            Self::NameClash(_)
            | Self::ConsecutiveProposalNotAllowed(_)
            | Self::VoteAlreadyActive
            | Self::NoActiveVote
            | Self::AlreadyVoted(_)
            | Self::NotYourTurn { .. }
            | Self::NotCreator
            | Self::NotEnoughAuthors { .. }
            | Self::InvalidState(_)
            | Self::NotJoined
            | Self::IdentityUnavailable
            | Self::Rejected(_) => ErrorCategory::Conflict,
            Self::Transient(_) => ErrorCategory::Transient,
            Self::SessionNotFound(_) => ErrorCategory::NotFound,
            Self::UnableToConnect { .. } => ErrorCategory::TerminalConnectivity,
            Self::Infrastructure(_) => ErrorCategory::Infrastructure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_converts_and_maps_to_validation() {
        let err: DomainError = ValidationError::EmptyWord.into();
        assert_eq!(err.category(), ErrorCategory::Validation);
    }

    #[test]
    fn test_name_clash_maps_to_conflict() {
        assert_eq!(
            DomainError::NameClash("ada".into()).category(),
            ErrorCategory::Conflict
        );
    }

    #[test]
    fn test_consecutive_proposal_maps_to_conflict() {
        assert_eq!(
            DomainError::ConsecutiveProposalNotAllowed("ada".into()).category(),
            ErrorCategory::Conflict
        );
    }

    #[test]
    fn test_session_not_found_is_distinct_from_transient() {
        let id = Uuid::new_v4();
        assert_eq!(
            DomainError::SessionNotFound(id).category(),
            ErrorCategory::NotFound
        );
        assert_eq!(
            DomainError::Transient("timeout".into()).category(),
            ErrorCategory::Transient
        );
    }

    #[test]
    fn test_unable_to_connect_is_terminal() {
        assert_eq!(
            DomainError::UnableToConnect { attempts: 10 }.category(),
            ErrorCategory::TerminalConnectivity
        );
    }

    #[test]
    fn test_messages_name_the_offending_author() {
        let err = DomainError::NotYourTurn {
            attempted: "bo".into(),
            current: "ada".into(),
        };
        assert_eq!(err.to_string(), "it is ada's turn, not bo's");
    }
}
