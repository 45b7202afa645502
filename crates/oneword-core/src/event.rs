//! Push-channel messages.
//!
//! Inbound events are notifications only. Receivers treat each one as a
//! trigger to fetch the authoritative session again and never as state in
//! its own right.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Notification pushed by the session service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PushEvent {
    /// The service issued a participant id for this connection.
    UserConnected {
        /// Newly issued participant id.
        id: Uuid,
    },
    /// A participant's connection dropped and they were removed.
    UserDisconnected {
        /// Name of the departed author.
        author: String,
    },
    /// An author joined.
    AuthorJoined {
        /// Name of the new author.
        author: String,
    },
    /// An author left deliberately.
    AuthorLeft {
        /// Name of the departed author.
        author: String,
    },
    /// The session was deleted.
    SessionDeleted,
    /// A word was appended.
    WordAdded {
        /// Who added it.
        author: String,
        /// The word.
        word: String,
        /// Who holds the turn now.
        #[serde(rename = "nextAuthor")]
        next_author: String,
    },
    /// An author passed.
    SkippedTurn {
        /// Who passed.
        author: String,
    },
    /// An author's countdown ran out.
    TimerExpired {
        /// Whose time ran out.
        author: String,
    },
    /// The session changed lifecycle state.
    StateChanged,
    /// A vote opened.
    VoteStarted,
    /// A ballot was cast.
    VoteMade,
    /// A vote concluded.
    VoteEnded,
    /// Another client shared the human-readable outcome of a vote.
    VoteOutcomeMessage {
        /// Display text.
        message: String,
    },
}

impl PushEvent {
    /// Stable name used in logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UserConnected { .. } => "user_connected",
            Self::UserDisconnected { .. } => "user_disconnected",
            Self::AuthorJoined { .. } => "author_joined",
            Self::AuthorLeft { .. } => "author_left",
            Self::SessionDeleted => "session_deleted",
            Self::WordAdded { .. } => "word_added",
            Self::SkippedTurn { .. } => "skipped_turn",
            Self::TimerExpired { .. } => "timer_expired",
            Self::StateChanged => "state_changed",
            Self::VoteStarted => "vote_started",
            Self::VoteMade => "vote_made",
            Self::VoteEnded => "vote_ended",
            Self::VoteOutcomeMessage { .. } => "vote_outcome_message",
        }
    }
}

/// Inbound frame: an event plus optional routing metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushEnvelope {
    /// Unique id of the logical event, when the service provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<Uuid>,
    /// Session the event concerns; `None` for connection-wide events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
    /// The event.
    #[serde(flatten)]
    pub event: PushEvent,
}

impl PushEnvelope {
    /// Wraps an event with no routing metadata.
    #[must_use]
    pub fn bare(event: PushEvent) -> Self {
        Self {
            event_id: None,
            session_id: None,
            event,
        }
    }

    /// Wraps an event addressed to a session.
    #[must_use]
    pub fn for_session(session_id: Uuid, event: PushEvent) -> Self {
        Self {
            event_id: Some(Uuid::new_v4()),
            session_id: Some(session_id),
            event,
        }
    }
}

/// Client-originated broadcast. Best-effort and never authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// Share a vote outcome with the other participants.
    VoteOutcome {
        /// Session the vote belongs to.
        #[serde(rename = "sessionId")]
        session_id: Uuid,
        /// Display text.
        message: String,
    },
}
