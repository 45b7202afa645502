//! Session snapshot types.
//!
//! A [`Session`] is owned by the authoritative session service. Clients only
//! ever hold a read-only copy fetched from it, so every accessor here
//! tolerates missing or inconsistent data by degrading to a safe default
//! rather than failing.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a session.
///
/// `AwaitingAuthors -> InProgress` happens at most once and `Completed` is
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    /// Authors may join; no words have been written yet.
    AwaitingAuthors,
    /// Words are being appended turn by turn.
    InProgress,
    /// The story is finished and immutable.
    Completed,
}

/// How votes are decided. Only simple majority is implemented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum VotingScheme {
    /// More than half of the current authors must agree.
    #[default]
    Majority,
}

/// The governance action a vote decides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoteType {
    /// Retract the most recently added word.
    EditWord,
    /// End the story now.
    EndStory,
}

impl VoteType {
    /// Human-readable description used in prompts and outcome messages.
    #[must_use]
    pub fn describe(self) -> &'static str {
        match self {
            Self::EditWord => "edit the last word",
            Self::EndStory => "end the story",
        }
    }
}

/// Final outcome of a concluded vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoteOutcome {
    /// The proposal passed and its consequence is applied.
    Carried,
    /// The proposal failed; the story is left as it is.
    NotCarried,
}

impl VoteOutcome {
    /// Returns `true` for [`VoteOutcome::Carried`].
    #[must_use]
    pub fn is_carried(self) -> bool {
        matches!(self, Self::Carried)
    }
}

/// One participant in a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    /// Participant identifier.
    pub id: Uuid,
    /// Display name, unique within the session (case-sensitive).
    pub name: String,
    /// Whether this author created the session.
    #[serde(default)]
    pub is_creator: bool,
}

/// A single word of the story and who wrote it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryWord {
    /// Name of the author who added the word.
    pub author_name: String,
    /// The word itself.
    pub word: String,
}

/// One author's decision in the active vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ballot {
    /// Name of the voting author.
    pub author_name: String,
    /// `true` to carry the proposal.
    pub decision: bool,
}

/// Governance state of a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteDetails {
    /// Whether a vote is currently collecting ballots.
    #[serde(default)]
    pub vote_is_active: bool,
    /// Name of the author who proposed the current (or last) vote.
    #[serde(default)]
    pub vote_proposed_by: Option<String>,
    /// Proposer of the most recently concluded vote.
    #[serde(default)]
    pub previous_vote_proposed_by: Option<String>,
    /// What the current (or last) vote decides.
    #[serde(default)]
    pub vote_type: Option<VoteType>,
    /// Ballots cast so far.
    #[serde(default)]
    pub votes: Vec<Ballot>,
}

/// Read-only snapshot of an authoritative session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Session identifier.
    pub id: Uuid,
    /// Story title.
    pub title: String,
    /// Optional genre label.
    #[serde(default)]
    pub genre: Option<String>,
    /// Maximum number of words; `0` means unlimited.
    #[serde(default)]
    pub word_limit: u32,
    /// Seconds per turn; `0` means turns are untimed.
    #[serde(default)]
    pub turn_time_limit_seconds: u32,
    /// Lifecycle state.
    pub state: SessionState,
    /// Authors in join order, which is also the turn rotation.
    #[serde(default)]
    pub authors: Vec<Author>,
    /// The story so far.
    #[serde(default)]
    pub words: Vec<StoryWord>,
    /// Index into `authors` of the author whose turn it is.
    #[serde(default)]
    pub turn_index: usize,
    /// Voting scheme.
    #[serde(default)]
    pub voting_scheme: VotingScheme,
    /// Vote in flight or just concluded.
    #[serde(default)]
    pub vote_details: Option<VoteDetails>,
    /// Authoritative mutation counter; higher means newer.
    #[serde(default)]
    pub version: u64,
}

impl Session {
    /// Looks up an author by exact name.
    #[must_use]
    pub fn author_named(&self, name: &str) -> Option<&Author> {
        self.authors.iter().find(|a| a.name == name)
    }

    /// The author whose turn it is, if any.
    ///
    /// Returns `None` for an empty session or an out-of-range index instead
    /// of panicking.
    #[must_use]
    pub fn current_turn_author(&self) -> Option<&Author> {
        self.authors.get(self.turn_index)
    }

    /// The session creator, if still present.
    #[must_use]
    pub fn creator(&self) -> Option<&Author> {
        self.authors.iter().find(|a| a.is_creator)
    }

    /// Whether a vote is currently collecting ballots.
    #[must_use]
    pub fn vote_is_active(&self) -> bool {
        self.vote_details.as_ref().is_some_and(|v| v.vote_is_active)
    }

    /// The active vote, or `None` when no vote is in flight.
    #[must_use]
    pub fn active_vote(&self) -> Option<&VoteDetails> {
        self.vote_details.as_ref().filter(|v| v.vote_is_active)
    }

    /// Proposer of the most recently concluded vote.
    #[must_use]
    pub fn previous_vote_proposer(&self) -> Option<&str> {
        self.vote_details
            .as_ref()
            .and_then(|v| v.previous_vote_proposed_by.as_deref())
    }

    /// Whether the story has reached its word limit.
    #[must_use]
    pub fn word_limit_reached(&self) -> bool {
        self.word_limit > 0 && self.words.len() >= self.word_limit as usize
    }

    /// Whether the session is finished.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.state == SessionState::Completed
    }
}
