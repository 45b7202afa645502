//! Client-side session projection.
//!
//! The store keeps the newest authoritative snapshot of the session the
//! client is in and answers read-only questions about it. Snapshots arrive
//! from fetches and from command responses in any order; `version` decides
//! which one is newest.

use oneword_core::model::{Author, Session};
use oneword_voting::domain::resolution::{self, BallotLine, VoteTally};
use tracing::debug;
use uuid::Uuid;

use crate::domain::views;

/// What `apply` did with a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The snapshot replaced the displayed one, which is handed back.
    Applied {
        /// The snapshot that was displayed before.
        previous: Option<Session>,
    },
    /// The snapshot is older than the displayed one and was dropped.
    Stale,
    /// The snapshot belongs to a session the store is not tracking.
    Foreign,
}

/// One fetch handed out by [`SessionStore::begin_refresh`]. Only the
/// ticket of the fetch currently in flight may end it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    /// Session to fetch.
    pub session_id: Uuid,
    seq: u64,
}

/// Holds the last-known snapshot and coalesces refreshes.
#[derive(Debug, Default)]
pub struct SessionStore {
    session_id: Option<Uuid>,
    snapshot: Option<Session>,
    in_flight: Option<u64>,
    last_seq: u64,
    refresh_queued: bool,
}

impl SessionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking `session_id`. Switching sessions drops the snapshot.
    pub fn track(&mut self, session_id: Uuid) {
        if self.session_id != Some(session_id) {
            self.clear();
            self.session_id = Some(session_id);
        }
    }

    /// Stops tracking any session.
    pub fn clear(&mut self) {
        self.session_id = None;
        self.snapshot = None;
        self.in_flight = None;
        self.refresh_queued = false;
    }

    /// The tracked session id.
    #[must_use]
    pub fn session_id(&self) -> Option<Uuid> {
        self.session_id
    }

    /// The displayed snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Option<&Session> {
        self.snapshot.as_ref()
    }

    /// Offers a snapshot to the store.
    ///
    /// Equal versions replace the displayed snapshot so that a refetch of
    /// unchanged state still counts as fresh.
    pub fn apply(&mut self, session: Session) -> ApplyOutcome {
        if self.session_id != Some(session.id) {
            return ApplyOutcome::Foreign;
        }
        if let Some(current) = &self.snapshot
            && current.version > session.version
        {
            debug!(
                session_id = %session.id,
                displayed = current.version,
                received = session.version,
                "dropping stale snapshot"
            );
            return ApplyOutcome::Stale;
        }
        let previous = self.snapshot.replace(session);
        ApplyOutcome::Applied { previous }
    }

    /// Asks for a refresh. Returns a ticket for the fetch to issue when no
    /// fetch is in flight; otherwise remembers that one more fetch is needed.
    pub fn begin_refresh(&mut self) -> Option<FetchTicket> {
        let session_id = self.session_id?;
        if self.in_flight.is_some() {
            self.refresh_queued = true;
            return None;
        }
        self.last_seq += 1;
        self.in_flight = Some(self.last_seq);
        Some(FetchTicket {
            session_id,
            seq: self.last_seq,
        })
    }

    /// Marks the fetch behind `ticket` as finished. Returns the ticket of a
    /// follow-up fetch if refreshes were requested meanwhile.
    ///
    /// A ticket issued before the store was cleared or switched sessions
    /// leaves the current fetch untouched.
    pub fn finish_refresh(&mut self, ticket: FetchTicket) -> Option<FetchTicket> {
        if self.in_flight != Some(ticket.seq) {
            debug!(session_id = %ticket.session_id, "superseded fetch finished");
            return None;
        }
        self.in_flight = None;
        if std::mem::take(&mut self.refresh_queued) {
            self.begin_refresh()
        } else {
            None
        }
    }

    /// Whether a fetch is outstanding.
    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Author holding the turn.
    #[must_use]
    pub fn current_turn_author(&self) -> Option<&Author> {
        self.snapshot.as_ref()?.current_turn_author()
    }

    /// The session creator.
    #[must_use]
    pub fn creator(&self) -> Option<&Author> {
        self.snapshot.as_ref()?.creator()
    }

    /// Whether authors may still join.
    #[must_use]
    pub fn is_joinable(&self) -> bool {
        self.snapshot.as_ref().is_some_and(views::is_joinable)
    }

    /// Whether there are at least two authors.
    #[must_use]
    pub fn has_enough_authors(&self) -> bool {
        self.snapshot.as_ref().is_some_and(views::has_enough_authors)
    }

    /// Whether the word limit has been reached.
    #[must_use]
    pub fn word_limit_reached(&self) -> bool {
        self.snapshot.as_ref().is_some_and(Session::word_limit_reached)
    }

    /// Whether a vote is collecting ballots.
    #[must_use]
    pub fn vote_is_active(&self) -> bool {
        self.snapshot.as_ref().is_some_and(Session::vote_is_active)
    }

    /// Whether `name` already voted in the active vote.
    #[must_use]
    pub fn has_voted(&self, name: &str) -> bool {
        self.snapshot
            .as_ref()
            .is_some_and(|s| views::has_voted(s, name))
    }

    /// Ballot counts of the active vote, or `None` when no vote is active.
    #[must_use]
    pub fn tally(&self) -> Option<VoteTally> {
        self.snapshot
            .as_ref()
            .filter(|s| s.vote_is_active())
            .map(resolution::tally)
    }

    /// Per-author ballots of the active vote.
    #[must_use]
    pub fn ballot_summary(&self) -> Vec<BallotLine> {
        self.snapshot
            .as_ref()
            .filter(|s| s.vote_is_active())
            .map(resolution::ballot_summary)
            .unwrap_or_default()
    }

    /// Authors as prose.
    #[must_use]
    pub fn author_list(&self) -> String {
        self.snapshot
            .as_ref()
            .map_or_else(|| "no current authors".to_owned(), views::author_list)
    }
}
