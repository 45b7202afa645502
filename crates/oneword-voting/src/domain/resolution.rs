//! Vote tally and majority resolution.
//!
//! Everything here is a read-only projection of a session snapshot, so it
//! can run on every client, as often as snapshots arrive, and always give
//! the same answer for the same ballots and authors.

use std::collections::HashSet;

use oneword_core::model::{Session, VoteOutcome, VoteType};
use serde::Serialize;

/// Ballot counts for the current vote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VoteTally {
    /// Ballots in favour.
    pub yes: usize,
    /// Ballots against.
    pub no: usize,
    /// Authors currently entitled to vote.
    pub eligible: usize,
}

impl VoteTally {
    /// Authors who have not voted yet.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.eligible.saturating_sub(self.yes + self.no)
    }
}

/// Result of running the resolution rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Not decided yet; keep collecting ballots.
    Pending,
    /// Decided.
    Decided(VoteOutcome),
}

/// Counts the ballots of the session's current vote.
///
/// Eligibility is recomputed from the authors present in this snapshot.
/// Ballots from authors who have since left are ignored, and an author who
/// somehow appears twice is counted once (first ballot wins). A session with
/// no vote details tallies to zero ballots.
#[must_use]
pub fn tally(session: &Session) -> VoteTally {
    let eligible = session.authors.len();
    let Some(details) = session.vote_details.as_ref() else {
        return VoteTally {
            eligible,
            ..VoteTally::default()
        };
    };

    let mut counted = HashSet::new();
    let mut result = VoteTally {
        eligible,
        ..VoteTally::default()
    };
    for ballot in &details.votes {
        if session.author_named(&ballot.author_name).is_none()
            || !counted.insert(ballot.author_name.as_str())
        {
            continue;
        }
        if ballot.decision {
            result.yes += 1;
        } else {
            result.no += 1;
        }
    }
    result
}

/// Applies the majority rule.
///
/// A side wins as soon as it holds more than half of the eligible votes, so
/// a vote can carry before everyone has voted. If every eligible author has
/// voted without either side reaching a majority (an exact tie), the vote
/// does not carry.
#[must_use]
pub fn resolve(tally: VoteTally) -> Resolution {
    if tally.yes * 2 > tally.eligible {
        Resolution::Decided(VoteOutcome::Carried)
    } else if tally.no * 2 > tally.eligible || tally.yes + tally.no >= tally.eligible {
        // Ties go to the status quo.
        Resolution::Decided(VoteOutcome::NotCarried)
    } else {
        Resolution::Pending
    }
}

/// Resolves the session's active vote, or `None` when no vote is active.
#[must_use]
pub fn resolve_active(session: &Session) -> Option<Resolution> {
    session.vote_is_active().then(|| resolve(tally(session)))
}

/// One row of the ballot summary shown while a vote is open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BallotLine {
    /// Author name.
    pub author_name: String,
    /// Their decision, or `None` if they have not voted.
    pub decision: Option<bool>,
}

/// Lists every current author with their ballot: voters first in the order
/// they voted, then those still to vote in turn order.
#[must_use]
pub fn ballot_summary(session: &Session) -> Vec<BallotLine> {
    let ballots = session
        .vote_details
        .as_ref()
        .map(|d| d.votes.as_slice())
        .unwrap_or_default();

    let mut seen = HashSet::new();
    let mut lines: Vec<BallotLine> = ballots
        .iter()
        .filter(|b| session.author_named(&b.author_name).is_some())
        .filter(|b| seen.insert(b.author_name.as_str()))
        .map(|b| BallotLine {
            author_name: b.author_name.clone(),
            decision: Some(b.decision),
        })
        .collect();
    lines.extend(
        session
            .authors
            .iter()
            .filter(|a| !seen.contains(a.name.as_str()))
            .map(|a| BallotLine {
                author_name: a.name.clone(),
                decision: None,
            }),
    );
    lines
}

/// Text announcing a vote's outcome.
#[must_use]
pub fn outcome_message(vote_type: Option<VoteType>, outcome: VoteOutcome) -> String {
    let subject = vote_type.map_or("vote type unspecified", VoteType::describe);
    if outcome.is_carried() {
        format!("Vote passed: {subject}")
    } else {
        format!("Vote failed: {subject}")
    }
}
