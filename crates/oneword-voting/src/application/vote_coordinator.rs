//! Vote coordinator.
//!
//! Checks proposals and ballots against the latest snapshot before they are
//! sent, and decides when this client should ask the service to conclude a
//! vote. It never flips vote state locally; the next snapshot is the only
//! source of truth for whether a vote is open.

use oneword_core::command::{CastVote, ConcludeVote, ProposeVote};
use oneword_core::error::{DomainError, ValidationError};
use oneword_core::model::{Ballot, Session, SessionState, VoteOutcome, VoteType};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::resolution::{self, Resolution};

/// Where the session's vote stands from this client's point of view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum VotePhase {
    /// No vote is open.
    #[default]
    Idle,
    /// A vote is collecting ballots.
    Proposed,
    /// This client has asked the service to conclude the open vote and is
    /// waiting to see it closed.
    Concluded,
}

/// Identifies one vote while it is open.
///
/// Ballots only accumulate while a vote is open, so a later snapshot shows
/// the same vote only if every remembered ballot is still there. A client
/// that missed the snapshots between two votes by the same proposer still
/// tells them apart once any remembered ballot is gone.
#[derive(Debug, Clone, PartialEq, Eq)]
struct VoteKey {
    session_id: Uuid,
    proposer: Option<String>,
    vote_type: Option<VoteType>,
    ballots: Vec<Ballot>,
}

impl VoteKey {
    fn of(session: &Session) -> Option<Self> {
        session.active_vote().map(|v| Self {
            session_id: session.id,
            proposer: v.vote_proposed_by.clone(),
            vote_type: v.vote_type,
            ballots: v.votes.clone(),
        })
    }

    fn same_vote(&self, later: &Self) -> bool {
        self.session_id == later.session_id
            && self.proposer == later.proposer
            && self.vote_type == later.vote_type
            && self.ballots.iter().all(|b| later.ballots.contains(b))
    }
}

/// A conclusion this client should send, with the text to announce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteConclusion {
    /// Command for the session service.
    pub command: ConcludeVote,
    /// Outcome being concluded.
    pub outcome: VoteOutcome,
    /// Human-readable outcome to broadcast.
    pub message: String,
}

/// Drives proposal, ballot and conclusion of votes for one client.
#[derive(Debug, Default)]
pub struct VoteCoordinator {
    concluding: Option<VoteKey>,
}

impl VoteCoordinator {
    /// Create an idle coordinator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current phase given the latest snapshot.
    #[must_use]
    pub fn phase(&self, session: &Session) -> VotePhase {
        match VoteKey::of(session) {
            None => VotePhase::Idle,
            Some(key) if self.concluding.as_ref().is_some_and(|c| c.same_vote(&key)) => {
                VotePhase::Concluded
            }
            Some(_) => VotePhase::Proposed,
        }
    }

    /// Builds a proposal command.
    ///
    /// # Errors
    ///
    /// - `InvalidState` unless the session is in progress.
    /// - `VoteAlreadyActive` if a vote is open.
    /// - `ConsecutiveProposalNotAllowed` if `proposer` proposed the last
    ///   concluded vote.
    /// - `NotJoined` if `proposer` is not an author.
    /// - `Validation(NothingToRetract)` for an edit vote on an empty story.
    pub fn propose(
        &self,
        session: &Session,
        vote_type: VoteType,
        proposer: &str,
    ) -> Result<ProposeVote, DomainError> {
        if session.state != SessionState::InProgress {
            return Err(DomainError::InvalidState(session.state));
        }
        if session.vote_is_active() {
            return Err(DomainError::VoteAlreadyActive);
        }
        if session.previous_vote_proposer() == Some(proposer) {
            return Err(DomainError::ConsecutiveProposalNotAllowed(
                proposer.to_owned(),
            ));
        }
        if session.author_named(proposer).is_none() {
            return Err(DomainError::NotJoined);
        }
        if vote_type == VoteType::EditWord && session.words.is_empty() {
            return Err(ValidationError::NothingToRetract.into());
        }
        Ok(ProposeVote {
            correlation_id: Uuid::new_v4(),
            session_id: session.id,
            vote_type,
            proposer: proposer.to_owned(),
        })
    }

    /// Builds a ballot command.
    ///
    /// # Errors
    ///
    /// - `NoActiveVote` if no vote is open.
    /// - `NotJoined` if `voter` is not an author.
    /// - `AlreadyVoted` if `voter` already has a ballot in the open vote.
    pub fn cast(
        &self,
        session: &Session,
        decision: bool,
        voter: &str,
    ) -> Result<CastVote, DomainError> {
        let Some(vote) = session.active_vote() else {
            return Err(DomainError::NoActiveVote);
        };
        if session.author_named(voter).is_none() {
            return Err(DomainError::NotJoined);
        }
        if vote.votes.iter().any(|b| b.author_name == voter) {
            return Err(DomainError::AlreadyVoted(voter.to_owned()));
        }
        Ok(CastVote {
            correlation_id: Uuid::new_v4(),
            session_id: session.id,
            voter: voter.to_owned(),
            decision,
        })
    }

    /// Re-evaluates the open vote against a fresh snapshot.
    ///
    /// Returns a conclusion the first time this client sees the open vote
    /// decided, and `None` otherwise, including on later snapshots of the
    /// same still-open vote. Other clients may conclude the same vote; the
    /// service ignores every conclusion after the first.
    pub fn observe(&mut self, session: &Session) -> Option<VoteConclusion> {
        let Some(key) = VoteKey::of(session) else {
            self.concluding = None;
            return None;
        };
        if self.concluding.as_ref().is_some_and(|c| c.same_vote(&key)) {
            return None;
        }
        self.concluding = None;

        let tally = resolution::tally(session);
        let Resolution::Decided(outcome) = resolution::resolve(tally) else {
            debug!(
                yes = tally.yes,
                no = tally.no,
                eligible = tally.eligible,
                "vote still pending"
            );
            return None;
        };

        info!(
            session_id = %session.id,
            ?outcome,
            yes = tally.yes,
            no = tally.no,
            eligible = tally.eligible,
            "vote decided"
        );
        let message = resolution::outcome_message(key.vote_type, outcome);
        self.concluding = Some(key);
        Some(VoteConclusion {
            command: ConcludeVote {
                correlation_id: Uuid::new_v4(),
                session_id: session.id,
                outcome,
            },
            outcome,
            message,
        })
    }

    /// Forgets an in-flight conclusion after the command failed, so the
    /// next snapshot of the still-open vote issues it again.
    pub fn conclusion_failed(&mut self) {
        self.concluding = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oneword_core::model::{Ballot, StoryWord, VoteDetails};
    use oneword_test_support::{session_awaiting, session_in_progress};

    fn open_vote(session: &mut Session, proposer: &str, votes: &[(&str, bool)]) {
        let previous = session
            .vote_details
            .as_ref()
            .and_then(|v| v.previous_vote_proposed_by.clone());
        session.vote_details = Some(VoteDetails {
            vote_is_active: true,
            vote_proposed_by: Some(proposer.to_owned()),
            previous_vote_proposed_by: previous,
            vote_type: Some(VoteType::EndStory),
            votes: votes
                .iter()
                .map(|(n, d)| Ballot {
                    author_name: (*n).to_owned(),
                    decision: *d,
                })
                .collect(),
        });
    }

    fn close_vote(session: &mut Session) {
        if let Some(v) = session.vote_details.as_mut() {
            v.vote_is_active = false;
            v.previous_vote_proposed_by = v.vote_proposed_by.clone();
        }
    }

    #[test]
    fn test_propose_rejects_consecutive_proposal_by_same_author() {
        // Arrange
        let coordinator = VoteCoordinator::new();
        let mut session = session_in_progress(&["ada", "bo", "cy"]);
        open_vote(&mut session, "ada", &[]);
        close_vote(&mut session);

        // Act
        let result = coordinator.propose(&session, VoteType::EndStory, "ada");

        // Assert
        assert_eq!(
            result.unwrap_err(),
            DomainError::ConsecutiveProposalNotAllowed("ada".into())
        );
    }

    #[test]
    fn test_propose_allowed_again_after_another_author_proposed() {
        let coordinator = VoteCoordinator::new();
        let mut session = session_in_progress(&["ada", "bo", "cy"]);
        open_vote(&mut session, "ada", &[]);
        close_vote(&mut session);
        assert!(coordinator.propose(&session, VoteType::EndStory, "bo").is_ok());
        open_vote(&mut session, "bo", &[]);
        close_vote(&mut session);

        let command = coordinator
            .propose(&session, VoteType::EndStory, "ada")
            .unwrap();

        assert_eq!(command.proposer, "ada");
        assert_eq!(command.session_id, session.id);
    }

    #[test]
    fn test_propose_rejects_while_vote_open() {
        let coordinator = VoteCoordinator::new();
        let mut session = session_in_progress(&["ada", "bo"]);
        open_vote(&mut session, "bo", &[]);

        assert_eq!(
            coordinator
                .propose(&session, VoteType::EndStory, "ada")
                .unwrap_err(),
            DomainError::VoteAlreadyActive
        );
    }

    #[test]
    fn test_propose_rejects_before_story_starts() {
        let coordinator = VoteCoordinator::new();
        let session = session_awaiting(&["ada", "bo"]);

        assert_eq!(
            coordinator
                .propose(&session, VoteType::EndStory, "ada")
                .unwrap_err(),
            DomainError::InvalidState(SessionState::AwaitingAuthors)
        );
    }

    #[test]
    fn test_edit_vote_needs_a_word_to_retract() {
        let coordinator = VoteCoordinator::new();
        let mut session = session_in_progress(&["ada", "bo"]);

        assert_eq!(
            coordinator
                .propose(&session, VoteType::EditWord, "ada")
                .unwrap_err(),
            DomainError::Validation(ValidationError::NothingToRetract)
        );

        session.words.push(StoryWord {
            author_name: "ada".into(),
            word: "Once".into(),
        });
        assert!(coordinator.propose(&session, VoteType::EditWord, "ada").is_ok());
    }

    #[test]
    fn test_cast_rejects_second_ballot() {
        let coordinator = VoteCoordinator::new();
        let mut session = session_in_progress(&["ada", "bo", "cy"]);
        open_vote(&mut session, "ada", &[("bo", true)]);

        assert_eq!(
            coordinator.cast(&session, false, "bo").unwrap_err(),
            DomainError::AlreadyVoted("bo".into())
        );
        assert!(coordinator.cast(&session, false, "cy").is_ok());
    }

    #[test]
    fn test_cast_rejects_without_open_vote() {
        let coordinator = VoteCoordinator::new();
        let session = session_in_progress(&["ada", "bo"]);

        assert_eq!(
            coordinator.cast(&session, true, "ada").unwrap_err(),
            DomainError::NoActiveVote
        );
    }

    #[test]
    fn test_observe_concludes_decided_vote_once() {
        // Arrange
        let mut coordinator = VoteCoordinator::new();
        let mut session = session_in_progress(&["ada", "bo", "cy"]);
        open_vote(&mut session, "ada", &[("ada", true), ("bo", true)]);

        // Act
        let first = coordinator.observe(&session);
        let second = coordinator.observe(&session);

        // Assert
        let conclusion = first.expect("decided vote should be concluded");
        assert_eq!(conclusion.outcome, VoteOutcome::Carried);
        assert_eq!(conclusion.command.outcome, VoteOutcome::Carried);
        assert_eq!(conclusion.message, "Vote passed: end the story");
        assert!(second.is_none());
        assert_eq!(coordinator.phase(&session), VotePhase::Concluded);
    }

    #[test]
    fn test_observe_ignores_pending_vote() {
        let mut coordinator = VoteCoordinator::new();
        let mut session = session_in_progress(&["ada", "bo", "cy"]);
        open_vote(&mut session, "ada", &[("ada", true)]);

        assert!(coordinator.observe(&session).is_none());
        assert_eq!(coordinator.phase(&session), VotePhase::Proposed);
    }

    #[test]
    fn test_observe_resets_once_vote_closes() {
        let mut coordinator = VoteCoordinator::new();
        let mut session = session_in_progress(&["ada", "bo"]);
        open_vote(&mut session, "ada", &[("ada", true), ("bo", true)]);
        assert!(coordinator.observe(&session).is_some());

        close_vote(&mut session);
        assert!(coordinator.observe(&session).is_none());
        assert_eq!(coordinator.phase(&session), VotePhase::Idle);

        open_vote(&mut session, "bo", &[("ada", false), ("bo", false)]);
        let conclusion = coordinator.observe(&session).unwrap();
        assert_eq!(conclusion.outcome, VoteOutcome::NotCarried);
    }

    #[test]
    fn test_late_ballot_on_concluding_vote_is_not_concluded_again() {
        let mut coordinator = VoteCoordinator::new();
        let mut session = session_in_progress(&["ada", "bo", "cy"]);
        open_vote(&mut session, "ada", &[("ada", true), ("bo", true)]);
        assert!(coordinator.observe(&session).is_some());

        open_vote(&mut session, "ada", &[("ada", true), ("bo", true), ("cy", false)]);

        assert!(coordinator.observe(&session).is_none());
        assert_eq!(coordinator.phase(&session), VotePhase::Concluded);
    }

    #[test]
    fn test_later_vote_by_same_proposer_is_concluded_after_missed_snapshots() {
        // Arrange: ada's first vote is concluded; the snapshots showing it
        // closed and bo's vote in between never reach this client.
        let mut coordinator = VoteCoordinator::new();
        let mut session = session_in_progress(&["ada", "bo", "cy"]);
        open_vote(&mut session, "ada", &[("ada", true), ("bo", true)]);
        assert!(coordinator.observe(&session).is_some());

        // Act
        open_vote(&mut session, "ada", &[("bo", false), ("cy", false)]);
        let conclusion = coordinator.observe(&session);

        // Assert
        assert_eq!(
            conclusion.map(|c| c.outcome),
            Some(VoteOutcome::NotCarried)
        );
    }

    #[test]
    fn test_failed_conclusion_is_reissued() {
        let mut coordinator = VoteCoordinator::new();
        let mut session = session_in_progress(&["ada", "bo"]);
        open_vote(&mut session, "ada", &[("ada", true), ("bo", true)]);
        assert!(coordinator.observe(&session).is_some());

        coordinator.conclusion_failed();

        assert!(coordinator.observe(&session).is_some());
    }
}
