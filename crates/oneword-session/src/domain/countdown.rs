//! Turn countdown rules.

use oneword_core::model::{Session, SessionState};

use crate::domain::views::has_enough_authors;

/// What a new snapshot means for the turn countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerDirective {
    /// The session is untimed.
    Inert,
    /// Cancel any running countdown and start again from the full limit.
    Restart,
    /// Leave the running countdown alone.
    Keep,
    /// Cancel the countdown and clear it.
    Pause,
}

/// Decides what the countdown should do when `next` replaces `previous`.
///
/// A first snapshot (no `previous`) counts as a change, as does a second
/// author arriving in a running session. `countdown_max` is
/// the limit captured from the first snapshot, not the one in `next`.
#[must_use]
pub fn directive(previous: Option<&Session>, next: &Session, countdown_max: u32) -> TimerDirective {
    if countdown_max == 0 {
        return TimerDirective::Inert;
    }
    let writable = next.state == SessionState::InProgress
        && has_enough_authors(next)
        && !next.vote_is_active();
    if !writable {
        return TimerDirective::Pause;
    }

    let Some(previous) = previous else {
        return TimerDirective::Restart;
    };
    let turn_changed = previous.turn_index != next.turn_index;
    let word_added = previous.words.len() != next.words.len();
    let state_changed = previous.state != next.state;
    let vote_ended = previous.vote_is_active();
    let quorum_regained = !has_enough_authors(previous);
    if turn_changed || word_added || state_changed || vote_ended || quorum_regained {
        TimerDirective::Restart
    } else {
        TimerDirective::Keep
    }
}

/// Result of one countdown tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing is counting.
    Idle,
    /// Seconds left after this tick.
    Counting(u32),
    /// This tick reached zero.
    Expired,
}

/// Per-turn countdown value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    max: u32,
    remaining: Option<u32>,
}

impl Countdown {
    /// A stopped countdown with the given limit in seconds.
    #[must_use]
    pub fn new(max: u32) -> Self {
        Self {
            max,
            remaining: None,
        }
    }

    /// The fixed limit.
    #[must_use]
    pub fn max(&self) -> u32 {
        self.max
    }

    /// Seconds left, or `None` while stopped.
    #[must_use]
    pub fn remaining(&self) -> Option<u32> {
        self.remaining
    }

    /// Starts again from the full limit.
    pub fn restart(&mut self) {
        self.remaining = Some(self.max);
    }

    /// Stops and forgets the current value.
    pub fn clear(&mut self) {
        self.remaining = None;
    }

    /// Counts one second down. Stays at zero once expired.
    pub fn tick(&mut self) -> TickOutcome {
        match self.remaining {
            None | Some(0) => TickOutcome::Idle,
            Some(1) => {
                self.remaining = Some(0);
                TickOutcome::Expired
            }
            Some(n) => {
                self.remaining = Some(n - 1);
                TickOutcome::Counting(n - 1)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oneword_core::model::{StoryWord, VoteDetails};
    use oneword_test_support::{session_awaiting, session_in_progress};

    fn with_active_vote(mut session: Session) -> Session {
        session.vote_details = Some(VoteDetails {
            vote_is_active: true,
            vote_proposed_by: Some("ada".into()),
            ..VoteDetails::default()
        });
        session
    }

    #[test]
    fn test_untimed_session_is_inert() {
        let session = session_in_progress(&["ada", "bo"]);

        assert_eq!(directive(None, &session, 0), TimerDirective::Inert);
    }

    #[test]
    fn test_first_writable_snapshot_restarts() {
        let session = session_in_progress(&["ada", "bo"]);

        assert_eq!(directive(None, &session, 30), TimerDirective::Restart);
    }

    #[test]
    fn test_turn_advance_restarts_and_no_change_keeps() {
        // Arrange
        let previous = session_in_progress(&["ada", "bo"]);
        let mut next = previous.clone();
        next.turn_index = 1;
        next.words.push(StoryWord {
            author_name: "ada".into(),
            word: "Once".into(),
        });

        // Act / Assert
        assert_eq!(directive(Some(&previous), &next, 30), TimerDirective::Restart);
        assert_eq!(directive(Some(&next), &next, 30), TimerDirective::Keep);
    }

    #[test]
    fn test_active_vote_pauses_and_conclusion_restarts() {
        let before = session_in_progress(&["ada", "bo"]);
        let voting = with_active_vote(before.clone());
        let mut after = voting.clone();
        after.vote_details.as_mut().unwrap().vote_is_active = false;

        assert_eq!(directive(Some(&before), &voting, 30), TimerDirective::Pause);
        assert_eq!(directive(Some(&voting), &after, 30), TimerDirective::Restart);
    }

    #[test]
    fn test_pauses_when_not_writable() {
        let awaiting = session_awaiting(&["ada", "bo"]);
        let lonely = session_in_progress(&["ada"]);

        assert_eq!(directive(None, &awaiting, 30), TimerDirective::Pause);
        assert_eq!(directive(None, &lonely, 30), TimerDirective::Pause);
    }

    #[test]
    fn test_second_author_arriving_restarts() {
        let lonely = session_in_progress(&["ada"]);
        let mut joined = lonely.clone();
        joined.authors.push(oneword_test_support::author("bo"));

        assert_eq!(directive(Some(&lonely), &joined, 30), TimerDirective::Restart);
    }

    #[test]
    fn test_countdown_expires_once_and_stays_at_zero() {
        let mut countdown = Countdown::new(2);
        assert_eq!(countdown.tick(), TickOutcome::Idle);

        countdown.restart();

        assert_eq!(countdown.tick(), TickOutcome::Counting(1));
        assert_eq!(countdown.tick(), TickOutcome::Expired);
        assert_eq!(countdown.tick(), TickOutcome::Idle);
        assert_eq!(countdown.remaining(), Some(0));
    }
}
