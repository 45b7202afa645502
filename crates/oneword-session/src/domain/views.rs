//! Derived read-only views over a session snapshot.
//!
//! All functions degrade to a safe default when data is missing: no vote,
//! no current turn, no creator.

use oneword_core::model::{Session, SessionState};

/// Fewest authors needed to start and keep writing.
pub const MIN_AUTHORS: usize = 2;

/// Shown while a session has too few authors to write.
pub const WAITING_BANNER: &str = "Waiting for 2 or more authors.";

/// Name of the author whose turn it is.
#[must_use]
pub fn current_turn_name(session: &Session) -> Option<&str> {
    session.current_turn_author().map(|a| a.name.as_str())
}

/// Name of the session creator.
#[must_use]
pub fn creator_name(session: &Session) -> Option<&str> {
    session.creator().map(|a| a.name.as_str())
}

/// Whether new authors may still join.
#[must_use]
pub fn is_joinable(session: &Session) -> bool {
    !session.is_completed()
}

/// Whether there are enough authors to write.
#[must_use]
pub fn has_enough_authors(session: &Session) -> bool {
    session.authors.len() >= MIN_AUTHORS
}

/// Whether `name` has a ballot in the active vote.
#[must_use]
pub fn has_voted(session: &Session, name: &str) -> bool {
    session
        .active_vote()
        .is_some_and(|v| v.votes.iter().any(|b| b.author_name == name))
}

/// Whether `name` holds the turn.
#[must_use]
pub fn is_turn_of(session: &Session, name: &str) -> bool {
    current_turn_name(session) == Some(name)
}

/// Authors as prose: `"ada"`, `"ada and bo"`, `"ada, bo and cy"`.
#[must_use]
pub fn author_list(session: &Session) -> String {
    let names: Vec<&str> = session.authors.iter().map(|a| a.name.as_str()).collect();
    match names.as_slice() {
        [] => "no current authors".to_owned(),
        [only] => (*only).to_owned(),
        [init @ .., last] => format!("{} and {last}", init.join(", ")),
    }
}

/// Status line to show after moving from `previous` to `next`, if the
/// transition calls for one.
#[must_use]
pub fn status_banner(previous: Option<&Session>, next: &Session) -> Option<String> {
    let previous_state = previous.map_or(SessionState::AwaitingAuthors, |s| s.state);
    let state_changed = previous_state != next.state;

    if next.is_completed() {
        return state_changed.then(|| "Thanks for writing!".to_owned());
    }
    if !has_enough_authors(next) {
        return Some(WAITING_BANNER.to_owned());
    }
    if state_changed && next.state == SessionState::InProgress {
        return current_turn_name(next).map(|name| format!("{name}, it's your turn."));
    }
    None
}
