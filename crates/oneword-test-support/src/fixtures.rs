//! Session fixtures.

use oneword_core::model::{Author, Session, SessionState, VotingScheme};
use uuid::Uuid;

/// An author with a fresh id who is not the creator.
#[must_use]
pub fn author(name: &str) -> Author {
    Author {
        id: Uuid::new_v4(),
        name: name.to_owned(),
        is_creator: false,
    }
}

fn session_with(names: &[&str], state: SessionState) -> Session {
    let authors = names
        .iter()
        .enumerate()
        .map(|(i, name)| Author {
            is_creator: i == 0,
            ..author(name)
        })
        .collect();
    Session {
        id: Uuid::new_v4(),
        title: "The Lighthouse Keeper".to_owned(),
        genre: None,
        word_limit: 0,
        turn_time_limit_seconds: 30,
        state,
        authors,
        words: Vec::new(),
        turn_index: 0,
        voting_scheme: VotingScheme::Majority,
        vote_details: None,
        version: 1,
    }
}

/// An in-progress session with a 30 second turn limit. The first name is
/// the creator and holds the turn.
#[must_use]
pub fn session_in_progress(names: &[&str]) -> Session {
    session_with(names, SessionState::InProgress)
}

/// A session still waiting for authors. The first name, if any, is the
/// creator.
#[must_use]
pub fn session_awaiting(names: &[&str]) -> Session {
    session_with(names, SessionState::AwaitingAuthors)
}
