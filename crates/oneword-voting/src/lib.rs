//! One Word — vote governance.
//!
//! Authors can propose to end the story or retract the last word. A vote
//! carries on a strict majority of the authors currently in the session.
//! Any client that observes a decided vote asks the service to conclude it;
//! the service applies the consequence once.

pub mod application;
pub mod domain;
