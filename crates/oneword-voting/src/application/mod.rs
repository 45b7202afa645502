//! Vote orchestration.

pub mod vote_coordinator;
