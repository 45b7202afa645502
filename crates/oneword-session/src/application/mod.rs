//! Stateful coordinators driven by the client engine.

pub mod membership;
pub mod recovery;
pub mod store;
pub mod turn_coordinator;
