//! Shared test doubles and fixtures for the One Word story engine.

mod clock;
mod fixtures;
mod identity;
mod service;
mod transport;

pub use clock::FixedClock;
pub use fixtures::{author, session_awaiting, session_in_progress};
pub use identity::InMemoryIdentityStore;
pub use service::{FailingSessionService, InMemorySessionService};
pub use transport::ScriptedTransport;
