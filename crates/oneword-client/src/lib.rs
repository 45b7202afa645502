//! One Word — client session engine.
//!
//! Wires the connection manager, session store, turn and vote coordinators
//! and membership manager into a single [`engine::SessionClient`] task, and
//! provides the process-level pieces around it: configuration, tracing
//! setup, and a JSON file identity store, joined up in [`bootstrap`].

pub mod bootstrap;
pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod identity_store;
pub mod telemetry;
