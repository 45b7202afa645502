//! Connection states, policy and signals.

pub mod state;
