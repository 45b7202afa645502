//! The connection manager.

pub mod manager;
