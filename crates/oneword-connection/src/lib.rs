//! One Word — push channel connection.
//!
//! Owns the single push channel to the session service, reconnects at a
//! fixed interval when it drops, and gives up after a bounded number of
//! attempts until asked to connect again.

pub mod application;
pub mod domain;
