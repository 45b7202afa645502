//! One Word — session projection, turns and membership.
//!
//! Holds the client's read-only copy of a session and everything derived
//! from it: whose turn it is, the turn countdown, who the local author is,
//! and whether an interrupted session can be resumed.

pub mod application;
pub mod domain;
