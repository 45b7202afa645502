//! One Word Core — shared session model and collaborator contracts.
//!
//! This crate defines the session snapshot types, the error taxonomy, the
//! commands a client may issue, and the traits behind which the
//! authoritative session service, the push channel and local identity
//! storage live. It contains no infrastructure code.

pub mod clock;
pub mod command;
pub mod error;
pub mod event;
pub mod identity;
pub mod model;
pub mod service;
pub mod transport;
