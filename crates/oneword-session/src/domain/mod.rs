//! Pure rules over session snapshots.

pub mod countdown;
pub mod validation;
pub mod views;
