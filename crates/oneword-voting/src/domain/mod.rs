//! Pure vote rules.

pub mod resolution;
