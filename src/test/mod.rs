//! Shared functionality which is used in unit tests across the crate.
