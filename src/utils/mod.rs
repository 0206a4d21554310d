//! Shared utilities.

pub mod format;
