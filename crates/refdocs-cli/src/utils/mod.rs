//! Shared helpers for command implementations.

pub mod logging;
