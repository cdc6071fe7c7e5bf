//! Command implementations for the Keel CLI.

pub mod status;
pub mod train;
