//! CLI command implementations.

pub mod approve;
pub mod replay;
