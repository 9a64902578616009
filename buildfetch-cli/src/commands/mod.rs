//! CLI command implementations.

pub mod common;
pub mod download;
pub mod files;
pub mod saved;
