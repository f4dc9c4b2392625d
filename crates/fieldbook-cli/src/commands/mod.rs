//! CLI command implementations

pub mod completions;
pub mod config;
pub mod import;
pub mod project;
pub mod serve;
