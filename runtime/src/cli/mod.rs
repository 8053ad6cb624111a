//! CLI subcommand implementations for the `web-explorer` binary.

pub mod doctor;
pub mod explore_cmd;
pub mod export_cmd;
pub mod output;
pub mod validate_cmd;
