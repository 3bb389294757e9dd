//! Subcommand implementations

pub mod run;
pub mod status;
pub mod validate;
