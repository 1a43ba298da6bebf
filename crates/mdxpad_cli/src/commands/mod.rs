//! Subcommand implementations

pub mod init;
pub mod live;
pub mod render;
