#![warn(missing_docs)]

//! CLI surface of the NFS HA agent.

pub mod cli;

pub use cli::{Cli, Command};
