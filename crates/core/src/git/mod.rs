//! Git operations for mergeprobe.

pub mod client;
pub mod command;
pub mod parser;

pub use client::GitClient;
pub use command::GitCommand;
