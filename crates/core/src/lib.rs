//! mergeprobe core library.
//!
//! This crate provides the foundational components for trial-merge conflict
//! detection between git branches: configuration, branch and commit models,
//! and an asynchronous client that drives the `git` CLI against a cached
//! clone, classifies merge outcomes, and restores the working directory on
//! every exit path.

pub mod config;
pub mod errors;
pub mod git;
pub mod models;

// Re-exports for convenience.
pub use config::GitOptions;
pub use errors::{ConfigError, ConflictError, CoreError, GitError};
pub use git::{GitClient, GitCommand};
pub use models::{Branch, Commit, Conflict, MergeOptions, MergeOutcome};
