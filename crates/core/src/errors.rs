//! Error types for the mergeprobe core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Conflict(#[from] ConflictError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Git errors
// ---------------------------------------------------------------------------

/// Errors from driving the `git` CLI.
#[derive(Debug, Error)]
pub enum GitError {
    /// The configured `git` binary could not be found.
    #[error("git binary not found: {0}")]
    BinaryNotFound(String),

    /// A `git` command exited with a non-zero status.
    ///
    /// `command` is the full rendered command line (binary included) and
    /// `output` is the combined stdout+stderr the process produced. The merge
    /// path inspects `output` to decide whether the failure was a conflict.
    #[error("git command {command} failed with exit code {exit_code}. Message:\n{output}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        output: String,
    },

    /// Could not parse the output produced by `git`.
    #[error("failed to parse git output: {0}")]
    ParseError(String),

    /// Generic I/O wrapper.
    #[error("git I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Conflict errors
// ---------------------------------------------------------------------------

/// Errors from constructing conflict results.
#[derive(Debug, Error)]
pub enum ConflictError {
    /// A conflict result needs at least one conflicting file; an empty list
    /// means the failure that produced it was not a merge conflict at all.
    #[error("conflict between '{branch_a}' and '{branch_b}' must have at least one conflicting file")]
    EmptyFileList {
        branch_a: String,
        branch_b: String,
    },
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue {
        field: String,
        detail: String,
    },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
