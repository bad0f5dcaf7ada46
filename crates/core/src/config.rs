//! TOML-based configuration for the git driver.
//!
//! Defaults match a conventional server layout, but every location is plain
//! data handed to [`GitClient`] at construction time so tests and alternate
//! deployments can point elsewhere (including `file://` remotes).
//!
//! [`GitClient`]: crate::git::GitClient

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::ConfigError;

/// Settings controlling how repositories are located, cached, and driven.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitOptions {
    /// Path to the `git` executable.
    #[serde(default = "default_binary_path")]
    pub binary_path: PathBuf,

    /// Directory under which repository clones are cached, one subdirectory
    /// per repository name.
    #[serde(default = "default_cache_root")]
    pub cache_root: PathBuf,

    /// Prefix a repository name is appended to when deriving its remote URL
    /// (`<remote_base><name>.git`).
    #[serde(default = "default_remote_base")]
    pub remote_base: String,
}

fn default_binary_path() -> PathBuf {
    PathBuf::from("/usr/bin/git")
}
fn default_cache_root() -> PathBuf {
    PathBuf::from("/tmp/git")
}
fn default_remote_base() -> String {
    "git@github.com:".into()
}

impl Default for GitOptions {
    fn default() -> Self {
        Self {
            binary_path: default_binary_path(),
            cache_root: default_cache_root(),
            remote_base: default_remote_base(),
        }
    }
}

impl GitOptions {
    /// Load [`GitOptions`] from a TOML file at the given path.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let options: GitOptions =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(options)
    }

    /// Validate that all fields are present and sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.binary_path.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "binary_path".into(),
                detail: "git binary path must not be empty".into(),
            });
        }
        if self.cache_root.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "cache_root".into(),
                detail: "cache root must not be empty".into(),
            });
        }
        if self.remote_base.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "remote_base".into(),
                detail: "remote base must not be empty".into(),
            });
        }

        Ok(())
    }

    /// Convenience: load and validate in one call.
    pub fn load_and_validate<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let options = Self::load_from_file(path)?;
        options.validate()?;
        Ok(options)
    }
}
