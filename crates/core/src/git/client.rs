//! Asynchronous git CLI client with trial-merge orchestration.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::command::{shell_escape, GitCommand};
use super::parser::{
    conflicting_files_from_merge_output, is_commit_sha, is_noop_merge_output, parse_branch_list,
    parse_commit_log,
};
use crate::config::GitOptions;
use crate::errors::GitError;
use crate::models::{Branch, Commit, Conflict, MergeOptions, MergeOutcome};

/// Log format for ref-range queries: sha, author name, author email,
/// ISO-8601 author date, subject.
const LOG_FORMAT: &str = "--format=%H\t%an\t%ae\t%aI\t%s";

/// Ref-listing format matching what [`parse_branch_list`] expects. The `~`
/// delimiter cannot occur in a ref name.
const REF_LIST_FORMAT: &str =
    "--format=%(refname:short)~%(authordate:iso8601)~%(authorname)~%(authoremail)";

/// Exact output of a push that had nothing to do.
const PUSH_NOOP_OUTPUT: &str = "Everything up-to-date\n";

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Asynchronous client driving the `git` CLI against one cached repository
/// clone.
///
/// The remote URL and local cache path are derived from the repository name
/// at construction and never change. The only mutable state is the working
/// directory itself; [`merge_branches`](Self::merge_branches) and
/// [`clone_or_update`](Self::clone_or_update) serialize on an internal lock
/// so a client shared across tasks cannot interleave mutations.
#[derive(Debug)]
pub struct GitClient {
    repository_name: String,
    repository_url: String,
    repository_path: PathBuf,
    options: GitOptions,
    work_lock: Mutex<()>,
}

impl GitClient {
    /// Create a client for `repository_name` (`owner/repo` style names form
    /// nested cache directories).
    pub fn new(repository_name: impl Into<String>, options: GitOptions) -> Self {
        let repository_name = repository_name.into();
        let repository_url = format!("{}{}.git", options.remote_base, repository_name);
        let repository_path = options.cache_root.join(&repository_name);
        info!(name = %repository_name, url = %repository_url, "created git client");

        Self {
            repository_name,
            repository_url,
            repository_path,
            options,
            work_lock: Mutex::new(()),
        }
    }

    pub fn repository_name(&self) -> &str {
        &self.repository_name
    }

    pub fn repository_url(&self) -> &str {
        &self.repository_url
    }

    pub fn repository_path(&self) -> &Path {
        &self.repository_path
    }

    // -----------------------------------------------------------------------
    // Command execution
    // -----------------------------------------------------------------------

    /// Run one git command to completion, returning its combined
    /// stdout+stderr (stdout first). A non-zero exit becomes
    /// [`GitError::CommandFailed`] carrying the rendered command line and
    /// the same combined output.
    pub async fn execute(
        &self,
        command: &GitCommand,
        run_in_repo_dir: bool,
    ) -> Result<String, GitError> {
        let rendered = format!(
            "{} {}",
            self.options.binary_path.display(),
            command.rendered()
        );

        let mut cmd = Command::new(&self.options.binary_path);
        cmd.args(command.argv())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if run_in_repo_dir {
            cmd.current_dir(&self.repository_path);
        }

        debug!(cmd = %rendered, "running git command");
        let output = cmd.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                GitError::BinaryNotFound(self.options.binary_path.display().to_string())
            } else {
                GitError::IoError(e)
            }
        })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).to_string();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            let exit_code = output.status.code().unwrap_or(-1);
            warn!(exit_code, cmd = %rendered, "git command failed");
            return Err(GitError::CommandFailed {
                command: rendered,
                exit_code,
                output: combined,
            });
        }
        Ok(combined)
    }

    // -----------------------------------------------------------------------
    // Repository lifecycle
    // -----------------------------------------------------------------------

    /// Clone the repository if it is not cached yet; otherwise restore the
    /// existing clone to a clean, current state. The update sequence is
    /// self-healing: anything a crashed run left in the working directory is
    /// discarded first.
    #[instrument(skip(self), fields(name = %self.repository_name))]
    pub async fn clone_or_update(&self, default_branch_name: &str) -> Result<(), GitError> {
        let _work = self.work_lock.lock().await;

        if self.repository_path.is_dir() {
            self.reset().await?;
            let mut clean = GitCommand::new();
            clean.args(&["clean", "-f", "-d"]);
            self.execute(&clean, true).await?;

            self.checkout_branch(default_branch_name).await?;

            // drop branches deleted on the remote, then update the rest
            let mut fetch = GitCommand::new();
            fetch.args(&["fetch", "--prune", "--all"]);
            self.execute(&fetch, true).await?;

            let mut pull = GitCommand::new();
            pull.args(&["pull", "--all"]);
            self.execute(&pull, true).await?;

            info!(path = %self.repository_path.display(), "updated repository");
        } else {
            let path = self.repository_path.display().to_string();
            let mut clone = GitCommand::new();
            clone.args(&["clone", &self.repository_url, &path]);
            self.execute(&clone, false).await?;

            info!(path = %self.repository_path.display(), "cloned repository");
        }
        Ok(())
    }

    /// Check out a branch, discarding local changes on the way in and out.
    #[instrument(skip(self), fields(name = %self.repository_name, branch = %branch_name))]
    pub async fn checkout_branch(&self, branch_name: &str) -> Result<(), GitError> {
        self.reset().await?;
        self.execute(&checkout_command(branch_name), true).await?;
        self.reset().await
    }

    /// Hard-reset the current branch to its remote-tracking counterpart,
    /// discarding all local modifications.
    pub async fn reset(&self) -> Result<(), GitError> {
        let current = self.current_branch_name().await?;
        self.execute(&reset_command(&current), true).await?;
        Ok(())
    }

    /// Push the current branch to origin. Returns whether anything was
    /// actually pushed.
    #[instrument(skip(self), fields(name = %self.repository_name, dry_run))]
    pub async fn push(&self, dry_run: bool) -> Result<bool, GitError> {
        let mut command = GitCommand::new();
        command.args(&["push"]);
        if dry_run {
            command.args(&["--dry-run"]);
        }
        command.args(&["origin"]);

        let raw_output = self.execute(&command, true).await?;
        Ok(raw_output != PUSH_NOOP_OUTPUT)
    }

    /// Fetch all remotes without pruning.
    pub async fn fetch_all(&self) -> Result<(), GitError> {
        let mut command = GitCommand::new();
        command.args(&["fetch", "--all"]);
        self.execute(&command, true).await?;
        Ok(())
    }

    /// Name of the branch currently checked out.
    pub async fn current_branch_name(&self) -> Result<String, GitError> {
        let mut command = GitCommand::new();
        command.args(&["rev-parse", "--abbrev-ref", "HEAD"]);
        let output = self.execute(&command, true).await?;
        Ok(output.trim().to_string())
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// List all remote-tracking branches with the author and date of their
    /// latest commits. Order follows git's listing order.
    #[instrument(skip(self), fields(name = %self.repository_name))]
    pub async fn branch_list(&self) -> Result<Vec<Branch>, GitError> {
        let mut command = GitCommand::new();
        command.args(&["for-each-ref", "refs/remotes/", REF_LIST_FORMAT]);
        let output = self.execute(&command, true).await?;
        parse_branch_list(&output, &self.repository_name)
    }

    /// Commits reachable from `ref_name` but not from `ancestor_ref_name`.
    /// Either side may be a branch name or a raw 40-hex commit sha; branch
    /// names are compared in their remote-tracking form.
    #[instrument(skip(self), fields(name = %self.repository_name, from = %ancestor_ref_name, to = %ref_name))]
    pub async fn commit_diff_refs(
        &self,
        ref_name: &str,
        ancestor_ref_name: &str,
        fetch: bool,
    ) -> Result<Vec<Commit>, GitError> {
        if fetch {
            self.fetch_all().await?;
        }

        let output = self
            .execute(&log_range_command(ref_name, ancestor_ref_name), true)
            .await?;
        let mut commits = parse_commit_log(&output)?;
        for commit in &mut commits {
            commit.repository_name = Some(self.repository_name.clone());
        }
        Ok(commits)
    }

    /// Files changed on `branch_name` since its merge base with
    /// `ancestor_branch_name`.
    #[instrument(skip(self), fields(name = %self.repository_name, branch = %branch_name, ancestor = %ancestor_branch_name))]
    pub async fn file_diff_with_ancestor(
        &self,
        branch_name: &str,
        ancestor_branch_name: &str,
    ) -> Result<Vec<String>, GitError> {
        let base_output = self
            .execute(&merge_base_command(branch_name, ancestor_branch_name), true)
            .await?;
        let base = base_output.trim();

        let raw_output = self
            .execute(&diff_range_command(base, branch_name), true)
            .await?;
        Ok(raw_output.lines().map(|l| l.to_string()).collect())
    }

    /// Resolve the newest reachable tag matching a glob pattern. A pattern
    /// that matches nothing surfaces as [`GitError::CommandFailed`].
    #[instrument(skip(self), fields(name = %self.repository_name, pattern = %tag_pattern))]
    pub async fn lookup_tag(&self, tag_pattern: &str) -> Result<String, GitError> {
        let mut command = GitCommand::new();
        command
            .args(&["describe", "--abbrev=0", "--match"])
            .ref_arg(tag_pattern);
        let output = self.execute(&command, true).await?;
        Ok(output.trim().to_string())
    }

    // -----------------------------------------------------------------------
    // Trial merge
    // -----------------------------------------------------------------------

    /// Attempt a trial merge of `source_branch_name` (or an explicit tag,
    /// see [`MergeOptions::source_tag`]) into `target_branch_name` and
    /// classify the outcome.
    ///
    /// Cleanup is unconditional: unless the caller asked to keep the trial
    /// changes, the working directory is hard-reset on every exit path,
    /// conflicted and failed ones included. A cleanup failure takes
    /// precedence over the captured result.
    ///
    /// Failures whose output carries no conflict markers (missing refs,
    /// network, authentication) come back as the original
    /// [`GitError::CommandFailed`], never as a conflict.
    #[instrument(skip(self, options), fields(name = %self.repository_name, target = %target_branch_name, source = %source_branch_name))]
    pub async fn merge_branches(
        &self,
        target_branch_name: &str,
        source_branch_name: &str,
        options: &MergeOptions,
    ) -> Result<MergeOutcome, GitError> {
        let _work = self.work_lock.lock().await;

        let result = self
            .attempt_merge(target_branch_name, source_branch_name, options)
            .await;

        if !options.keep_changes {
            self.reset().await?;
        }

        if let Ok(outcome) = &result {
            info!(%outcome, "trial merge classified");
        }
        result
    }

    async fn attempt_merge(
        &self,
        target_branch_name: &str,
        source_branch_name: &str,
        options: &MergeOptions,
    ) -> Result<MergeOutcome, GitError> {
        if self.current_branch_name().await? != target_branch_name {
            self.checkout_branch(target_branch_name).await?;
        }

        match self
            .execute(&merge_command(source_branch_name, options), true)
            .await
        {
            Ok(raw_output) => {
                if is_noop_merge_output(&raw_output) {
                    Ok(MergeOutcome::NoOp)
                } else {
                    Ok(MergeOutcome::Clean)
                }
            }
            Err(GitError::CommandFailed {
                command,
                exit_code,
                output,
            }) => {
                let files = conflicting_files_from_merge_output(&output);
                match Conflict::new(
                    &self.repository_name,
                    target_branch_name,
                    source_branch_name,
                    files,
                ) {
                    Ok(conflict) => Ok(MergeOutcome::Conflicted(conflict)),
                    // no conflict markers in the output: not a merge
                    // conflict, so the original failure propagates
                    Err(_) => Err(GitError::CommandFailed {
                        command,
                        exit_code,
                        output,
                    }),
                }
            }
            Err(other) => Err(other),
        }
    }
}

// ---------------------------------------------------------------------------
// Command builders
// ---------------------------------------------------------------------------

fn checkout_command(branch_name: &str) -> GitCommand {
    let mut command = GitCommand::new();
    command.args(&["checkout"]).ref_arg(branch_name);
    command
}

fn reset_command(current_branch_name: &str) -> GitCommand {
    let mut command = GitCommand::new();
    command
        .args(&["reset", "--hard"])
        .prefixed_ref_arg("origin/", current_branch_name);
    command
}

/// `merge --no-edit [-m <message>] <source>`: the source is the tag when a
/// non-empty one is given, otherwise the remote-tracking form of the source
/// branch.
fn merge_command(source_branch_name: &str, options: &MergeOptions) -> GitCommand {
    let mut command = GitCommand::new();
    command.args(&["merge", "--no-edit"]);
    if let Some(message) = &options.commit_message {
        command.args(&["-m"]).message_arg(message);
    }
    match options.source_tag.as_deref().filter(|tag| !tag.is_empty()) {
        Some(tag) => command.ref_arg(tag),
        None => command.prefixed_ref_arg("origin/", source_branch_name),
    };
    command
}

fn merge_base_command(branch_name: &str, ancestor_branch_name: &str) -> GitCommand {
    let mut command = GitCommand::new();
    command
        .args(&["merge-base"])
        .prefixed_ref_arg("origin/", ancestor_branch_name)
        .prefixed_ref_arg("origin/", branch_name);
    command
}

fn diff_range_command(base: &str, branch_name: &str) -> GitCommand {
    let mut command = GitCommand::new();
    command.args(&["diff", "--name-only"]).raw_arg(
        format!("{base}..origin/{branch_name}"),
        format!("{base}..origin/{}", shell_escape(branch_name)),
    );
    command
}

fn log_range_command(ref_name: &str, ancestor_ref_name: &str) -> GitCommand {
    let ancestor_prefix = remote_prefix(ancestor_ref_name);
    let ref_prefix = remote_prefix(ref_name);

    let mut command = GitCommand::new();
    command.args(&["log", LOG_FORMAT, "--no-color"]).raw_arg(
        format!("{ancestor_prefix}{ancestor_ref_name}..{ref_prefix}{ref_name}"),
        format!(
            "{ancestor_prefix}{}..{ref_prefix}{}",
            shell_escape(ancestor_ref_name),
            shell_escape(ref_name)
        ),
    );
    command
}

/// Branch names are compared in their remote-tracking form; raw commit shas
/// are used as-is.
fn remote_prefix(ref_name: &str) -> &'static str {
    if is_commit_sha(ref_name) {
        ""
    } else {
        "origin/"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_identity_derivation() {
        let client = GitClient::new("Invoca/web", GitOptions::default());
        assert_eq!(client.repository_name(), "Invoca/web");
        assert_eq!(client.repository_url(), "git@github.com:Invoca/web.git");
        assert_eq!(client.repository_path(), Path::new("/tmp/git/Invoca/web"));
    }

    #[test]
    fn test_client_identity_honors_options() {
        let options = GitOptions {
            binary_path: "/opt/git/bin/git".into(),
            cache_root: "/srv/cache".into(),
            remote_base: "file:///srv/remotes/".into(),
        };
        let client = GitClient::new("widget", options);
        assert_eq!(client.repository_url(), "file:///srv/remotes/widget.git");
        assert_eq!(client.repository_path(), Path::new("/srv/cache/widget"));
    }

    #[test]
    fn test_checkout_command_escapes_branch_names() {
        let command = checkout_command("branch_`name");
        assert_eq!(command.rendered(), "checkout branch_\\`name");
        assert_eq!(command.argv(), ["checkout", "branch_`name"]);
    }

    #[test]
    fn test_reset_command_escapes_branch_names() {
        let command = reset_command("branch_`name");
        assert_eq!(command.rendered(), "reset --hard origin/branch_\\`name");
        assert_eq!(command.argv(), ["reset", "--hard", "origin/branch_`name"]);
    }

    #[test]
    fn test_merge_command_escapes_branch_names_but_not_messages() {
        let options = MergeOptions {
            commit_message: Some("commit `message".into()),
            ..MergeOptions::default()
        };
        let command = merge_command("source`name space", &options);
        assert_eq!(
            command.rendered(),
            "merge --no-edit -m \"commit `message\" origin/source\\`name\\ space"
        );
        assert_eq!(
            command.argv(),
            [
                "merge",
                "--no-edit",
                "-m",
                "commit `message",
                "origin/source`name space"
            ]
        );
    }

    #[test]
    fn test_merge_command_without_message_has_no_empty_tokens() {
        let command = merge_command("source_branch", &MergeOptions::default());
        assert_eq!(command.rendered(), "merge --no-edit origin/source_branch");
        assert_eq!(
            command.argv(),
            ["merge", "--no-edit", "origin/source_branch"]
        );
    }

    #[test]
    fn test_merge_command_uses_tag_when_given() {
        let options = MergeOptions {
            source_tag: Some("tag_name".into()),
            ..MergeOptions::default()
        };
        let command = merge_command("source_branch", &options);
        assert_eq!(command.rendered(), "merge --no-edit tag_name");

        // an empty tag falls back to the source branch
        let options = MergeOptions {
            source_tag: Some(String::new()),
            ..MergeOptions::default()
        };
        let command = merge_command("source_branch", &options);
        assert_eq!(command.rendered(), "merge --no-edit origin/source_branch");
    }

    #[test]
    fn test_log_range_command_prefixes_branches() {
        let command = log_range_command("branch", "ancestor_branch");
        assert_eq!(
            command.rendered(),
            "log --format=%H\t%an\t%ae\t%aI\t%s --no-color origin/ancestor_branch..origin/branch"
        );
    }

    #[test]
    fn test_log_range_command_leaves_shas_bare() {
        let command =
            log_range_command("e2a7e607745d63da4d7f8486e0619e91a410f796", "ancestor_branch");
        assert_eq!(
            command.rendered(),
            "log --format=%H\t%an\t%ae\t%aI\t%s --no-color origin/ancestor_branch..e2a7e607745d63da4d7f8486e0619e91a410f796"
        );

        let command = log_range_command(
            "e2a7e607745d63da4d7f8486e0619e91a410f796",
            "c5e8de4eb36a2d1b9f66543966ede9ce9cc28a89",
        );
        assert_eq!(
            command.rendered(),
            "log --format=%H\t%an\t%ae\t%aI\t%s --no-color c5e8de4eb36a2d1b9f66543966ede9ce9cc28a89..e2a7e607745d63da4d7f8486e0619e91a410f796"
        );
    }

    #[test]
    fn test_log_range_command_escapes_backticks() {
        let command = log_range_command("branch`name", "ancestor`_branch");
        assert_eq!(
            command.rendered(),
            "log --format=%H\t%an\t%ae\t%aI\t%s --no-color origin/ancestor\\`_branch..origin/branch\\`name"
        );
        assert_eq!(
            command.argv()[3],
            "origin/ancestor`_branch..origin/branch`name"
        );
    }

    #[test]
    fn test_merge_base_and_diff_commands() {
        let command = merge_base_command("branch`name", "ancestor`_branch");
        assert_eq!(
            command.rendered(),
            "merge-base origin/ancestor\\`_branch origin/branch\\`name"
        );

        let command = diff_range_command("fedc8e0cfa136d5e1f84005ab6d82235122b0006", "branch`name");
        assert_eq!(
            command.rendered(),
            "diff --name-only fedc8e0cfa136d5e1f84005ab6d82235122b0006..origin/branch\\`name"
        );
        assert_eq!(
            command.argv(),
            [
                "diff",
                "--name-only",
                "fedc8e0cfa136d5e1f84005ab6d82235122b0006..origin/branch`name"
            ]
        );
    }
}
