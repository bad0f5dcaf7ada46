//! mergeprobe command-line conflict detection tool.
//!
//! Provides subcommands for listing remote branches, showing the commits one
//! ref carries over another, and running a trial-merge conflict check whose
//! exit code can gate CI jobs.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use mergeprobe_core::config::GitOptions;
use mergeprobe_core::git::GitClient;
use mergeprobe_core::models::{MergeOptions, MergeOutcome};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// mergeprobe command-line conflict detection tool.
#[derive(Parser, Debug)]
#[command(
    name = "mergeprobe",
    version,
    about = "Detect git merge conflicts between branches without touching the remote"
)]
struct Cli {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the git binary path.
    #[arg(long, global = true)]
    binary: Option<PathBuf>,

    /// Override the directory cached clones live under.
    #[arg(long, global = true)]
    cache_root: Option<PathBuf>,

    /// Override the remote URL prefix repository names are appended to.
    #[arg(long, global = true)]
    remote_base: Option<String>,

    /// Branch checked out while refreshing the cached clone.
    #[arg(long, global = true, default_value = "main")]
    default_branch: String,

    /// Emit machine-readable JSON instead of tables.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List remote branches with their latest authors and dates.
    Branches {
        /// Repository name, e.g. "acme/widget".
        repository: String,
    },

    /// Show commits reachable from a ref but not from its ancestor.
    Log {
        /// Repository name, e.g. "acme/widget".
        repository: String,

        /// Branch name or 40-hex commit sha to read history from.
        r#ref: String,

        /// Branch name or 40-hex commit sha marking the cut-off.
        ancestor: String,

        /// Fetch all remotes before reading history.
        #[arg(long)]
        fetch: bool,
    },

    /// Trial-merge a source branch into a target and report the outcome.
    Check {
        /// Repository name, e.g. "acme/widget".
        repository: String,

        /// Branch the merge would land on.
        target: String,

        /// Branch whose changes are being probed.
        source: String,

        /// Merge this tag instead of the source branch's remote ref.
        #[arg(long)]
        tag: Option<String>,

        /// Use a custom merge commit message.
        #[arg(short, long)]
        message: Option<String>,

        /// Leave the merge result in the working directory for inspection.
        #[arg(long)]
        keep_changes: bool,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    // Minimal logging for CLI
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .without_time()
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let options = load_options(&cli)?;
    let default_branch = cli.default_branch.clone();
    let json = cli.json;

    match cli.command {
        Commands::Branches { repository } => {
            let client = refreshed_client(&repository, options, &default_branch).await?;
            cmd_branches(&client, json).await
        }
        Commands::Log {
            repository,
            r#ref,
            ancestor,
            fetch,
        } => {
            let client = refreshed_client(&repository, options, &default_branch).await?;
            cmd_log(&client, &r#ref, &ancestor, fetch, json).await
        }
        Commands::Check {
            repository,
            target,
            source,
            tag,
            message,
            keep_changes,
        } => {
            let client = refreshed_client(&repository, options, &default_branch).await?;
            let merge_options = MergeOptions {
                source_tag: tag,
                keep_changes,
                commit_message: message,
            };
            cmd_check(&client, &target, &source, &merge_options, json).await
        }
    }
}

// ---------------------------------------------------------------------------
// Config helpers
// ---------------------------------------------------------------------------

fn load_options(cli: &Cli) -> Result<GitOptions> {
    let mut options = match &cli.config {
        Some(path) => {
            GitOptions::load_from_file(path).context("failed to load configuration file")?
        }
        None => GitOptions::default(),
    };

    if let Some(binary) = &cli.binary {
        options.binary_path = binary.clone();
    }
    if let Some(cache_root) = &cli.cache_root {
        options.cache_root = cache_root.clone();
    }
    if let Some(remote_base) = &cli.remote_base {
        options.remote_base = remote_base.clone();
    }

    options.validate().context("invalid configuration")?;
    debug!(
        binary = %options.binary_path.display(),
        cache_root = %options.cache_root.display(),
        remote_base = %options.remote_base,
        "resolved options"
    );
    Ok(options)
}

/// Build a client and bring its cached clone up to date.
async fn refreshed_client(
    repository: &str,
    options: GitOptions,
    default_branch: &str,
) -> Result<GitClient> {
    let client = GitClient::new(repository, options);
    client
        .clone_or_update(default_branch)
        .await
        .with_context(|| format!("failed to prepare cached clone for '{}'", repository))?;
    Ok(client)
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

async fn cmd_branches(client: &GitClient, json: bool) -> Result<ExitCode> {
    let branches = client
        .branch_list()
        .await
        .context("failed to list branches")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&branches)?);
        return Ok(ExitCode::SUCCESS);
    }

    if branches.is_empty() {
        println!("No remote branches found.");
        return Ok(ExitCode::SUCCESS);
    }

    println!("{:<42} {:<26} AUTHOR", "BRANCH", "LAST COMMIT");
    println!("{}", "-".repeat(100));
    for branch in &branches {
        println!(
            "{:<42} {:<26} {} <{}>",
            truncate(&branch.name, 40),
            branch.last_modified_date.format("%Y-%m-%d %H:%M %z"),
            branch.author_name,
            branch.author_email,
        );
    }
    println!();
    println!("{} branch(es)", branches.len());

    Ok(ExitCode::SUCCESS)
}

async fn cmd_log(
    client: &GitClient,
    ref_name: &str,
    ancestor_ref_name: &str,
    fetch: bool,
    json: bool,
) -> Result<ExitCode> {
    let commits = client
        .commit_diff_refs(ref_name, ancestor_ref_name, fetch)
        .await
        .context("failed to read commit range")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&commits)?);
        return Ok(ExitCode::SUCCESS);
    }

    if commits.is_empty() {
        println!(
            "'{}' carries no commits over '{}'.",
            ref_name, ancestor_ref_name
        );
        return Ok(ExitCode::SUCCESS);
    }

    println!("{:<10} {:<18} {:<24} SUBJECT", "SHA", "DATE", "AUTHOR");
    println!("{}", "-".repeat(100));
    for commit in &commits {
        println!(
            "{:<10} {:<18} {:<24} {}",
            short_sha(&commit.sha),
            commit.commit_date.format("%Y-%m-%d %H:%M"),
            truncate(&commit.author_name, 22),
            truncate(&commit.message, 44),
        );
    }
    println!();
    println!("{} commit(s)", commits.len());

    Ok(ExitCode::SUCCESS)
}

async fn cmd_check(
    client: &GitClient,
    target: &str,
    source: &str,
    merge_options: &MergeOptions,
    json: bool,
) -> Result<ExitCode> {
    let outcome = client
        .merge_branches(target, source, merge_options)
        .await
        .context("trial merge failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(exit_code_for(&outcome));
    }

    match &outcome {
        MergeOutcome::Clean => {
            println!("No conflicts: '{}' merges cleanly into '{}'.", source, target);
        }
        MergeOutcome::NoOp => {
            println!("Nothing to merge: '{}' already contains '{}'.", target, source);
        }
        MergeOutcome::Conflicted(conflict) => {
            println!(
                "CONFLICT: {} file(s) collide merging '{}' into '{}':",
                conflict.conflicting_files.len(),
                source,
                target
            );
            for file in &conflict.conflicting_files {
                println!("  {}", file);
            }
        }
    }

    Ok(exit_code_for(&outcome))
}

/// Clean and no-op probes gate nothing; conflicts fail the job.
fn exit_code_for(outcome: &MergeOutcome) -> ExitCode {
    match outcome {
        MergeOutcome::Clean | MergeOutcome::NoOp => ExitCode::SUCCESS,
        MergeOutcome::Conflicted(_) => ExitCode::from(2),
    }
}

// ---------------------------------------------------------------------------
// Utilities
// ---------------------------------------------------------------------------

fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    // never cut inside a multi-byte character
    let mut cut = max_len.saturating_sub(3);
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &s[..cut])
}

fn short_sha(sha: &str) -> &str {
    &sha[..sha.len().min(8)]
}
