//! Parsers for git ref-listing, log, and merge output.

use std::sync::LazyLock;

use chrono::DateTime;
use regex_lite::Regex;
use tracing::debug;

use crate::errors::GitError;
use crate::models::{Branch, Commit};

/// Field separator used in ref-listing records; git forbids it in ref names.
const FIELD_DELIMITER: char = '~';

/// Author dates in ref listings arrive as `%(authordate:iso8601)`,
/// e.g. `2015-10-19 17:58:24 -0700`.
const REF_LIST_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S %z";

static CONFLICT_ANNOTATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"CONFLICT \(.*\): ").expect("valid pattern"));
static DELETED_IN_TRAILER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" deleted in .*").expect("valid pattern"));

// ---------------------------------------------------------------------------
// Ref listing
// ---------------------------------------------------------------------------

/// Parse `for-each-ref` output (one `~`-delimited record per line) into
/// branches tagged with `repository_name`. Records keep the listing order.
pub fn parse_branch_list(output: &str, repository_name: &str) -> Result<Vec<Branch>, GitError> {
    debug!("parsing ref listing ({} bytes)", output.len());

    let mut branches = Vec::new();
    for line in output.lines() {
        if line.is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split(FIELD_DELIMITER).collect();
        if fields.len() != 4 {
            return Err(GitError::ParseError(format!(
                "expected 4 fields in ref listing record, got {}: {:?}",
                fields.len(),
                line
            )));
        }

        let name = fields[0].strip_prefix("origin/").unwrap_or(fields[0]);
        let last_modified_date = DateTime::parse_from_str(fields[1], REF_LIST_DATE_FORMAT)
            .map_err(|e| {
                GitError::ParseError(format!("bad author date {:?}: {}", fields[1], e))
            })?;
        let author_email = fields[3].trim_start_matches('<').trim_end_matches('>');

        branches.push(Branch::new(
            repository_name,
            name,
            last_modified_date,
            fields[2],
            author_email,
        ));
    }

    debug!(count = branches.len(), "parsed branches");
    Ok(branches)
}

// ---------------------------------------------------------------------------
// Commit log
// ---------------------------------------------------------------------------

/// Parse `log --format=%H\t%an\t%ae\t%aI\t%s` output into commits. The
/// subject is the final field and may itself contain tabs, so each record is
/// split with a field limit.
pub fn parse_commit_log(output: &str) -> Result<Vec<Commit>, GitError> {
    debug!("parsing commit log ({} bytes)", output.len());

    let mut commits = Vec::new();
    for line in output.lines() {
        if line.is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.splitn(5, '\t').collect();
        if fields.len() != 5 {
            return Err(GitError::ParseError(format!(
                "expected 5 fields in log record, got {}: {:?}",
                fields.len(),
                line
            )));
        }

        let commit_date = DateTime::parse_from_rfc3339(fields[3]).map_err(|e| {
            GitError::ParseError(format!("bad commit date {:?}: {}", fields[3], e))
        })?;

        commits.push(Commit::new(
            fields[0], fields[4], commit_date, fields[1], fields[2],
        ));
    }

    debug!(count = commits.len(), "parsed commits");
    Ok(commits)
}

/// Whether a ref is a raw commit identifier (and must not be given a remote
/// prefix): exactly 40 lowercase hex characters.
pub fn is_commit_sha(value: &str) -> bool {
    value.len() == 40 && value.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

// ---------------------------------------------------------------------------
// Merge output
// ---------------------------------------------------------------------------

/// Extract the conflicting file paths from failed-merge output: keep the
/// lines carrying the `CONFLICT` marker, then strip the classification
/// annotation, the `Merge conflict in ` prefix, and any ` deleted in ...`
/// trailer. Paths keep their output order; duplicates are not removed. An
/// empty result means the failure was not a conflict.
pub fn conflicting_files_from_merge_output(output: &str) -> Vec<String> {
    output
        .lines()
        .filter(|line| line.contains("CONFLICT"))
        .map(|line| {
            let stripped = CONFLICT_ANNOTATION.replace(line, "");
            let stripped = stripped.replacen("Merge conflict in ", "", 1);
            DELETED_IN_TRAILER.replace(&stripped, "").into_owned()
        })
        .collect()
}

/// Whether successful merge output reports that nothing needed merging.
/// Both the historic hyphenated spelling and the one git prints since 2.16
/// are recognized.
pub fn is_noop_merge_output(output: &str) -> bool {
    output
        .lines()
        .any(|line| line.contains("Already up-to-date") || line.contains("Already up to date"))
}
