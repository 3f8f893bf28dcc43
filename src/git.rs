use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use crate::error::Error;
use crate::workspace::RebaseOutcome;

/// Run a git command in `root` and capture its output.
///
/// This uses the system git command, which automatically handles:
/// - SSH keys from ~/.ssh/
/// - Git credential helpers
/// - Any authentication configured in ~/.gitconfig
fn git_output(root: &Path, args: &[&str]) -> Result<Output, Error> {
    log::debug!("git {}", args.join(" "));
    Command::new("git")
        .arg("-C")
        .arg(root)
        .args(args)
        .output()
        .map_err(|e| Error::GitCommand {
            command: args.join(" "),
            stderr: e.to_string(),
        })
}

/// Run a git command in `root`, failing on a non-zero exit status, and return
/// its trimmed stdout.
pub fn run_git(root: &Path, args: &[&str]) -> Result<String, Error> {
    let output = git_output(root, args)?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);

        // Point at the usual cause when the remote cannot be reached
        let stderr = if stderr.contains("Authentication failed")
            || stderr.contains("Permission denied")
            || stderr.contains("Could not read from remote repository")
        {
            format!(
                "Authentication failed. Make sure you have access to the remote repository.\n\
                Error: {}",
                stderr.trim()
            )
        } else {
            stderr.trim().to_string()
        };

        return Err(Error::GitCommand {
            command: args.join(" "),
            stderr,
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// The checked-out branch name, or `HEAD` when detached.
pub fn current_branch(root: &Path) -> Result<String, Error> {
    run_git(root, &["rev-parse", "--abbrev-ref", "HEAD"])
}

/// The full id of the checked-out commit.
pub fn current_commit(root: &Path) -> Result<String, Error> {
    run_git(root, &["rev-parse", "HEAD"])
}

/// The commit `branch` points to on `remote`, or `None` if the remote has no
/// such branch.
pub fn remote_commit(root: &Path, remote: &str, branch: &str) -> Result<Option<String>, Error> {
    let refname = format!("refs/heads/{}", branch);
    let stdout = run_git(root, &["ls-remote", remote, &refname])?;
    Ok(parse_ls_remote(&stdout, &refname))
}

/// Extracts the commit for `refname` from `git ls-remote` output.
///
/// Each line is `<hash>\t<ref>`.
fn parse_ls_remote(stdout: &str, refname: &str) -> Option<String> {
    stdout.lines().find_map(|line| {
        let (hash, name) = line.split_once('\t')?;
        (name.trim() == refname).then(|| hash.trim().to_string())
    })
}

/// Whether tracked files have uncommitted changes.
pub fn is_dirty(root: &Path) -> Result<bool, Error> {
    let stdout = run_git(root, &["status", "--porcelain", "--untracked-files=no"])?;
    Ok(!stdout.is_empty())
}

/// Like [`is_dirty`], but uncommitted edits to `file` that only change
/// `key=` lines do not count.
///
/// A version stamp written into a tracked settings file must not block the
/// next fast-forward.
pub fn is_dirty_except_key(root: &Path, file: &Path, key: &str) -> Result<bool, Error> {
    let Some(name) = tracked_name(root, file)? else {
        return is_dirty(root);
    };

    let changed = run_git(root, &["diff", "--name-only", "HEAD"])?;
    for path in changed.lines() {
        if path == name && only_key_changed(root, &name, key)? {
            continue;
        }
        return Ok(true);
    }
    Ok(false)
}

/// Discards uncommitted edits to `file` when they only change `key=` lines.
///
/// Returns whether the file was restored. Any other edit leaves the file
/// untouched.
pub fn restore_if_only_key_changed(root: &Path, file: &Path, key: &str) -> Result<bool, Error> {
    let Some(name) = tracked_name(root, file)? else {
        return Ok(false);
    };

    let pathspec = top_pathspec(&name);
    let changed = run_git(root, &["diff", "--name-only", "HEAD", "--", &pathspec])?;
    if changed.is_empty() || !only_key_changed(root, &name, key)? {
        return Ok(false);
    }

    run_git(root, &["checkout", "HEAD", "--", &pathspec])?;
    Ok(true)
}

/// The repository-relative name of `file`, or `None` if git does not track it.
fn tracked_name(root: &Path, file: &Path) -> Result<Option<String>, Error> {
    let file = match file.strip_prefix(root) {
        Ok(relative) => relative.to_path_buf(),
        Err(_) if file.is_relative() => std::env::current_dir()?.join(file),
        Err(_) => file.to_path_buf(),
    };
    let file = file.to_string_lossy();
    let name = run_git(root, &["ls-files", "--full-name", "--", &*file])?;
    Ok((!name.is_empty()).then_some(name))
}

fn top_pathspec(name: &str) -> String {
    format!(":(top){}", name)
}

/// Whether every changed line in the uncommitted diff of `name` is a `key=`
/// entry.
fn only_key_changed(root: &Path, name: &str, key: &str) -> Result<bool, Error> {
    let pathspec = top_pathspec(name);
    let diff = run_git(
        root,
        &["diff", "--no-color", "--no-ext-diff", "--unified=0", "HEAD", "--", &pathspec],
    )?;
    Ok(diff_only_changes_key(&diff, key))
}

fn diff_only_changes_key(diff: &str, key: &str) -> bool {
    diff.lines()
        .skip_while(|line| !line.starts_with("@@"))
        .filter(|line| !line.starts_with("@@"))
        .filter_map(|line| line.strip_prefix('+').or_else(|| line.strip_prefix('-')))
        .all(|content| matches!(content.split_once('='), Some((k, _)) if k.trim() == key))
}

/// Whether `ancestor` is reachable from `descendant`.
pub fn is_ancestor(root: &Path, ancestor: &str, descendant: &str) -> Result<bool, Error> {
    let args = ["merge-base", "--is-ancestor", ancestor, descendant];
    let output = git_output(root, &args)?;
    match output.status.code() {
        Some(0) => Ok(true),
        Some(1) => Ok(false),
        _ => Err(Error::GitCommand {
            command: args.join(" "),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }),
    }
}

/// Whether a rebase was started and not finished or aborted.
pub fn rebase_in_progress(root: &Path) -> Result<bool, Error> {
    for marker in ["rebase-merge", "rebase-apply"] {
        let path = PathBuf::from(run_git(root, &["rev-parse", "--git-path", marker])?);
        let path = if path.is_absolute() { path } else { root.join(path) };
        if path.exists() {
            return Ok(true);
        }
    }
    Ok(false)
}

/// The most recent tag reachable from HEAD, or `None` if there are no tags.
pub fn latest_tag(root: &Path) -> Result<Option<String>, Error> {
    let args = ["describe", "--tags", "--abbrev=0"];
    let output = git_output(root, &args)?;

    if output.status.success() {
        let tag = String::from_utf8_lossy(&output.stdout).trim().to_string();
        return Ok((!tag.is_empty()).then_some(tag));
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    if stderr.contains("No names found") || stderr.contains("No tags can describe") {
        Ok(None)
    } else {
        Err(Error::GitCommand {
            command: args.join(" "),
            stderr: stderr.trim().to_string(),
        })
    }
}

/// Fetch from `remote`.
pub fn fetch(root: &Path, remote: &str) -> Result<(), Error> {
    run_git(root, &["fetch", "--quiet", remote]).map(|_| ())
}

/// Advance the current branch to `commit` without creating a merge commit.
pub fn fast_forward(root: &Path, commit: &str) -> Result<(), Error> {
    run_git(root, &["merge", "--ff-only", "--quiet", commit]).map(|_| ())
}

/// Rebase the current branch onto `onto`.
///
/// A conflicting rebase is reported as [`RebaseOutcome::Conflict`] and left in
/// progress; the caller decides whether to abort it.
pub fn rebase(root: &Path, onto: &str) -> Result<RebaseOutcome, Error> {
    let args = ["rebase", onto];
    let output = git_output(root, &args)?;

    if output.status.success() {
        return Ok(RebaseOutcome::Success);
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    if is_conflict_output(&stdout) || is_conflict_output(&stderr) {
        return Ok(RebaseOutcome::Conflict {
            detail: conflict_summary(&stdout, &stderr),
        });
    }

    Err(Error::GitCommand {
        command: args.join(" "),
        stderr: stderr.trim().to_string(),
    })
}

fn is_conflict_output(text: &str) -> bool {
    text.contains("CONFLICT") || text.contains("could not apply")
}

fn conflict_summary(stdout: &str, stderr: &str) -> String {
    let lines: Vec<&str> = stdout
        .lines()
        .chain(stderr.lines())
        .filter(|line| line.starts_with("CONFLICT"))
        .collect();
    if lines.is_empty() {
        "rebase stopped on a conflict".to_string()
    } else {
        lines.join("; ")
    }
}

/// Abort an in-progress rebase, restoring the pre-rebase state.
pub fn abort_rebase(root: &Path) -> Result<(), Error> {
    run_git(root, &["rebase", "--abort"]).map(|_| ())
}
