//! Upstream update notifier.
//!
//! At session start, fetch the configured remote of a tracked repository and
//! report how many commits on `<remote>/<branch>` are not yet in `HEAD`.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::{Config, UpdateConfig};

#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    #[error("{0} is not a git repository")]
    NotARepository(PathBuf),
    #[error("no `{0}` remote configured")]
    NoRemote(String),
    #[error("failed to run git {args}: {source}")]
    Spawn {
        args: String,
        #[source]
        source: std::io::Error,
    },
    #[error("git {args} failed: {stderr}")]
    Git { args: String, stderr: String },
}

/// New upstream commits, ready to show to the agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateNotice {
    pub remote: String,
    pub branch: String,
    pub count: usize,
    /// First few `--oneline` entries, newest first.
    pub preview: Vec<String>,
}

impl UpdateNotice {
    /// Build a notice from `git log --oneline` output; `None` when it is empty.
    pub fn from_log(log: &str, preview: usize, remote: &str, branch: &str) -> Option<Self> {
        let lines: Vec<&str> = log.lines().filter(|l| !l.trim().is_empty()).collect();
        if lines.is_empty() {
            return None;
        }
        Some(Self {
            remote: remote.to_string(),
            branch: branch.to_string(),
            count: lines.len(),
            preview: lines.iter().take(preview).map(|l| l.to_string()).collect(),
        })
    }

    pub fn render(&self) -> String {
        let plural = if self.count == 1 { "" } else { "s" };
        let upstream = format!("{}/{}", self.remote, self.branch);
        let mut out = format!(
            "📦 Upstream updates available\n{} new commit{plural} on {upstream}\n\nRecent changes:\n",
            self.count
        );
        for line in &self.preview {
            out.push_str(line);
            out.push('\n');
        }
        if self.count > self.preview.len() {
            out.push_str(&format!(
                "... and {} more\n",
                self.count - self.preview.len()
            ));
        }
        out.push_str(&format!(
            "\nTo review: git log HEAD..{upstream}\nTo merge: git pull {} {}",
            self.remote, self.branch
        ));
        out
    }
}

/// Expand `~` and `$VARS` in a configured path. Empty means "not configured".
pub fn resolve_repo_path(raw: &str) -> Option<PathBuf> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match shellexpand::full(raw) {
        Ok(expanded) => Some(PathBuf::from(expanded.as_ref())),
        Err(e) => {
            log::warn!("cannot expand repo path {raw}: {e}");
            None
        }
    }
}

/// Fetch the remote and compare it with `HEAD`.
pub fn check(repo: &Path, config: &UpdateConfig) -> Result<Option<UpdateNotice>, UpdateError> {
    if !repo.join(".git").exists() {
        return Err(UpdateError::NotARepository(repo.to_path_buf()));
    }

    let remotes = git(repo, &["remote"])?;
    if !remotes.lines().any(|r| r.trim() == config.remote) {
        return Err(UpdateError::NoRemote(config.remote.clone()));
    }

    git(repo, &["fetch", &config.remote, "--quiet"])?;

    let range = format!("HEAD..{}/{}", config.remote, config.branch);
    let log = git(repo, &["log", &range, "--oneline"])?;
    Ok(UpdateNotice::from_log(
        &log,
        config.preview,
        &config.remote,
        &config.branch,
    ))
}

fn git(repo: &Path, args: &[&str]) -> Result<String, UpdateError> {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo)
        .output()
        .map_err(|source| UpdateError::Spawn {
            args: args.join(" "),
            source,
        })?;
    if !output.status.success() {
        return Err(UpdateError::Git {
            args: args.join(" "),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Entry point for the `session-start` subcommand. Failures are logged only.
pub fn run(config: &Config, repo_arg: Option<String>) {
    let raw = repo_arg.unwrap_or_else(|| config.updates.repo_path.clone());
    let Some(repo) = resolve_repo_path(&raw) else {
        log::debug!("session-start: no repository configured");
        return;
    };

    match check(&repo, &config.updates) {
        Ok(Some(notice)) => {
            log::info!(
                "session-start: {} new commits in {}",
                notice.count,
                repo.display()
            );
            println!("{}", notice.render());
        }
        Ok(None) => log::debug!("session-start: {} is up to date", repo.display()),
        Err(e) => log::warn!("session-start: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOG: &str = "a1b2c3d Add widget\nd4e5f6a Fix typo\n0badf00 Bump deps\n1234567 Docs\n89abcde Init\n";

    #[test]
    fn empty_log_means_no_notice() {
        assert_eq!(UpdateNotice::from_log("", 3, "upstream", "main"), None);
        assert_eq!(UpdateNotice::from_log("\n  \n", 3, "upstream", "main"), None);
    }

    #[test]
    fn notice_counts_and_previews() {
        let notice = UpdateNotice::from_log(LOG, 3, "upstream", "main").unwrap();
        assert_eq!(notice.count, 5);
        assert_eq!(
            notice.preview,
            vec!["a1b2c3d Add widget", "d4e5f6a Fix typo", "0badf00 Bump deps"]
        );
    }

    #[test]
    fn render_mentions_remaining_commits() {
        let text = UpdateNotice::from_log(LOG, 3, "upstream", "main")
            .unwrap()
            .render();
        assert!(text.contains("5 new commits on upstream/main"));
        assert!(text.contains("... and 2 more"));
        assert!(text.contains("git pull upstream main"));
    }

    #[test]
    fn render_single_commit() {
        let text = UpdateNotice::from_log("abc Only\n", 3, "origin", "dev")
            .unwrap()
            .render();
        assert!(text.contains("1 new commit on origin/dev"));
        assert!(!text.contains("more"));
    }

    #[test]
    fn empty_path_is_unconfigured() {
        assert_eq!(resolve_repo_path(""), None);
        assert_eq!(resolve_repo_path("   "), None);
    }

    #[test]
    fn plain_path_is_kept() {
        assert_eq!(
            resolve_repo_path("/workspace/framework"),
            Some(PathBuf::from("/workspace/framework"))
        );
    }

    #[test]
    fn non_repository_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = check(dir.path(), &UpdateConfig::default()).unwrap_err();
        assert!(matches!(err, UpdateError::NotARepository(_)));
    }
}
