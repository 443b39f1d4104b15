//! `git`-backed [`VcsClient`] used by the session-start health probe.

use crate::traits::VcsClient;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::time::Duration;

/// Shells out to `git` with a soft timeout per invocation. A timed-out or
/// failing subprocess yields `None`, never an error — VCS context is
/// advisory to the health probe, not load-bearing.
pub struct GitVcsClient {
  repo_root: PathBuf,
  timeout: Duration,
}

impl GitVcsClient {
  pub fn new(repo_root: impl Into<PathBuf>) -> Self {
    Self {
      repo_root: repo_root.into(),
      timeout: Duration::from_secs(2),
    }
  }

  pub fn with_timeout(repo_root: impl Into<PathBuf>, timeout: Duration) -> Self {
    Self {
      repo_root: repo_root.into(),
      timeout,
    }
  }

  fn run(&self, args: &[&str]) -> Option<String> {
    let mut cmd = Command::new("git");
    cmd.args(args).current_dir(&self.repo_root).stdout(Stdio::piped()).stderr(Stdio::null());

    let (tx, rx) = mpsc::channel();
    let mut child = cmd.spawn().ok()?;
    std::thread::spawn(move || {
      let output = child.wait_with_output();
      let _ = tx.send(output);
    });

    match rx.recv_timeout(self.timeout) {
      Ok(Ok(output)) if output.status.success() => Some(String::from_utf8_lossy(&output.stdout).trim().to_string()),
      _ => {
        tracing::debug!(?args, "git invocation failed or timed out");
        None
      }
    }
  }
}

impl VcsClient for GitVcsClient {
  fn head(&self) -> Option<String> {
    self.run(&["rev-parse", "HEAD"]).filter(|s| !s.is_empty())
  }

  fn current_branch(&self) -> Option<String> {
    self.run(&["rev-parse", "--abbrev-ref", "HEAD"]).filter(|s| !s.is_empty())
  }

  fn status_porcelain(&self) -> Option<Vec<String>> {
    self.run(&["status", "--porcelain"]).map(|out| out.lines().map(str::to_string).collect())
  }

  fn recent_subjects(&self, n: usize) -> Option<Vec<String>> {
    let count = n.to_string();
    self
      .run(&["log", "-n", &count, "--pretty=format:%s"])
      .map(|out| out.lines().map(str::to_string).collect())
  }

  fn commits_between(&self, from: &str, to: &str) -> Option<u32> {
    let range = format!("{from}..{to}");
    self.run(&["rev-list", "--count", &range]).and_then(|s| s.parse().ok())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::process::Command;
  use tempfile::TempDir;

  #[test]
  fn non_repo_directory_yields_no_vcs_info() {
    let tmp = TempDir::new().unwrap();
    let client = GitVcsClient::new(tmp.path());
    assert_eq!(client.head(), None);
  }

  fn init_repo_on_branch(branch: &str) -> TempDir {
    let tmp = TempDir::new().unwrap();
    let run = |args: &[&str]| {
      let status = Command::new("git").args(args).current_dir(tmp.path()).status().unwrap();
      assert!(status.success(), "git {args:?} failed");
    };
    run(&["init", "-q", "-b", branch]);
    run(&["config", "user.email", "test@example.com"]);
    run(&["config", "user.name", "test"]);
    std::fs::write(tmp.path().join("f.txt"), "hi").unwrap();
    run(&["add", "f.txt"]);
    run(&["commit", "-q", "-m", "init"]);
    tmp
  }

  #[test]
  fn current_branch_returns_branch_name_not_commit_hash() {
    let repo = init_repo_on_branch("feature-x");
    let client = GitVcsClient::new(repo.path());

    let branch = client.current_branch().unwrap();
    let head = client.head().unwrap();

    assert_eq!(branch, "feature-x");
    assert_ne!(branch, head, "branch name must never be confused with the commit hash");
  }
}
