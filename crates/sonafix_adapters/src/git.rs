//! Git-backed version control client.
//!
//! Each fix branch gets its own worktree under
//! `.sonafix/worktrees/<branch>`, so concurrent workers never share a
//! mutable checkout: a branch belongs to exactly one work item, and a
//! worktree belongs to exactly one branch.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use sonafix_core::{CoreResult, FixPatch, FixerError, VcsClient};

/// `VcsClient` shelling out to the `git` binary.
pub struct GitWorkspace {
    repo_path: PathBuf,
    remote: String,
}

impl GitWorkspace {
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self {
            repo_path: repo_path.into(),
            remote: "origin".to_string(),
        }
    }

    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = remote.into();
        self
    }

    /// Check if git is available on the system.
    pub async fn is_git_available() -> bool {
        Command::new("git")
            .arg("--version")
            .output()
            .await
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    fn worktree_dir(&self, branch: &str) -> PathBuf {
        self.repo_path
            .join(".sonafix")
            .join("worktrees")
            .join(branch.replace('/', "-"))
    }

    async fn git(&self, dir: &Path, args: &[&str]) -> CoreResult<String> {
        debug!("git {} (in {})", args.join(" "), dir.display());
        let output = Command::new("git")
            .args(args)
            .current_dir(dir)
            .output()
            .await
            .map_err(|e| FixerError::Conflict(format!("failed to run git: {}", e)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(classify_git_error(args, &stderr));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl VcsClient for GitWorkspace {
    async fn create_branch(&self, branch: &str, base: &str) -> CoreResult<()> {
        let dir = self.worktree_dir(branch);
        if dir.exists() {
            debug!("Worktree for {} already exists, reusing it", branch);
            return Ok(());
        }
        if let Some(parent) = dir.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        self.git(&self.repo_path, &["worktree", "prune"]).await?;
        let dir_str = dir.to_string_lossy().to_string();
        match self
            .git(
                &self.repo_path,
                &["worktree", "add", dir_str.as_str(), "-b", branch, base],
            )
            .await
        {
            Ok(_) => {
                info!("Created branch {} off {}", branch, base);
                Ok(())
            }
            // Branch left over from a previous run; check it out as-is.
            Err(FixerError::Conflict(msg)) if msg.contains("already exists") => {
                self.git(&self.repo_path, &["worktree", "add", dir_str.as_str(), branch])
                    .await?;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn apply_and_commit(
        &self,
        branch: &str,
        patch: &FixPatch,
        message: &str,
    ) -> CoreResult<()> {
        let dir = self.worktree_dir(branch);
        let file = dir.join(&patch.file_path);
        let content =
            tokio::fs::read_to_string(&file)
                .await
                .map_err(|_| FixerError::ContextMissing {
                    path: patch.file_path.clone(),
                    line: patch.start_line,
                })?;
        let patched = apply_patch(&content, patch)?;
        tokio::fs::write(&file, patched).await?;

        self.git(&dir, &["add", &patch.file_path]).await?;
        self.git(&dir, &["commit", "-m", message]).await?;
        info!("Committed fix for {} on {}", patch.file_path, branch);
        Ok(())
    }

    async fn push(&self, branch: &str) -> CoreResult<()> {
        let dir = self.worktree_dir(branch);
        self.git(&dir, &["push", "--set-upstream", &self.remote, branch])
            .await?;
        info!("Pushed {} to {}", branch, self.remote);
        Ok(())
    }
}

/// Splice the patch into the file content, checking the structural
/// precondition first.
fn apply_patch(content: &str, patch: &FixPatch) -> CoreResult<String> {
    let lines: Vec<&str> = content.lines().collect();
    let start = patch.start_line as usize;
    let end = patch.end_line as usize;
    if start == 0 || start > end || end > lines.len() {
        return Err(FixerError::PatchMismatch(patch.file_path.clone()));
    }
    let current = lines[start - 1..end].join("\n");
    if !patch.applies_to(&current) {
        return Err(FixerError::PatchMismatch(patch.file_path.clone()));
    }

    let mut out: Vec<&str> = Vec::with_capacity(lines.len());
    out.extend(&lines[..start - 1]);
    let replacement = patch.replacement.trim_end_matches('\n');
    if !replacement.is_empty() {
        out.extend(replacement.lines());
    }
    out.extend(&lines[end..]);

    let mut result = out.join("\n");
    if content.ends_with('\n') && !result.is_empty() {
        result.push('\n');
    }
    Ok(result)
}

/// Push failures are usually the network; everything else about a
/// working tree is a conflict the retry loop must not touch.
fn classify_git_error(args: &[&str], stderr: &str) -> FixerError {
    let network_markers = [
        "could not resolve host",
        "unable to access",
        "connection timed out",
        "connection reset",
        "early eof",
        "remote hung up",
    ];
    let lowered = stderr.to_lowercase();
    let is_push = args.first() == Some(&"push");
    if is_push && network_markers.iter().any(|m| lowered.contains(m)) {
        return FixerError::Network(format!("git push failed: {}", stderr));
    }
    FixerError::Conflict(format!("git {} failed: {}", args.first().unwrap_or(&"?"), stderr))
}
