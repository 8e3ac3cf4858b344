//! Version-control hook run after a successful local write.
//! Failures are returned to the store, which reports them as warnings.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::config::SyncConfig;
use crate::error::{CatalogError, Result};

pub trait VersionSync: Send + Sync {
    fn name(&self) -> &'static str;

    /// Record `changed` files (inside `repo_dir`) with `message`.
    fn sync(&self, repo_dir: &Path, changed: &[PathBuf], message: &str) -> Result<()>;
}

/// Leaves files as written.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSync;

impl VersionSync for NoSync {
    fn name(&self) -> &'static str {
        "none"
    }

    fn sync(&self, _repo_dir: &Path, _changed: &[PathBuf], _message: &str) -> Result<()> {
        Ok(())
    }
}

/// `git add` + `git commit`, then `git push` when enabled.
#[derive(Debug, Clone)]
pub struct GitSync {
    pub remote: String,
    pub branch: Option<String>,
    pub push: bool,
}

impl GitSync {
    pub fn from_config(config: &SyncConfig) -> Self {
        GitSync {
            remote: config.remote.clone(),
            branch: config.branch.clone(),
            push: config.push,
        }
    }
}

impl VersionSync for GitSync {
    fn name(&self) -> &'static str {
        "git"
    }

    fn sync(&self, repo_dir: &Path, changed: &[PathBuf], message: &str) -> Result<()> {
        let mut add = vec!["add".to_string(), "--".to_string()];
        add.extend(changed.iter().map(|p| p.display().to_string()));
        run_git(repo_dir, &add)?;

        let commit = run_git(
            repo_dir,
            &["commit".to_string(), "-m".to_string(), message.to_string()],
        );
        match commit {
            Ok(_) => {}
            // Re-saving identical content leaves nothing to commit.
            Err(CatalogError::SyncFailure { message }) if message.contains("nothing to commit") => {
                debug!("git sync: nothing to commit");
                return Ok(());
            }
            Err(err) => return Err(err),
        }

        if self.push {
            let mut push = vec!["push".to_string(), self.remote.clone()];
            if let Some(branch) = &self.branch {
                push.push(branch.clone());
            }
            run_git(repo_dir, &push)?;
        }
        Ok(())
    }
}

fn run_git(repo_dir: &Path, args: &[String]) -> Result<String> {
    let output = Command::new("git")
        .arg("-C")
        .arg(repo_dir)
        .args(args)
        .output()
        .map_err(|err| CatalogError::SyncFailure {
            message: format!("unable to run git: {err}"),
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let command = args.first().map(String::as_str).unwrap_or("git");
        return Err(CatalogError::SyncFailure {
            message: format!(
                "git {command} exited with {}: {} {}",
                output.status,
                stdout.trim(),
                stderr.trim()
            ),
        });
    }
    Ok(stdout)
}

pub fn sync_from_config(config: &SyncConfig) -> Box<dyn VersionSync> {
    if config.enabled {
        Box::new(GitSync::from_config(config))
    } else {
        Box::new(NoSync)
    }
}
