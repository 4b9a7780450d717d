use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

/// The `origin` remote URL of a git checkout, or `None` if the directory is
/// not a repository, has no such remote, or git is unavailable.
pub fn repo_origin(dir: &Path) -> Option<String> {
    run_git(dir, &["remote", "get-url", "origin"])
}

fn run_git(dir: &Path, args: &[&str]) -> Option<String> {
    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(args)
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let out = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

/// Memoizes origin lookups per resolved directory within a single run, so
/// repeated sessions under the same working directory cost one subprocess.
#[derive(Debug, Default)]
pub struct OriginCache {
    seen: HashMap<PathBuf, Option<String>>,
}

impl OriginCache {
    pub fn origin(&mut self, dir: &Path) -> Option<String> {
        if let Some(cached) = self.seen.get(dir) {
            return cached.clone();
        }
        let origin = repo_origin(dir);
        if origin.is_none() {
            debug!(dir = %dir.display(), "no git origin resolved");
        }
        self.seen.insert(dir.to_path_buf(), origin.clone());
        origin
    }
}
