//! Log-source adapter for Claude project transcripts.
//!
//! Transcripts for a repository live in one directory under the projects
//! root, keyed by a transform of the repo's absolute path (`/a/b/c` becomes
//! `-a-b-c`). Each `*.jsonl` file is one session; tool invocations appear
//! as `tool_use` entries either directly under `message.content` or inside
//! a sidechain wrapper under `data.message.message.content`.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use impact_core::classify;
use impact_core::jsonl::parse_object_line;
use impact_core::session::{SessionStats, Source};
use impact_core::window::{timestamp_date, DateWindow};

/// Tool names that constitute a direct file edit.
const EDIT_TOOLS: &[&str] = &["Edit", "Write", "MultiEdit"];

/// The project directory holding transcripts for `repo_root`: path
/// separators collapse to `-`, prefixed with a leading `-`.
pub fn project_dir_for_repo(repo_root: &Path, projects_root: &Path) -> PathBuf {
    let mut key = String::new();
    for component in repo_root.components() {
        if let Component::Normal(part) = component {
            key.push('-');
            key.push_str(&part.to_string_lossy());
        }
    }
    projects_root.join(key)
}

/// Scan the repo's project directory and return completed session records.
/// A missing directory yields an empty result.
pub fn collect_sessions(
    projects_root: &Path,
    repo_root: &Path,
    window: &DateWindow,
) -> Vec<SessionStats> {
    let project_dir = project_dir_for_repo(repo_root, projects_root);
    let Ok(entries) = std::fs::read_dir(&project_dir) else {
        return Vec::new();
    };

    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("jsonl"))
        .collect();
    files.sort();

    files
        .iter()
        .filter_map(|path| scan_session_file(path, window))
        .collect()
}

/// Yield `tool_use` entries from one transcript record, covering both the
/// direct and the sidechain-wrapped message shapes.
pub fn tool_uses(record: &Value) -> impl Iterator<Item = &Value> {
    let direct = record
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_array());
    let wrapped = record
        .get("data")
        .and_then(|d| d.get("message"))
        .and_then(|m| m.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_array());

    direct
        .into_iter()
        .flatten()
        .chain(wrapped.into_iter().flatten())
        .filter(|item| item.get("type").and_then(|t| t.as_str()) == Some("tool_use"))
}

fn scan_session_file(path: &Path, window: &DateWindow) -> Option<SessionStats> {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(err) => {
            debug!(path = %path.display(), %err, "skipping unreadable transcript");
            return None;
        }
    };
    let text = String::from_utf8_lossy(&bytes);

    let session_id = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let mut stats = SessionStats::new(Source::Claude, session_id, path);
    let mut seen_tool_ids: HashSet<String> = HashSet::new();

    for raw in text.lines() {
        let Some(obj) = parse_object_line(raw) else { continue };
        let date = obj
            .get("timestamp")
            .and_then(|v| v.as_str())
            .and_then(timestamp_date);

        for tool in tool_uses(&obj) {
            if let Some(id) = tool.get("id").and_then(|v| v.as_str()) {
                if !id.is_empty() && !seen_tool_ids.insert(id.to_string()) {
                    continue;
                }
            }
            let name = tool.get("name").and_then(|v| v.as_str()).unwrap_or("");
            let input = tool.get("input");

            match name {
                "Bash" => {
                    let Some(command) = input
                        .and_then(|i| i.get("command"))
                        .and_then(|v| v.as_str())
                        .filter(|c| !c.is_empty())
                    else {
                        continue;
                    };
                    if !window.contains(date) {
                        continue;
                    }
                    stats.record_action(
                        date,
                        classify::is_codemap_reference(command),
                        classify::is_edit_equivalent_shell_command(command),
                        None,
                    );
                    if classify::is_strict_codemap_invocation(command) {
                        stats.has_explicit_codemap_run = true;
                    }
                    if classify::is_commit_command(command) {
                        stats.has_commit_command = true;
                    }
                }
                "Read" => {
                    let Some(file_path) = input
                        .and_then(|i| i.get("file_path"))
                        .and_then(|v| v.as_str())
                        .filter(|p| !p.is_empty())
                    else {
                        continue;
                    };
                    if !window.contains(date) {
                        continue;
                    }
                    stats.record_action(
                        date,
                        classify::is_codemap_reference(file_path),
                        false,
                        Some(file_path),
                    );
                }
                name if EDIT_TOOLS.contains(&name) => {
                    if !window.contains(date) {
                        continue;
                    }
                    stats.record_action(date, false, true, None);
                }
                _ => {}
            }
        }
    }

    (stats.action_count > 0).then_some(stats)
}
