//! Log-source adapter for Codex session rollouts.
//!
//! Sessions live as `*.jsonl` files anywhere under a sessions root. A file
//! belongs to the target repository if any raw line contains the repo path
//! as a literal substring, or if its `session_meta` working directory
//! resolves into the repo (or shares its git origin URL). Matching sessions
//! are replayed into one [`SessionStats`] accumulator each.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde_json::Value;
use time::Date;
use tracing::debug;
use walkdir::WalkDir;

use impact_core::classify;
use impact_core::git::{repo_origin, OriginCache};
use impact_core::jsonl::parse_object_line;
use impact_core::session::{SessionStats, Source};
use impact_core::window::{timestamp_date, DateWindow};

/// Tool names whose invocations carry a shell command string.
const COMMAND_TOOLS: &[&str] = &["exec_command", "shell_command"];

enum ParsedEvent {
    Command { command: String, date: Option<Date> },
    Edit { date: Option<Date> },
}

/// Scan all session files under `sessions_root` and return completed
/// records for sessions belonging to `repo_root`. A missing root yields an
/// empty result; unreadable files and malformed lines are skipped.
pub fn collect_sessions(
    sessions_root: &Path,
    repo_root: &Path,
    window: &DateWindow,
) -> Vec<SessionStats> {
    if !sessions_root.exists() {
        return Vec::new();
    }
    let repo_root_str = repo_root.to_string_lossy().to_string();
    let repo_origin_url = repo_origin(repo_root);
    let mut origin_cache = OriginCache::default();

    let mut sessions = Vec::new();
    for entry in WalkDir::new(sessions_root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
            continue;
        }
        if let Some(stats) = scan_session_file(
            path,
            repo_root,
            &repo_root_str,
            repo_origin_url.as_deref(),
            &mut origin_cache,
            window,
        ) {
            sessions.push(stats);
        }
    }
    sessions
}

/// Parse one session file. Events are buffered during the scan because the
/// repo-membership decision may only arrive with a late `session_meta`
/// record; they are replayed into the accumulator once the session matches.
fn scan_session_file(
    path: &Path,
    repo_root: &Path,
    repo_root_str: &str,
    repo_origin_url: Option<&str>,
    origin_cache: &mut OriginCache,
    window: &DateWindow,
) -> Option<SessionStats> {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(err) => {
            debug!(path = %path.display(), %err, "skipping unreadable session file");
            return None;
        }
    };
    let text = String::from_utf8_lossy(&bytes);

    let mut include = false;
    let mut session_id = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let mut events: Vec<ParsedEvent> = Vec::new();
    let mut seen_call_ids: HashSet<String> = HashSet::new();

    for raw in text.lines() {
        if raw.contains(repo_root_str) {
            include = true;
        }
        let Some(obj) = parse_object_line(raw) else { continue };
        let date = obj
            .get("timestamp")
            .and_then(|v| v.as_str())
            .and_then(timestamp_date);

        match obj.get("type").and_then(|v| v.as_str()) {
            Some("session_meta") => {
                let Some(payload) = obj.get("payload") else { continue };
                // A later meta record reveals the canonical session id.
                if let Some(id) = payload.get("id").and_then(|v| v.as_str()) {
                    if !id.is_empty() {
                        session_id = id.to_string();
                    }
                }
                if cwd_matches_repo(payload.get("cwd"), repo_root, repo_origin_url, origin_cache) {
                    include = true;
                }
            }
            Some("response_item") => {
                let Some(payload) = obj.get("payload") else { continue };
                let name = payload.get("name").and_then(|v| v.as_str()).unwrap_or("");
                match payload.get("type").and_then(|v| v.as_str()) {
                    Some("function_call") => {
                        if is_duplicate_call(payload, &mut seen_call_ids) {
                            continue;
                        }
                        if let Some(command) = parse_command(name, payload) {
                            events.push(ParsedEvent::Command { command, date });
                        } else if name == "apply_patch" {
                            events.push(ParsedEvent::Edit { date });
                        }
                    }
                    Some("custom_tool_call") if name == "apply_patch" => {
                        if is_duplicate_call(payload, &mut seen_call_ids) {
                            continue;
                        }
                        events.push(ParsedEvent::Edit { date });
                    }
                    _ => {}
                }
            }
            _ => {}
        }
    }

    if !include {
        return None;
    }

    let mut stats = SessionStats::new(Source::Codex, session_id, path);
    for event in events {
        match event {
            ParsedEvent::Command { command, date } => {
                if !window.contains(date) {
                    continue;
                }
                stats.record_action(date, classify::is_codemap_reference(&command), false, None);
                if classify::is_strict_codemap_invocation(&command) {
                    stats.has_explicit_codemap_run = true;
                }
                if classify::is_commit_command(&command) {
                    stats.has_commit_command = true;
                }
            }
            ParsedEvent::Edit { date } => {
                if !window.contains(date) {
                    continue;
                }
                stats.record_action(date, false, true, None);
            }
        }
    }

    (stats.action_count > 0).then_some(stats)
}

/// A repeated tool invocation with the same call id is processed once per
/// session; id-less invocations always process. Only invocation records
/// consume ids: a `function_call_output` sharing its call's id must not
/// shadow the call itself under arbitrary record ordering.
fn is_duplicate_call(payload: &Value, seen: &mut HashSet<String>) -> bool {
    match payload.get("call_id").and_then(|v| v.as_str()) {
        Some(call_id) if !call_id.is_empty() => !seen.insert(call_id.to_string()),
        _ => false,
    }
}

/// A session's working directory matches the target repo if it resolves to
/// the repo root or a descendant, or shares the repo's git origin URL.
/// Unresolvable directories and failed origin lookups are non-matches.
fn cwd_matches_repo(
    cwd: Option<&Value>,
    repo_root: &Path,
    repo_origin_url: Option<&str>,
    origin_cache: &mut OriginCache,
) -> bool {
    let Some(cwd) = cwd.and_then(|v| v.as_str()).filter(|s| !s.is_empty()) else {
        return false;
    };
    let cwd_path = PathBuf::from(cwd);
    let resolved = cwd_path.canonicalize().unwrap_or(cwd_path);
    if resolved.starts_with(repo_root) {
        return true;
    }
    let Some(origin) = repo_origin_url else { return false };
    origin_cache.origin(&resolved).as_deref() == Some(origin)
}

/// Extract the shell command string from a command-tool invocation.
/// `arguments` may be a JSON-encoded string or an already-structured
/// object; anything else (including unparseable argument JSON) is skipped.
fn parse_command(name: &str, payload: &Value) -> Option<String> {
    if !COMMAND_TOOLS.contains(&name) {
        return None;
    }
    let args = match payload.get("arguments") {
        Some(Value::String(raw)) => serde_json::from_str::<Value>(raw).ok()?,
        Some(Value::Object(map)) => Value::Object(map.clone()),
        _ => return None,
    };
    let key = if name == "exec_command" { "cmd" } else { "command" };
    let command = args.get(key)?.as_str()?;
    if command.trim().is_empty() {
        return None;
    }
    Some(command.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use time::macros::date;

    fn write_session(dir: &Path, name: &str, lines: &[String]) -> PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        for line in lines {
            writeln!(f, "{line}").unwrap();
        }
        path
    }

    fn meta_line(id: &str, cwd: &str) -> String {
        format!(
            r#"{{"type":"session_meta","timestamp":"2024-01-10T09:00:00Z","payload":{{"id":"{id}","cwd":"{cwd}"}}}}"#
        )
    }

    fn shell_line(command: &str) -> String {
        format!(
            r#"{{"type":"response_item","timestamp":"2024-01-10T09:01:00Z","payload":{{"type":"function_call","name":"shell_command","arguments":{{"command":"{command}"}}}}}}"#
        )
    }

    #[test]
    fn missing_root_yields_empty() {
        let sessions = collect_sessions(
            Path::new("/nonexistent/codex/sessions"),
            Path::new("/repo"),
            &DateWindow::default(),
        );
        assert!(sessions.is_empty());
    }

    #[test]
    fn matches_by_session_meta_cwd_and_overrides_id() {
        let tmp = tempfile::tempdir().unwrap();
        let repo = tmp.path().join("proj");
        std::fs::create_dir_all(repo.join("src")).unwrap();
        let repo = repo.canonicalize().unwrap();
        let root = tmp.path().join("sessions");
        std::fs::create_dir_all(&root).unwrap();

        write_session(
            &root,
            "rollout-1.jsonl",
            &[
                meta_line("sess-canonical", &repo.join("src").to_string_lossy()),
                shell_line("ls -la"),
            ],
        );

        let sessions = collect_sessions(&root, &repo, &DateWindow::default());
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].session_id, "sess-canonical");
        assert_eq!(sessions[0].action_count, 1);
        assert_eq!(sessions[0].first_date, Some(date!(2024 - 01 - 10)));
    }

    #[test]
    fn matches_by_raw_substring_without_meta() {
        let tmp = tempfile::tempdir().unwrap();
        let repo = tmp.path().join("proj");
        std::fs::create_dir_all(&repo).unwrap();
        let repo = repo.canonicalize().unwrap();
        let root = tmp.path().join("sessions");
        std::fs::create_dir_all(&root).unwrap();

        write_session(
            &root,
            "rollout-2.jsonl",
            &[shell_line(&format!("cat {}/CODEMAP.paths", repo.display()))],
        );

        let sessions = collect_sessions(&root, &repo, &DateWindow::default());
        assert_eq!(sessions.len(), 1);
        // Falls back to the file stem when no meta id appears.
        assert_eq!(sessions[0].session_id, "rollout-2");
        assert!(sessions[0].touched_codemap());
    }

    #[test]
    fn unrelated_sessions_are_excluded() {
        let tmp = tempfile::tempdir().unwrap();
        let repo = tmp.path().join("proj");
        std::fs::create_dir_all(&repo).unwrap();
        let repo = repo.canonicalize().unwrap();
        let root = tmp.path().join("sessions");
        std::fs::create_dir_all(&root).unwrap();

        write_session(
            &root,
            "rollout-3.jsonl",
            &[
                meta_line("other", "/somewhere/else"),
                shell_line("echo hello"),
            ],
        );

        let sessions = collect_sessions(&root, &repo, &DateWindow::default());
        assert!(sessions.is_empty());
    }

    #[test]
    fn classifies_commands_and_patch_edits() {
        let tmp = tempfile::tempdir().unwrap();
        let repo = tmp.path().join("proj");
        std::fs::create_dir_all(&repo).unwrap();
        let repo = repo.canonicalize().unwrap();
        let root = tmp.path().join("sessions");
        std::fs::create_dir_all(&root).unwrap();

        write_session(
            &root,
            "rollout-4.jsonl",
            &[
                meta_line("s4", &repo.to_string_lossy()),
                shell_line("codemap --check"),
                shell_line("git commit -m fix"),
                r#"{"type":"response_item","timestamp":"2024-01-10T09:05:00Z","payload":{"type":"function_call","name":"apply_patch","arguments":"{}"}}"#.to_string(),
                r#"{"type":"response_item","timestamp":"2024-01-10T09:06:00Z","payload":{"type":"custom_tool_call","name":"apply_patch"}}"#.to_string(),
            ],
        );

        let sessions = collect_sessions(&root, &repo, &DateWindow::default());
        assert_eq!(sessions.len(), 1);
        let s = &sessions[0];
        assert_eq!(s.action_count, 4);
        assert_eq!(s.first_codemap_action_index, Some(1));
        assert!(s.has_explicit_codemap_run);
        assert!(s.has_commit_command);
        assert_eq!(s.first_edit_action_index, Some(3));
    }

    #[test]
    fn string_encoded_arguments_are_parsed() {
        let tmp = tempfile::tempdir().unwrap();
        let repo = tmp.path().join("proj");
        std::fs::create_dir_all(&repo).unwrap();
        let repo = repo.canonicalize().unwrap();
        let root = tmp.path().join("sessions");
        std::fs::create_dir_all(&root).unwrap();

        write_session(
            &root,
            "rollout-5.jsonl",
            &[
                meta_line("s5", &repo.to_string_lossy()),
                r#"{"type":"response_item","timestamp":"2024-01-10T09:01:00Z","payload":{"type":"function_call","name":"exec_command","arguments":"{\"cmd\":\"cat CODEMAP.md\"}"}}"#.to_string(),
                // Malformed argument JSON: the record is skipped, not fatal.
                r#"{"type":"response_item","timestamp":"2024-01-10T09:02:00Z","payload":{"type":"function_call","name":"exec_command","arguments":"{broken"}}"#.to_string(),
            ],
        );

        let sessions = collect_sessions(&root, &repo, &DateWindow::default());
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].action_count, 1);
        assert!(sessions[0].touched_codemap());
    }

    #[test]
    fn duplicate_call_ids_process_once() {
        let tmp = tempfile::tempdir().unwrap();
        let repo = tmp.path().join("proj");
        std::fs::create_dir_all(&repo).unwrap();
        let repo = repo.canonicalize().unwrap();
        let root = tmp.path().join("sessions");
        std::fs::create_dir_all(&root).unwrap();

        let dup = r#"{"type":"response_item","timestamp":"2024-01-10T09:01:00Z","payload":{"type":"function_call","name":"shell_command","call_id":"c1","arguments":{"command":"ls"}}}"#.to_string();
        write_session(
            &root,
            "rollout-6.jsonl",
            &[meta_line("s6", &repo.to_string_lossy()), dup.clone(), dup],
        );

        let sessions = collect_sessions(&root, &repo, &DateWindow::default());
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].action_count, 1);
    }

    #[test]
    fn out_of_window_actions_never_count() {
        let tmp = tempfile::tempdir().unwrap();
        let repo = tmp.path().join("proj");
        std::fs::create_dir_all(&repo).unwrap();
        let repo = repo.canonicalize().unwrap();
        let root = tmp.path().join("sessions");
        std::fs::create_dir_all(&root).unwrap();

        write_session(
            &root,
            "rollout-7.jsonl",
            &[meta_line("s7", &repo.to_string_lossy()), shell_line("ls")],
        );

        let window = DateWindow::new(Some(date!(2025 - 01 - 01)), None);
        let sessions = collect_sessions(&root, &repo, &window);
        assert!(sessions.is_empty(), "zero in-window actions discards the session");
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let repo = tmp.path().join("proj");
        std::fs::create_dir_all(&repo).unwrap();
        let repo = repo.canonicalize().unwrap();
        let root = tmp.path().join("sessions");
        std::fs::create_dir_all(&root).unwrap();

        write_session(
            &root,
            "rollout-8.jsonl",
            &[
                "{not json".to_string(),
                meta_line("s8", &repo.to_string_lossy()),
                shell_line("echo ok"),
            ],
        );

        let sessions = collect_sessions(&root, &repo, &DateWindow::default());
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].action_count, 1);
    }

    #[test]
    fn matches_by_shared_git_origin() {
        let tmp = tempfile::tempdir().unwrap();
        let repo = tmp.path().join("checkout-a");
        let other = tmp.path().join("checkout-b");
        std::fs::create_dir_all(&repo).unwrap();
        std::fs::create_dir_all(&other).unwrap();
        let repo = repo.canonicalize().unwrap();
        let other = other.canonicalize().unwrap();
        for dir in [&repo, &other] {
            let git = |args: &[&str]| {
                let _ = std::process::Command::new("git")
                    .arg("-C")
                    .arg(dir)
                    .args(args)
                    .output();
            };
            git(&["init"]);
            git(&["remote", "add", "origin", "https://example.com/team/proj.git"]);
        }
        let root = tmp.path().join("sessions");
        std::fs::create_dir_all(&root).unwrap();

        write_session(
            &root,
            "rollout-origin.jsonl",
            &[
                meta_line("s-origin", &other.to_string_lossy()),
                shell_line("ls"),
            ],
        );

        let sessions = collect_sessions(&root, &repo, &DateWindow::default());
        assert_eq!(sessions.len(), 1, "second checkout of the same origin matches");
    }

    #[test]
    fn recursive_discovery_under_dated_subdirs() {
        let tmp = tempfile::tempdir().unwrap();
        let repo = tmp.path().join("proj");
        std::fs::create_dir_all(&repo).unwrap();
        let repo = repo.canonicalize().unwrap();
        let root = tmp.path().join("sessions");
        let nested = root.join("2024").join("01").join("10");
        std::fs::create_dir_all(&nested).unwrap();

        write_session(
            &nested,
            "rollout-9.jsonl",
            &[meta_line("s9", &repo.to_string_lossy()), shell_line("ls")],
        );

        let sessions = collect_sessions(&root, &repo, &DateWindow::default());
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].session_id, "s9");
    }
}
