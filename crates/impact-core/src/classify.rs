use std::sync::LazyLock;

use regex::Regex;

/// Reference to the codemap artifact: one of its conventional file names
/// (`CODEMAP.paths`, `CODEMAP.md`) or the bare `codemap` token anywhere in
/// the text (paths and scripts that mention it still count as a touch).
static CODEMAP_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"CODEMAP\.(?:paths|md)|\bcodemap\b").unwrap());

/// Strict invocation: `codemap` run as a standalone command, i.e. the token
/// at the start of input, after a command separator, or after a newline,
/// followed by whitespace or end of string.
static STRICT_CODEMAP_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(^|[;&|]\s*|\n)\s*codemap(\s|$)").unwrap());

static GIT_COMMIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bgit\s+commit\b").unwrap());

/// Shell text that applies a patch: `apply_patch` or `git apply`. Used for
/// the ecosystem whose file edits only show up as shell commands.
static EDIT_SHELL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bapply_patch\b|\bgit\s+apply\b").unwrap());

/// True if the text references the codemap artifact.
pub fn is_codemap_reference(text: &str) -> bool {
    CODEMAP_REF.is_match(text)
}

/// True if the text, read as a shell command line, runs `codemap` directly.
///
/// Stricter than [`is_codemap_reference`]: a mention inside a longer path
/// (e.g. `./scripts/codemap.sh`) does not qualify.
pub fn is_strict_codemap_invocation(text: &str) -> bool {
    STRICT_CODEMAP_RUN.is_match(text)
}

/// True if the text contains a `git commit` invocation.
pub fn is_commit_command(text: &str) -> bool {
    GIT_COMMIT.is_match(text)
}

/// True if the shell text is an edit in disguise (patch application).
pub fn is_edit_equivalent_shell_command(text: &str) -> bool {
    EDIT_SHELL.is_match(text)
}
