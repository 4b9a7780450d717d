use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use time::Date;

/// Which log ecosystem produced a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Codex,
    Claude,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Codex => "codex",
            Source::Claude => "claude",
        }
    }

    /// Parse a source tag as it appears in an outcomes table row.
    pub fn parse(value: &str) -> Option<Source> {
        match value {
            "codex" => Some(Source::Codex),
            "claude" => Some(Source::Claude),
            _ => None,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-session accumulator: one per transcript file, fed classified actions
/// in chronological log order, then frozen and handed to the aggregator.
#[derive(Debug, Clone)]
pub struct SessionStats {
    pub source: Source,
    pub session_id: String,
    pub session_file: PathBuf,
    pub first_date: Option<Date>,
    pub action_count: usize,
    /// 1-based position of the first codemap reference; set at most once.
    pub first_codemap_action_index: Option<usize>,
    /// 1-based position of the first edit; set at most once.
    pub first_edit_action_index: Option<usize>,
    /// Unique read paths seen while no edit had yet occurred.
    pub unique_reads_before_edit: HashSet<String>,
    pub has_explicit_codemap_run: bool,
    pub has_commit_command: bool,
}

impl SessionStats {
    pub fn new(source: Source, session_id: impl Into<String>, session_file: impl Into<PathBuf>) -> Self {
        SessionStats {
            source,
            session_id: session_id.into(),
            session_file: session_file.into(),
            first_date: None,
            action_count: 0,
            first_codemap_action_index: None,
            first_edit_action_index: None,
            unique_reads_before_edit: HashSet::new(),
            has_explicit_codemap_run: false,
            has_commit_command: false,
        }
    }

    /// Ingest one in-window classified action.
    ///
    /// The count increments for every action, classified or not. A read path
    /// supplied in the same call that records the first edit is still added
    /// to the reads set: the read check runs before the edit flag is applied.
    pub fn record_action(
        &mut self,
        date: Option<Date>,
        codemap_event: bool,
        edit_event: bool,
        read_path: Option<&str>,
    ) {
        self.action_count += 1;
        if self.first_date.is_none() {
            self.first_date = date;
        }
        if codemap_event && self.first_codemap_action_index.is_none() {
            self.first_codemap_action_index = Some(self.action_count);
        }
        if let Some(path) = read_path {
            if self.first_edit_action_index.is_none() {
                self.unique_reads_before_edit.insert(path.to_string());
            }
        }
        if edit_event && self.first_edit_action_index.is_none() {
            self.first_edit_action_index = Some(self.action_count);
        }
    }

    pub fn touched_codemap(&self) -> bool {
        self.first_codemap_action_index.is_some()
    }

    /// First codemap reference within the first three actions.
    pub fn touched_codemap_early(&self) -> bool {
        matches!(self.first_codemap_action_index, Some(idx) if idx <= 3)
    }

    /// Actions taken before the first edit; `None` if no edit ever occurred.
    pub fn actions_before_first_edit(&self) -> Option<usize> {
        self.first_edit_action_index.map(|idx| idx - 1)
    }

    /// Base name of the session file, without extension.
    pub fn file_stem(&self) -> &str {
        self.session_file
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("")
    }
}
