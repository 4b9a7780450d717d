use std::fmt::Write as _;
use std::path::Path;

use serde::Serialize;

use impact_core::aggregate::{pct, AggregateMetrics};
use impact_core::outcome::OutcomeSummary;
use impact_core::window::DateWindow;

/// Per-source metrics plus the derived percentages the report exposes.
#[derive(Debug, Serialize)]
pub struct SourceMetrics {
    #[serde(flatten)]
    pub aggregate: AggregateMetrics,
    pub sessions_touching_codemap_pct: Option<f64>,
    pub sessions_touching_codemap_early_pct_of_touching: Option<f64>,
}

impl From<AggregateMetrics> for SourceMetrics {
    fn from(aggregate: AggregateMetrics) -> Self {
        let touch_pct = pct(aggregate.sessions_touching_codemap, aggregate.sessions_total);
        let early_pct = pct(
            aggregate.sessions_touching_codemap_early,
            aggregate.sessions_touching_codemap,
        );
        SourceMetrics {
            aggregate,
            sessions_touching_codemap_pct: touch_pct,
            sessions_touching_codemap_early_pct_of_touching: early_pct,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReportWindow {
    pub since: Option<String>,
    pub until: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReportSources {
    pub codex_sessions_root: String,
    pub claude_projects_root: String,
    pub claude_project_dir: String,
}

#[derive(Debug, Serialize)]
pub struct ReportMetrics {
    pub codex: SourceMetrics,
    pub claude: SourceMetrics,
    pub combined: SourceMetrics,
}

/// The complete invocation output: structured for `--json`, rendered to
/// text otherwise.
#[derive(Debug, Serialize)]
pub struct Report {
    pub repo: String,
    pub window: ReportWindow,
    pub sources: ReportSources,
    pub metrics: ReportMetrics,
    pub success_labels: Option<OutcomeSummary>,
}

impl Report {
    pub fn new(
        repo_root: &Path,
        window: &DateWindow,
        codex_root: &Path,
        claude_root: &Path,
        codex: AggregateMetrics,
        claude: AggregateMetrics,
        combined: AggregateMetrics,
        success_labels: Option<OutcomeSummary>,
    ) -> Self {
        Report {
            repo: repo_root.display().to_string(),
            window: ReportWindow {
                since: window.since.map(iso_date),
                until: window.until.map(iso_date),
            },
            sources: ReportSources {
                codex_sessions_root: codex_root.display().to_string(),
                claude_projects_root: claude_root.display().to_string(),
                claude_project_dir: impact_claude::project_dir_for_repo(repo_root, claude_root)
                    .display()
                    .to_string(),
            },
            metrics: ReportMetrics {
                codex: codex.into(),
                claude: claude.into(),
                combined: combined.into(),
            },
            success_labels,
        }
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Codemap Impact Report");
        let _ = writeln!(out, "Repo: {}", self.repo);
        let _ = writeln!(
            out,
            "Window: {} -> {}",
            self.window.since.as_deref().unwrap_or("unbounded"),
            self.window.until.as_deref().unwrap_or("unbounded"),
        );
        let _ = writeln!(out, "Codex sessions root: {}", self.sources.codex_sessions_root);
        let _ = writeln!(out, "Claude project dir: {}", self.sources.claude_project_dir);
        out.push('\n');
        render_source_block(&mut out, "Codex", &self.metrics.codex, false);
        out.push('\n');
        render_source_block(&mut out, "Claude", &self.metrics.claude, true);
        out.push('\n');
        render_source_block(&mut out, "Combined", &self.metrics.combined, false);
        out.push('\n');
        match &self.success_labels {
            None => {
                let _ = writeln!(
                    out,
                    "Success metric: n/a (provide --outcomes-csv with columns source,session_id,success)"
                );
            }
            Some(summary) => {
                let _ = writeln!(out, "Success metric (labeled sessions only):");
                let _ = writeln!(out, "  labeled sessions matched: {}", summary.labeled_sessions);
                let _ = writeln!(
                    out,
                    "  success rate (codemap sessions): {} over {} sessions",
                    fmt_pct(summary.success_rate_codemap),
                    summary.codemap_sessions,
                );
                let _ = writeln!(
                    out,
                    "  success rate (non-codemap sessions): {} over {} sessions",
                    fmt_pct(summary.success_rate_non_codemap),
                    summary.non_codemap_sessions,
                );
            }
        }
        out
    }
}

fn render_source_block(out: &mut String, title: &str, metrics: &SourceMetrics, has_read_metric: bool) {
    let agg = &metrics.aggregate;
    let _ = writeln!(out, "{title}:");
    let _ = writeln!(out, "  sessions analyzed: {}", agg.sessions_total);
    let _ = writeln!(
        out,
        "  codemap touch rate: {}/{} ({})",
        agg.sessions_touching_codemap,
        agg.sessions_total,
        fmt_pct(metrics.sessions_touching_codemap_pct),
    );
    let _ = writeln!(
        out,
        "  early codemap touch (<=3 actions): {}/{} ({})",
        agg.sessions_touching_codemap_early,
        agg.sessions_touching_codemap,
        fmt_pct(metrics.sessions_touching_codemap_early_pct_of_touching),
    );
    let _ = writeln!(out, "  sessions with edits: {}", agg.sessions_with_edit);
    let _ = writeln!(
        out,
        "  median actions before first edit: all={}, early_codemap={}, no_early_codemap={}",
        fmt_num(agg.median_actions_before_first_edit),
        fmt_num(agg.median_actions_before_first_edit_early_codemap),
        fmt_num(agg.median_actions_before_first_edit_no_early_codemap),
    );
    if has_read_metric {
        let _ = writeln!(
            out,
            "  median unique reads before first edit: all={}, early_codemap={}, no_early_codemap={}",
            fmt_num(agg.median_unique_reads_before_first_edit),
            fmt_num(agg.median_unique_reads_before_first_edit_early_codemap),
            fmt_num(agg.median_unique_reads_before_first_edit_no_early_codemap),
        );
    } else {
        let _ = writeln!(
            out,
            "  median unique reads before first edit: n/a (no direct Read-tool events)"
        );
    }
    let _ = writeln!(
        out,
        "  explicit `codemap` command sessions: {}",
        agg.sessions_with_explicit_codemap_run
    );
    let _ = writeln!(
        out,
        "  sessions with `git commit`: {}",
        agg.sessions_with_commit_command
    );
}

fn iso_date(date: time::Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

/// "n/a" for undefined, no decimals for whole numbers, one decimal else.
pub fn fmt_num(value: Option<f64>) -> String {
    match value {
        None => "n/a".to_string(),
        Some(v) if v.fract() == 0.0 => format!("{}", v as i64),
        Some(v) => format!("{v:.1}"),
    }
}

pub fn fmt_pct(value: Option<f64>) -> String {
    match value {
        None => "n/a".to_string(),
        Some(v) => format!("{v:.1}%"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use impact_core::aggregate::compute;
    use impact_core::session::{SessionStats, Source};
    use impact_core::window::parse_date;

    fn sample_report(success: Option<OutcomeSummary>) -> Report {
        let mut touched = SessionStats::new(Source::Claude, "s1", "/logs/s1.jsonl");
        touched.record_action(None, true, false, Some("CODEMAP.md"));
        touched.record_action(None, false, true, None);
        let claude = compute(&[touched], true);
        let window = DateWindow::new(parse_date("2024-01-01").ok(), None);
        Report::new(
            Path::new("/repo"),
            &window,
            Path::new("/codex/sessions"),
            Path::new("/claude/projects"),
            compute(&[], false),
            claude,
            compute(&[], false),
            success,
        )
    }

    #[test]
    fn fmt_num_variants() {
        assert_eq!(fmt_num(None), "n/a");
        assert_eq!(fmt_num(Some(3.0)), "3");
        assert_eq!(fmt_num(Some(2.5)), "2.5");
        assert_eq!(fmt_num(Some(2.25)), "2.2");
    }

    #[test]
    fn fmt_pct_variants() {
        assert_eq!(fmt_pct(None), "n/a");
        assert_eq!(fmt_pct(Some(33.333)), "33.3%");
    }

    #[test]
    fn text_report_shape() {
        let text = sample_report(None).render_text();
        assert!(text.starts_with("Codemap Impact Report"));
        assert!(text.contains("Window: 2024-01-01 -> unbounded"));
        assert!(text.contains("Codex:\n  sessions analyzed: 0"));
        assert!(text.contains("Claude:\n  sessions analyzed: 1"));
        assert!(text.contains("codemap touch rate: 1/1 (100.0%)"));
        assert!(text.contains("Success metric: n/a"));
        // Codex never emits read events; its read median is marked n/a.
        assert!(text.contains("median unique reads before first edit: n/a"));
    }

    #[test]
    fn text_report_with_success_block() {
        let summary = OutcomeSummary {
            labeled_sessions: 2,
            codemap_sessions: 1,
            non_codemap_sessions: 1,
            success_rate_codemap: Some(100.0),
            success_rate_non_codemap: Some(0.0),
        };
        let text = sample_report(Some(summary)).render_text();
        assert!(text.contains("labeled sessions matched: 2"));
        assert!(text.contains("success rate (codemap sessions): 100.0% over 1 sessions"));
    }

    #[test]
    fn json_report_shape() {
        let json = sample_report(None).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["repo"], "/repo");
        assert_eq!(value["window"]["since"], "2024-01-01");
        assert_eq!(value["window"]["until"], serde_json::Value::Null);
        assert_eq!(value["metrics"]["claude"]["sessions_total"], 1);
        assert_eq!(value["metrics"]["claude"]["sessions_touching_codemap_pct"], 100.0);
        // Undefined medians serialize as null, never zero.
        assert_eq!(
            value["metrics"]["codex"]["median_actions_before_first_edit"],
            serde_json::Value::Null
        );
        assert_eq!(value["success_labels"], serde_json::Value::Null);
        assert_eq!(
            value["sources"]["claude_project_dir"],
            "/claude/projects/-repo"
        );
    }
}
