mod outcomes;
mod report;

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use time::Date;

use impact_core::aggregate;
use impact_core::outcome;
use impact_core::window::{parse_date, DateWindow};
use report::Report;

#[derive(Parser)]
#[command(
    name = "codemap-impact",
    version,
    about = "Codemap impact metrics from local Codex/Claude session logs"
)]
struct Cli {
    /// Path to the target repository (absolute or relative)
    #[arg(long)]
    repo: PathBuf,
    /// Start date (inclusive), YYYY-MM-DD. Default: no lower bound
    #[arg(long)]
    since: Option<String>,
    /// End date (inclusive), YYYY-MM-DD. Default: no upper bound
    #[arg(long)]
    until: Option<String>,
    /// Codex sessions root. Default: ~/.codex/sessions
    #[arg(long)]
    codex_sessions_root: Option<PathBuf>,
    /// Claude projects root. Default: ~/.claude/projects
    #[arg(long)]
    claude_projects_root: Option<PathBuf>,
    /// Labeled outcomes CSV with columns: source,session_id,success
    #[arg(long)]
    outcomes_csv: Option<PathBuf>,
    /// Emit machine-readable JSON output
    #[arg(long)]
    json: bool,
}

fn parse_date_flag(value: Option<&str>, flag: &str) -> anyhow::Result<Option<Date>> {
    value
        .map(|v| parse_date(v).with_context(|| format!("invalid {flag} value")))
        .transpose()
}

fn home_subdir(parts: &[&str]) -> PathBuf {
    let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    for part in parts {
        path = path.join(part);
    }
    path
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let repo_root = cli
        .repo
        .canonicalize()
        .with_context(|| format!("repo path does not exist: {}", cli.repo.display()))?;

    // Invalid dates are rejected before any log scanning begins.
    let since = parse_date_flag(cli.since.as_deref(), "--since")?;
    let until = parse_date_flag(cli.until.as_deref(), "--until")?;
    if let (Some(s), Some(u)) = (since, until) {
        if s > u {
            bail!("--since must be <= --until");
        }
    }
    let window = DateWindow::new(since, until);

    let codex_root = cli
        .codex_sessions_root
        .unwrap_or_else(|| home_subdir(&[".codex", "sessions"]));
    let claude_root = cli
        .claude_projects_root
        .unwrap_or_else(|| home_subdir(&[".claude", "projects"]));

    let codex_sessions = impact_codex::collect_sessions(&codex_root, &repo_root, &window);
    let claude_sessions = impact_claude::collect_sessions(&claude_root, &repo_root, &window);
    let mut combined = codex_sessions.clone();
    combined.extend(claude_sessions.iter().cloned());

    let success_labels = match &cli.outcomes_csv {
        Some(path) => {
            let labels = outcomes::load_outcomes(path)?;
            Some(outcome::match_labeled(&combined, &labels))
        }
        None => None,
    };

    let report = Report::new(
        &repo_root,
        &window,
        &codex_root,
        &claude_root,
        aggregate::compute(&codex_sessions, false),
        aggregate::compute(&claude_sessions, true),
        aggregate::compute(&combined, false),
        success_labels,
    );

    if cli.json {
        println!("{}", report.to_json()?);
    } else {
        print!("{}", report.render_text());
    }
    Ok(())
}
