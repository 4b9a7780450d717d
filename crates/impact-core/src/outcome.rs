use std::collections::HashMap;

use serde::Serialize;

use crate::session::{SessionStats, Source};

/// Externally supplied `(source, identifier) -> success` labels.
///
/// The identifier may be a session id, a log file's base name, or a full
/// file path; matching tries those per session in that priority order.
pub type OutcomeLabels = HashMap<(Source, String), bool>;

/// Success rates for the labeled subset of a session population, split by
/// whether the session ever touched the codemap.
#[derive(Debug, Clone, Serialize)]
pub struct OutcomeSummary {
    pub labeled_sessions: usize,
    pub codemap_sessions: usize,
    pub non_codemap_sessions: usize,
    pub success_rate_codemap: Option<f64>,
    pub success_rate_non_codemap: Option<f64>,
}

/// Join sessions against the label table. Unmatched sessions are excluded;
/// a rate over an empty subset is undefined.
pub fn match_labeled(sessions: &[SessionStats], labels: &OutcomeLabels) -> OutcomeSummary {
    let mut codemap_outcomes: Vec<bool> = Vec::new();
    let mut non_codemap_outcomes: Vec<bool> = Vec::new();

    for session in sessions {
        let candidates = [
            session.session_id.clone(),
            session.file_stem().to_string(),
            session.session_file.to_string_lossy().to_string(),
        ];
        let label = candidates
            .into_iter()
            .find_map(|id| labels.get(&(session.source, id)).copied());
        let Some(success) = label else { continue };
        if session.touched_codemap() {
            codemap_outcomes.push(success);
        } else {
            non_codemap_outcomes.push(success);
        }
    }

    OutcomeSummary {
        labeled_sessions: codemap_outcomes.len() + non_codemap_outcomes.len(),
        codemap_sessions: codemap_outcomes.len(),
        non_codemap_sessions: non_codemap_outcomes.len(),
        success_rate_codemap: success_rate(&codemap_outcomes),
        success_rate_non_codemap: success_rate(&non_codemap_outcomes),
    }
}

fn success_rate(outcomes: &[bool]) -> Option<f64> {
    if outcomes.is_empty() {
        return None;
    }
    let wins = outcomes.iter().filter(|v| **v).count();
    Some(wins as f64 * 100.0 / outcomes.len() as f64)
}
