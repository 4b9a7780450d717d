use serde::Serialize;

use crate::session::SessionStats;

/// Population-level summary over a frozen set of session records.
///
/// Every median is `None` (reported as "n/a" downstream, never zero) when
/// the underlying sub-population is empty. The read medians are also `None`
/// for populations whose ecosystem emits no read events.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateMetrics {
    pub sessions_total: usize,
    pub sessions_touching_codemap: usize,
    pub sessions_touching_codemap_early: usize,
    pub sessions_with_edit: usize,
    pub sessions_with_explicit_codemap_run: usize,
    pub sessions_with_commit_command: usize,
    pub median_actions_before_first_edit: Option<f64>,
    pub median_actions_before_first_edit_early_codemap: Option<f64>,
    pub median_actions_before_first_edit_no_early_codemap: Option<f64>,
    pub median_unique_reads_before_first_edit: Option<f64>,
    pub median_unique_reads_before_first_edit_early_codemap: Option<f64>,
    pub median_unique_reads_before_first_edit_no_early_codemap: Option<f64>,
}

/// Standard median: average of the two middle values for even sizes,
/// undefined for an empty population.
pub fn median(values: &[usize]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid] as f64)
    } else {
        Some((sorted[mid - 1] + sorted[mid]) as f64 / 2.0)
    }
}

/// Percentage of `num` over `den`, undefined when the denominator is zero.
pub fn pct(num: usize, den: usize) -> Option<f64> {
    if den == 0 {
        None
    } else {
        Some(num as f64 * 100.0 / den as f64)
    }
}

/// Reduce completed session records into aggregate metrics.
///
/// `include_read_metric` is false for populations where read events are not
/// tracked (the codex ecosystem, and any mixed population containing it);
/// their read medians report as undefined rather than a misleading zero.
pub fn compute(sessions: &[SessionStats], include_read_metric: bool) -> AggregateMetrics {
    let edited: Vec<&SessionStats> = sessions
        .iter()
        .filter(|s| s.first_edit_action_index.is_some())
        .collect();

    let before_edit = |filter: &dyn Fn(&SessionStats) -> bool| -> Vec<usize> {
        edited
            .iter()
            .filter(|s| filter(s))
            .filter_map(|s| s.actions_before_first_edit())
            .collect()
    };
    let before_edit_all = before_edit(&|_| true);
    let before_edit_early = before_edit(&|s| s.touched_codemap_early());
    let before_edit_no_early = before_edit(&|s| !s.touched_codemap_early());

    let (reads_all, reads_early, reads_no_early) = if include_read_metric {
        let reads = |filter: &dyn Fn(&SessionStats) -> bool| -> Vec<usize> {
            edited
                .iter()
                .filter(|s| filter(s))
                .map(|s| s.unique_reads_before_edit.len())
                .collect()
        };
        (
            median(&reads(&|_| true)),
            median(&reads(&|s| s.touched_codemap_early())),
            median(&reads(&|s| !s.touched_codemap_early())),
        )
    } else {
        (None, None, None)
    };

    AggregateMetrics {
        sessions_total: sessions.len(),
        sessions_touching_codemap: sessions.iter().filter(|s| s.touched_codemap()).count(),
        sessions_touching_codemap_early: sessions
            .iter()
            .filter(|s| s.touched_codemap_early())
            .count(),
        sessions_with_edit: edited.len(),
        sessions_with_explicit_codemap_run: sessions
            .iter()
            .filter(|s| s.has_explicit_codemap_run)
            .count(),
        sessions_with_commit_command: sessions
            .iter()
            .filter(|s| s.has_commit_command)
            .count(),
        median_actions_before_first_edit: median(&before_edit_all),
        median_actions_before_first_edit_early_codemap: median(&before_edit_early),
        median_actions_before_first_edit_no_early_codemap: median(&before_edit_no_early),
        median_unique_reads_before_first_edit: reads_all,
        median_unique_reads_before_first_edit_early_codemap: reads_early,
        median_unique_reads_before_first_edit_no_early_codemap: reads_no_early,
    }
}
