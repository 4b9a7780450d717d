use std::path::Path;

use anyhow::{bail, Context};
use impact_core::outcome::OutcomeLabels;
use impact_core::session::Source;

/// Load the labeled-outcomes table.
///
/// Expected header: `source,session_id,success` (any column order). Rows
/// with an unknown source tag or an unrecognized success token are dropped;
/// a malformed row never aborts the load. Values are plain comma-separated
/// fields; the identifiers this table carries do not contain commas.
pub fn load_outcomes(path: &Path) -> anyhow::Result<OutcomeLabels> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("outcomes CSV not found: {}", path.display()))?;

    let mut lines = content.lines();
    let header: Vec<&str> = lines
        .next()
        .unwrap_or("")
        .split(',')
        .map(str::trim)
        .collect();
    let col = |name: &str| header.iter().position(|h| *h == name);
    let (Some(source_col), Some(id_col), Some(success_col)) =
        (col("source"), col("session_id"), col("success"))
    else {
        bail!("outcomes CSV must include header columns: source,session_id,success");
    };

    let mut labels = OutcomeLabels::new();
    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').collect();
        let field = |idx: usize| fields.get(idx).map(|f| f.trim()).unwrap_or("");

        let Some(source) = Source::parse(&field(source_col).to_lowercase()) else {
            continue;
        };
        let session_id = field(id_col);
        if session_id.is_empty() {
            continue;
        }
        let success = match field(success_col).to_lowercase().as_str() {
            "1" | "true" | "yes" => true,
            "0" | "false" | "no" => false,
            _ => continue,
        };
        labels.insert((source, session_id.to_string()), success);
    }
    Ok(labels)
}
