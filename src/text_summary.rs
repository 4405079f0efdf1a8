//! Text summary builder for CLI output.

use crate::model::{Outcome, RunReport};

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

/// Build the end-of-run summary printed to stdout in text mode.
pub(crate) fn build_text_summary(report: &RunReport) -> TextSummary {
    let mut lines = Vec::new();
    lines.push(format!("Run: {}", report.run_id));
    lines.push(format!(
        "Work units: {} of {} ({}%)",
        report.progress_events, report.target, report.last_percent
    ));
    lines.push(format!("Elapsed: {} ms", report.duration_ms));
    lines.push(match &report.outcome {
        Outcome::Failed(fault) => format!("Outcome: failed ({fault})"),
        other => format!("Outcome: {}", other.as_str()),
    });
    TextSummary { lines }
}
