//! Final run summary rendering.

use crate::core::elapsed::format_elapsed;
use crate::core::types::{ItemOutcome, RunRecord};

/// Render the end-of-run report: one line per item, one per failed script
/// hook, a stuck-lock line, an overall line, and the run time when requested.
pub fn render_summary(record: &RunRecord) -> Vec<String> {
    let mut lines: Vec<String> = record.items.iter().map(item_line).collect();

    for hook in record.failed_hooks() {
        lines.push(format!(
            "{}: FAILED {}",
            hook.hook,
            hook.error.as_deref().unwrap_or_default()
        ));
    }

    if let Some(err) = &record.lock_release_error {
        lines.push(format!("lock: FAILED {err}"));
    }

    let failed = record.failed_items().count();
    let mut overall = format!(
        "{} backup {}: {} succeeded, {} failed",
        record.mode,
        if record.succeeded() { "ok" } else { "FAILED" },
        record.items.len() - failed,
        failed
    );
    let hooks_failed = record.failed_hooks().count();
    if hooks_failed > 0 {
        overall.push_str(&format!(", {hooks_failed} script hook(s) failed"));
    }
    lines.push(overall);

    if record.show_script_time {
        lines.push(format!(
            "Backup script took {} to complete",
            format_elapsed(record.elapsed)
        ));
    }
    lines
}

fn item_line(item: &ItemOutcome) -> String {
    let mut line = if item.succeeded() {
        format!("{}: ok", item.name)
    } else {
        let reasons: Vec<String> = item
            .failures
            .iter()
            .map(|f| format!("{}: {}", f.phase, f.message))
            .collect();
        format!("{}: FAILED {}", item.name, reasons.join("; "))
    };
    if let Some(elapsed) = item.archive_elapsed {
        line.push_str(&format!(" (archive took {})", format_elapsed(elapsed)));
    }
    line
}
