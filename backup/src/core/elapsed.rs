//! Human-readable elapsed time.

use std::time::Duration;

/// Render whole seconds as `MM mins SS seconds`, prefixed with hours when needed.
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    let hours = total / 3600;
    let mins = (total % 3600) / 60;
    let secs = total % 60;
    if hours > 0 {
        format!("{hours} hours {mins:02} mins {secs:02} seconds")
    } else {
        format!("{mins:02} mins {secs:02} seconds")
    }
}
