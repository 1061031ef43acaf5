//! Machine-readable run report (`backup run --report <path>`).

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use crate::core::types::RunRecord;

/// Atomically write `record` as pretty JSON (temp file + rename).
pub fn write_report(path: &Path, record: &RunRecord) -> Result<()> {
    debug!(path = %path.display(), items = record.items.len(), "writing run report");
    let mut buf = serde_json::to_string_pretty(record).context("serialize run report")?;
    buf.push('\n');

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, buf)
        .with_context(|| format!("write temp report {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace report {}", path.display()))?;
    Ok(())
}
