//! Snapshot-state artifacts (GNU tar `--listed-incremental` files).

use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::naming::latest_snapshot;

/// Newest snapshot for `name` in `dir`. A missing `dir` has no snapshots.
pub fn find_latest_snapshot(dir: &Path, name: &str) -> io::Result<Option<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if let Some(file) = entry.file_name().to_str() {
            names.push(file.to_string());
        }
    }

    let latest = latest_snapshot(name, names.iter().map(String::as_str)).map(|f| dir.join(f));
    debug!(dir = %dir.display(), item = name, snapshot = ?latest, "snapshot lookup");
    Ok(latest)
}

/// Seed `staging` for one tar run against `snapshot`.
///
/// A new baseline starts from no state at all. Otherwise the current state is
/// copied, so tar advances the copy and `snapshot` survives a failed run.
pub fn stage_snapshot(snapshot: &Path, staging: &Path, new_baseline: bool) -> io::Result<()> {
    match fs::remove_file(staging) {
        Ok(()) => debug!(path = %staging.display(), "removed stale staging snapshot"),
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => return Err(err),
    }
    if !new_baseline {
        fs::copy(snapshot, staging)?;
    }
    Ok(())
}
