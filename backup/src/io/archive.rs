//! Archive operation: resolves artifact paths for an item and drives `tar`.
//!
//! The [`Archiver`] trait decouples item jobs from GNU tar. Tests use a
//! scripted archiver that writes marker files instead of spawning processes.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use chrono::NaiveDate;
use tracing::{debug, info, instrument, warn};

use crate::config::ItemConfig;
use crate::core::naming::{archive_file_name, item_dir, snapshot_file_name};
use crate::core::types::RunMode;
use crate::error::BackupError;
use crate::io::process::{DEFAULT_OUTPUT_LIMIT_BYTES, run_command};
use crate::io::snapshot::{find_latest_snapshot, stage_snapshot};

/// GNU tar exits 1 when files changed while being read; the archive is still usable.
const TAR_EXIT_FILES_CHANGED: i32 = 1;

const STAGING_SUFFIX: &str = ".partial";

/// Everything needed to produce one item's archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveRequest {
    pub item: String,
    pub mode: RunMode,
    pub src_path: PathBuf,
    pub archive_path: PathBuf,
    /// Written fresh in full mode, read and advanced in incremental mode.
    pub snapshot_path: PathBuf,
    pub tar_opts: Vec<String>,
    pub workdir: PathBuf,
    pub timeout: Option<Duration>,
}

/// Abstraction over archive backends. Shared by every item worker.
pub trait Archiver: Send + Sync {
    fn archive(&self, request: &ArchiveRequest) -> Result<(), BackupError>;
}

/// Resolve paths for `item` and prepare its destination.
///
/// Incremental mode fails with `MissingSnapshotState` before anything is
/// created when no baseline exists. Full mode creates `<dest>/<name>/` and
/// targets today's snapshot, which the archiver replaces only on success.
pub fn prepare_archive(
    item: &ItemConfig,
    mode: RunMode,
    date: NaiveDate,
    workdir: &Path,
    timeout: Option<Duration>,
) -> Result<ArchiveRequest, BackupError> {
    let src_path = workdir.join(&item.src_path);
    if !src_path.exists() {
        return Err(BackupError::archive(
            &item.name,
            format!("source path {} does not exist", src_path.display()),
        ));
    }

    let dir = item_dir(&workdir.join(&item.dest_path), &item.name);
    let snapshot_path = match mode {
        RunMode::Incremental => find_latest_snapshot(&dir, &item.name)
            .map_err(|err| {
                BackupError::archive(&item.name, format!("scan {}: {err}", dir.display()))
            })?
            .ok_or_else(|| BackupError::MissingSnapshotState {
                item: item.name.clone(),
                dir: dir.clone(),
            })?,
        RunMode::Full => {
            fs::create_dir_all(&dir).map_err(|err| {
                BackupError::archive(&item.name, format!("create {}: {err}", dir.display()))
            })?;
            dir.join(snapshot_file_name(&item.name, date))
        }
    };

    Ok(ArchiveRequest {
        item: item.name.clone(),
        mode,
        src_path,
        archive_path: dir.join(archive_file_name(mode, &item.name, date)),
        snapshot_path,
        tar_opts: split_tar_opts(item.tar_opts.as_deref()),
        workdir: workdir.to_path_buf(),
        timeout,
    })
}

/// Split configured tar options into arguments.
///
/// Bare letter clusters such as `v` or `vp` become `-v` / `-vp`.
pub fn split_tar_opts(opts: Option<&str>) -> Vec<String> {
    opts.unwrap_or_default()
        .split_whitespace()
        .map(|token| {
            if token.starts_with('-') {
                token.to_string()
            } else {
                format!("-{token}")
            }
        })
        .collect()
}

/// Arguments for `tar` (without the program name).
pub fn tar_args(request: &ArchiveRequest) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-czP".into()];
    args.extend(request.tar_opts.iter().map(OsString::from));
    args.push("-f".into());
    args.push(request.archive_path.clone().into_os_string());
    args.push("--listed-incremental".into());
    args.push(request.snapshot_path.clone().into_os_string());
    args.push(request.src_path.clone().into_os_string());
    args
}

/// Where an artifact is written until the archive run succeeds.
pub fn staging_path(path: &Path) -> PathBuf {
    let mut staged = path.as_os_str().to_owned();
    staged.push(STAGING_SUFFIX);
    PathBuf::from(staged)
}

/// Archiver that spawns GNU `tar`.
///
/// Tar writes to staging copies of the archive and snapshot. Both are renamed
/// into place only after tar succeeds, so a failed run leaves the previous
/// artifacts (including a same-day baseline) untouched.
pub struct TarArchiver {
    pub output_limit_bytes: usize,
}

impl Default for TarArchiver {
    fn default() -> Self {
        Self {
            output_limit_bytes: DEFAULT_OUTPUT_LIMIT_BYTES,
        }
    }
}

impl Archiver for TarArchiver {
    #[instrument(skip_all, fields(item = %request.item, mode = %request.mode))]
    fn archive(&self, request: &ArchiveRequest) -> Result<(), BackupError> {
        info!(
            src = %request.src_path.display(),
            archive = %request.archive_path.display(),
            "creating archive"
        );
        let staged = ArchiveRequest {
            archive_path: staging_path(&request.archive_path),
            snapshot_path: staging_path(&request.snapshot_path),
            ..request.clone()
        };
        if let Err(err) = stage_snapshot(
            &request.snapshot_path,
            &staged.snapshot_path,
            request.mode == RunMode::Full,
        ) {
            let reason = format!("stage {}: {err}", request.snapshot_path.display());
            discard_partial(&staged);
            return Err(BackupError::archive(&request.item, reason));
        }

        let mut cmd = Command::new("tar");
        cmd.args(tar_args(&staged)).current_dir(&request.workdir);

        let mut failure = match run_command(cmd, request.timeout, self.output_limit_bytes) {
            Err(err) => Some(format!("{err:#}")),
            Ok(output) if output.success() => None,
            Ok(output)
                if output.timed_out.is_none()
                    && output.status.code() == Some(TAR_EXIT_FILES_CHANGED) =>
            {
                let stderr = String::from_utf8_lossy(&output.stderr);
                warn!(stderr = %stderr.trim_end(), "files changed while archiving");
                None
            }
            Ok(output) => output.failure_reason(),
        };
        if failure.is_none()
            && let Err(err) = commit(&staged, request)
        {
            failure = Some(err);
        }

        match failure {
            None => Ok(()),
            Some(reason) => {
                discard_partial(&staged);
                Err(BackupError::archive(&request.item, reason))
            }
        }
    }
}

/// Move staged artifacts into place, snapshot last so a baseline never
/// points at a missing archive.
fn commit(staged: &ArchiveRequest, request: &ArchiveRequest) -> Result<(), String> {
    for (from, to) in [
        (&staged.archive_path, &request.archive_path),
        (&staged.snapshot_path, &request.snapshot_path),
    ] {
        fs::rename(from, to).map_err(|err| format!("move {} into place: {err}", to.display()))?;
    }
    Ok(())
}

/// Remove staging artifacts a failed tar run may have left half-written.
fn discard_partial(staged: &ArchiveRequest) {
    for path in [&staged.archive_path, &staged.snapshot_path] {
        match fs::remove_file(path) {
            Ok(()) => debug!(path = %path.display(), "removed partial artifact"),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                warn!(path = %path.display(), err = %err, "could not remove partial artifact");
            }
        }
    }
}
