//! Concurrent directory backup runner.
//!
//! Reads `config.json`, archives every enabled item in parallel with GNU tar,
//! and holds `backup.lock` for the duration of the run.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use backup::core::summary::render_summary;
use backup::core::types::RunMode;
use backup::coordinator::{RunRequest, run_backup};
use backup::error::BackupError;
use backup::exit_codes;
use backup::io::archive::TarArchiver;
use backup::io::config_store::{CONFIG_FILE_NAME, load_config};
use backup::io::hooks::ShellHookRunner;
use backup::io::lock::{LOCK_FILE_NAME, RunLock};
use backup::io::report::write_report;
use backup::logging;
use backup::status::check_status;
use clap::{Parser, Subcommand};
use tracing::debug;

#[derive(Parser)]
#[command(
    name = "backup",
    version,
    about = "Concurrent per-directory tar backups guarded by a lock file"
)]
struct Cli {
    /// Config file (JSON, or TOML with a `.toml` extension).
    #[arg(short, long, global = true, default_value = CONFIG_FILE_NAME)]
    config: PathBuf,

    /// Lock file whose presence means a run is in progress.
    #[arg(long, global = true, default_value = LOCK_FILE_NAME)]
    lock_file: PathBuf,

    /// Debug-level logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Archive every enabled item (incremental unless `--full`).
    Run {
        /// Full backup with a fresh snapshot baseline.
        #[arg(short, long)]
        full: bool,
        /// Also write the run record as JSON to this path.
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Print `running` or `idle` depending on the lock file.
    Status,
    /// Check the config and list enabled items.
    Validate,
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    let code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            exit_code_for(&err)
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<i32> {
    let workdir = std::env::current_dir().context("resolve working directory")?;
    let lock = RunLock::new(workdir.join(&cli.lock_file));
    match cli.command {
        Command::Run { full, report } => cmd_run(
            &workdir,
            &workdir.join(&cli.config),
            &lock,
            RunMode::from_full_flag(full),
            report.as_deref(),
        ),
        Command::Status => {
            let status = check_status(&lock);
            println!("{}", status.as_str());
            Ok(status.exit_code())
        }
        Command::Validate => cmd_validate(&workdir.join(&cli.config)),
    }
}

fn cmd_run(
    workdir: &Path,
    config_path: &Path,
    lock: &RunLock,
    mode: RunMode,
    report: Option<&Path>,
) -> Result<i32> {
    let config = load_config(config_path)?;
    let record = run_backup(
        lock,
        &config,
        &RunRequest::today(mode, workdir),
        Arc::new(TarArchiver::default()),
        Arc::new(ShellHookRunner::default()),
        |phase| debug!(?phase, "run phase"),
    )?;

    for line in render_summary(&record) {
        println!("{line}");
    }
    if let Some(path) = report {
        write_report(&workdir.join(path), &record)?;
    }
    if let Some(err) = &record.lock_release_error {
        eprintln!("{err}; delete it by hand before the next run");
    }
    Ok(record.exit_code())
}

fn cmd_validate(config_path: &Path) -> Result<i32> {
    let config = load_config(config_path)?;
    for item in &config.backup_list {
        if item.enabled {
            println!(
                "{}: {} -> {}",
                item.name,
                item.src_path.display(),
                item.dest_path.display()
            );
        } else {
            println!("{}: disabled", item.name);
        }
    }
    Ok(exit_codes::OK)
}

/// A held lock has its own exit code; every other early error is invalid.
///
/// A lock left behind after a run is reported through the run record instead.
fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<BackupError>() {
        Some(BackupError::LockAlreadyHeld { .. }) => exit_codes::LOCKED,
        _ => exit_codes::INVALID,
    }
}
