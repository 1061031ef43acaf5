//! Test-only helpers: scripted archiver/hook doubles and a temp workspace.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tempfile::TempDir;

use crate::config::{BackupConfig, ItemConfig};
use crate::coordinator::RunRequest;
use crate::core::naming::item_dir;
use crate::core::types::RunMode;
use crate::error::BackupError;
use crate::io::archive::{ArchiveRequest, Archiver};
use crate::io::hooks::{HookRequest, HookRunner};
use crate::io::lock::RunLock;

/// Enabled item with no hooks.
pub fn item_config(name: &str, src_path: &str, dest_path: &str) -> ItemConfig {
    ItemConfig {
        name: name.to_string(),
        src_path: PathBuf::from(src_path),
        dest_path: PathBuf::from(dest_path),
        enabled: true,
        pre_action: None,
        post_action: None,
        tar_opts: None,
        show_time_taken: false,
    }
}

fn names(list: &[&str]) -> HashSet<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// Archiver double that writes marker files instead of running tar.
///
/// Full mode writes both the archive and the snapshot; incremental mode
/// writes the archive only.
#[derive(Default)]
pub struct ScriptedArchiver {
    fail: HashSet<String>,
    panic_on: HashSet<String>,
    delay: Duration,
    archived: Mutex<Vec<String>>,
    requests: Mutex<Vec<ArchiveRequest>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl ScriptedArchiver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the archive phase for the named items.
    pub fn failing(items: &[&str]) -> Self {
        Self {
            fail: names(items),
            ..Self::default()
        }
    }

    /// Panic inside the worker for the named items.
    pub fn panicking(items: &[&str]) -> Self {
        Self {
            panic_on: names(items),
            ..Self::default()
        }
    }

    /// Hold each archive call open for `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Items archived successfully, in completion order.
    pub fn archived(&self) -> Vec<String> {
        self.archived.lock().expect("archived lock").clone()
    }

    /// Every request received, including failed ones.
    pub fn requests(&self) -> Vec<ArchiveRequest> {
        self.requests.lock().expect("requests lock").clone()
    }

    /// Highest number of archive calls observed in flight at once.
    pub fn max_concurrency(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

impl Archiver for ScriptedArchiver {
    fn archive(&self, request: &ArchiveRequest) -> Result<(), BackupError> {
        self.requests
            .lock()
            .expect("requests lock")
            .push(request.clone());
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        if self.panic_on.contains(&request.item) {
            panic!("scripted archiver panic for {}", request.item);
        }
        if self.fail.contains(&request.item) {
            return Err(BackupError::archive(&request.item, "scripted failure"));
        }

        let marker = format!("{} {}\n", request.mode, request.src_path.display());
        fs::write(&request.archive_path, &marker)
            .map_err(|err| BackupError::archive(&request.item, err.to_string()))?;
        if request.mode == RunMode::Full {
            fs::write(&request.snapshot_path, &marker)
                .map_err(|err| BackupError::archive(&request.item, err.to_string()))?;
        }
        self.archived
            .lock()
            .expect("archived lock")
            .push(request.item.clone());
        Ok(())
    }
}

/// Hook double that records commands and fails or panics on request.
#[derive(Default)]
pub struct ScriptedHookRunner {
    fail: HashSet<String>,
    panic_on: HashSet<String>,
    executed: Mutex<Vec<String>>,
}

impl ScriptedHookRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(commands: &[&str]) -> Self {
        Self {
            fail: names(commands),
            ..Self::default()
        }
    }

    pub fn panicking(commands: &[&str]) -> Self {
        Self {
            panic_on: names(commands),
            ..Self::default()
        }
    }

    /// Commands executed, in call order.
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().expect("executed lock").clone()
    }
}

impl HookRunner for ScriptedHookRunner {
    fn run(&self, request: &HookRequest) -> Result<(), BackupError> {
        self.executed
            .lock()
            .expect("executed lock")
            .push(request.command.clone());
        if self.panic_on.contains(&request.command) {
            panic!("scripted hook panic for {}", request.command);
        }
        if self.fail.contains(&request.command) {
            return Err(BackupError::hook(
                &request.label,
                &request.command,
                "exit status: 1",
            ));
        }
        Ok(())
    }
}

/// Temporary working directory with source trees under `src/` and
/// destinations under `dest/`.
pub struct TestWorkspace {
    dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("create tempdir")?;
        Ok(Self { dir })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Fixed run date so artifact names are predictable.
    pub fn date(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap_or_default()
    }

    pub fn lock(&self) -> RunLock {
        RunLock::in_dir(self.root())
    }

    pub fn request(&self, mode: RunMode) -> RunRequest {
        RunRequest {
            mode,
            date: self.date(),
            workdir: self.root().to_path_buf(),
        }
    }

    /// Create `src/<name>` with a file in it and return an item archiving it to `dest/`.
    pub fn item(&self, name: &str) -> Result<ItemConfig> {
        let src = self.root().join("src").join(name);
        fs::create_dir_all(&src).with_context(|| format!("create {}", src.display()))?;
        fs::write(src.join("data.txt"), format!("{name} data\n"))
            .with_context(|| format!("write {}", src.display()))?;
        Ok(item_config(name, &format!("src/{name}"), "dest"))
    }

    pub fn items(&self, names: &[&str]) -> Result<Vec<ItemConfig>> {
        names.iter().map(|name| self.item(name)).collect()
    }

    /// `<root>/dest/<name>`.
    pub fn item_dir(&self, name: &str) -> PathBuf {
        item_dir(&self.root().join("dest"), name)
    }

    pub fn config(&self, items: Vec<ItemConfig>) -> BackupConfig {
        BackupConfig {
            backup_list: items,
            pre_script_action: None,
            post_script_action: None,
            show_script_time: false,
            command_timeout_secs: None,
        }
    }

    /// Write `config` as `config.json` in the workspace root.
    pub fn write_config(&self, config: &BackupConfig) -> Result<PathBuf> {
        let path = self.root().join("config.json");
        let json = serde_json::to_string_pretty(config).context("serialize config")?;
        fs::write(&path, json).with_context(|| format!("write {}", path.display()))?;
        Ok(path)
    }
}
