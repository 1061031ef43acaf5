//! Hook command adapter.
//!
//! Hooks are opaque shell command strings. The only contract is: run it to
//! completion in the working directory and report whether it exited zero.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::BackupError;
use crate::io::process::{DEFAULT_OUTPUT_LIMIT_BYTES, run_command};

#[derive(Debug, Clone)]
pub struct HookRequest {
    /// Which hook this is (`pre_action`, `post_script_action`, ...), for messages.
    pub label: String,
    pub command: String,
    pub workdir: PathBuf,
    pub timeout: Option<Duration>,
}

impl HookRequest {
    pub fn new(label: &str, command: &str, workdir: &Path, timeout: Option<Duration>) -> Self {
        Self {
            label: label.to_string(),
            command: command.to_string(),
            workdir: workdir.to_path_buf(),
            timeout,
        }
    }
}

/// Executes hook commands. Shared by every item worker.
pub trait HookRunner: Send + Sync {
    fn run(&self, request: &HookRequest) -> Result<(), BackupError>;
}

/// Runs hooks through `sh -c`.
pub struct ShellHookRunner {
    pub output_limit_bytes: usize,
}

impl Default for ShellHookRunner {
    fn default() -> Self {
        Self {
            output_limit_bytes: DEFAULT_OUTPUT_LIMIT_BYTES,
        }
    }
}

impl HookRunner for ShellHookRunner {
    fn run(&self, request: &HookRequest) -> Result<(), BackupError> {
        debug!(label = %request.label, command = %request.command, "executing hook");
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(&request.command)
            .current_dir(&request.workdir);

        let output = run_command(cmd, request.timeout, self.output_limit_bytes).map_err(|err| {
            BackupError::hook(&request.label, &request.command, format!("{err:#}"))
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            debug!(label = %request.label, output = %stdout.trim_end(), "hook stdout");
        }

        match output.failure_reason() {
            None => {
                info!(label = %request.label, command = %request.command, "hook finished");
                Ok(())
            }
            Some(reason) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                warn!(
                    label = %request.label,
                    command = %request.command,
                    exit_code = ?output.status.code(),
                    stderr = %stderr.trim_end(),
                    "hook failed"
                );
                Err(BackupError::hook(&request.label, &request.command, reason))
            }
        }
    }
}
