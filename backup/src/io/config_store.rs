//! Backup configuration loading (`config.json`, or TOML by extension).

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use tracing::debug;

use crate::config::BackupConfig;
use crate::core::invariants::validate_config;

/// Default config file, relative to the working directory.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Load and validate config from `path`.
///
/// Files ending in `.toml` are parsed as TOML, everything else as JSON.
pub fn load_config(path: &Path) -> Result<BackupConfig> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(anyhow!(
                "could not load {}, does it exist?",
                path.display()
            ));
        }
        Err(err) => return Err(err).with_context(|| format!("read {}", path.display())),
    };

    let cfg = parse_config(path, &contents)?;
    let errors = validate_config(&cfg);
    if !errors.is_empty() {
        bail!(
            "invalid config {}:\n- {}",
            path.display(),
            errors.join("\n- ")
        );
    }
    debug!(
        path = %path.display(),
        items = cfg.backup_list.len(),
        enabled = cfg.enabled_items().count(),
        "config loaded"
    );
    Ok(cfg)
}

fn parse_config(path: &Path, contents: &str) -> Result<BackupConfig> {
    let is_toml = path.extension().is_some_and(|ext| ext == "toml");
    if is_toml {
        toml::from_str(contents).with_context(|| format!("parse {}", path.display()))
    } else {
        serde_json::from_str(contents).with_context(|| format!("parse {}", path.display()))
    }
}
