//! Config invariants checked before a run touches the lock.

use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::{Component, Path};

use crate::config::{BackupConfig, ItemConfig};

/// Collect every invariant violation in `config`. Empty means valid.
pub fn validate_config(config: &BackupConfig) -> Vec<String> {
    let mut errors = Vec::new();

    if config.command_timeout_secs == Some(0) {
        errors.push("command_timeout_secs must be > 0".to_string());
    }
    check_hook(&mut errors, "pre_script_action", config.pre_script_action.as_deref());
    check_hook(&mut errors, "post_script_action", config.post_script_action.as_deref());

    let mut seen = HashSet::new();
    for (index, item) in config.backup_list.iter().enumerate() {
        check_item(&mut errors, index, item);
        // Enabled items with the same name share one archive directory per destination
        // and one identity in the run report.
        if item.enabled && !seen.insert(item.name.as_str()) {
            errors.push(format!("duplicate enabled item name: {}", item.name));
        }
    }

    errors
}

fn check_item(errors: &mut Vec<String>, index: usize, item: &ItemConfig) {
    let label = if item.name.is_empty() {
        format!("backup_list[{index}]")
    } else {
        item.name.clone()
    };
    if !is_single_component(&item.name) {
        errors.push(format!(
            "{label}: name must be a single path component, got {:?}",
            item.name
        ));
    }
    if item.src_path.as_os_str().is_empty() {
        errors.push(format!("{label}: src_path must not be empty"));
    }
    if item.dest_path.as_os_str().is_empty() {
        errors.push(format!("{label}: dest_path must not be empty"));
    }
    check_hook(errors, &format!("{label}: pre_action"), item.pre_action.as_deref());
    check_hook(errors, &format!("{label}: post_action"), item.post_action.as_deref());
}

fn check_hook(errors: &mut Vec<String>, label: &str, command: Option<&str>) {
    if let Some(command) = command
        && command.trim().is_empty()
    {
        errors.push(format!("{label} must not be blank"));
    }
}

fn is_single_component(name: &str) -> bool {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(part)), None) => part == OsStr::new(name),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::item_config;

    fn config(items: Vec<ItemConfig>) -> BackupConfig {
        BackupConfig {
            backup_list: items,
            pre_script_action: None,
            post_script_action: None,
            show_script_time: false,
            command_timeout_secs: None,
        }
    }

    #[test]
    fn valid_config_has_no_errors() {
        let cfg = config(vec![item_config("docs", "src/docs", "dest")]);
        assert!(validate_config(&cfg).is_empty());
    }

    #[test]
    fn rejects_names_that_are_not_a_single_component() {
        for bad in ["", ".", "..", "a/b", "/abs", "docs/"] {
            let cfg = config(vec![item_config(bad, "src", "dest")]);
            let errors = validate_config(&cfg);
            assert!(
                errors.iter().any(|e| e.contains("single path component")),
                "expected name error for {bad:?}, got {errors:?}"
            );
        }
    }

    #[test]
    fn rejects_duplicate_enabled_names_only() {
        let mut disabled = item_config("docs", "other", "dest");
        disabled.enabled = false;
        let cfg = config(vec![item_config("docs", "src", "dest"), disabled]);
        assert!(validate_config(&cfg).is_empty());

        let cfg = config(vec![
            item_config("docs", "src", "dest"),
            item_config("docs", "other", "dest"),
        ]);
        let errors = validate_config(&cfg);
        assert_eq!(errors, vec!["duplicate enabled item name: docs".to_string()]);
    }

    #[test]
    fn collects_every_violation() {
        let mut item = item_config("docs", "", "");
        item.pre_action = Some("   ".to_string());
        let mut cfg = config(vec![item]);
        cfg.command_timeout_secs = Some(0);
        cfg.post_script_action = Some(String::new());

        let errors = validate_config(&cfg);
        assert_eq!(errors.len(), 5, "{errors:?}");
        assert!(errors.iter().any(|e| e == "docs: src_path must not be empty"));
        assert!(errors.iter().any(|e| e == "docs: pre_action must not be blank"));
        assert!(errors.iter().any(|e| e == "post_script_action must not be blank"));
    }
}
