//! Deterministic artifact names derived from item name, run mode, and date.
//!
//! Layout under an item's destination:
//!
//! ```text
//! <dest_path>/<name>/full-<name>-YYYY-MM-DD.tar.gz
//! <dest_path>/<name>/i.<name>-YYYY-MM-DD.tar.gz
//! <dest_path>/<name>/<name>-YYYY-MM-DD.snar
//! ```

use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::core::types::RunMode;

const DATE_FORMAT: &str = "%Y-%m-%d";
const SNAPSHOT_EXT: &str = ".snar";

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn item_dir(dest_path: &Path, name: &str) -> PathBuf {
    dest_path.join(name)
}

pub fn archive_file_name(mode: RunMode, name: &str, date: NaiveDate) -> String {
    let prefix = match mode {
        RunMode::Full => "full-",
        RunMode::Incremental => "i.",
    };
    format!("{prefix}{name}-{}.tar.gz", format_date(date))
}

pub fn snapshot_file_name(name: &str, date: NaiveDate) -> String {
    format!("{name}-{}{SNAPSHOT_EXT}", format_date(date))
}

/// Date encoded in a snapshot file name belonging to `name`, if it is one.
pub fn snapshot_date(name: &str, file_name: &str) -> Option<NaiveDate> {
    let stem = file_name.strip_suffix(SNAPSHOT_EXT)?;
    let date = stem.strip_prefix(name)?.strip_prefix('-')?;
    NaiveDate::parse_from_str(date, DATE_FORMAT).ok()
}

/// Newest snapshot for `name` among `file_names`.
pub fn latest_snapshot<'a, I>(name: &str, file_names: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    file_names
        .into_iter()
        .filter_map(|file| snapshot_date(name, file).map(|date| (date, file)))
        .max_by_key(|(date, _)| *date)
        .map(|(_, file)| file)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn archive_names_follow_mode_prefix() {
        let date = day(2024, 3, 9);
        assert_eq!(
            archive_file_name(RunMode::Full, "docs", date),
            "full-docs-2024-03-09.tar.gz"
        );
        assert_eq!(
            archive_file_name(RunMode::Incremental, "docs", date),
            "i.docs-2024-03-09.tar.gz"
        );
        assert_eq!(snapshot_file_name("docs", date), "docs-2024-03-09.snar");
    }

    #[test]
    fn item_dir_nests_name_under_dest() {
        assert_eq!(
            item_dir(Path::new("/mnt/backup"), "photos"),
            PathBuf::from("/mnt/backup/photos")
        );
    }

    #[test]
    fn snapshot_date_rejects_foreign_names() {
        assert_eq!(
            snapshot_date("docs", "docs-2024-01-31.snar"),
            Some(day(2024, 1, 31))
        );
        assert_eq!(snapshot_date("docs", "docs-old-2024-01-31.snar"), None);
        assert_eq!(snapshot_date("docs", "full-docs-2024-01-31.tar.gz"), None);
        assert_eq!(snapshot_date("docs", "docs-2024-13-01.snar"), None);
    }

    #[test]
    fn latest_snapshot_picks_newest_date() {
        let files = [
            "docs-2024-01-31.snar",
            "full-docs-2024-02-01.tar.gz",
            "docs-2024-02-01.snar",
            "docs-2023-12-25.snar",
        ];
        assert_eq!(
            latest_snapshot("docs", files.iter().copied()),
            Some("docs-2024-02-01.snar")
        );
        assert_eq!(latest_snapshot("photos", files.iter().copied()), None);
    }
}
